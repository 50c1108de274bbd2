//! Currency-tagged monetary amounts.

use std::str::FromStr;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Number of decimal places amounts are rounded to after derived arithmetic.
const MINOR_UNIT_SCALE: u32 = 2;

/// Errors raised by money construction and arithmetic.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MoneyError {
    /// Arithmetic was attempted between two different currencies.
    #[error("Currency mismatch: {left} vs {right}")]
    CurrencyMismatch {
        left: CurrencyCode,
        right: CurrencyCode,
    },

    /// The currency code is not three ASCII letters.
    #[error("Invalid currency code: {0:?}")]
    InvalidCurrency(String),

    /// The amount could not be parsed as a decimal.
    #[error("Invalid amount: {0:?}")]
    InvalidAmount(String),

    /// The result does not fit in a decimal amount.
    #[error("Amount overflow")]
    Overflow,
}

/// ISO-4217 style currency code (three upper-case ASCII letters).
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CurrencyCode([u8; 3]);

impl CurrencyCode {
    /// Brazilian real, the storefront's home currency.
    pub const BRL: CurrencyCode = CurrencyCode(*b"BRL");

    /// Parses a currency code, normalising it to upper case.
    pub fn parse(code: &str) -> Result<Self, MoneyError> {
        let bytes = code.as_bytes();
        if bytes.len() != 3 || !bytes.iter().all(u8::is_ascii_alphabetic) {
            return Err(MoneyError::InvalidCurrency(code.to_string()));
        }
        Ok(Self([
            bytes[0].to_ascii_uppercase(),
            bytes[1].to_ascii_uppercase(),
            bytes[2].to_ascii_uppercase(),
        ]))
    }

    /// Returns the code as a string slice.
    pub fn as_str(&self) -> &str {
        // Construction only admits ASCII letters.
        std::str::from_utf8(&self.0).unwrap_or("???")
    }
}

impl std::fmt::Debug for CurrencyCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CurrencyCode({})", self.as_str())
    }
}

impl std::fmt::Display for CurrencyCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CurrencyCode {
    type Err = MoneyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for CurrencyCode {
    type Error = MoneyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<CurrencyCode> for String {
    fn from(code: CurrencyCode) -> Self {
        code.as_str().to_string()
    }
}

/// An immutable amount of money in a specific currency.
///
/// Arithmetic between two amounts is only defined when both carry the same
/// currency; a mismatch is reported as [`MoneyError::CurrencyMismatch`] and
/// never coerced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Money {
    currency: CurrencyCode,
    amount: Decimal,
}

impl Money {
    /// Creates a money value.
    pub fn new(currency: CurrencyCode, amount: Decimal) -> Self {
        Self { currency, amount }
    }

    /// Creates a money value from a currency code and decimal string.
    pub fn parse(currency: &str, amount: &str) -> Result<Self, MoneyError> {
        let currency = CurrencyCode::parse(currency)?;
        let amount =
            Decimal::from_str(amount).map_err(|_| MoneyError::InvalidAmount(amount.to_string()))?;
        Ok(Self { currency, amount })
    }

    /// Returns zero in the given currency.
    pub fn zero(currency: CurrencyCode) -> Self {
        Self {
            currency,
            amount: Decimal::ZERO,
        }
    }

    /// Returns the currency code.
    pub fn currency(&self) -> CurrencyCode {
        self.currency
    }

    /// Returns the decimal amount.
    pub fn amount(&self) -> Decimal {
        self.amount
    }

    pub fn is_zero(&self) -> bool {
        self.amount.is_zero()
    }

    pub fn is_positive(&self) -> bool {
        self.amount > Decimal::ZERO
    }

    pub fn is_negative(&self) -> bool {
        self.amount < Decimal::ZERO
    }

    /// Returns true if both values share a currency.
    pub fn same_currency(&self, other: &Money) -> bool {
        self.currency == other.currency
    }

    /// Adds another amount of the same currency.
    pub fn try_add(&self, other: Money) -> Result<Money, MoneyError> {
        self.ensure_same_currency(&other)?;
        let amount = self.amount.checked_add(other.amount).ok_or(MoneyError::Overflow)?;
        Ok(Money::new(self.currency, amount))
    }

    /// Subtracts another amount of the same currency.
    pub fn try_sub(&self, other: Money) -> Result<Money, MoneyError> {
        self.ensure_same_currency(&other)?;
        let amount = self.amount.checked_sub(other.amount).ok_or(MoneyError::Overflow)?;
        Ok(Money::new(self.currency, amount))
    }

    /// Multiplies by a quantity.
    pub fn try_times(&self, quantity: u32) -> Result<Money, MoneyError> {
        let amount = self
            .amount
            .checked_mul(Decimal::from(quantity))
            .ok_or(MoneyError::Overflow)?;
        Ok(Money::new(self.currency, amount))
    }

    /// Returns `percentage` percent of this amount, rounded to minor units.
    pub fn try_percent(&self, percentage: Decimal) -> Result<Money, MoneyError> {
        let raw = self
            .amount
            .checked_mul(percentage)
            .and_then(|scaled| scaled.checked_div(Decimal::ONE_HUNDRED))
            .ok_or(MoneyError::Overflow)?;
        Ok(Money::new(
            self.currency,
            raw.round_dp_with_strategy(MINOR_UNIT_SCALE, RoundingStrategy::MidpointAwayFromZero),
        ))
    }

    /// Returns the smaller of two amounts of the same currency.
    pub fn try_min(&self, other: Money) -> Result<Money, MoneyError> {
        self.ensure_same_currency(&other)?;
        Ok(if other.amount < self.amount {
            other
        } else {
            *self
        })
    }

    /// Returns zero when the amount is negative.
    pub fn clamp_non_negative(&self) -> Money {
        if self.is_negative() {
            Money::zero(self.currency)
        } else {
            *self
        }
    }

    /// Sums amounts, all of which must be in `currency`.
    pub fn sum<I>(currency: CurrencyCode, amounts: I) -> Result<Money, MoneyError>
    where
        I: IntoIterator<Item = Money>,
    {
        amounts
            .into_iter()
            .try_fold(Money::zero(currency), |acc, next| acc.try_add(next))
    }

    fn ensure_same_currency(&self, other: &Money) -> Result<(), MoneyError> {
        if self.currency != other.currency {
            return Err(MoneyError::CurrencyMismatch {
                left: self.currency,
                right: other.currency,
            });
        }
        Ok(())
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {:.2}", self.currency, self.amount)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn brl(amount: &str) -> Money {
        Money::parse("BRL", amount).unwrap()
    }

    #[test]
    fn currency_code_is_normalised() {
        let code = CurrencyCode::parse("brl").unwrap();
        assert_eq!(code.as_str(), "BRL");
    }

    #[test]
    fn currency_code_rejects_bad_input() {
        assert!(CurrencyCode::parse("BR").is_err());
        assert!(CurrencyCode::parse("BRLX").is_err());
        assert!(CurrencyCode::parse("B1L").is_err());
    }

    #[test]
    fn adding_same_currency_sums_amounts() {
        let total = brl("50.00").try_add(brl("25.50")).unwrap();
        assert_eq!(total, brl("75.50"));
    }

    #[test]
    fn adding_different_currency_fails() {
        let usd = Money::parse("USD", "10").unwrap();
        let result = brl("10").try_add(usd);
        assert!(matches!(result, Err(MoneyError::CurrencyMismatch { .. })));
    }

    #[test]
    fn subtracting_different_currency_fails() {
        let eur = Money::parse("EUR", "1").unwrap();
        assert!(brl("10").try_sub(eur).is_err());
    }

    #[test]
    fn times_multiplies_by_quantity() {
        assert_eq!(brl("50.00").try_times(2).unwrap(), brl("100.00"));
    }

    #[test]
    fn percent_rounds_to_cents() {
        assert_eq!(brl("10.05").try_percent(Decimal::from(10)).unwrap(), brl("1.01"));
        assert_eq!(brl("200").try_percent(Decimal::from(15)).unwrap(), brl("30"));
    }

    #[test]
    fn overflow_is_reported_instead_of_panicking() {
        let huge = Money::new(CurrencyCode::BRL, Decimal::MAX);
        assert_eq!(huge.try_times(2), Err(MoneyError::Overflow));
        assert_eq!(huge.try_add(brl("1")), Err(MoneyError::Overflow));
        assert_eq!(huge.try_percent(Decimal::from(50)), Err(MoneyError::Overflow));
        let code = CurrencyCode::BRL;
        assert_eq!(Money::sum(code, [huge, huge]), Err(MoneyError::Overflow));
    }

    #[test]
    fn sum_requires_one_currency() {
        let code = CurrencyCode::parse("BRL").unwrap();
        let total = Money::sum(code, [brl("1"), brl("2"), brl("3")]).unwrap();
        assert_eq!(total, brl("6"));

        let mixed = Money::sum(code, [brl("1"), Money::parse("USD", "2").unwrap()]);
        assert!(mixed.is_err());
    }

    #[test]
    fn clamp_non_negative_floors_at_zero() {
        let negative = brl("5").try_sub(brl("8")).unwrap();
        assert!(negative.is_negative());
        assert!(negative.clamp_non_negative().is_zero());
    }

    #[test]
    fn display_shows_currency_and_two_decimals() {
        assert_eq!(brl("50").to_string(), "BRL 50.00");
    }

    #[test]
    fn money_serialization_roundtrip() {
        let money = brl("12.34");
        let json = serde_json::to_string(&money).unwrap();
        let back: Money = serde_json::from_str(&json).unwrap();
        assert_eq!(money, back);
    }
}
