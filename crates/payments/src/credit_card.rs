//! Credit card gateway.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Datelike, NaiveDate, Utc};
use domain::PaymentMethod;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::strategy::{record_gateway_call, simulate_processing};
use crate::{
    CreditCardDetails, FieldError, GatewayConfig, GatewayResponse, PaymentDetails, PaymentError,
    PaymentRequest, PaymentStrategy, ReferenceGenerator, Result,
};

/// Card network, detected from the number prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CardBrand {
    Visa,
    Mastercard,
    Amex,
    Elo,
    Unknown,
}

impl CardBrand {
    /// Detects the brand of a normalised card number.
    pub fn detect(digits: &str) -> Self {
        let prefix = |len: usize| digits.get(..len).and_then(|p| p.parse::<u32>().ok());

        if matches!(prefix(6), Some(401178 | 438935 | 451416 | 457631 | 504175 | 636297 | 636368)) {
            return CardBrand::Elo;
        }
        if digits.starts_with('4') {
            return CardBrand::Visa;
        }
        if matches!(prefix(2), Some(34 | 37)) {
            return CardBrand::Amex;
        }
        if matches!(prefix(2), Some(51..=55)) || matches!(prefix(4), Some(2221..=2720)) {
            return CardBrand::Mastercard;
        }
        CardBrand::Unknown
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CardBrand::Visa => "Visa",
            CardBrand::Mastercard => "Mastercard",
            CardBrand::Amex => "Amex",
            CardBrand::Elo => "Elo",
            CardBrand::Unknown => "Unknown",
        }
    }
}

impl std::fmt::Display for CardBrand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Strips the separators people type into card numbers.
pub(crate) fn normalize_card_number(number: &str) -> String {
    number
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '-')
        .collect()
}

pub(crate) fn last_four(number: &str) -> String {
    let digits: Vec<char> = normalize_card_number(number).chars().collect();
    digits[digits.len().saturating_sub(4)..].iter().collect()
}

/// Luhn checksum over ASCII digits.
pub fn luhn_valid(digits: &str) -> bool {
    if digits.len() < 12 || digits.len() > 19 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }
    let sum: u32 = digits
        .bytes()
        .rev()
        .enumerate()
        .map(|(i, b)| {
            let d = u32::from(b - b'0');
            if i % 2 == 1 {
                let doubled = d * 2;
                if doubled > 9 { doubled - 9 } else { doubled }
            } else {
                d
            }
        })
        .sum();
    sum % 10 == 0
}

/// Parses `MM/YY` into (year, month).
fn parse_expiry(value: &str) -> Option<(i32, u32)> {
    let (month, year) = value.trim().split_once('/')?;
    if month.len() != 2 || year.len() != 2 {
        return None;
    }
    let month: u32 = month.parse().ok()?;
    let year: i32 = year.parse().ok()?;
    (1..=12).contains(&month).then_some((2000 + year, month))
}

/// Simulated credit card gateway.
pub struct CreditCardStrategy {
    config: GatewayConfig,
    references: Arc<ReferenceGenerator>,
    reference_date: Option<NaiveDate>,
}

impl CreditCardStrategy {
    pub fn new(config: GatewayConfig, references: Arc<ReferenceGenerator>) -> Self {
        Self {
            config,
            references,
            reference_date: None,
        }
    }

    /// Pins the date expiry is checked against.
    pub fn with_reference_date(mut self, date: NaiveDate) -> Self {
        self.reference_date = Some(date);
        self
    }

    fn today(&self) -> NaiveDate {
        self.reference_date
            .unwrap_or_else(|| Utc::now().date_naive())
    }

    /// Checks every field and reports all problems at once.
    pub fn validate(&self, card: &CreditCardDetails) -> Result<()> {
        let mut errors = Vec::new();

        if !luhn_valid(&normalize_card_number(&card.card_number)) {
            errors.push(FieldError::new("CardNumber", "Card number is invalid"));
        }
        if card.card_holder_name.trim().is_empty() {
            errors.push(FieldError::new(
                "CardHolderName",
                "Card holder name is required",
            ));
        }
        match parse_expiry(&card.expiration_date) {
            None => errors.push(FieldError::new(
                "ExpirationDate",
                "Expiration date must use the MM/YY format",
            )),
            Some((year, month)) => {
                let today = self.today();
                if (year, month) < (today.year(), today.month()) {
                    errors.push(FieldError::new("ExpirationDate", "Card has expired"));
                }
            }
        }
        let cvv = card.cvv.trim();
        if !(3..=4).contains(&cvv.len()) || !cvv.bytes().all(|b| b.is_ascii_digit()) {
            errors.push(FieldError::new("Cvv", "CVV must have 3 or 4 digits"));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(PaymentError::Validation(errors))
        }
    }
}

#[async_trait]
impl PaymentStrategy for CreditCardStrategy {
    fn method(&self) -> PaymentMethod {
        PaymentMethod::CreditCard
    }

    #[tracing::instrument(skip(self, request, cancel), fields(amount = %request.amount))]
    async fn process_payment(
        &self,
        request: &PaymentRequest,
        cancel: &CancellationToken,
    ) -> Result<GatewayResponse> {
        let PaymentDetails::CreditCard(card) = &request.details else {
            return Err(PaymentError::field(
                "PaymentDetails",
                "Credit card details are required",
            ));
        };
        if let Err(err) = self.validate(card) {
            record_gateway_call(self.method(), "invalid");
            return Err(err);
        }

        let brand = CardBrand::detect(&normalize_card_number(&card.card_number));
        tracing::info!(%brand, "Sending card payment to gateway");
        simulate_processing(self.config.processing_delay, cancel).await?;

        record_gateway_call(self.method(), "approved");
        Ok(GatewayResponse {
            transaction_id: Uuid::new_v4(),
            reference: self.references.next_reference(),
            is_success: true,
            message: format!("{brand} payment approved"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strategy() -> CreditCardStrategy {
        CreditCardStrategy::new(
            GatewayConfig {
                processing_delay: std::time::Duration::ZERO,
            },
            Arc::new(ReferenceGenerator::seeded(3)),
        )
        .with_reference_date(NaiveDate::from_ymd_opt(2026, 6, 15).unwrap())
    }

    fn card(number: &str, expiry: &str, cvv: &str) -> CreditCardDetails {
        CreditCardDetails {
            card_number: number.to_string(),
            card_holder_name: "Maria Silva".to_string(),
            expiration_date: expiry.to_string(),
            cvv: cvv.to_string(),
        }
    }

    fn fields(err: PaymentError) -> Vec<&'static str> {
        match err {
            PaymentError::Validation(errors) => errors.into_iter().map(|e| e.field).collect(),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn luhn_accepts_test_cards() {
        assert!(luhn_valid("4111111111111111"));
        assert!(luhn_valid("5555555555554444"));
        assert!(luhn_valid("378282246310005"));
        assert!(!luhn_valid("1234567890123456"));
        assert!(!luhn_valid("4111a11111111111"));
    }

    #[test]
    fn brand_detection() {
        assert_eq!(CardBrand::detect("4111111111111111"), CardBrand::Visa);
        assert_eq!(CardBrand::detect("5555555555554444"), CardBrand::Mastercard);
        assert_eq!(CardBrand::detect("2221000000000009"), CardBrand::Mastercard);
        assert_eq!(CardBrand::detect("378282246310005"), CardBrand::Amex);
        assert_eq!(CardBrand::detect("6362970000457013"), CardBrand::Elo);
        assert_eq!(CardBrand::detect("9999"), CardBrand::Unknown);
    }

    #[test]
    fn valid_card_passes() {
        assert!(
            strategy()
                .validate(&card("4111 1111 1111 1111", "12/28", "123"))
                .is_ok()
        );
    }

    #[test]
    fn invalid_number_is_reported_on_card_number() {
        let err = strategy()
            .validate(&card("1234567890123456", "12/28", "123"))
            .unwrap_err();
        assert_eq!(fields(err), vec!["CardNumber"]);
    }

    #[test]
    fn expiry_is_checked_against_reference_date() {
        let strategy = strategy();
        assert!(
            strategy
                .validate(&card("4111111111111111", "06/26", "123"))
                .is_ok()
        );
        let err = strategy
            .validate(&card("4111111111111111", "05/26", "123"))
            .unwrap_err();
        assert_eq!(fields(err), vec!["ExpirationDate"]);

        let err = strategy
            .validate(&card("4111111111111111", "13/28", "123"))
            .unwrap_err();
        assert_eq!(fields(err), vec!["ExpirationDate"]);
    }

    #[test]
    fn all_problems_are_reported_together() {
        let mut details = card("1234", "1/2", "12");
        details.card_holder_name = " ".to_string();
        let err = strategy().validate(&details).unwrap_err();
        assert_eq!(
            fields(err),
            vec!["CardNumber", "CardHolderName", "ExpirationDate", "Cvv"]
        );
    }

    #[test]
    fn last_four_ignores_separators() {
        assert_eq!(last_four("4111-1111-1111-1234"), "1234");
        assert_eq!(last_four("12"), "12");
    }
}
