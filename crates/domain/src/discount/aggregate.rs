//! Discount aggregate implementation.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use common::{CategoryId, DiscountId, Money};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{DiscountError, DiscountType};

/// Input for creating a discount.
#[derive(Debug, Clone)]
pub struct NewDiscount {
    pub code: Option<String>,
    pub discount_type: DiscountType,
    pub fixed_amount: Option<Money>,
    pub percentage: Option<Decimal>,
    pub max_uses: u32,
    pub min_order_amount: Money,
    pub max_uses_per_user: u32,
    pub valid_from: DateTime<Utc>,
    pub valid_to: DateTime<Utc>,
    pub auto_apply: bool,
    pub categories: BTreeSet<CategoryId>,
}

/// Storage representation of a discount.
#[derive(Debug, Clone)]
pub struct DiscountParts {
    pub id: DiscountId,
    pub code: Option<String>,
    pub discount_type: DiscountType,
    pub fixed_amount: Option<Money>,
    pub percentage: Option<Decimal>,
    pub max_uses: u32,
    pub uses: u32,
    pub min_order_amount: Money,
    pub max_uses_per_user: u32,
    pub valid_from: DateTime<Utc>,
    pub valid_to: DateTime<Utc>,
    pub is_active: bool,
    pub auto_apply: bool,
    pub categories: BTreeSet<CategoryId>,
    pub created_at: DateTime<Utc>,
}

/// Outcome of recording one more use of a discount.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UsageOutcome {
    pub uses: u32,
    /// True when this use consumed the last allowed one; the caller is
    /// expected to deactivate the discount.
    pub reached_limit: bool,
}

/// Discount aggregate root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Discount {
    id: DiscountId,
    code: Option<String>,
    discount_type: DiscountType,
    fixed_amount: Option<Money>,
    percentage: Option<Decimal>,
    max_uses: u32,
    uses: u32,
    min_order_amount: Money,
    max_uses_per_user: u32,
    valid_from: DateTime<Utc>,
    valid_to: DateTime<Utc>,
    is_active: bool,
    auto_apply: bool,
    categories: BTreeSet<CategoryId>,
    created_at: DateTime<Utc>,
}

impl Discount {
    /// Creates a new active discount with no recorded uses.
    pub fn create(new: NewDiscount, now: DateTime<Utc>) -> Result<Self, DiscountError> {
        Self::from_parts(DiscountParts {
            id: DiscountId::new(),
            code: new.code,
            discount_type: new.discount_type,
            fixed_amount: new.fixed_amount,
            percentage: new.percentage,
            max_uses: new.max_uses,
            uses: 0,
            min_order_amount: new.min_order_amount,
            max_uses_per_user: new.max_uses_per_user,
            valid_from: new.valid_from,
            valid_to: new.valid_to,
            is_active: true,
            auto_apply: new.auto_apply,
            categories: new.categories,
            created_at: now,
        })
    }

    /// Rehydrates a discount from storage, re-checking its definition.
    pub fn from_parts(parts: DiscountParts) -> Result<Self, DiscountError> {
        let code = match parts.code {
            Some(code) if !code.trim().is_empty() => Some(code.trim().to_uppercase()),
            _ => None,
        };

        match parts.discount_type {
            DiscountType::Fixed => {
                if parts.fixed_amount.is_none() {
                    return Err(DiscountError::invalid(
                        "fixed_amount",
                        "is required for fixed discounts",
                    ));
                }
                if parts.percentage.is_some() {
                    return Err(DiscountError::invalid(
                        "percentage",
                        "must be empty for fixed discounts",
                    ));
                }
            }
            DiscountType::Percentage => {
                if parts.percentage.is_none() {
                    return Err(DiscountError::invalid(
                        "percentage",
                        "is required for percentage discounts",
                    ));
                }
                if parts.fixed_amount.is_some() {
                    return Err(DiscountError::invalid(
                        "fixed_amount",
                        "must be empty for percentage discounts",
                    ));
                }
            }
            DiscountType::Coupon => {
                if code.is_none() {
                    return Err(DiscountError::invalid("code", "is required for coupons"));
                }
                if parts.fixed_amount.is_none() && parts.percentage.is_none() {
                    return Err(DiscountError::invalid(
                        "fixed_amount",
                        "a coupon needs a fixed amount or a percentage",
                    ));
                }
            }
        }

        if let Some(amount) = parts.fixed_amount {
            if !amount.is_positive() {
                return Err(DiscountError::invalid("fixed_amount", "must be positive"));
            }
            if !amount.same_currency(&parts.min_order_amount) {
                return Err(DiscountError::invalid(
                    "fixed_amount",
                    "must use the same currency as the minimum order amount",
                ));
            }
        }
        if let Some(percentage) = parts.percentage
            && (percentage <= Decimal::ZERO || percentage > Decimal::ONE_HUNDRED)
        {
            return Err(DiscountError::invalid(
                "percentage",
                "must be greater than 0 and at most 100",
            ));
        }
        if parts.max_uses == 0 {
            return Err(DiscountError::invalid("max_uses", "must be at least 1"));
        }
        if parts.uses > parts.max_uses {
            return Err(DiscountError::invalid("uses", "exceeds max_uses"));
        }
        if parts.max_uses_per_user == 0 {
            return Err(DiscountError::invalid(
                "max_uses_per_user",
                "must be at least 1",
            ));
        }
        if parts.min_order_amount.is_negative() {
            return Err(DiscountError::invalid(
                "min_order_amount",
                "must not be negative",
            ));
        }
        if parts.valid_from >= parts.valid_to {
            return Err(DiscountError::invalid(
                "valid_to",
                "must be after valid_from",
            ));
        }

        Ok(Self {
            id: parts.id,
            code,
            discount_type: parts.discount_type,
            fixed_amount: parts.fixed_amount,
            percentage: parts.percentage,
            max_uses: parts.max_uses,
            uses: parts.uses,
            min_order_amount: parts.min_order_amount,
            max_uses_per_user: parts.max_uses_per_user,
            valid_from: parts.valid_from,
            valid_to: parts.valid_to,
            is_active: parts.is_active,
            auto_apply: parts.auto_apply,
            categories: parts.categories,
            created_at: parts.created_at,
        })
    }

    pub fn to_parts(&self) -> DiscountParts {
        DiscountParts {
            id: self.id,
            code: self.code.clone(),
            discount_type: self.discount_type,
            fixed_amount: self.fixed_amount,
            percentage: self.percentage,
            max_uses: self.max_uses,
            uses: self.uses,
            min_order_amount: self.min_order_amount,
            max_uses_per_user: self.max_uses_per_user,
            valid_from: self.valid_from,
            valid_to: self.valid_to,
            is_active: self.is_active,
            auto_apply: self.auto_apply,
            categories: self.categories.clone(),
            created_at: self.created_at,
        }
    }
}

// Query methods
impl Discount {
    pub fn id(&self) -> DiscountId {
        self.id
    }

    /// Coupon code, normalised to upper case.
    pub fn code(&self) -> Option<&str> {
        self.code.as_deref()
    }

    pub fn discount_type(&self) -> DiscountType {
        self.discount_type
    }

    pub fn fixed_amount(&self) -> Option<Money> {
        self.fixed_amount
    }

    pub fn percentage(&self) -> Option<Decimal> {
        self.percentage
    }

    pub fn max_uses(&self) -> u32 {
        self.max_uses
    }

    pub fn uses(&self) -> u32 {
        self.uses
    }

    pub fn min_order_amount(&self) -> Money {
        self.min_order_amount
    }

    pub fn max_uses_per_user(&self) -> u32 {
        self.max_uses_per_user
    }

    pub fn valid_from(&self) -> DateTime<Utc> {
        self.valid_from
    }

    pub fn valid_to(&self) -> DateTime<Utc> {
        self.valid_to
    }

    pub fn is_active(&self) -> bool {
        self.is_active
    }

    pub fn auto_apply(&self) -> bool {
        self.auto_apply
    }

    pub fn categories(&self) -> &BTreeSet<CategoryId> {
        &self.categories
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns true if every allowed use has been consumed.
    pub fn is_exhausted(&self) -> bool {
        self.uses >= self.max_uses
    }

    /// A discount that was used at least once is part of the order history.
    pub fn can_be_deleted(&self) -> bool {
        self.uses == 0
    }

    /// Returns true if the discount can be used at `now`.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.ensure_usable_at(now).is_ok()
    }

    pub fn is_eligible(
        &self,
        cart_total: Money,
        cart_categories: &BTreeSet<CategoryId>,
        now: DateTime<Utc>,
    ) -> bool {
        self.ensure_eligible(cart_total, cart_categories, now).is_ok()
    }

    /// Checks activity, validity window and remaining uses at `now`.
    pub fn ensure_usable_at(&self, now: DateTime<Utc>) -> Result<(), DiscountError> {
        if !self.is_active {
            return Err(DiscountError::Inactive);
        }
        if now < self.valid_from || now > self.valid_to {
            return Err(DiscountError::OutsideValidityWindow);
        }
        if self.is_exhausted() {
            return Err(DiscountError::UsageLimitReached {
                uses: self.uses,
                max_uses: self.max_uses,
            });
        }
        Ok(())
    }

    /// Checks whether the discount may be applied to a cart.
    ///
    /// `cart_categories` are the categories of the products in the cart. A
    /// discount without categories applies to any cart.
    pub fn ensure_eligible(
        &self,
        cart_total: Money,
        cart_categories: &BTreeSet<CategoryId>,
        now: DateTime<Utc>,
    ) -> Result<(), DiscountError> {
        self.ensure_usable_at(now)?;

        let shortfall = cart_total.try_sub(self.min_order_amount)?;
        if shortfall.is_negative() {
            return Err(DiscountError::BelowMinimumOrder {
                minimum: self.min_order_amount,
            });
        }

        if !self.categories.is_empty() && self.categories.is_disjoint(cart_categories) {
            return Err(DiscountError::CategoryMismatch);
        }
        Ok(())
    }

    /// Checks the per-customer limit given how often the customer used it.
    pub fn ensure_customer_allowance(&self, customer_uses: u32) -> Result<(), DiscountError> {
        if customer_uses >= self.max_uses_per_user {
            return Err(DiscountError::CustomerLimitReached {
                uses: customer_uses,
                limit: self.max_uses_per_user,
            });
        }
        Ok(())
    }

    /// Computes the amount this discount takes off `order_total`.
    ///
    /// The result is never larger than the order total. A coupon carrying
    /// both a percentage and a fixed amount applies the percentage first and
    /// then the fixed amount.
    pub fn calculate_amount(&self, order_total: Money) -> Result<Money, DiscountError> {
        let mut amount = Money::zero(order_total.currency());
        if let Some(percentage) = self.percentage {
            amount = amount.try_add(order_total.try_percent(percentage)?)?;
        }
        if let Some(fixed) = self.fixed_amount {
            amount = amount.try_add(fixed)?;
        }
        Ok(amount.try_min(order_total.clamp_non_negative())?)
    }
}

// Command methods
impl Discount {
    /// Records one more use.
    ///
    /// Fails without changing state when the limit was already reached.
    pub fn increment_usage(&mut self) -> Result<UsageOutcome, DiscountError> {
        if self.is_exhausted() {
            return Err(DiscountError::UsageLimitReached {
                uses: self.uses,
                max_uses: self.max_uses,
            });
        }
        self.uses += 1;
        Ok(UsageOutcome {
            uses: self.uses,
            reached_limit: self.is_exhausted(),
        })
    }

    /// Deactivates the discount. Returns false if it was already inactive.
    pub fn deactivate(&mut self) -> bool {
        let was_active = self.is_active;
        self.is_active = false;
        was_active
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use common::CurrencyCode;

    use super::*;

    fn brl(amount: &str) -> Money {
        Money::parse("BRL", amount).unwrap()
    }

    fn base(discount_type: DiscountType) -> NewDiscount {
        let now = Utc::now();
        NewDiscount {
            code: None,
            discount_type,
            fixed_amount: None,
            percentage: None,
            max_uses: 2,
            min_order_amount: brl("0"),
            max_uses_per_user: 1,
            valid_from: now - Duration::days(1),
            valid_to: now + Duration::days(1),
            auto_apply: true,
            categories: BTreeSet::new(),
        }
    }

    fn fixed(amount: &str) -> Discount {
        let new = NewDiscount {
            fixed_amount: Some(brl(amount)),
            ..base(DiscountType::Fixed)
        };
        Discount::create(new, Utc::now()).unwrap()
    }

    #[test]
    fn fixed_discount_requires_only_amount() {
        assert!(Discount::create(base(DiscountType::Fixed), Utc::now()).is_err());

        let both = NewDiscount {
            fixed_amount: Some(brl("5")),
            percentage: Some(Decimal::from(10)),
            ..base(DiscountType::Fixed)
        };
        assert!(matches!(
            Discount::create(both, Utc::now()),
            Err(DiscountError::InvalidDefinition {
                field: "percentage",
                ..
            })
        ));
    }

    #[test]
    fn percentage_discount_requires_only_percentage() {
        let ok = NewDiscount {
            percentage: Some(Decimal::from(10)),
            ..base(DiscountType::Percentage)
        };
        assert!(Discount::create(ok, Utc::now()).is_ok());

        let too_big = NewDiscount {
            percentage: Some(Decimal::from(150)),
            ..base(DiscountType::Percentage)
        };
        assert!(Discount::create(too_big, Utc::now()).is_err());
    }

    #[test]
    fn coupon_requires_code_and_some_amount() {
        let no_code = NewDiscount {
            fixed_amount: Some(brl("5")),
            ..base(DiscountType::Coupon)
        };
        assert!(Discount::create(no_code, Utc::now()).is_err());

        let no_amount = NewDiscount {
            code: Some("save5".to_string()),
            ..base(DiscountType::Coupon)
        };
        assert!(Discount::create(no_amount, Utc::now()).is_err());

        let ok = NewDiscount {
            code: Some(" save5 ".to_string()),
            fixed_amount: Some(brl("5")),
            ..base(DiscountType::Coupon)
        };
        let coupon = Discount::create(ok, Utc::now()).unwrap();
        assert_eq!(coupon.code(), Some("SAVE5"));
    }

    #[test]
    fn window_must_be_ordered() {
        let now = Utc::now();
        let inverted = NewDiscount {
            fixed_amount: Some(brl("5")),
            valid_from: now,
            valid_to: now - Duration::hours(1),
            ..base(DiscountType::Fixed)
        };
        assert!(Discount::create(inverted, Utc::now()).is_err());
    }

    #[test]
    fn uses_never_exceed_max() {
        let mut discount = fixed("5");
        assert_eq!(
            discount.increment_usage().unwrap(),
            UsageOutcome {
                uses: 1,
                reached_limit: false
            }
        );
        assert!(discount.increment_usage().unwrap().reached_limit);

        let err = discount.increment_usage().unwrap_err();
        assert!(matches!(err, DiscountError::UsageLimitReached { .. }));
        assert_eq!(discount.uses(), discount.max_uses());
    }

    #[test]
    fn deactivate_is_idempotent() {
        let mut discount = fixed("5");
        assert!(discount.deactivate());
        assert!(!discount.deactivate());
        assert!(!discount.is_active());
        assert_eq!(
            discount.ensure_usable_at(Utc::now()),
            Err(DiscountError::Inactive)
        );
    }

    #[test]
    fn fixed_amount_is_capped_at_total() {
        let discount = fixed("30");
        assert_eq!(discount.calculate_amount(brl("100")).unwrap(), brl("30"));
        assert_eq!(discount.calculate_amount(brl("20")).unwrap(), brl("20"));
    }

    #[test]
    fn percentage_amount_is_rounded() {
        let new = NewDiscount {
            percentage: Some(Decimal::from(15)),
            ..base(DiscountType::Percentage)
        };
        let discount = Discount::create(new, Utc::now()).unwrap();
        assert_eq!(
            discount.calculate_amount(brl("99.99")).unwrap(),
            brl("15.00")
        );
    }

    #[test]
    fn coupon_with_both_applies_percentage_then_fixed() {
        let new = NewDiscount {
            code: Some("COMBO".to_string()),
            fixed_amount: Some(brl("5")),
            percentage: Some(Decimal::from(10)),
            ..base(DiscountType::Coupon)
        };
        let coupon = Discount::create(new, Utc::now()).unwrap();
        assert_eq!(coupon.calculate_amount(brl("100")).unwrap(), brl("15"));
    }

    #[test]
    fn eligibility_checks_minimum_and_categories() {
        let category = CategoryId::new();
        let new = NewDiscount {
            fixed_amount: Some(brl("5")),
            min_order_amount: brl("50"),
            categories: BTreeSet::from([category]),
            ..base(DiscountType::Fixed)
        };
        let discount = Discount::create(new, Utc::now()).unwrap();
        let now = Utc::now();

        assert!(matches!(
            discount.ensure_eligible(brl("49.99"), &BTreeSet::from([category]), now),
            Err(DiscountError::BelowMinimumOrder { .. })
        ));
        assert_eq!(
            discount.ensure_eligible(brl("60"), &BTreeSet::from([CategoryId::new()]), now),
            Err(DiscountError::CategoryMismatch)
        );
        assert!(
            discount
                .ensure_eligible(brl("60"), &BTreeSet::from([category]), now)
                .is_ok()
        );
    }

    #[test]
    fn eligibility_rejects_other_currency() {
        let discount = fixed("5");
        let usd = Money::zero(CurrencyCode::parse("USD").unwrap());
        assert!(matches!(
            discount.ensure_eligible(usd, &BTreeSet::new(), Utc::now()),
            Err(DiscountError::Money(_))
        ));
    }

    #[test]
    fn expired_discount_is_unusable() {
        let discount = fixed("5");
        let later = discount.valid_to() + Duration::seconds(1);
        assert_eq!(
            discount.ensure_usable_at(later),
            Err(DiscountError::OutsideValidityWindow)
        );
    }

    #[test]
    fn customer_allowance_is_enforced() {
        let discount = fixed("5");
        assert!(discount.ensure_customer_allowance(0).is_ok());
        assert!(matches!(
            discount.ensure_customer_allowance(1),
            Err(DiscountError::CustomerLimitReached { .. })
        ));
    }

    #[test]
    fn used_discount_cannot_be_deleted() {
        let mut discount = fixed("5");
        assert!(discount.can_be_deleted());
        discount.increment_usage().unwrap();
        assert!(!discount.can_be_deleted());
    }
}
