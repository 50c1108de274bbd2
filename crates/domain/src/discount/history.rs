use chrono::{DateTime, Utc};
use common::{DiscountHistoryId, DiscountId, Money, OrderId, UserId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{Discount, DiscountType};

/// Immutable audit record of one discount applied to one order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscountHistory {
    pub id: DiscountHistoryId,
    pub order_id: OrderId,
    pub customer_id: UserId,
    pub discount_id: DiscountId,
    pub discount_type: DiscountType,
    pub discount_amount: Money,
    pub percentage: Option<Decimal>,
    pub fixed_amount: Option<Money>,
    pub coupon_code: Option<String>,
    pub applied_at: DateTime<Utc>,
}

impl DiscountHistory {
    /// Records that `discount` took `amount` off `order_id`.
    pub fn record(
        discount: &Discount,
        order_id: OrderId,
        customer_id: UserId,
        amount: Money,
    ) -> Self {
        Self {
            id: DiscountHistoryId::new(),
            order_id,
            customer_id,
            discount_id: discount.id(),
            discount_type: discount.discount_type(),
            discount_amount: amount,
            percentage: discount.percentage(),
            fixed_amount: discount.fixed_amount(),
            coupon_code: discount.code().map(str::to_string),
            applied_at: Utc::now(),
        }
    }
}
