use chrono::{DateTime, Utc};
use common::{Money, OrderId, PaymentId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{MethodDetails, PaymentMethod, PaymentRecordError, PaymentStatus, StatusChange};

/// Storage representation of a payment record.
#[derive(Debug, Clone)]
pub struct PaymentParts {
    pub id: PaymentId,
    pub order_id: OrderId,
    pub amount: Money,
    pub payment_method: PaymentMethod,
    pub transaction_id: Uuid,
    pub processed_at: DateTime<Utc>,
    pub status: PaymentStatus,
    pub gateway_response: String,
    pub method_details: MethodDetails,
    pub status_history: Vec<StatusChange>,
}

/// Payment record aggregate root.
///
/// Status changes append to the history; the current status is always the
/// status of the last entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentRecord {
    id: PaymentId,
    order_id: OrderId,
    amount: Money,
    payment_method: PaymentMethod,
    transaction_id: Uuid,
    processed_at: DateTime<Utc>,
    status: PaymentStatus,
    gateway_response: String,
    method_details: MethodDetails,
    status_history: Vec<StatusChange>,
}

impl PaymentRecord {
    /// Creates a record in `Processing` for a gateway transaction.
    pub fn create(
        order_id: OrderId,
        amount: Money,
        transaction_id: Uuid,
        gateway_response: impl Into<String>,
        method_details: MethodDetails,
    ) -> Result<Self, PaymentRecordError> {
        if !amount.is_positive() {
            return Err(PaymentRecordError::NonPositiveAmount);
        }
        let now = Utc::now();
        Ok(Self {
            id: PaymentId::new(),
            order_id,
            amount,
            payment_method: method_details.method(),
            transaction_id,
            processed_at: now,
            status: PaymentStatus::Processing,
            gateway_response: gateway_response.into(),
            method_details,
            status_history: vec![StatusChange {
                status: PaymentStatus::Processing,
                timestamp: now,
                reference: None,
            }],
        })
    }

    /// Rehydrates a record from storage.
    pub fn from_parts(parts: PaymentParts) -> Result<Self, PaymentRecordError> {
        if !parts.amount.is_positive() {
            return Err(PaymentRecordError::NonPositiveAmount);
        }
        if parts.method_details.method() != parts.payment_method {
            return Err(PaymentRecordError::MethodMismatch {
                method: parts.payment_method,
            });
        }
        let last = parts
            .status_history
            .last()
            .ok_or(PaymentRecordError::EmptyHistory)?;
        if last.status != parts.status {
            return Err(PaymentRecordError::InvalidTransition {
                from: last.status,
                to: parts.status,
            });
        }

        Ok(Self {
            id: parts.id,
            order_id: parts.order_id,
            amount: parts.amount,
            payment_method: parts.payment_method,
            transaction_id: parts.transaction_id,
            processed_at: parts.processed_at,
            status: parts.status,
            gateway_response: parts.gateway_response,
            method_details: parts.method_details,
            status_history: parts.status_history,
        })
    }

    pub fn to_parts(&self) -> PaymentParts {
        PaymentParts {
            id: self.id,
            order_id: self.order_id,
            amount: self.amount,
            payment_method: self.payment_method,
            transaction_id: self.transaction_id,
            processed_at: self.processed_at,
            status: self.status,
            gateway_response: self.gateway_response.clone(),
            method_details: self.method_details.clone(),
            status_history: self.status_history.clone(),
        }
    }

    pub fn id(&self) -> PaymentId {
        self.id
    }

    pub fn order_id(&self) -> OrderId {
        self.order_id
    }

    pub fn amount(&self) -> Money {
        self.amount
    }

    pub fn payment_method(&self) -> PaymentMethod {
        self.payment_method
    }

    pub fn transaction_id(&self) -> Uuid {
        self.transaction_id
    }

    pub fn processed_at(&self) -> DateTime<Utc> {
        self.processed_at
    }

    pub fn status(&self) -> PaymentStatus {
        self.status
    }

    pub fn gateway_response(&self) -> &str {
        &self.gateway_response
    }

    pub fn method_details(&self) -> &MethodDetails {
        &self.method_details
    }

    pub fn status_history(&self) -> &[StatusChange] {
        &self.status_history
    }

    /// The most recent history entry.
    pub fn last_change(&self) -> Option<&StatusChange> {
        self.status_history.last()
    }
}

// Command methods
impl PaymentRecord {
    pub fn mark_as_succeeded(
        &mut self,
        reference: impl Into<String>,
    ) -> Result<(), PaymentRecordError> {
        self.transition(PaymentStatus::Succeeded, Some(reference.into()))
    }

    pub fn mark_as_failed(&mut self, reason: impl Into<String>) -> Result<(), PaymentRecordError> {
        self.transition(PaymentStatus::Failed, Some(reason.into()))
    }

    pub fn request_refund(
        &mut self,
        reference: impl Into<String>,
    ) -> Result<(), PaymentRecordError> {
        self.transition(PaymentStatus::RefundRequested, Some(reference.into()))
    }

    pub fn mark_as_refunded(
        &mut self,
        reference: impl Into<String>,
    ) -> Result<(), PaymentRecordError> {
        self.transition(PaymentStatus::Refunded, Some(reference.into()))
    }

    fn transition(
        &mut self,
        next: PaymentStatus,
        reference: Option<String>,
    ) -> Result<(), PaymentRecordError> {
        if !self.status.can_transition_to(next) {
            return Err(PaymentRecordError::InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        self.status_history.push(StatusChange {
            status: next,
            timestamp: Utc::now(),
            reference,
        });
        Ok(())
    }
}
