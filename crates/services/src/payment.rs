//! Checkout and payment records.

use std::sync::Arc;
use std::time::Instant;

use common::{Money, OrderId, PaymentId, UserId};
use domain::{PaymentMethod, PaymentRecord, PaymentRepository, PaymentStatus};
use payments::{PaymentDetails, PaymentRequest, PaymentStrategyFactory};
use serde::{Deserialize, Serialize};
use store::{Persistence, TransactionHandler, UnitOfWork};
use tokio_util::sync::CancellationToken;

use crate::cart::non_empty_cart;
use crate::order::owned_order;
use crate::transaction::finish;
use crate::{Notification, Notifier, OrderService, Result, ServiceError, ShippingDetails};

/// Everything needed to pay for the cart.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutRequest {
    pub method: PaymentMethod,
    pub details: PaymentDetails,
    #[serde(flatten)]
    pub shipping: ShippingDetails,
}

/// Result of a successful checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutReceipt {
    pub order_id: OrderId,
    pub payment_id: PaymentId,
    /// Order tracking reference issued by the gateway.
    pub reference: String,
    pub status: PaymentStatus,
    pub amount: Money,
}

/// Charges carts and keeps the payment records.
///
/// A checkout runs in a single transaction: the charge is only recorded,
/// and the order only placed, if every step succeeds.
pub struct PaymentService<P: Persistence> {
    backend: P,
    orders: Arc<OrderService<P>>,
    strategies: Arc<PaymentStrategyFactory>,
    notifier: Arc<dyn Notifier>,
}

impl<P: Persistence> PaymentService<P> {
    pub fn new(
        backend: P,
        orders: Arc<OrderService<P>>,
        strategies: Arc<PaymentStrategyFactory>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            backend,
            orders,
            strategies,
            notifier,
        }
    }

    /// Charges the user's cart and turns it into an order.
    ///
    /// Business errors keep their category. Infrastructure errors are
    /// reported as [`ServiceError::Failure`].
    #[tracing::instrument(
        skip(self, request, cancel),
        fields(user_id = %user_id, method = %request.method)
    )]
    pub async fn pay_for_cart(
        &self,
        user_id: &UserId,
        request: CheckoutRequest,
        cancel: &CancellationToken,
    ) -> Result<CheckoutReceipt> {
        metrics::counter!("checkout_attempts_total").increment(1);
        let start = Instant::now();

        let outcome = self.run_checkout(user_id, &request, cancel).await;

        metrics::histogram!("checkout_duration_seconds").record(start.elapsed().as_secs_f64());
        match outcome {
            Ok(receipt) => {
                metrics::counter!("payments_succeeded_total").increment(1);
                tracing::info!(
                    order_id = %receipt.order_id,
                    payment_id = %receipt.payment_id,
                    reference = %receipt.reference,
                    amount = %receipt.amount,
                    "Checkout completed"
                );
                self.notifier
                    .notify(Notification::OrderPlaced {
                        user_id: user_id.clone(),
                        order_id: receipt.order_id,
                        payment_id: receipt.payment_id,
                        method: request.method,
                        amount: receipt.amount,
                        reference: receipt.reference.clone(),
                    })
                    .await;
                Ok(receipt)
            }
            Err(err) => {
                metrics::counter!("checkout_failures_total").increment(1);
                tracing::warn!(error = %err, "Checkout failed");
                Err(err.into_checkout_failure())
            }
        }
    }

    async fn run_checkout(
        &self,
        user_id: &UserId,
        request: &CheckoutRequest,
        cancel: &CancellationToken,
    ) -> Result<CheckoutReceipt> {
        let uow = UnitOfWork::begin(self.backend.clone()).await?;
        let outcome = TransactionHandler::new(&uow)
            .execute(cancel, |uow| self.checkout_in(uow, user_id, request, cancel))
            .await;
        uow.close().await;
        outcome
    }

    async fn checkout_in(
        &self,
        uow: &UnitOfWork<P>,
        user_id: &UserId,
        request: &CheckoutRequest,
        cancel: &CancellationToken,
    ) -> Result<CheckoutReceipt> {
        let cart = non_empty_cart(uow, user_id, cancel).await?;

        // Nothing is charged for an order that cannot be placed.
        request.shipping.shipping_address.validate("shipping")?;
        request.shipping.billing_address.validate("billing")?;
        if request.details.method() != request.method {
            return Err(ServiceError::validation(
                "PaymentDetails",
                format!(
                    "{} details were sent for a {} payment",
                    request.details.method(),
                    request.method
                ),
            ));
        }
        // A missing gateway is a wiring fault, reported as unexpected.
        let strategy = self.strategies.resolve(request.method)?;

        let amount = cart.total_with_discount();
        if !amount.is_positive() {
            return Err(ServiceError::validation(
                "Cart",
                "Cart total must be greater than zero",
            ));
        }

        let response = strategy
            .process_payment(
                &PaymentRequest {
                    amount,
                    details: request.details.clone(),
                },
                cancel,
            )
            .await?;
        if !response.is_success {
            return Err(ServiceError::Failure(format!(
                "Payment was not approved: {}",
                response.message
            )));
        }

        let order = self
            .orders
            .place_order_in(uow, user_id, &request.shipping, cancel)
            .await?;
        if order.total_amount() != amount {
            return Err(ServiceError::Unexpected(format!(
                "Order total {} differs from the charged amount {amount}",
                order.total_amount()
            )));
        }

        let mut record = PaymentRecord::create(
            order.id(),
            amount,
            response.transaction_id,
            response.message.clone(),
            request.details.to_method_details(),
        )?;
        record.mark_as_succeeded(response.reference.clone())?;

        let payments = uow.payments();
        payments.create_payment(&record, cancel).await?;
        for change in record.status_history() {
            payments
                .create_payment_status_history(record.id(), change, cancel)
                .await?;
        }

        Ok(CheckoutReceipt {
            order_id: order.id(),
            payment_id: record.id(),
            reference: response.reference,
            status: record.status(),
            amount,
        })
    }

    /// Returns a payment of one of the user's orders.
    #[tracing::instrument(skip(self, cancel), fields(user_id = %user_id))]
    pub async fn get_payment(
        &self,
        user_id: &UserId,
        payment_id: PaymentId,
        cancel: &CancellationToken,
    ) -> Result<PaymentRecord> {
        let uow = UnitOfWork::begin(self.backend.clone()).await?;
        let result = async {
            let record = load(&uow, payment_id, cancel).await?;
            owned_order(&uow, user_id, record.order_id(), cancel).await?;
            Ok::<_, ServiceError>(record)
        }
        .await;
        finish(uow, cancel, result).await
    }

    #[tracing::instrument(skip(self, cancel), fields(user_id = %user_id))]
    pub async fn get_payments_for_order(
        &self,
        user_id: &UserId,
        order_id: OrderId,
        cancel: &CancellationToken,
    ) -> Result<Vec<PaymentRecord>> {
        let uow = UnitOfWork::begin(self.backend.clone()).await?;
        let result = async {
            owned_order(&uow, user_id, order_id, cancel).await?;
            let records = uow
                .payments()
                .get_payments_by_order(order_id, cancel)
                .await?;
            Ok::<_, ServiceError>(records)
        }
        .await;
        finish(uow, cancel, result).await
    }

    /// Asks for a succeeded payment to be refunded.
    #[tracing::instrument(skip(self, cancel))]
    pub async fn request_refund(
        &self,
        payment_id: PaymentId,
        reference: &str,
        cancel: &CancellationToken,
    ) -> Result<PaymentRecord> {
        self.change_status(payment_id, cancel, |record| {
            record.request_refund(reference)
        })
        .await
    }

    /// Confirms a requested refund.
    #[tracing::instrument(skip(self, cancel))]
    pub async fn complete_refund(
        &self,
        payment_id: PaymentId,
        reference: &str,
        cancel: &CancellationToken,
    ) -> Result<PaymentRecord> {
        let record = self
            .change_status(payment_id, cancel, |record| {
                record.mark_as_refunded(reference)
            })
            .await?;

        self.notifier
            .notify(Notification::PaymentRefunded {
                order_id: record.order_id(),
                payment_id: record.id(),
                amount: record.amount(),
            })
            .await;
        Ok(record)
    }

    async fn change_status<F>(
        &self,
        payment_id: PaymentId,
        cancel: &CancellationToken,
        change: F,
    ) -> Result<PaymentRecord>
    where
        F: FnOnce(&mut PaymentRecord) -> std::result::Result<(), domain::PaymentRecordError>,
    {
        let uow = UnitOfWork::begin(self.backend.clone()).await?;
        let result = async {
            let mut record = load(&uow, payment_id, cancel).await?;
            change(&mut record)?;

            let payments = uow.payments();
            payments
                .update_payment_status(payment_id, record.status(), cancel)
                .await?;
            if let Some(last) = record.last_change() {
                payments
                    .create_payment_status_history(payment_id, last, cancel)
                    .await?;
            }
            tracing::info!(status = %record.status(), "Payment status changed");
            Ok::<_, ServiceError>(record)
        }
        .await;
        finish(uow, cancel, result).await
    }
}

async fn load<P: Persistence>(
    uow: &UnitOfWork<P>,
    payment_id: PaymentId,
    cancel: &CancellationToken,
) -> Result<PaymentRecord> {
    uow.payments()
        .get_payment_by_id(payment_id, cancel)
        .await?
        .ok_or_else(|| ServiceError::not_found(format!("Payment {payment_id}")))
}
