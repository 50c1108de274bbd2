use std::sync::Arc;

use async_trait::async_trait;
use domain::{
    CartRepository, DiscountRepository, OrderRepository, PaymentRepository, ProductRepository,
};
use tokio::sync::Mutex;

use crate::Result;

/// Slot holding the transaction currently open in a unit of work.
///
/// `None` only between a commit or rollback and the next `begin`, or after
/// the unit of work was closed.
pub type TransactionCell<B> = Arc<Mutex<Option<<B as Backend>::Transaction>>>;

/// A storage engine that can run transactions.
#[async_trait]
pub trait Backend: Send + Sync + 'static {
    type Transaction: Send + 'static;

    async fn begin(&self) -> Result<Self::Transaction>;

    /// Makes every write staged in `tx` visible to other transactions.
    async fn commit(&self, tx: Self::Transaction) -> Result<()>;

    /// Discards every write staged in `tx`.
    async fn rollback(&self, tx: Self::Transaction) -> Result<()>;
}

/// A repository handle that runs inside a unit of work's transaction.
pub trait Repository<B: Backend>: Send + Sync + Sized {
    fn bind(backend: &B, cell: TransactionCell<B>) -> Self;
}

/// A backend that provides one repository per aggregate.
pub trait Persistence: Backend + Clone {
    type Carts: CartRepository + Repository<Self>;
    type Products: ProductRepository + Repository<Self>;
    type Orders: OrderRepository + Repository<Self>;
    type Discounts: DiscountRepository + Repository<Self>;
    type Payments: PaymentRepository + Repository<Self>;
}
