use std::fmt::Display;
use std::future::Future;

use tokio_util::sync::CancellationToken;

use crate::{Backend, StoreError, UnitOfWork};

/// Runs an operation that spans several services in one transaction.
///
/// While the operation runs the unit of work is externally controlled, so
/// inner `commit(_, false)` calls are deferred. The handler commits once on
/// success and rolls back on failure.
pub struct TransactionHandler<'u, B: Backend> {
    uow: &'u UnitOfWork<B>,
}

impl<'u, B: Backend> TransactionHandler<'u, B> {
    pub fn new(uow: &'u UnitOfWork<B>) -> Self {
        Self { uow }
    }

    pub async fn execute<T, E, F, Fut>(&self, cancel: &CancellationToken, op: F) -> Result<T, E>
    where
        F: FnOnce(&'u UnitOfWork<B>) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<StoreError> + Display,
    {
        self.uow.set_externally_controlled(true);

        let outcome = match op(self.uow).await {
            Ok(value) => match self.uow.commit(cancel, true).await {
                Ok(()) => Ok(value),
                Err(err) => Err(self.uow.rollback_after(E::from(err)).await),
            },
            Err(err) => Err(self.uow.rollback_after(err).await),
        };

        self.uow.set_externally_controlled(false);
        outcome
    }
}
