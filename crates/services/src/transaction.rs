use store::{Backend, UnitOfWork};
use tokio_util::sync::CancellationToken;

use crate::{Result, ServiceError};

/// Ends a service call's unit of work.
///
/// Commits on success. On failure the transaction is rolled back before the
/// error is handed back, and a rollback failure never replaces it.
pub(crate) async fn finish<B: Backend, T>(
    uow: UnitOfWork<B>,
    cancel: &CancellationToken,
    result: Result<T>,
) -> Result<T> {
    let result = match result {
        Ok(value) => match uow.commit(cancel, false).await {
            Ok(()) => Ok(value),
            Err(err) => Err(uow.rollback_after(ServiceError::from(err)).await),
        },
        Err(err) => Err(uow.rollback_after(err).await),
    };
    uow.close().await;
    result
}
