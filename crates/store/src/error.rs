use domain::RepositoryError;
use thiserror::Error;

/// Errors raised while coordinating a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The cancellation token fired before the commit.
    #[error("Transaction cancelled")]
    Cancelled,

    /// No transaction is open in the unit of work.
    #[error("Transaction is closed")]
    TransactionClosed,

    /// The backend failed to begin, commit or roll back.
    #[error("Backend error: {0}")]
    Backend(String),
}

impl From<StoreError> for RepositoryError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Cancelled => RepositoryError::Cancelled,
            StoreError::TransactionClosed => RepositoryError::TransactionClosed,
            StoreError::Backend(message) => RepositoryError::Connection(message),
        }
    }
}

/// Result type for unit of work operations.
pub type Result<T> = std::result::Result<T, StoreError>;
