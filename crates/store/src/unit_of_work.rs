use std::fmt::Display;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::{Backend, Persistence, Repository, Result, StoreError, TransactionCell};

/// One transaction per logical operation.
///
/// Repository handles obtained from the same unit of work share its
/// transaction. After a commit or rollback a fresh transaction is opened in
/// place, so previously issued handles keep working.
pub struct UnitOfWork<B: Backend> {
    backend: B,
    cell: TransactionCell<B>,
    externally_controlled: AtomicBool,
}

impl<B: Backend> UnitOfWork<B> {
    /// Opens a unit of work with a fresh transaction.
    pub async fn begin(backend: B) -> Result<Self> {
        let tx = backend.begin().await?;
        Ok(Self {
            backend,
            cell: Arc::new(Mutex::new(Some(tx))),
            externally_controlled: AtomicBool::new(false),
        })
    }

    /// Returns a repository bound to this unit of work's transaction.
    pub fn repository<R: Repository<B>>(&self) -> R {
        R::bind(&self.backend, Arc::clone(&self.cell))
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// True while an outer [`TransactionHandler`](crate::TransactionHandler)
    /// owns the commit decision.
    pub fn is_externally_controlled(&self) -> bool {
        self.externally_controlled.load(Ordering::Acquire)
    }

    pub(crate) fn set_externally_controlled(&self, controlled: bool) {
        self.externally_controlled.store(controlled, Ordering::Release);
    }

    /// Commits the open transaction and opens a new one.
    ///
    /// While externally controlled this is a no-op unless
    /// `allow_external_commit` is set.
    pub async fn commit(
        &self,
        cancel: &CancellationToken,
        allow_external_commit: bool,
    ) -> Result<()> {
        if self.is_externally_controlled() && !allow_external_commit {
            tracing::debug!("Commit deferred to the transaction handler");
            return Ok(());
        }
        if cancel.is_cancelled() {
            return Err(StoreError::Cancelled);
        }

        let mut slot = self.cell.lock().await;
        let tx = slot.take().ok_or(StoreError::TransactionClosed)?;
        let committed = self.backend.commit(tx).await;
        let reopened = self.backend.begin().await;

        // Handles stay usable even when the commit failed.
        *slot = Some(reopened?);
        committed?;

        metrics::counter!("uow_commits_total").increment(1);
        tracing::debug!("Transaction committed");
        Ok(())
    }

    /// Rolls back the open transaction and opens a new one.
    ///
    /// Safe to call repeatedly and after a partial failure.
    pub async fn rollback(&self) -> Result<()> {
        let mut slot = self.cell.lock().await;
        let rolled_back = match slot.take() {
            Some(tx) => self.backend.rollback(tx).await,
            None => Ok(()),
        };
        *slot = Some(self.backend.begin().await?);

        metrics::counter!("uow_rollbacks_total").increment(1);
        tracing::debug!("Transaction rolled back");
        rolled_back
    }

    /// Rolls back and hands `err` back unchanged.
    ///
    /// A rollback failure is logged; it never replaces the original error.
    pub async fn rollback_after<E: Display>(&self, err: E) -> E {
        if let Err(rollback_err) = self.rollback().await {
            tracing::error!(
                error = %err,
                rollback_error = %rollback_err,
                "Rollback failed after error"
            );
        }
        err
    }

    /// Rolls back anything still open and releases the transaction.
    pub async fn close(self) {
        let tx = self.cell.lock().await.take();
        if let Some(tx) = tx
            && let Err(err) = self.backend.rollback(tx).await
        {
            tracing::warn!(error = %err, "Failed to roll back while closing unit of work");
        }
    }
}

impl<P: Persistence> UnitOfWork<P> {
    pub fn carts(&self) -> P::Carts {
        self.repository()
    }

    pub fn products(&self) -> P::Products {
        self.repository()
    }

    pub fn orders(&self) -> P::Orders {
        self.repository()
    }

    pub fn discounts(&self) -> P::Discounts {
        self.repository()
    }

    pub fn payments(&self) -> P::Payments {
        self.repository()
    }
}
