//! Transactional storage for the commerce workflow.
//!
//! A [`UnitOfWork`] owns one backend transaction and lends out repository
//! handles bound to it. All handles share a [`TransactionCell`]; committing
//! or rolling back swaps the transaction inside the cell, so handles stay
//! valid for the lifetime of the unit of work.

pub mod backend;
pub mod error;
pub mod handler;
pub mod memory;
pub mod unit_of_work;

pub use backend::{Backend, Persistence, Repository, TransactionCell};
pub use error::{Result, StoreError};
pub use handler::TransactionHandler;
pub use memory::InMemoryBackend;
pub use unit_of_work::UnitOfWork;
