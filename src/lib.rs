//! finance_tracker Library
//!
//! Accounts, expenses and transfers with balances that stay consistent
//! through the whole expense lifecycle. Re-exports modules for the server
//! binary and integration testing.

pub mod api;
pub mod config;
pub mod db;
pub mod domain;
mod error;
pub mod handlers;
pub mod idempotency;
pub mod jobs;
pub mod storage;

pub use config::Config;
pub use domain::{Amount, AmountError, Balance, DomainError, OperationContext};
pub use error::{AppError, AppResult};
pub use storage::{SharedStorage, StorageError};
