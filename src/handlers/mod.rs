//! Command Handlers module
//!
//! Handlers orchestrate business operations: they validate commands, run
//! the balance rules against locked accounts and persist the outcome
//! through one storage unit of work.

mod account_handler;
mod commands;
mod expense_handler;
mod posting;
mod report_handler;
mod transfer_handler;

#[cfg(test)]
mod tests;

pub use account_handler::AccountHandler;
pub use commands::*;
pub use expense_handler::ExpenseHandler;
pub use report_handler::ReportHandler;
pub use transfer_handler::TransferHandler;

use uuid::Uuid;

use crate::domain::OperationContext;
use crate::error::{AppError, AppResult};

/// Every operation is scoped to the requesting user
fn require_user(context: &OperationContext) -> AppResult<Uuid> {
    context
        .request_user_id
        .ok_or_else(|| AppError::MissingHeader("X-Request-User-Id".to_string()))
}
