//! Domain module
//!
//! Core domain types and the balance ledger rules.

pub mod account;
pub mod amount;
pub mod context;
pub mod error;
pub mod expense;
pub mod ledger;
pub mod transfer;

pub use account::{Account, AccountType};
pub use amount::{Amount, AmountError, Balance};
pub use context::OperationContext;
pub use error::DomainError;
pub use expense::{Expense, ExpenseFilter, ExpensePatch};
pub use ledger::{apply_amount, Direction, EntryKind, LedgerEntry, Reconciliation};
pub use transfer::Transfer;
