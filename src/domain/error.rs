//! Domain Error Types
//!
//! Pure domain errors that don't depend on infrastructure.

use rust_decimal::Decimal;
use thiserror::Error;
use uuid::Uuid;

/// Business rule violations of the balance ledger.
///
/// Every variant is detected before any write happens, so returning one
/// of these means nothing was persisted.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DomainError {
    /// Malformed input (empty name, bad date range, ...)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Zero, negative or unrepresentable amount
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    /// Account does not exist or belongs to another user
    #[error("Account not found: {0}")]
    AccountNotFound(String),

    /// Expense does not exist or belongs to another user
    #[error("Expense not found: {0}")]
    ExpenseNotFound(String),

    /// A non-credit account would go below zero
    #[error("Insufficient funds in account {account_id}: required {required}, available {available}")]
    InsufficientFunds {
        account_id: Uuid,
        required: Decimal,
        available: Decimal,
    },

    /// A credit card's owed amount would go below zero
    #[error("Over-payment on credit card {account_id}: payment {payment}, owed {owed}")]
    OverPayment {
        account_id: Uuid,
        payment: Decimal,
        owed: Decimal,
    },

    /// Undoing an expense would leave a credit card owing less than zero
    #[error("Reverting expense would over-pay credit card {account_id}: amount {amount}, owed {owed}")]
    OverPaymentOnRevert {
        account_id: Uuid,
        amount: Decimal,
        owed: Decimal,
    },

    /// Transfer source and destination are the same account
    #[error("Source and destination accounts must differ")]
    SameAccountTransfer,
}

impl DomainError {
    /// Create an insufficient funds error
    pub fn insufficient_funds(account_id: Uuid, required: Decimal, available: Decimal) -> Self {
        Self::InsufficientFunds {
            account_id,
            required,
            available,
        }
    }

    /// Create an over-payment error
    pub fn over_payment(account_id: Uuid, payment: Decimal, owed: Decimal) -> Self {
        Self::OverPayment {
            account_id,
            payment,
            owed,
        }
    }

    /// Re-label a failed revert. Reverting an expense is a Receive, so the
    /// only way it fails is a credit-card over-payment.
    pub fn into_revert_failure(self) -> Self {
        match self {
            Self::OverPayment {
                account_id,
                payment,
                owed,
            } => Self::OverPaymentOnRevert {
                account_id,
                amount: payment,
                owed,
            },
            other => other,
        }
    }

    /// Check if the operation was rejected because of the ledger rules
    /// (as opposed to malformed input or a missing record)
    pub fn is_balance_violation(&self) -> bool {
        matches!(
            self,
            Self::InsufficientFunds { .. }
                | Self::OverPayment { .. }
                | Self::OverPaymentOnRevert { .. }
        )
    }
}
