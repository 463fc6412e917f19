//! Balance mutation rule and ledger journal entries
//!
//! `apply_amount` is the single place where the sign of a balance change is
//! decided. It is pure: callers validate every leg of an operation with it
//! before writing anything.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::{Account, Amount, Balance, DomainError};

/// Economic direction of a movement of money
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Money leaves the owner: an expense, or the source side of a transfer
    Spend,
    /// Money reaches the owner: a transfer in, a payment, or an undone expense
    Receive,
}

/// Compute the balance `account` would have after moving `amount` in `direction`.
///
/// | type        | Spend         | Receive       |
/// |-------------|---------------|---------------|
/// | non-credit  | balance - A   | balance + A   |
/// | credit card | balance + A   | balance - A   |
///
/// A non-credit account going below zero fails with `InsufficientFunds`,
/// a credit card going below zero fails with `OverPayment`.
pub fn apply_amount(
    account: &Account,
    amount: &Amount,
    direction: Direction,
) -> Result<Balance, DomainError> {
    let balance = &account.balance;
    let decreases = match (account.is_credit(), direction) {
        (false, Direction::Spend) | (true, Direction::Receive) => true,
        (false, Direction::Receive) | (true, Direction::Spend) => false,
    };

    if decreases {
        balance.minus(amount).map_err(|_| {
            if account.is_credit() {
                DomainError::over_payment(account.id, amount.value(), balance.value())
            } else {
                DomainError::insufficient_funds(account.id, amount.value(), balance.value())
            }
        })
    } else {
        balance
            .plus(amount)
            .map_err(|e| DomainError::InvalidAmount(e.to_string()))
    }
}

/// Balance after charging an expense of `amount` to `account`
pub fn apply_expense(account: &Account, amount: &Amount) -> Result<Balance, DomainError> {
    apply_amount(account, amount, Direction::Spend)
}

/// Balance after undoing an expense of `amount` previously charged to `account`
pub fn revert_expense(account: &Account, amount: &Amount) -> Result<Balance, DomainError> {
    apply_amount(account, amount, Direction::Receive).map_err(DomainError::into_revert_failure)
}

/// What caused a journal entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    ExpenseApplied,
    ExpenseReverted,
    TransferOut,
    TransferIn,
}

impl EntryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryKind::ExpenseApplied => "expense_applied",
            EntryKind::ExpenseReverted => "expense_reverted",
            EntryKind::TransferOut => "transfer_out",
            EntryKind::TransferIn => "transfer_in",
        }
    }
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntryKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "expense_applied" => Ok(EntryKind::ExpenseApplied),
            "expense_reverted" => Ok(EntryKind::ExpenseReverted),
            "transfer_out" => Ok(EntryKind::TransferOut),
            "transfer_in" => Ok(EntryKind::TransferIn),
            other => Err(format!("unknown entry kind '{}'", other)),
        }
    }
}

/// One recorded balance mutation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: Uuid,
    pub user_id: Uuid,
    pub account_id: Uuid,
    pub kind: EntryKind,
    /// Expense or transfer that caused the mutation
    pub reference_id: Uuid,
    /// Signed change of the stored balance
    pub delta: Decimal,
    pub balance_after: Balance,
    pub created_at: DateTime<Utc>,
}

impl LedgerEntry {
    /// Journal the move of `account` from its current balance to `after`
    pub fn record(account: &Account, after: Balance, kind: EntryKind, reference_id: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: account.user_id,
            account_id: account.id,
            kind,
            reference_id,
            delta: after.delta_from(&account.balance),
            balance_after: after,
            created_at: Utc::now(),
        }
    }
}

/// Outcome of comparing an account's balance with its journal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reconciliation {
    pub account_id: Uuid,
    pub opening_balance: Balance,
    /// opening balance + sum of journal deltas
    pub expected: Decimal,
    pub actual: Balance,
    pub entries: usize,
    pub is_consistent: bool,
}

impl Reconciliation {
    pub fn check(account: &Account, entries: &[LedgerEntry]) -> Self {
        let expected = entries
            .iter()
            .fold(account.opening_balance.value(), |acc, e| acc + e.delta);

        Self {
            account_id: account.id,
            opening_balance: account.opening_balance,
            expected,
            actual: account.balance,
            entries: entries.len(),
            is_consistent: expected == account.balance.value(),
        }
    }
}
