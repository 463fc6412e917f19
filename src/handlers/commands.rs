//! Command definitions
//!
//! Commands represent intentions to change the system state. Money travels
//! as decimal strings and is parsed into `Amount`/`Balance` by the handlers.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use crate::domain::{AccountType, Amount, Balance, DomainError, ExpensePatch};

/// Parse a strictly positive money amount
pub(crate) fn parse_amount(raw: &str) -> Result<Amount, DomainError> {
    raw.trim()
        .parse()
        .map_err(|e| DomainError::InvalidAmount(format!("{}: {}", raw, e)))
}

/// Parse a non-negative opening balance
pub(crate) fn parse_balance(raw: &str) -> Result<Balance, DomainError> {
    raw.trim()
        .parse()
        .map_err(|e| DomainError::InvalidAmount(format!("{}: {}", raw, e)))
}

/// Distinguishes an absent field from an explicit `null`
fn double_option<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

// =========================================================================
// Accounts
// =========================================================================

/// Command to open a new account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAccountCommand {
    pub name: String,
    pub account_type: AccountType,
    /// Opening balance (owed amount for credit cards), defaults to zero
    #[serde(default)]
    pub opening_balance: Option<String>,
}

impl CreateAccountCommand {
    pub fn new(name: impl Into<String>, account_type: AccountType) -> Self {
        Self {
            name: name.into(),
            account_type,
            opening_balance: None,
        }
    }

    pub fn with_opening_balance(mut self, opening_balance: impl Into<String>) -> Self {
        self.opening_balance = Some(opening_balance.into());
        self
    }
}

// =========================================================================
// Expenses
// =========================================================================

/// Command to record an expense
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateExpenseCommand {
    pub amount: String,
    #[serde(default)]
    pub account_id: Option<Uuid>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    pub date: NaiveDate,
}

impl CreateExpenseCommand {
    pub fn new(amount: impl Into<String>, date: NaiveDate) -> Self {
        Self {
            amount: amount.into(),
            account_id: None,
            category: None,
            description: None,
            date,
        }
    }

    pub fn with_account(mut self, account_id: Uuid) -> Self {
        self.account_id = Some(account_id);
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Partial update of an expense.
///
/// `account_id` is tri-state: absent keeps the link, `null` unlinks,
/// a UUID relinks.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateExpenseCommand {
    #[serde(default)]
    pub amount: Option<String>,
    #[serde(
        default,
        deserialize_with = "double_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub account_id: Option<Option<Uuid>>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(
        default,
        deserialize_with = "double_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub description: Option<Option<String>>,
    #[serde(default)]
    pub date: Option<NaiveDate>,
}

impl UpdateExpenseCommand {
    pub fn with_amount(mut self, amount: impl Into<String>) -> Self {
        self.amount = Some(amount.into());
        self
    }

    pub fn with_account(mut self, account_id: Option<Uuid>) -> Self {
        self.account_id = Some(account_id);
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    /// Validate into a domain patch
    pub fn into_patch(self) -> Result<ExpensePatch, DomainError> {
        let amount = self.amount.as_deref().map(parse_amount).transpose()?;

        if let Some(ref category) = self.category {
            if category.trim().is_empty() {
                return Err(DomainError::Validation(
                    "Category cannot be empty".to_string(),
                ));
            }
        }

        Ok(ExpensePatch {
            amount,
            account_id: self.account_id,
            category: self.category,
            description: self.description,
            date: self.date,
        })
    }
}

// =========================================================================
// Transfers
// =========================================================================

/// Command to move money between two accounts of the same user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferCommand {
    pub from_account_id: Uuid,
    pub to_account_id: Uuid,
    /// Amount to transfer (as string for precise decimal)
    pub amount: String,
    #[serde(default)]
    pub memo: Option<String>,
}

impl TransferCommand {
    pub fn new(from_account_id: Uuid, to_account_id: Uuid, amount: impl Into<String>) -> Self {
        Self {
            from_account_id,
            to_account_id,
            amount: amount.into(),
            memo: None,
        }
    }

    pub fn with_memo(mut self, memo: impl Into<String>) -> Self {
        self.memo = Some(memo.into());
        self
    }
}

/// Result of a successful transfer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferResult {
    pub transfer_id: Uuid,
    pub from_account_id: Uuid,
    pub to_account_id: Uuid,
    pub amount: Amount,
    pub from_balance: Balance,
    pub to_balance: Balance,
}

// =========================================================================
// Reports
// =========================================================================

/// Totals of a user's expenses over an optional date range
#[derive(Debug, Clone, Serialize)]
pub struct ExpenseSummary {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub count: usize,
    pub total: Decimal,
    pub by_category: Vec<CategoryTotal>,
    pub by_account: Vec<AccountTotal>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CategoryTotal {
    pub category: String,
    pub count: usize,
    pub total: Decimal,
}

/// Totals per linked account; unlinked expenses are grouped under `None`
#[derive(Debug, Clone, Serialize)]
pub struct AccountTotal {
    pub account_id: Option<Uuid>,
    pub count: usize,
    pub total: Decimal,
}
