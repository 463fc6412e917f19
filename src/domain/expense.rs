//! Expense entity

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Amount, DomainError};

/// Category used when none is given
pub const DEFAULT_CATEGORY: &str = "uncategorized";

/// A recorded expense, optionally charged to one of the user's accounts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expense {
    pub id: Uuid,
    pub user_id: Uuid,
    /// Linked account; `None` means the expense has no balance effect
    pub account_id: Option<Uuid>,
    pub amount: Amount,
    pub category: String,
    pub description: Option<String>,
    pub date: NaiveDate,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Trim a category, falling back to the default for blank input
pub fn normalize_category(category: Option<&str>) -> String {
    match category.map(str::trim) {
        Some(c) if !c.is_empty() => c.to_string(),
        _ => DEFAULT_CATEGORY.to_string(),
    }
}

/// Blank descriptions are stored as `None`
fn normalize_description(description: Option<String>) -> Option<String> {
    description
        .map(|d| d.trim().to_string())
        .filter(|d| !d.is_empty())
}

impl Expense {
    pub fn new(
        user_id: Uuid,
        amount: Amount,
        account_id: Option<Uuid>,
        category: Option<&str>,
        description: Option<String>,
        date: NaiveDate,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id,
            account_id,
            amount,
            category: normalize_category(category),
            description: normalize_description(description),
            date,
            created_at: now,
            updated_at: now,
        }
    }

    /// Produce the updated expense described by `patch`
    pub fn patched(&self, patch: &ExpensePatch) -> Self {
        let mut next = self.clone();
        if let Some(amount) = patch.amount {
            next.amount = amount;
        }
        if let Some(account_id) = patch.account_id {
            next.account_id = account_id;
        }
        if let Some(ref category) = patch.category {
            next.category = normalize_category(Some(category));
        }
        if let Some(ref description) = patch.description {
            next.description = normalize_description(description.clone());
        }
        if let Some(date) = patch.date {
            next.date = date;
        }
        next.updated_at = Utc::now();
        next
    }
}

/// Validated partial update of an expense
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExpensePatch {
    pub amount: Option<Amount>,
    /// `None` = unchanged, `Some(None)` = unlink, `Some(Some(id))` = link to `id`
    pub account_id: Option<Option<Uuid>>,
    pub category: Option<String>,
    pub description: Option<Option<String>>,
    pub date: Option<NaiveDate>,
}

impl ExpensePatch {
    pub fn is_empty(&self) -> bool {
        self.amount.is_none()
            && self.account_id.is_none()
            && self.category.is_none()
            && self.description.is_none()
            && self.date.is_none()
    }
}

/// Filters for listing expenses
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ExpenseFilter {
    #[serde(default)]
    pub account_id: Option<Uuid>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub from: Option<NaiveDate>,
    #[serde(default)]
    pub to: Option<NaiveDate>,
}

impl ExpenseFilter {
    pub fn validate(&self) -> Result<(), DomainError> {
        if let (Some(from), Some(to)) = (self.from, self.to) {
            if from > to {
                return Err(DomainError::Validation(format!(
                    "date range is inverted: {} > {}",
                    from, to
                )));
            }
        }
        Ok(())
    }

    pub fn matches(&self, expense: &Expense) -> bool {
        self.account_id.map_or(true, |id| expense.account_id == Some(id))
            && self
                .category
                .as_deref()
                .map_or(true, |c| expense.category == c)
            && self.from.map_or(true, |from| expense.date >= from)
            && self.to.map_or(true, |to| expense.date <= to)
    }
}
