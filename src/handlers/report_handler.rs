//! Report Handler

use std::collections::BTreeMap;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::domain::{Expense, ExpenseFilter, OperationContext};
use crate::error::AppResult;
use crate::storage::SharedStorage;

use super::{require_user, AccountTotal, CategoryTotal, ExpenseSummary};

/// Handler for read-only expense reports
pub struct ReportHandler {
    storage: SharedStorage,
}

impl ReportHandler {
    pub fn new(storage: SharedStorage) -> Self {
        Self { storage }
    }

    /// Totals per category and per account over `[from, to]`
    pub async fn expense_summary(
        &self,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
        context: &OperationContext,
    ) -> AppResult<ExpenseSummary> {
        let user_id = require_user(context)?;

        let filter = ExpenseFilter {
            from,
            to,
            ..Default::default()
        };
        filter.validate()?;

        let expenses = self.storage.list_expenses(user_id, &filter).await?;
        Ok(summarize(from, to, &expenses))
    }
}

fn summarize(from: Option<NaiveDate>, to: Option<NaiveDate>, expenses: &[Expense]) -> ExpenseSummary {
    let mut total = Decimal::ZERO;
    let mut by_category: BTreeMap<&str, (usize, Decimal)> = BTreeMap::new();
    let mut by_account: BTreeMap<Option<Uuid>, (usize, Decimal)> = BTreeMap::new();

    for expense in expenses {
        let amount = expense.amount.value();
        total += amount;

        let slot = by_category.entry(expense.category.as_str()).or_default();
        slot.0 += 1;
        slot.1 += amount;

        let slot = by_account.entry(expense.account_id).or_default();
        slot.0 += 1;
        slot.1 += amount;
    }

    ExpenseSummary {
        from,
        to,
        count: expenses.len(),
        total,
        by_category: by_category
            .into_iter()
            .map(|(category, (count, total))| CategoryTotal {
                category: category.to_string(),
                count,
                total,
            })
            .collect(),
        by_account: by_account
            .into_iter()
            .map(|(account_id, (count, total))| AccountTotal {
                account_id,
                count,
                total,
            })
            .collect(),
    }
}
