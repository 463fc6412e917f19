//! Expense Handler
//!
//! Expense lifecycle with balance consistency: create applies the expense
//! to its linked account, update reverts the old effect then applies the
//! new one, delete reverts. Every balance change is validated before the
//! first write.

use uuid::Uuid;

use crate::domain::ledger::{apply_expense, revert_expense};
use crate::domain::{DomainError, EntryKind, Expense, ExpenseFilter, OperationContext};
use crate::error::{AppError, AppResult};
use crate::storage::SharedStorage;

use super::commands::parse_amount;
use super::posting::BalanceSheet;
use super::{require_user, CreateExpenseCommand, UpdateExpenseCommand};

/// Handler for the expense lifecycle
pub struct ExpenseHandler {
    storage: SharedStorage,
}

impl ExpenseHandler {
    pub fn new(storage: SharedStorage) -> Self {
        Self { storage }
    }

    /// Record an expense, charging its linked account
    pub async fn create(
        &self,
        command: CreateExpenseCommand,
        context: &OperationContext,
    ) -> AppResult<Expense> {
        let user_id = require_user(context)?;
        let amount = parse_amount(&command.amount)?;

        let expense = Expense::new(
            user_id,
            amount,
            command.account_id,
            command.category.as_deref(),
            command.description,
            command.date,
        );

        let mut tx = self.storage.begin().await?;
        let mut sheet = BalanceSheet::lock(tx.as_mut(), user_id, expense.account_id).await?;

        if let Some(account_id) = expense.account_id {
            sheet.post(account_id, EntryKind::ExpenseApplied, expense.id, |account| {
                apply_expense(account, &expense.amount)
            })?;
        }

        tx.insert_expense(&expense).await?;
        sheet.write(tx.as_mut()).await?;
        tx.commit().await?;

        tracing::info!(
            expense_id = %expense.id,
            account_id = ?expense.account_id,
            amount = %expense.amount,
            "Expense created"
        );
        Ok(expense)
    }

    /// Apply a partial update.
    ///
    /// The old account (if any) gets the old amount back, then the new
    /// account (if any) is charged the new amount; on the same account the
    /// charge is validated against the reverted balance.
    pub async fn update(
        &self,
        expense_id: Uuid,
        command: UpdateExpenseCommand,
        context: &OperationContext,
    ) -> AppResult<Expense> {
        let user_id = require_user(context)?;
        let patch = command.into_patch()?;
        if patch.is_empty() {
            return Err(AppError::InvalidRequest("No fields to update".to_string()));
        }

        let mut tx = self.storage.begin().await?;
        let current = tx
            .lock_expense(user_id, expense_id)
            .await?
            .ok_or_else(|| DomainError::ExpenseNotFound(expense_id.to_string()))?;
        let next = current.patched(&patch);

        let touched = current.account_id.into_iter().chain(next.account_id);
        let mut sheet = BalanceSheet::lock(tx.as_mut(), user_id, touched).await?;

        if let Some(old_account_id) = current.account_id {
            sheet.post(old_account_id, EntryKind::ExpenseReverted, current.id, |account| {
                revert_expense(account, &current.amount)
            })?;
        }
        if let Some(new_account_id) = next.account_id {
            sheet.post(new_account_id, EntryKind::ExpenseApplied, next.id, |account| {
                apply_expense(account, &next.amount)
            })?;
        }

        tx.update_expense(&next).await?;
        sheet.write(tx.as_mut()).await?;
        tx.commit().await?;

        tracing::info!(
            expense_id = %next.id,
            old_account_id = ?current.account_id,
            new_account_id = ?next.account_id,
            old_amount = %current.amount,
            new_amount = %next.amount,
            "Expense updated"
        );
        Ok(next)
    }

    /// Delete an expense, giving its amount back to the linked account
    pub async fn delete(&self, expense_id: Uuid, context: &OperationContext) -> AppResult<()> {
        let user_id = require_user(context)?;

        let mut tx = self.storage.begin().await?;
        let current = tx
            .lock_expense(user_id, expense_id)
            .await?
            .ok_or_else(|| DomainError::ExpenseNotFound(expense_id.to_string()))?;

        let mut sheet = BalanceSheet::lock(tx.as_mut(), user_id, current.account_id).await?;
        if let Some(account_id) = current.account_id {
            sheet.post(account_id, EntryKind::ExpenseReverted, current.id, |account| {
                revert_expense(account, &current.amount)
            })?;
        }

        if !tx.delete_expense(user_id, expense_id).await? {
            return Err(DomainError::ExpenseNotFound(expense_id.to_string()).into());
        }
        sheet.write(tx.as_mut()).await?;
        tx.commit().await?;

        tracing::info!(%expense_id, account_id = ?current.account_id, "Expense deleted");
        Ok(())
    }

    pub async fn get(&self, expense_id: Uuid, context: &OperationContext) -> AppResult<Expense> {
        let user_id = require_user(context)?;
        self.storage
            .get_expense(user_id, expense_id)
            .await?
            .ok_or_else(|| DomainError::ExpenseNotFound(expense_id.to_string()).into())
    }

    /// Expenses matching `filter`, newest date first
    pub async fn list(
        &self,
        filter: &ExpenseFilter,
        context: &OperationContext,
    ) -> AppResult<Vec<Expense>> {
        let user_id = require_user(context)?;
        filter.validate()?;
        Ok(self.storage.list_expenses(user_id, filter).await?)
    }
}
