//! Account Handler
//!
//! Opening, listing, deleting and reconciling a user's accounts.

use uuid::Uuid;

use crate::domain::{Account, Balance, DomainError, LedgerEntry, OperationContext, Reconciliation};
use crate::error::AppResult;
use crate::storage::SharedStorage;

use super::commands::parse_balance;
use super::{require_user, CreateAccountCommand};

/// Handler for account management
pub struct AccountHandler {
    storage: SharedStorage,
}

impl AccountHandler {
    pub fn new(storage: SharedStorage) -> Self {
        Self { storage }
    }

    /// Open an account; the opening balance defaults to zero
    pub async fn create(
        &self,
        command: CreateAccountCommand,
        context: &OperationContext,
    ) -> AppResult<Account> {
        let user_id = require_user(context)?;

        let opening_balance = match command.opening_balance.as_deref() {
            Some(raw) => parse_balance(raw)?,
            None => Balance::zero(),
        };
        let account = Account::open(user_id, &command.name, command.account_type, opening_balance)?;

        let mut tx = self.storage.begin().await?;
        tx.insert_account(&account).await?;
        tx.commit().await?;

        tracing::info!(
            account_id = %account.id,
            account_type = %account.account_type,
            opening_balance = %account.opening_balance,
            "Account created"
        );
        Ok(account)
    }

    pub async fn list(&self, context: &OperationContext) -> AppResult<Vec<Account>> {
        let user_id = require_user(context)?;
        Ok(self.storage.list_accounts(user_id).await?)
    }

    pub async fn get(&self, account_id: Uuid, context: &OperationContext) -> AppResult<Account> {
        let user_id = require_user(context)?;
        self.find(user_id, account_id).await
    }

    /// Remove an account and its journal.
    ///
    /// Linked expenses stay and become unlinked without any balance effect;
    /// transfers that referenced the account are kept as history.
    pub async fn delete(&self, account_id: Uuid, context: &OperationContext) -> AppResult<()> {
        let user_id = require_user(context)?;

        let mut tx = self.storage.begin().await?;
        if !tx.delete_account(user_id, account_id).await? {
            return Err(DomainError::AccountNotFound(account_id.to_string()).into());
        }
        tx.commit().await?;

        tracing::info!(%account_id, "Account deleted");
        Ok(())
    }

    /// Journal of an account, oldest first
    pub async fn statement(
        &self,
        account_id: Uuid,
        context: &OperationContext,
    ) -> AppResult<Vec<LedgerEntry>> {
        let user_id = require_user(context)?;
        self.find(user_id, account_id).await?;
        Ok(self.storage.list_entries(user_id, account_id).await?)
    }

    /// Compare the stored balance with opening balance plus journal deltas
    pub async fn reconcile(
        &self,
        account_id: Uuid,
        context: &OperationContext,
    ) -> AppResult<Reconciliation> {
        let user_id = require_user(context)?;
        let account = self.find(user_id, account_id).await?;
        let entries = self.storage.list_entries(user_id, account_id).await?;

        let reconciliation = Reconciliation::check(&account, &entries);
        if !reconciliation.is_consistent {
            tracing::warn!(
                %account_id,
                expected = %reconciliation.expected,
                actual = %reconciliation.actual,
                "Account balance does not match its journal"
            );
        }
        Ok(reconciliation)
    }

    async fn find(&self, user_id: Uuid, account_id: Uuid) -> AppResult<Account> {
        self.storage
            .get_account(user_id, account_id)
            .await?
            .ok_or_else(|| DomainError::AccountNotFound(account_id.to_string()).into())
    }
}
