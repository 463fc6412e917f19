//! In-memory storage backend
//!
//! Fallback used when no database is configured. All state sits behind one
//! `tokio::sync::Mutex`; a unit of work holds the lock for its whole
//! lifetime and works on a staged copy, so writers are serialized and an
//! uncommitted unit of work leaves no trace.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use crate::domain::{Account, Balance, Expense, ExpenseFilter, LedgerEntry, Transfer};
use crate::idempotency::IdempotencyRecord;

use super::{LedgerTx, Storage, StorageError, StorageResult};

const ACCOUNTS: &str = "accounts are not available in this storage backend";

#[derive(Debug, Clone, Default)]
struct MemoryState {
    accounts: HashMap<Uuid, Account>,
    expenses: HashMap<Uuid, Expense>,
    transfers: Vec<Transfer>,
    entries: Vec<LedgerEntry>,
    idempotency: HashMap<(Uuid, Uuid), IdempotencyRecord>,
}

/// Process-local storage
#[derive(Debug, Clone)]
pub struct MemoryStorage {
    state: Arc<Mutex<MemoryState>>,
    accounts_enabled: bool,
}

impl MemoryStorage {
    /// Full-featured in-memory backend
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MemoryState::default())),
            accounts_enabled: true,
        }
    }

    /// Minimal backend that only keeps expenses. Account and transfer
    /// operations fail with `StorageError::Unsupported`; expenses without
    /// an account still work.
    pub fn without_accounts() -> Self {
        Self {
            accounts_enabled: false,
            ..Self::new()
        }
    }

    fn require_accounts(&self) -> StorageResult<()> {
        if self.accounts_enabled {
            Ok(())
        } else {
            Err(StorageError::Unsupported(ACCOUNTS))
        }
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    fn backend(&self) -> &'static str {
        if self.accounts_enabled {
            "memory"
        } else {
            "memory-minimal"
        }
    }

    async fn begin(&self) -> StorageResult<Box<dyn LedgerTx>> {
        let guard = self.state.clone().lock_owned().await;
        let working = guard.clone();
        Ok(Box::new(MemoryTx {
            guard,
            working,
            accounts_enabled: self.accounts_enabled,
        }))
    }

    async fn health_check(&self) -> StorageResult<()> {
        Ok(())
    }

    async fn get_account(&self, user_id: Uuid, account_id: Uuid) -> StorageResult<Option<Account>> {
        self.require_accounts()?;
        let state = self.state.lock().await;
        Ok(state
            .accounts
            .get(&account_id)
            .filter(|a| a.user_id == user_id)
            .cloned())
    }

    async fn list_accounts(&self, user_id: Uuid) -> StorageResult<Vec<Account>> {
        self.require_accounts()?;
        let state = self.state.lock().await;
        let mut accounts: Vec<Account> = state
            .accounts
            .values()
            .filter(|a| a.user_id == user_id)
            .cloned()
            .collect();
        accounts.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(accounts)
    }

    async fn get_expense(&self, user_id: Uuid, expense_id: Uuid) -> StorageResult<Option<Expense>> {
        let state = self.state.lock().await;
        Ok(state
            .expenses
            .get(&expense_id)
            .filter(|e| e.user_id == user_id)
            .cloned())
    }

    async fn list_expenses(
        &self,
        user_id: Uuid,
        filter: &ExpenseFilter,
    ) -> StorageResult<Vec<Expense>> {
        let state = self.state.lock().await;
        let mut expenses: Vec<Expense> = state
            .expenses
            .values()
            .filter(|e| e.user_id == user_id && filter.matches(e))
            .cloned()
            .collect();
        expenses.sort_by(|a, b| {
            b.date
                .cmp(&a.date)
                .then(b.created_at.cmp(&a.created_at))
        });
        Ok(expenses)
    }

    async fn list_transfers(&self, user_id: Uuid) -> StorageResult<Vec<Transfer>> {
        self.require_accounts()?;
        let state = self.state.lock().await;
        Ok(state
            .transfers
            .iter()
            .rev()
            .filter(|t| t.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn list_entries(
        &self,
        user_id: Uuid,
        account_id: Uuid,
    ) -> StorageResult<Vec<LedgerEntry>> {
        self.require_accounts()?;
        let state = self.state.lock().await;
        Ok(state
            .entries
            .iter()
            .filter(|e| e.user_id == user_id && e.account_id == account_id)
            .cloned()
            .collect())
    }

    async fn get_idempotency_record(
        &self,
        user_id: Uuid,
        key: Uuid,
    ) -> StorageResult<Option<IdempotencyRecord>> {
        let state = self.state.lock().await;
        Ok(state.idempotency.get(&(user_id, key)).cloned())
    }

    async fn save_idempotency_record(&self, record: &IdempotencyRecord) -> StorageResult<()> {
        let mut state = self.state.lock().await;
        let slot = (record.user_id, record.key);
        // A live record wins; an expired one is replaced
        let live = state
            .idempotency
            .get(&slot)
            .map_or(false, |existing| existing.expires_at >= record.created_at);
        if !live {
            state.idempotency.insert(slot, record.clone());
        }
        Ok(())
    }

    async fn purge_expired_idempotency_records(&self, now: DateTime<Utc>) -> StorageResult<u64> {
        let mut state = self.state.lock().await;
        let before = state.idempotency.len();
        state.idempotency.retain(|_, record| record.expires_at >= now);
        Ok((before - state.idempotency.len()) as u64)
    }
}

/// Unit of work over a staged copy of the state
struct MemoryTx {
    guard: OwnedMutexGuard<MemoryState>,
    working: MemoryState,
    accounts_enabled: bool,
}

impl MemoryTx {
    fn require_accounts(&self) -> StorageResult<()> {
        if self.accounts_enabled {
            Ok(())
        } else {
            Err(StorageError::Unsupported(ACCOUNTS))
        }
    }
}

#[async_trait]
impl LedgerTx for MemoryTx {
    async fn lock_account(
        &mut self,
        user_id: Uuid,
        account_id: Uuid,
    ) -> StorageResult<Option<Account>> {
        self.require_accounts()?;
        Ok(self
            .working
            .accounts
            .get(&account_id)
            .filter(|a| a.user_id == user_id)
            .cloned())
    }

    async fn insert_account(&mut self, account: &Account) -> StorageResult<()> {
        self.require_accounts()?;
        self.working.accounts.insert(account.id, account.clone());
        Ok(())
    }

    async fn delete_account(&mut self, user_id: Uuid, account_id: Uuid) -> StorageResult<bool> {
        self.require_accounts()?;
        let owned = self
            .working
            .accounts
            .get(&account_id)
            .map_or(false, |a| a.user_id == user_id);
        if !owned {
            return Ok(false);
        }

        self.working.accounts.remove(&account_id);
        self.working.entries.retain(|e| e.account_id != account_id);
        for expense in self.working.expenses.values_mut() {
            if expense.account_id == Some(account_id) {
                expense.account_id = None;
                expense.updated_at = Utc::now();
            }
        }
        Ok(true)
    }

    async fn set_balance(&mut self, account_id: Uuid, balance: Balance) -> StorageResult<()> {
        self.require_accounts()?;
        let account = self
            .working
            .accounts
            .get_mut(&account_id)
            .ok_or_else(|| StorageError::Corrupt(format!("account {} vanished", account_id)))?;
        account.balance = balance;
        account.updated_at = Utc::now();
        Ok(())
    }

    async fn lock_expense(
        &mut self,
        user_id: Uuid,
        expense_id: Uuid,
    ) -> StorageResult<Option<Expense>> {
        Ok(self
            .working
            .expenses
            .get(&expense_id)
            .filter(|e| e.user_id == user_id)
            .cloned())
    }

    async fn insert_expense(&mut self, expense: &Expense) -> StorageResult<()> {
        self.working.expenses.insert(expense.id, expense.clone());
        Ok(())
    }

    async fn update_expense(&mut self, expense: &Expense) -> StorageResult<()> {
        self.working.expenses.insert(expense.id, expense.clone());
        Ok(())
    }

    async fn delete_expense(&mut self, user_id: Uuid, expense_id: Uuid) -> StorageResult<bool> {
        let owned = self
            .working
            .expenses
            .get(&expense_id)
            .map_or(false, |e| e.user_id == user_id);
        if owned {
            self.working.expenses.remove(&expense_id);
        }
        Ok(owned)
    }

    async fn insert_transfer(&mut self, transfer: &Transfer) -> StorageResult<()> {
        self.require_accounts()?;
        self.working.transfers.push(transfer.clone());
        Ok(())
    }

    async fn append_entry(&mut self, entry: &LedgerEntry) -> StorageResult<()> {
        self.require_accounts()?;
        self.working.entries.push(entry.clone());
        Ok(())
    }

    async fn commit(self: Box<Self>) -> StorageResult<()> {
        let MemoryTx {
            mut guard, working, ..
        } = *self;
        *guard = working;
        Ok(())
    }
}
