//! Storage module
//!
//! Persistence capability for accounts, expenses, transfers and the ledger
//! journal. A single backend is chosen at startup (`connect`) and shared as
//! [`SharedStorage`]; handlers never know which one they talk to.
//!
//! Every mutation goes through a [`LedgerTx`] unit of work. Reads that feed
//! a balance decision must happen through the same unit of work
//! (`lock_account` / `lock_expense`), which serializes concurrent writers
//! on the rows involved.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::config::{Config, StorageBackend};
use crate::domain::{Account, Balance, Expense, ExpenseFilter, LedgerEntry, Transfer};
use crate::idempotency::IdempotencyRecord;

mod error;
mod memory;
mod postgres;

pub use error::{StorageError, StorageResult};
pub use memory::MemoryStorage;
pub use postgres::PgStorage;

/// Storage handle shared by every request
pub type SharedStorage = Arc<dyn Storage>;

/// Read side and unit-of-work factory of a storage backend
#[async_trait]
pub trait Storage: Send + Sync + 'static {
    /// Short backend name for logs
    fn backend(&self) -> &'static str;

    /// Start a unit of work. Nothing written through it is visible to
    /// others until `commit`; dropping it discards the writes.
    async fn begin(&self) -> StorageResult<Box<dyn LedgerTx>>;

    /// Verify the backend is reachable
    async fn health_check(&self) -> StorageResult<()>;

    async fn get_account(&self, user_id: Uuid, account_id: Uuid) -> StorageResult<Option<Account>>;

    async fn list_accounts(&self, user_id: Uuid) -> StorageResult<Vec<Account>>;

    async fn get_expense(&self, user_id: Uuid, expense_id: Uuid) -> StorageResult<Option<Expense>>;

    /// Expenses matching `filter`, newest date first
    async fn list_expenses(&self, user_id: Uuid, filter: &ExpenseFilter)
        -> StorageResult<Vec<Expense>>;

    /// Transfers of `user_id`, newest first
    async fn list_transfers(&self, user_id: Uuid) -> StorageResult<Vec<Transfer>>;

    /// Journal of one account, oldest first
    async fn list_entries(&self, user_id: Uuid, account_id: Uuid)
        -> StorageResult<Vec<LedgerEntry>>;

    async fn get_idempotency_record(
        &self,
        user_id: Uuid,
        key: Uuid,
    ) -> StorageResult<Option<IdempotencyRecord>>;

    /// Store a record. A live record for the same user and key is kept;
    /// one that expired before `record.created_at` is replaced.
    async fn save_idempotency_record(&self, record: &IdempotencyRecord) -> StorageResult<()>;

    /// Delete records whose `expires_at` is before `now`; returns how many
    async fn purge_expired_idempotency_records(&self, now: DateTime<Utc>) -> StorageResult<u64>;
}

/// A unit of work over the ledger
#[async_trait]
pub trait LedgerTx: Send {
    /// Load an account of `user_id` and hold it until commit
    async fn lock_account(&mut self, user_id: Uuid, account_id: Uuid)
        -> StorageResult<Option<Account>>;

    async fn insert_account(&mut self, account: &Account) -> StorageResult<()>;

    /// Remove an account and its journal, unlinking its expenses.
    /// Returns false if the account does not exist for `user_id`.
    async fn delete_account(&mut self, user_id: Uuid, account_id: Uuid) -> StorageResult<bool>;

    async fn set_balance(&mut self, account_id: Uuid, balance: Balance) -> StorageResult<()>;

    /// Load an expense of `user_id` and hold it until commit
    async fn lock_expense(&mut self, user_id: Uuid, expense_id: Uuid)
        -> StorageResult<Option<Expense>>;

    async fn insert_expense(&mut self, expense: &Expense) -> StorageResult<()>;

    async fn update_expense(&mut self, expense: &Expense) -> StorageResult<()>;

    async fn delete_expense(&mut self, user_id: Uuid, expense_id: Uuid) -> StorageResult<bool>;

    async fn insert_transfer(&mut self, transfer: &Transfer) -> StorageResult<()>;

    async fn append_entry(&mut self, entry: &LedgerEntry) -> StorageResult<()>;

    /// Publish every write of this unit of work
    async fn commit(self: Box<Self>) -> StorageResult<()>;
}

/// Build the storage backend selected by `config`
pub async fn connect(config: &Config) -> Result<SharedStorage, StorageError> {
    match config.storage_backend {
        StorageBackend::Postgres => {
            let database_url = config
                .database_url
                .as_deref()
                .ok_or(StorageError::Unsupported("postgres backend without DATABASE_URL"))?;
            let storage =
                PgStorage::connect(database_url, config.database_max_connections).await?;
            Ok(Arc::new(storage))
        }
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory storage; data is lost on restart");
            Ok(Arc::new(MemoryStorage::new()))
        }
    }
}
