//! PostgreSQL storage backend
//!
//! A unit of work is a database transaction. Rows that feed a balance
//! decision are read with `SELECT ... FOR UPDATE`, so two requests touching
//! the same account queue up instead of overwriting each other.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::domain::{
    Account, AccountType, Amount, Balance, EntryKind, Expense, ExpenseFilter, LedgerEntry,
    Transfer,
};
use crate::idempotency::IdempotencyRecord;

use super::{LedgerTx, Storage, StorageError, StorageResult};

type AccountRow = (
    Uuid,
    Uuid,
    String,
    String,
    Decimal,
    Decimal,
    DateTime<Utc>,
    DateTime<Utc>,
);

type ExpenseRow = (
    Uuid,
    Uuid,
    Option<Uuid>,
    Decimal,
    String,
    Option<String>,
    NaiveDate,
    DateTime<Utc>,
    DateTime<Utc>,
);

type TransferRow = (Uuid, Uuid, Uuid, Uuid, Decimal, Option<String>, DateTime<Utc>);

type EntryRow = (Uuid, Uuid, Uuid, String, Uuid, Decimal, Decimal, DateTime<Utc>);

const ACCOUNT_COLUMNS: &str =
    "id, user_id, name, account_type, opening_balance, balance, created_at, updated_at";

const EXPENSE_COLUMNS: &str =
    "id, user_id, account_id, amount, category, description, date, created_at, updated_at";

fn account_from_row(row: AccountRow) -> StorageResult<Account> {
    let (id, user_id, name, account_type, opening_balance, balance, created_at, updated_at) = row;
    let account_type: AccountType = account_type
        .parse()
        .map_err(|e| StorageError::Corrupt(format!("account {}: {}", id, e)))?;

    Ok(Account {
        id,
        user_id,
        name,
        account_type,
        opening_balance: Balance::from_decimal_unchecked(opening_balance),
        balance: Balance::from_decimal_unchecked(balance),
        created_at,
        updated_at,
    })
}

fn amount_from_column(id: Uuid, value: Decimal) -> StorageResult<Amount> {
    Amount::new(value).map_err(|e| StorageError::Corrupt(format!("record {}: {}", id, e)))
}

fn expense_from_row(row: ExpenseRow) -> StorageResult<Expense> {
    let (id, user_id, account_id, amount, category, description, date, created_at, updated_at) =
        row;

    Ok(Expense {
        id,
        user_id,
        account_id,
        amount: amount_from_column(id, amount)?,
        category,
        description,
        date,
        created_at,
        updated_at,
    })
}

fn transfer_from_row(row: TransferRow) -> StorageResult<Transfer> {
    let (id, user_id, from_account_id, to_account_id, amount, memo, created_at) = row;

    Ok(Transfer {
        id,
        user_id,
        from_account_id,
        to_account_id,
        amount: amount_from_column(id, amount)?,
        memo,
        created_at,
    })
}

fn entry_from_row(row: EntryRow) -> StorageResult<LedgerEntry> {
    let (id, user_id, account_id, kind, reference_id, delta, balance_after, created_at) = row;
    let kind: EntryKind = kind
        .parse()
        .map_err(|e| StorageError::Corrupt(format!("ledger entry {}: {}", id, e)))?;

    Ok(LedgerEntry {
        id,
        user_id,
        account_id,
        kind,
        reference_id,
        delta,
        balance_after: Balance::from_decimal_unchecked(balance_after),
        created_at,
    })
}

/// PostgreSQL-backed storage
#[derive(Debug, Clone)]
pub struct PgStorage {
    pool: PgPool,
}

impl PgStorage {
    /// Wrap an existing pool
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Open a connection pool and verify the schema
    pub async fn connect(database_url: &str, max_connections: u32) -> StorageResult<Self> {
        tracing::info!("Connecting to database...");
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;

        if !crate::db::check_schema(&pool).await? {
            return Err(StorageError::Corrupt(
                "database schema is incomplete; apply migrations/0001_init.sql".to_string(),
            ));
        }

        tracing::info!("Database connected successfully");
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl Storage for PgStorage {
    fn backend(&self) -> &'static str {
        "postgres"
    }

    async fn begin(&self) -> StorageResult<Box<dyn LedgerTx>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgTx { tx }))
    }

    async fn health_check(&self) -> StorageResult<()> {
        crate::db::verify_connection(&self.pool).await?;
        Ok(())
    }

    async fn get_account(&self, user_id: Uuid, account_id: Uuid) -> StorageResult<Option<Account>> {
        let row: Option<AccountRow> = sqlx::query_as(&format!(
            "SELECT {} FROM accounts WHERE id = $1 AND user_id = $2",
            ACCOUNT_COLUMNS
        ))
        .bind(account_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(account_from_row).transpose()
    }

    async fn list_accounts(&self, user_id: Uuid) -> StorageResult<Vec<Account>> {
        let rows: Vec<AccountRow> = sqlx::query_as(&format!(
            "SELECT {} FROM accounts WHERE user_id = $1 ORDER BY created_at, id",
            ACCOUNT_COLUMNS
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(account_from_row).collect()
    }

    async fn get_expense(&self, user_id: Uuid, expense_id: Uuid) -> StorageResult<Option<Expense>> {
        let row: Option<ExpenseRow> = sqlx::query_as(&format!(
            "SELECT {} FROM expenses WHERE id = $1 AND user_id = $2",
            EXPENSE_COLUMNS
        ))
        .bind(expense_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(expense_from_row).transpose()
    }

    async fn list_expenses(
        &self,
        user_id: Uuid,
        filter: &ExpenseFilter,
    ) -> StorageResult<Vec<Expense>> {
        // NULL parameters disable their filter
        let rows: Vec<ExpenseRow> = sqlx::query_as(&format!(
            r#"
            SELECT {}
            FROM expenses
            WHERE user_id = $1
              AND ($2::uuid IS NULL OR account_id = $2)
              AND ($3::text IS NULL OR category = $3)
              AND ($4::date IS NULL OR date >= $4)
              AND ($5::date IS NULL OR date <= $5)
            ORDER BY date DESC, created_at DESC
            "#,
            EXPENSE_COLUMNS
        ))
        .bind(user_id)
        .bind(filter.account_id)
        .bind(filter.category.as_deref())
        .bind(filter.from)
        .bind(filter.to)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(expense_from_row).collect()
    }

    async fn list_transfers(&self, user_id: Uuid) -> StorageResult<Vec<Transfer>> {
        let rows: Vec<TransferRow> = sqlx::query_as(
            r#"
            SELECT id, user_id, from_account_id, to_account_id, amount, memo, created_at
            FROM transfers
            WHERE user_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(transfer_from_row).collect()
    }

    async fn list_entries(
        &self,
        user_id: Uuid,
        account_id: Uuid,
    ) -> StorageResult<Vec<LedgerEntry>> {
        let rows: Vec<EntryRow> = sqlx::query_as(
            r#"
            SELECT id, user_id, account_id, kind, reference_id, delta, balance_after, created_at
            FROM ledger_entries
            WHERE user_id = $1 AND account_id = $2
            ORDER BY seq ASC
            "#,
        )
        .bind(user_id)
        .bind(account_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(entry_from_row).collect()
    }

    async fn get_idempotency_record(
        &self,
        user_id: Uuid,
        key: Uuid,
    ) -> StorageResult<Option<IdempotencyRecord>> {
        let row: Option<(Uuid, Uuid, String, i32, serde_json::Value, DateTime<Utc>, DateTime<Utc>)> =
            sqlx::query_as(
                r#"
                SELECT key, user_id, request_hash, response_status, response_body, created_at, expires_at
                FROM idempotency_keys
                WHERE user_id = $1 AND key = $2
                "#,
            )
            .bind(user_id)
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(
            |(key, user_id, request_hash, response_status, response_body, created_at, expires_at)| {
                IdempotencyRecord {
                    key,
                    user_id,
                    request_hash,
                    response_status: response_status as u16,
                    response_body,
                    created_at,
                    expires_at,
                }
            },
        ))
    }

    async fn save_idempotency_record(&self, record: &IdempotencyRecord) -> StorageResult<()> {
        sqlx::query(
            r#"
            INSERT INTO idempotency_keys
                (key, user_id, request_hash, response_status, response_body, created_at, expires_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (user_id, key) DO UPDATE
            SET request_hash = EXCLUDED.request_hash,
                response_status = EXCLUDED.response_status,
                response_body = EXCLUDED.response_body,
                created_at = EXCLUDED.created_at,
                expires_at = EXCLUDED.expires_at
            WHERE idempotency_keys.expires_at < EXCLUDED.created_at
            "#,
        )
        .bind(record.key)
        .bind(record.user_id)
        .bind(&record.request_hash)
        .bind(i32::from(record.response_status))
        .bind(&record.response_body)
        .bind(record.created_at)
        .bind(record.expires_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn purge_expired_idempotency_records(&self, now: DateTime<Utc>) -> StorageResult<u64> {
        let result = sqlx::query("DELETE FROM idempotency_keys WHERE expires_at < $1")
            .bind(now)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}

/// Unit of work backed by a database transaction
struct PgTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl LedgerTx for PgTx {
    async fn lock_account(
        &mut self,
        user_id: Uuid,
        account_id: Uuid,
    ) -> StorageResult<Option<Account>> {
        let row: Option<AccountRow> = sqlx::query_as(&format!(
            "SELECT {} FROM accounts WHERE id = $1 AND user_id = $2 FOR UPDATE",
            ACCOUNT_COLUMNS
        ))
        .bind(account_id)
        .bind(user_id)
        .fetch_optional(&mut *self.tx)
        .await?;

        row.map(account_from_row).transpose()
    }

    async fn insert_account(&mut self, account: &Account) -> StorageResult<()> {
        sqlx::query(
            r#"
            INSERT INTO accounts
                (id, user_id, name, account_type, opening_balance, balance, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(account.id)
        .bind(account.user_id)
        .bind(&account.name)
        .bind(account.account_type.as_str())
        .bind(account.opening_balance.value())
        .bind(account.balance.value())
        .bind(account.created_at)
        .bind(account.updated_at)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn delete_account(&mut self, user_id: Uuid, account_id: Uuid) -> StorageResult<bool> {
        // expenses.account_id is ON DELETE SET NULL, ledger_entries cascade
        let result = sqlx::query("DELETE FROM accounts WHERE id = $1 AND user_id = $2")
            .bind(account_id)
            .bind(user_id)
            .execute(&mut *self.tx)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn set_balance(&mut self, account_id: Uuid, balance: Balance) -> StorageResult<()> {
        let result = sqlx::query(
            "UPDATE accounts SET balance = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(account_id)
        .bind(balance.value())
        .execute(&mut *self.tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StorageError::Corrupt(format!(
                "account {} vanished",
                account_id
            )));
        }
        Ok(())
    }

    async fn lock_expense(
        &mut self,
        user_id: Uuid,
        expense_id: Uuid,
    ) -> StorageResult<Option<Expense>> {
        let row: Option<ExpenseRow> = sqlx::query_as(&format!(
            "SELECT {} FROM expenses WHERE id = $1 AND user_id = $2 FOR UPDATE",
            EXPENSE_COLUMNS
        ))
        .bind(expense_id)
        .bind(user_id)
        .fetch_optional(&mut *self.tx)
        .await?;

        row.map(expense_from_row).transpose()
    }

    async fn insert_expense(&mut self, expense: &Expense) -> StorageResult<()> {
        sqlx::query(
            r#"
            INSERT INTO expenses
                (id, user_id, account_id, amount, category, description, date, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(expense.id)
        .bind(expense.user_id)
        .bind(expense.account_id)
        .bind(expense.amount.value())
        .bind(&expense.category)
        .bind(expense.description.as_deref())
        .bind(expense.date)
        .bind(expense.created_at)
        .bind(expense.updated_at)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn update_expense(&mut self, expense: &Expense) -> StorageResult<()> {
        sqlx::query(
            r#"
            UPDATE expenses
            SET account_id = $3,
                amount = $4,
                category = $5,
                description = $6,
                date = $7,
                updated_at = $8
            WHERE id = $1 AND user_id = $2
            "#,
        )
        .bind(expense.id)
        .bind(expense.user_id)
        .bind(expense.account_id)
        .bind(expense.amount.value())
        .bind(&expense.category)
        .bind(expense.description.as_deref())
        .bind(expense.date)
        .bind(expense.updated_at)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn delete_expense(&mut self, user_id: Uuid, expense_id: Uuid) -> StorageResult<bool> {
        let result = sqlx::query("DELETE FROM expenses WHERE id = $1 AND user_id = $2")
            .bind(expense_id)
            .bind(user_id)
            .execute(&mut *self.tx)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn insert_transfer(&mut self, transfer: &Transfer) -> StorageResult<()> {
        sqlx::query(
            r#"
            INSERT INTO transfers
                (id, user_id, from_account_id, to_account_id, amount, memo, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(transfer.id)
        .bind(transfer.user_id)
        .bind(transfer.from_account_id)
        .bind(transfer.to_account_id)
        .bind(transfer.amount.value())
        .bind(transfer.memo.as_deref())
        .bind(transfer.created_at)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn append_entry(&mut self, entry: &LedgerEntry) -> StorageResult<()> {
        sqlx::query(
            r#"
            INSERT INTO ledger_entries
                (id, user_id, account_id, kind, reference_id, delta, balance_after, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(entry.id)
        .bind(entry.user_id)
        .bind(entry.account_id)
        .bind(entry.kind.as_str())
        .bind(entry.reference_id)
        .bind(entry.delta)
        .bind(entry.balance_after.value())
        .bind(entry.created_at)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn commit(self: Box<Self>) -> StorageResult<()> {
        let PgTx { tx } = *self;
        tx.commit().await?;
        Ok(())
    }
}
