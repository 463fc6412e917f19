//! Staged balance postings
//!
//! Accounts are locked through the unit of work, every balance change is
//! computed against an in-memory copy, and nothing is written until all of
//! them validated.

use std::collections::HashMap;

use uuid::Uuid;

use crate::domain::{Account, Balance, DomainError, EntryKind, LedgerEntry};
use crate::error::AppResult;
use crate::storage::{LedgerTx, StorageResult};

pub(crate) struct BalanceSheet {
    accounts: HashMap<Uuid, Account>,
    entries: Vec<LedgerEntry>,
}

impl BalanceSheet {
    /// Lock `account_ids` of `user_id` in ascending id order
    pub(crate) async fn lock<I>(
        tx: &mut dyn LedgerTx,
        user_id: Uuid,
        account_ids: I,
    ) -> AppResult<Self>
    where
        I: IntoIterator<Item = Uuid>,
    {
        let mut ids: Vec<Uuid> = account_ids.into_iter().collect();
        ids.sort();
        ids.dedup();

        let mut accounts = HashMap::with_capacity(ids.len());
        for id in ids {
            let account = tx
                .lock_account(user_id, id)
                .await?
                .ok_or_else(|| DomainError::AccountNotFound(id.to_string()))?;
            accounts.insert(id, account);
        }

        Ok(Self {
            accounts,
            entries: Vec::new(),
        })
    }

    /// Compute the next balance of `account_id` with `rule` and stage it.
    /// Later postings to the same account see the staged balance.
    pub(crate) fn post<F>(
        &mut self,
        account_id: Uuid,
        kind: EntryKind,
        reference_id: Uuid,
        rule: F,
    ) -> Result<Balance, DomainError>
    where
        F: FnOnce(&Account) -> Result<Balance, DomainError>,
    {
        let account = self
            .accounts
            .get_mut(&account_id)
            .ok_or_else(|| DomainError::AccountNotFound(account_id.to_string()))?;

        let after = rule(account)?;
        self.entries
            .push(LedgerEntry::record(account, after, kind, reference_id));
        *account = account.with_balance(after);
        Ok(after)
    }

    /// Write staged balances and their journal entries
    pub(crate) async fn write(self, tx: &mut dyn LedgerTx) -> StorageResult<()> {
        for entry in &self.entries {
            tx.set_balance(entry.account_id, entry.balance_after).await?;
            tx.append_entry(entry).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ledger::{apply_expense, revert_expense};
    use crate::domain::{AccountType, Amount};
    use crate::storage::{MemoryStorage, Storage};
    use rust_decimal_macros::dec;

    fn amount(value: rust_decimal::Decimal) -> Amount {
        Amount::new(value).unwrap()
    }

    #[tokio::test]
    async fn test_revert_then_reapply_on_one_account() {
        let storage = MemoryStorage::new();
        let user_id = Uuid::new_v4();
        let account = Account::open(
            user_id,
            "Checking",
            AccountType::Bank,
            Balance::new(dec!(700.00)).unwrap(),
        )
        .unwrap();

        let mut tx = storage.begin().await.unwrap();
        tx.insert_account(&account).await.unwrap();

        let mut sheet = BalanceSheet::lock(tx.as_mut(), user_id, [account.id, account.id])
            .await
            .unwrap();
        let reverted = sheet
            .post(account.id, EntryKind::ExpenseReverted, Uuid::nil(), |a| {
                revert_expense(a, &amount(dec!(300.00)))
            })
            .unwrap();
        let applied = sheet
            .post(account.id, EntryKind::ExpenseApplied, Uuid::nil(), |a| {
                apply_expense(a, &amount(dec!(450.00)))
            })
            .unwrap();

        assert_eq!(reverted.value(), dec!(1000.00));
        assert_eq!(applied.value(), dec!(550.00));

        sheet.write(tx.as_mut()).await.unwrap();
        tx.commit().await.unwrap();

        let stored = storage.get_account(user_id, account.id).await.unwrap().unwrap();
        assert_eq!(stored.balance.value(), dec!(550.00));

        let entries = storage.list_entries(user_id, account.id).await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].delta, dec!(300.00));
        assert_eq!(entries[1].delta, dec!(-450.00));
    }

    #[tokio::test]
    async fn test_lock_unknown_account() {
        let storage = MemoryStorage::new();
        let mut tx = storage.begin().await.unwrap();

        let result = BalanceSheet::lock(tx.as_mut(), Uuid::new_v4(), Some(Uuid::new_v4())).await;
        assert!(matches!(
            result,
            Err(crate::error::AppError::Domain(DomainError::AccountNotFound(_)))
        ));
    }
}
