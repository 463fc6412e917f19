//! Handler tests against the in-memory backend

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::NaiveDate;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    use crate::domain::{AccountType, DomainError, EntryKind, OperationContext};
    use crate::error::AppError;
    use crate::handlers::{
        AccountHandler, CreateAccountCommand, CreateExpenseCommand, ExpenseHandler,
        TransferCommand, TransferHandler, UpdateExpenseCommand,
    };
    use crate::storage::{MemoryStorage, SharedStorage, StorageError};

    struct Fixture {
        storage: SharedStorage,
        context: OperationContext,
    }

    impl Fixture {
        fn new() -> Self {
            Self::with_storage(Arc::new(MemoryStorage::new()))
        }

        fn with_storage(storage: SharedStorage) -> Self {
            Self {
                storage,
                context: OperationContext::new().with_request_user(Uuid::new_v4()),
            }
        }

        fn accounts(&self) -> AccountHandler {
            AccountHandler::new(self.storage.clone())
        }

        fn expenses(&self) -> ExpenseHandler {
            ExpenseHandler::new(self.storage.clone())
        }

        fn transfers(&self) -> TransferHandler {
            TransferHandler::new(self.storage.clone())
        }

        async fn open(&self, name: &str, account_type: AccountType, opening: &str) -> Uuid {
            let command = CreateAccountCommand::new(name, account_type).with_opening_balance(opening);
            self.accounts()
                .create(command, &self.context)
                .await
                .unwrap()
                .id
        }

        async fn balance(&self, account_id: Uuid) -> Decimal {
            self.accounts()
                .get(account_id, &self.context)
                .await
                .unwrap()
                .balance
                .value()
        }

        async fn spend(&self, account_id: Uuid, amount: &str) -> Result<Uuid, AppError> {
            let command = CreateExpenseCommand::new(amount, day()).with_account(account_id);
            self.expenses()
                .create(command, &self.context)
                .await
                .map(|e| e.id)
        }

        async fn assert_reconciled(&self, account_id: Uuid) {
            let reconciliation = self
                .accounts()
                .reconcile(account_id, &self.context)
                .await
                .unwrap();
            assert!(reconciliation.is_consistent, "{:?}", reconciliation);
        }
    }

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, 10).unwrap()
    }

    // =========================================================================
    // Expense lifecycle
    // =========================================================================

    #[tokio::test]
    async fn test_checking_account_lifecycle() {
        let fx = Fixture::new();
        let checking = fx.open("Checking", AccountType::Bank, "1000.00").await;

        let expense_id = fx.spend(checking, "300.00").await.unwrap();
        assert_eq!(fx.balance(checking).await, dec!(700.00));

        fx.expenses()
            .update(
                expense_id,
                UpdateExpenseCommand::default().with_amount("450.00"),
                &fx.context,
            )
            .await
            .unwrap();
        assert_eq!(fx.balance(checking).await, dec!(550.00));

        fx.expenses().delete(expense_id, &fx.context).await.unwrap();
        assert_eq!(fx.balance(checking).await, dec!(1000.00));

        let result = fx.spend(checking, "2000.00").await;
        assert!(matches!(
            result,
            Err(AppError::Domain(DomainError::InsufficientFunds { .. }))
        ));
        assert_eq!(fx.balance(checking).await, dec!(1000.00));

        fx.assert_reconciled(checking).await;
    }

    #[tokio::test]
    async fn test_rejected_expense_is_not_persisted() {
        let fx = Fixture::new();
        let wallet = fx.open("Wallet", AccountType::Wallet, "10.00").await;

        assert!(fx.spend(wallet, "10.01").await.is_err());

        let listed = fx
            .expenses()
            .list(&Default::default(), &fx.context)
            .await
            .unwrap();
        assert!(listed.is_empty());
        assert_eq!(fx.balance(wallet).await, dec!(10.00));
    }

    #[tokio::test]
    async fn test_credit_card_sign_inversion() {
        let fx = Fixture::new();
        let visa = fx.open("Visa", AccountType::CreditCard, "0").await;

        let expense_id = fx.spend(visa, "120.00").await.unwrap();
        assert_eq!(fx.balance(visa).await, dec!(120.00));

        fx.expenses().delete(expense_id, &fx.context).await.unwrap();
        assert_eq!(fx.balance(visa).await, dec!(0.00));
    }

    #[tokio::test]
    async fn test_reassigning_expense_moves_its_effect() {
        let fx = Fixture::new();
        let x = fx.open("X", AccountType::Bank, "500.00").await;
        let y = fx.open("Y", AccountType::Cash, "300.00").await;

        let expense_id = fx.spend(x, "100.00").await.unwrap();
        assert_eq!(fx.balance(x).await, dec!(400.00));

        let updated = fx
            .expenses()
            .update(
                expense_id,
                UpdateExpenseCommand::default()
                    .with_account(Some(y))
                    .with_amount("250.00"),
                &fx.context,
            )
            .await
            .unwrap();

        assert_eq!(updated.account_id, Some(y));
        assert_eq!(fx.balance(x).await, dec!(500.00));
        assert_eq!(fx.balance(y).await, dec!(50.00));

        fx.assert_reconciled(x).await;
        fx.assert_reconciled(y).await;
    }

    #[tokio::test]
    async fn test_failed_reassignment_changes_nothing() {
        let fx = Fixture::new();
        let x = fx.open("X", AccountType::Bank, "500.00").await;
        let y = fx.open("Y", AccountType::Cash, "30.00").await;
        let expense_id = fx.spend(x, "100.00").await.unwrap();

        let result = fx
            .expenses()
            .update(
                expense_id,
                UpdateExpenseCommand::default().with_account(Some(y)),
                &fx.context,
            )
            .await;

        assert!(matches!(
            result,
            Err(AppError::Domain(DomainError::InsufficientFunds { .. }))
        ));
        assert_eq!(fx.balance(x).await, dec!(400.00));
        assert_eq!(fx.balance(y).await, dec!(30.00));

        let expense = fx.expenses().get(expense_id, &fx.context).await.unwrap();
        assert_eq!(expense.account_id, Some(x));
    }

    #[tokio::test]
    async fn test_unlinking_expense_restores_balance() {
        let fx = Fixture::new();
        let bank = fx.open("Bank", AccountType::Bank, "100.00").await;
        let expense_id = fx.spend(bank, "40.00").await.unwrap();

        fx.expenses()
            .update(
                expense_id,
                UpdateExpenseCommand::default().with_account(None),
                &fx.context,
            )
            .await
            .unwrap();

        assert_eq!(fx.balance(bank).await, dec!(100.00));
    }

    #[tokio::test]
    async fn test_delete_after_card_payment_fails_on_revert() {
        let fx = Fixture::new();
        let bank = fx.open("Bank", AccountType::Bank, "1000.00").await;
        let visa = fx.open("Visa", AccountType::CreditCard, "0").await;

        let expense_id = fx.spend(visa, "500.00").await.unwrap();
        fx.transfers()
            .execute(TransferCommand::new(bank, visa, "500.00"), &fx.context)
            .await
            .unwrap();

        let result = fx.expenses().delete(expense_id, &fx.context).await;
        assert!(matches!(
            result,
            Err(AppError::Domain(DomainError::OverPaymentOnRevert { .. }))
        ));

        // The expense is still there and nothing moved
        assert!(fx.expenses().get(expense_id, &fx.context).await.is_ok());
        assert_eq!(fx.balance(visa).await, dec!(0.00));
        assert_eq!(fx.balance(bank).await, dec!(500.00));
    }

    #[tokio::test]
    async fn test_update_after_card_payment_fails_on_revert() {
        let fx = Fixture::new();
        let bank = fx.open("Bank", AccountType::Bank, "1000.00").await;
        let visa = fx.open("Visa", AccountType::CreditCard, "0").await;

        let expense_id = fx.spend(visa, "500.00").await.unwrap();
        fx.transfers()
            .execute(TransferCommand::new(bank, visa, "500.00"), &fx.context)
            .await
            .unwrap();

        let result = fx
            .expenses()
            .update(
                expense_id,
                UpdateExpenseCommand::default()
                    .with_amount("20.00")
                    .with_category("travel"),
                &fx.context,
            )
            .await;
        assert!(matches!(
            result,
            Err(AppError::Domain(DomainError::OverPaymentOnRevert { .. }))
        ));

        let expense = fx.expenses().get(expense_id, &fx.context).await.unwrap();
        assert_eq!(expense.amount.value(), dec!(500.00));
        assert_eq!(expense.category, "uncategorized");
        assert_eq!(expense.account_id, Some(visa));
        assert_eq!(fx.balance(visa).await, dec!(0.00));
        assert_eq!(fx.balance(bank).await, dec!(500.00));
        fx.assert_reconciled(visa).await;
    }

    #[tokio::test]
    async fn test_metadata_update_journals_a_net_zero_pair() {
        let fx = Fixture::new();
        let bank = fx.open("Bank", AccountType::Bank, "100.00").await;
        let expense_id = fx.spend(bank, "40.00").await.unwrap();

        let updated = fx
            .expenses()
            .update(
                expense_id,
                UpdateExpenseCommand::default().with_category("groceries"),
                &fx.context,
            )
            .await
            .unwrap();
        assert_eq!(updated.category, "groceries");
        assert_eq!(fx.balance(bank).await, dec!(60.00));

        let entries = fx.accounts().statement(bank, &fx.context).await.unwrap();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[1].kind, EntryKind::ExpenseReverted);
        assert_eq!(entries[2].kind, EntryKind::ExpenseApplied);
        assert_eq!(entries[1].delta, dec!(40.00));
        assert_eq!(entries[2].delta, dec!(-40.00));
        assert_eq!(entries[1].reference_id, expense_id);
        assert_eq!(entries[2].reference_id, expense_id);
        fx.assert_reconciled(bank).await;
    }

    #[tokio::test]
    async fn test_empty_update_is_rejected() {
        let fx = Fixture::new();
        let bank = fx.open("Bank", AccountType::Bank, "100.00").await;
        let expense_id = fx.spend(bank, "40.00").await.unwrap();

        let result = fx
            .expenses()
            .update(expense_id, UpdateExpenseCommand::default(), &fx.context)
            .await;
        assert!(matches!(result, Err(AppError::InvalidRequest(_))));
    }

    #[tokio::test]
    async fn test_expenses_are_scoped_to_user() {
        let fx = Fixture::new();
        let bank = fx.open("Bank", AccountType::Bank, "100.00").await;
        let expense_id = fx.spend(bank, "40.00").await.unwrap();

        let stranger = OperationContext::new().with_request_user(Uuid::new_v4());
        let result = fx.expenses().delete(expense_id, &stranger).await;
        assert!(matches!(
            result,
            Err(AppError::Domain(DomainError::ExpenseNotFound(_)))
        ));

        // Another user's account cannot be charged either
        let command = CreateExpenseCommand::new("1.00", day()).with_account(bank);
        let result = fx.expenses().create(command, &stranger).await;
        assert!(matches!(
            result,
            Err(AppError::Domain(DomainError::AccountNotFound(_)))
        ));
    }

    #[tokio::test]
    async fn test_missing_request_user() {
        let fx = Fixture::new();
        let result = fx.accounts().list(&OperationContext::new()).await;
        assert!(matches!(result, Err(AppError::MissingHeader(_))));
    }

    // =========================================================================
    // Transfers
    // =========================================================================

    #[tokio::test]
    async fn test_visa_payment_scenario() {
        let fx = Fixture::new();
        let bank = fx.open("Checking", AccountType::Bank, "1000.00").await;
        let visa = fx.open("Visa", AccountType::CreditCard, "0.00").await;

        fx.spend(visa, "500.00").await.unwrap();
        assert_eq!(fx.balance(visa).await, dec!(500.00));

        let result = fx
            .transfers()
            .execute(TransferCommand::new(bank, visa, "500.00"), &fx.context)
            .await
            .unwrap();
        assert_eq!(result.from_balance.value(), dec!(500.00));
        assert_eq!(result.to_balance.value(), dec!(0.00));

        let overpay = fx
            .transfers()
            .execute(TransferCommand::new(bank, visa, "100.00"), &fx.context)
            .await;
        assert!(matches!(
            overpay,
            Err(AppError::Domain(DomainError::OverPayment { .. }))
        ));
        assert_eq!(fx.balance(bank).await, dec!(500.00));
        assert_eq!(fx.balance(visa).await, dec!(0.00));

        let history = fx.transfers().history(&fx.context).await.unwrap();
        assert_eq!(history.len(), 1);

        fx.assert_reconciled(bank).await;
        fx.assert_reconciled(visa).await;
    }

    #[tokio::test]
    async fn test_transfer_round_trip() {
        let fx = Fixture::new();
        let a = fx.open("A", AccountType::Bank, "80.00").await;
        let b = fx.open("B", AccountType::Wallet, "20.00").await;

        fx.transfers()
            .execute(TransferCommand::new(a, b, "35.50"), &fx.context)
            .await
            .unwrap();
        fx.transfers()
            .execute(TransferCommand::new(b, a, "35.50"), &fx.context)
            .await
            .unwrap();

        assert_eq!(fx.balance(a).await, dec!(80.00));
        assert_eq!(fx.balance(b).await, dec!(20.00));
    }

    #[tokio::test]
    async fn test_transfer_preconditions() {
        let fx = Fixture::new();
        let a = fx.open("A", AccountType::Bank, "80.00").await;

        let same = fx
            .transfers()
            .execute(TransferCommand::new(a, a, "1.00"), &fx.context)
            .await;
        assert!(matches!(
            same,
            Err(AppError::Domain(DomainError::SameAccountTransfer))
        ));

        let zero = fx
            .transfers()
            .execute(TransferCommand::new(a, Uuid::new_v4(), "0"), &fx.context)
            .await;
        assert!(matches!(zero, Err(AppError::Domain(DomainError::InvalidAmount(_)))));

        let missing = fx
            .transfers()
            .execute(TransferCommand::new(a, Uuid::new_v4(), "1.00"), &fx.context)
            .await;
        assert!(matches!(
            missing,
            Err(AppError::Domain(DomainError::AccountNotFound(_)))
        ));
        assert_eq!(fx.balance(a).await, dec!(80.00));
    }

    // =========================================================================
    // Accounts
    // =========================================================================

    #[tokio::test]
    async fn test_delete_account_unlinks_expenses() {
        let fx = Fixture::new();
        let bank = fx.open("Bank", AccountType::Bank, "100.00").await;
        let expense_id = fx.spend(bank, "40.00").await.unwrap();

        fx.accounts().delete(bank, &fx.context).await.unwrap();

        let expense = fx.expenses().get(expense_id, &fx.context).await.unwrap();
        assert_eq!(expense.account_id, None);

        let result = fx.accounts().get(bank, &fx.context).await;
        assert!(matches!(
            result,
            Err(AppError::Domain(DomainError::AccountNotFound(_)))
        ));

        // The unlinked expense can now be deleted without any balance effect
        fx.expenses().delete(expense_id, &fx.context).await.unwrap();
    }

    #[tokio::test]
    async fn test_statement_lists_entries_in_order() {
        let fx = Fixture::new();
        let bank = fx.open("Bank", AccountType::Bank, "100.00").await;
        let expense_id = fx.spend(bank, "40.00").await.unwrap();
        fx.expenses().delete(expense_id, &fx.context).await.unwrap();

        let entries = fx.accounts().statement(bank, &fx.context).await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].delta, dec!(-40.00));
        assert_eq!(entries[1].delta, dec!(40.00));
        assert_eq!(entries[1].balance_after.value(), dec!(100.00));
    }

    #[tokio::test]
    async fn test_invalid_account_commands() {
        let fx = Fixture::new();

        let blank = fx
            .accounts()
            .create(CreateAccountCommand::new("  ", AccountType::Cash), &fx.context)
            .await;
        assert!(matches!(blank, Err(AppError::Domain(DomainError::Validation(_)))));

        let negative = fx
            .accounts()
            .create(
                CreateAccountCommand::new("Cash", AccountType::Cash).with_opening_balance("-1"),
                &fx.context,
            )
            .await;
        assert!(matches!(
            negative,
            Err(AppError::Domain(DomainError::InvalidAmount(_)))
        ));
    }

    // =========================================================================
    // Minimal backend
    // =========================================================================

    #[tokio::test]
    async fn test_minimal_backend_rejects_balance_operations() {
        let fx = Fixture::with_storage(Arc::new(MemoryStorage::without_accounts()));

        let command = CreateExpenseCommand::new("12.00", day()).with_category("food");
        let expense = fx.expenses().create(command, &fx.context).await.unwrap();
        assert_eq!(expense.account_id, None);

        let linked = CreateExpenseCommand::new("12.00", day()).with_account(Uuid::new_v4());
        let result = fx.expenses().create(linked, &fx.context).await;
        assert!(matches!(
            result,
            Err(AppError::Storage(StorageError::Unsupported(_)))
        ));

        let transfer = fx
            .transfers()
            .execute(
                TransferCommand::new(Uuid::new_v4(), Uuid::new_v4(), "1.00"),
                &fx.context,
            )
            .await;
        assert!(matches!(
            transfer,
            Err(AppError::Storage(StorageError::Unsupported(_)))
        ));
    }
}
