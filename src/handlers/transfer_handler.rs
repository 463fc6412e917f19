//! Transfer Handler
//!
//! Moves money between two accounts of the same user. The source side is
//! a Spend and the destination side a Receive, so paying a credit card
//! from a bank account lowers both the bank balance and the card's owed
//! amount.

use crate::domain::{
    apply_amount, Direction, DomainError, EntryKind, OperationContext, Transfer,
};
use crate::error::AppResult;
use crate::storage::SharedStorage;

use super::commands::parse_amount;
use super::posting::BalanceSheet;
use super::{require_user, TransferCommand, TransferResult};

/// Handler for account-to-account transfers
pub struct TransferHandler {
    storage: SharedStorage,
}

impl TransferHandler {
    pub fn new(storage: SharedStorage) -> Self {
        Self { storage }
    }

    /// Execute the transfer command
    pub async fn execute(
        &self,
        command: TransferCommand,
        context: &OperationContext,
    ) -> AppResult<TransferResult> {
        let user_id = require_user(context)?;

        let amount = parse_amount(&command.amount)?;

        if command.from_account_id == command.to_account_id {
            return Err(DomainError::SameAccountTransfer.into());
        }

        let transfer = Transfer::new(
            user_id,
            command.from_account_id,
            command.to_account_id,
            amount,
            command.memo,
        );

        let mut tx = self.storage.begin().await?;
        let mut sheet = BalanceSheet::lock(
            tx.as_mut(),
            user_id,
            [transfer.from_account_id, transfer.to_account_id],
        )
        .await?;

        // Both sides validate before either is written
        let from_balance = sheet.post(
            transfer.from_account_id,
            EntryKind::TransferOut,
            transfer.id,
            |account| apply_amount(account, &amount, Direction::Spend),
        )?;
        let to_balance = sheet.post(
            transfer.to_account_id,
            EntryKind::TransferIn,
            transfer.id,
            |account| apply_amount(account, &amount, Direction::Receive),
        )?;

        tx.insert_transfer(&transfer).await?;
        sheet.write(tx.as_mut()).await?;
        tx.commit().await?;

        tracing::info!(
            transfer_id = %transfer.id,
            from_account_id = %transfer.from_account_id,
            to_account_id = %transfer.to_account_id,
            amount = %amount,
            "Transfer completed"
        );

        Ok(TransferResult {
            transfer_id: transfer.id,
            from_account_id: transfer.from_account_id,
            to_account_id: transfer.to_account_id,
            amount,
            from_balance,
            to_balance,
        })
    }

    /// Transfers of the requesting user, newest first
    pub async fn history(&self, context: &OperationContext) -> AppResult<Vec<Transfer>> {
        let user_id = require_user(context)?;
        Ok(self.storage.list_transfers(user_id).await?)
    }
}
