//! Transfer record

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Amount;

/// A completed movement of money between two accounts of the same user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transfer {
    pub id: Uuid,
    pub user_id: Uuid,
    pub from_account_id: Uuid,
    pub to_account_id: Uuid,
    pub amount: Amount,
    pub memo: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Transfer {
    pub fn new(
        user_id: Uuid,
        from_account_id: Uuid,
        to_account_id: Uuid,
        amount: Amount,
        memo: Option<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            from_account_id,
            to_account_id,
            amount,
            memo: memo.map(|m| m.trim().to_string()).filter(|m| !m.is_empty()),
            created_at: Utc::now(),
        }
    }
}
