//! Account entity
//!
//! An account holds a balance whose meaning depends on its type: funds held
//! for bank, wallet and cash accounts, amount owed for credit cards.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::{Balance, DomainError};

/// Account type tag. Immutable once the account exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountType {
    Bank,
    Wallet,
    Cash,
    CreditCard,
}

impl AccountType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountType::Bank => "bank",
            AccountType::Wallet => "wallet",
            AccountType::Cash => "cash",
            AccountType::CreditCard => "credit_card",
        }
    }

    /// Credit cards store what is owed, so spending raises the balance.
    pub fn is_credit(&self) -> bool {
        matches!(self, AccountType::CreditCard)
    }
}

impl fmt::Display for AccountType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccountType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "bank" => Ok(AccountType::Bank),
            "wallet" => Ok(AccountType::Wallet),
            "cash" => Ok(AccountType::Cash),
            "credit_card" => Ok(AccountType::CreditCard),
            other => Err(DomainError::Validation(format!(
                "unknown account type '{}'",
                other
            ))),
        }
    }
}

/// A user's tracked account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub account_type: AccountType,
    /// Balance when the account was opened
    pub opening_balance: Balance,
    /// Current balance
    pub balance: Balance,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    /// Open a new account for `user_id`
    pub fn open(
        user_id: Uuid,
        name: &str,
        account_type: AccountType,
        opening_balance: Balance,
    ) -> Result<Self, DomainError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(DomainError::Validation(
                "Account name cannot be empty".to_string(),
            ));
        }

        let now = Utc::now();
        Ok(Self {
            id: Uuid::new_v4(),
            user_id,
            name: name.to_string(),
            account_type,
            opening_balance,
            balance: opening_balance,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn is_credit(&self) -> bool {
        self.account_type.is_credit()
    }

    /// Copy of this account carrying `balance`
    pub fn with_balance(&self, balance: Balance) -> Self {
        Self {
            balance,
            updated_at: Utc::now(),
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_open_account() {
        let user_id = Uuid::new_v4();
        let opening = Balance::new(dec!(1000)).unwrap();
        let account = Account::open(user_id, "  Checking ", AccountType::Bank, opening).unwrap();

        assert_eq!(account.user_id, user_id);
        assert_eq!(account.name, "Checking");
        assert_eq!(account.balance, opening);
        assert_eq!(account.opening_balance, opening);
        assert!(!account.is_credit());
    }

    #[test]
    fn test_open_account_empty_name() {
        let result = Account::open(Uuid::new_v4(), "   ", AccountType::Cash, Balance::zero());
        assert!(matches!(result, Err(DomainError::Validation(_))));
    }

    #[test]
    fn test_account_type_round_trip_str() {
        for ty in [
            AccountType::Bank,
            AccountType::Wallet,
            AccountType::Cash,
            AccountType::CreditCard,
        ] {
            assert_eq!(ty.as_str().parse::<AccountType>().unwrap(), ty);
        }
        assert!("savings".parse::<AccountType>().is_err());
    }

    #[test]
    fn test_account_type_serde() {
        let json = serde_json::to_string(&AccountType::CreditCard).unwrap();
        assert_eq!(json, r#""credit_card""#);
        assert!(AccountType::CreditCard.is_credit());
    }
}
