//! Money types
//!
//! Domain primitives for monetary values. Every value carries exactly two
//! fractional digits; binary floats never enter balance arithmetic.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Largest single amount (10 billion)
const MAX_AMOUNT: i64 = 10_000_000_000;

/// Largest balance (10^16), inside the NUMERIC(20, 2) columns.
/// Crediting a balance fails only after a million maximum-size amounts.
const MAX_BALANCE: i64 = 10_000_000_000_000_000;

/// Fractional digits carried by every monetary value
pub const MONEY_SCALE: u32 = 2;

/// Amount represents a validated, strictly positive monetary value.
///
/// # Invariants
/// - Value is always positive (> 0)
/// - At most 2 significant decimal places, stored with scale 2
/// - Maximum value is 10 billion
///
/// # Example
/// ```
/// use rust_decimal::Decimal;
/// use finance_tracker::domain::Amount;
///
/// let amount = Amount::new(Decimal::new(30000, 2)).unwrap();
/// assert_eq!(amount.to_string(), "300.00");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Amount(Decimal);

/// Errors that can occur when creating an Amount or Balance
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AmountError {
    #[error("Amount must be positive (got {0})")]
    NotPositive(Decimal),

    #[error("Balance cannot be negative (got {0})")]
    Negative(Decimal),

    #[error("Too many decimal places (max {MONEY_SCALE}, got {0})")]
    TooManyDecimals(u32),

    #[error("Value exceeds maximum allowed ({0})")]
    Overflow(i64),

    #[error("Invalid amount format: {0}")]
    ParseError(String),
}

/// Normalize a decimal to scale 2, rejecting extra precision and values above `max`.
fn to_money(value: Decimal, max: i64) -> Result<Decimal, AmountError> {
    let normalized = value.normalize();
    if normalized.scale() > MONEY_SCALE {
        return Err(AmountError::TooManyDecimals(normalized.scale()));
    }
    if normalized.abs() > Decimal::from(max) {
        return Err(AmountError::Overflow(max));
    }
    let mut money = normalized;
    money.rescale(MONEY_SCALE);
    Ok(money)
}

impl Amount {
    /// Create a new Amount with validation.
    ///
    /// # Errors
    /// - `AmountError::NotPositive` if value <= 0
    /// - `AmountError::TooManyDecimals` if more than 2 significant decimal places
    /// - `AmountError::Overflow` if value exceeds the maximum
    pub fn new(value: Decimal) -> Result<Self, AmountError> {
        if value <= Decimal::ZERO {
            return Err(AmountError::NotPositive(value));
        }
        Ok(Self(to_money(value, MAX_AMOUNT)?))
    }

    /// Get the underlying Decimal value.
    pub fn value(&self) -> Decimal {
        self.0
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

impl FromStr for Amount {
    type Err = AmountError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let decimal = Decimal::from_str(s.trim())
            .map_err(|e| AmountError::ParseError(e.to_string()))?;
        Amount::new(decimal)
    }
}

impl TryFrom<String> for Amount {
    type Error = AmountError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Amount::from_str(&value)
    }
}

impl From<Amount> for String {
    fn from(amount: Amount) -> Self {
        amount.to_string()
    }
}

/// Balance is the stored state of an account: funds held, or amount owed
/// for a credit card. Valid balances are never negative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Balance(Decimal);

impl Balance {
    /// Create a new balance (zero or positive)
    pub fn new(value: Decimal) -> Result<Self, AmountError> {
        if value < Decimal::ZERO {
            return Err(AmountError::Negative(value));
        }
        Ok(Self(to_money(value, MAX_BALANCE)?))
    }

    /// Create a zero balance
    pub fn zero() -> Self {
        Self(Decimal::new(0, MONEY_SCALE))
    }

    /// Wrap a stored value without the sign check.
    /// WARNING: only for rows read back from storage, which may predate validation.
    pub fn from_decimal_unchecked(value: Decimal) -> Self {
        let mut value = value;
        value.rescale(MONEY_SCALE);
        Self(value)
    }

    /// Get the underlying value
    pub fn value(&self) -> Decimal {
        self.0
    }

    /// Add amount to balance
    pub fn plus(&self, amount: &Amount) -> Result<Balance, AmountError> {
        Balance::new(self.0 + amount.value())
    }

    /// Subtract amount from balance, failing if the result would be negative
    pub fn minus(&self, amount: &Amount) -> Result<Balance, AmountError> {
        Balance::new(self.0 - amount.value())
    }

    /// Signed difference `self - earlier`
    pub fn delta_from(&self, earlier: &Balance) -> Decimal {
        self.0 - earlier.0
    }
}

impl fmt::Display for Balance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

impl Default for Balance {
    fn default() -> Self {
        Self::zero()
    }
}

impl FromStr for Balance {
    type Err = AmountError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let decimal = Decimal::from_str(s.trim())
            .map_err(|e| AmountError::ParseError(e.to_string()))?;
        Balance::new(decimal)
    }
}

impl TryFrom<String> for Balance {
    type Error = AmountError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Balance::from_str(&value)
    }
}

impl From<Balance> for String {
    fn from(balance: Balance) -> Self {
        balance.to_string()
    }
}
