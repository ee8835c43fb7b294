//! Wallet Aggregate

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    Credit,
    Debit,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Credit => "credit",
            Self::Debit => "debit",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletTransaction {
    pub kind: TransactionKind,
    pub amount: Decimal,
    pub reason: String,
    pub created_at: DateTime<Utc>,
}

impl WalletTransaction {
    /// Amount with its sign: credits positive, debits negative.
    pub fn signed_amount(&self) -> Decimal {
        match self.kind {
            TransactionKind::Credit => self.amount,
            TransactionKind::Debit => -self.amount,
        }
    }
}

/// Per-user stored value. The balance always equals the signed sum of the log.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Wallet {
    user_id: Uuid,
    balance: Decimal,
    transactions: Vec<WalletTransaction>,
}

impl Wallet {
    pub fn new(user_id: Uuid) -> Self {
        Self { user_id, balance: Decimal::ZERO, transactions: vec![] }
    }

    /// Rebuild from a stored log.
    pub fn from_transactions(user_id: Uuid, transactions: Vec<WalletTransaction>) -> Self {
        let balance = transactions.iter().map(WalletTransaction::signed_amount).sum();
        Self { user_id, balance, transactions }
    }

    pub fn user_id(&self) -> Uuid { self.user_id }
    pub fn balance(&self) -> Decimal { self.balance }
    pub fn transactions(&self) -> &[WalletTransaction] { &self.transactions }

    /// Append a transaction. A debit larger than the balance leaves the wallet untouched.
    pub fn apply(&mut self, tx: WalletTransaction) -> Result<Decimal, WalletError> {
        if tx.amount <= Decimal::ZERO {
            return Err(WalletError::NonPositiveAmount(tx.amount));
        }
        if tx.kind == TransactionKind::Debit && self.balance < tx.amount {
            return Err(WalletError::InsufficientBalance { balance: self.balance, requested: tx.amount });
        }
        self.balance += tx.signed_amount();
        self.transactions.push(tx);
        Ok(self.balance)
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum WalletError {
    #[error("wallet amount must be positive, got {0}")]
    NonPositiveAmount(Decimal),
    #[error("insufficient wallet balance: {balance} available, {requested} requested")]
    InsufficientBalance { balance: Decimal, requested: Decimal },
}
