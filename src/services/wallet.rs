//! Wallet ledger.
//!
//! Credits and debits go through `WalletStore::apply_transaction`, which
//! moves the balance and appends the log entry in one atomic step.

use chrono::Utc;
use rust_decimal::Decimal;
use std::sync::Arc;
use uuid::Uuid;

use super::EventPublisher;
use crate::domain::aggregates::{TransactionKind, Wallet, WalletTransaction};
use crate::domain::events::{DomainEvent, WalletEvent};
use crate::domain::value_objects::round2;
use crate::store::WalletStore;
use crate::{CommerceError, Result};

#[derive(Clone)]
pub struct WalletLedger {
    wallets: Arc<dyn WalletStore>,
    events: EventPublisher,
}

impl WalletLedger {
    pub fn new(wallets: Arc<dyn WalletStore>, events: EventPublisher) -> Self { Self { wallets, events } }

    pub async fn wallet(&self, user_id: Uuid) -> Result<Wallet> { Ok(self.wallets.wallet(user_id).await?) }

    #[tracing::instrument(skip(self, amount, reason), fields(%amount))]
    pub async fn credit(&self, user_id: Uuid, amount: Decimal, reason: impl Into<String>) -> Result<Decimal> {
        self.apply(user_id, TransactionKind::Credit, amount, reason.into()).await
    }

    /// Fails with `InsufficientBalance` and changes nothing when the
    /// balance does not cover `amount`.
    #[tracing::instrument(skip(self, amount, reason), fields(%amount))]
    pub async fn debit(&self, user_id: Uuid, amount: Decimal, reason: impl Into<String>) -> Result<Decimal> {
        self.apply(user_id, TransactionKind::Debit, amount, reason.into()).await
    }

    async fn apply(&self, user_id: Uuid, kind: TransactionKind, amount: Decimal, reason: String) -> Result<Decimal> {
        let amount = round2(amount);
        if amount <= Decimal::ZERO {
            return Err(CommerceError::Validation(format!("Amount must be positive, got {amount}")));
        }
        let tx = WalletTransaction { kind, amount, reason, created_at: Utc::now() };
        let balance = self.wallets.apply_transaction(user_id, &tx).await?;
        tracing::info!(kind = kind.as_str(), %balance, "wallet updated");

        let event = match kind {
            TransactionKind::Credit => WalletEvent::Credited { user_id, amount, balance },
            TransactionKind::Debit => WalletEvent::Debited { user_id, amount, balance },
        };
        self.events.publish(vec![DomainEvent::Wallet(event)]).await;
        Ok(balance)
    }
}
