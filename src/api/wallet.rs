//! Wallet endpoint.

use axum::{extract::State, Json};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use super::auth::CurrentUser;
use super::AppState;
use crate::domain::aggregates::{TransactionKind, WalletTransaction};
use crate::Result;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionView {
    #[serde(rename = "type")]
    pub kind: TransactionKind,
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    pub reason: String,
    pub created_at: DateTime<Utc>,
}

impl From<&WalletTransaction> for TransactionView {
    fn from(tx: &WalletTransaction) -> Self {
        Self { kind: tx.kind, amount: tx.amount, reason: tx.reason.clone(), created_at: tx.created_at }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletResponse {
    pub success: bool,
    #[serde(with = "rust_decimal::serde::float")]
    pub balance: Decimal,
    /// Newest first.
    pub transactions: Vec<TransactionView>,
}

pub async fn get_wallet(State(state): State<AppState>, CurrentUser(actor): CurrentUser) -> Result<Json<WalletResponse>> {
    let wallet = state.services.wallet.wallet(actor.user_id).await?;
    Ok(Json(WalletResponse {
        success: true,
        balance: wallet.balance(),
        transactions: wallet.transactions().iter().rev().map(TransactionView::from).collect(),
    }))
}
