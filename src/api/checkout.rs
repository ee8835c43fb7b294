//! Cart, checkout and payment-intent endpoints.

use axum::{extract::State, http::StatusCode, Json};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;
use validator::Validate;

use super::auth::{CurrentUser, ValidatedJson};
use super::AppState;
use crate::domain::value_objects::Quantity;
use crate::pricing::Quote;
use crate::services::payment::to_minor_units;
use crate::{CommerceError, Result};

/// Totals of a quote, as numbers.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteView {
    pub items: usize,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_item_price: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub item_discount: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub coupon_discount: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub platform_fee: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub shipping_fee: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub final_amount: Decimal,
}

impl From<&Quote> for QuoteView {
    fn from(q: &Quote) -> Self {
        Self {
            items: q.lines.len(),
            total_item_price: q.total_item_price,
            item_discount: q.item_discount,
            coupon_discount: q.coupon_discount,
            platform_fee: q.platform_fee,
            shipping_fee: q.shipping_fee,
            final_amount: q.final_amount,
        }
    }
}

pub async fn get_cart(State(state): State<AppState>, CurrentUser(actor): CurrentUser) -> Result<Json<Value>> {
    let cart = state.services.checkout.cart(actor.user_id).await?;
    Ok(Json(json!({ "success": true, "cart": cart })))
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AddItemRequest {
    pub product_id: Uuid,
    pub variant_id: Option<Uuid>,
    #[validate(range(min = 1, max = 10))]
    pub quantity: u32,
}

pub async fn add_item(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    ValidatedJson(body): ValidatedJson<AddItemRequest>,
) -> Result<(StatusCode, Json<Value>)> {
    let quantity = Quantity::new(body.quantity)
        .ok_or_else(|| CommerceError::Validation("Quantity must be at least 1".into()))?;
    let cart = state
        .services
        .checkout
        .add_to_cart(actor.user_id, body.product_id, body.variant_id, quantity)
        .await?;
    Ok((StatusCode::CREATED, Json(json!({ "success": true, "cart": cart }))))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutResponse {
    pub success: bool,
    pub checkout_token: Uuid,
    pub expires_at: DateTime<Utc>,
    pub quote: QuoteView,
}

pub async fn start(State(state): State<AppState>, CurrentUser(actor): CurrentUser) -> Result<(StatusCode, Json<CheckoutResponse>)> {
    let (session, quote) = state.services.checkout.start(actor.user_id, Utc::now()).await?;
    Ok((
        StatusCode::CREATED,
        Json(CheckoutResponse {
            success: true,
            checkout_token: session.token,
            expires_at: session.expires_at,
            quote: QuoteView::from(&quote),
        }),
    ))
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct PaymentOrderRequest {
    pub checkout_token: Uuid,
}

pub async fn create_payment_order(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    ValidatedJson(body): ValidatedJson<PaymentOrderRequest>,
) -> Result<(StatusCode, Json<Value>)> {
    let order = state
        .services
        .checkout
        .create_payment_order(actor.user_id, body.checkout_token, Utc::now())
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "razorpayOrderId": order.id,
            "amount": to_minor_units(order.amount)?,
            "currency": state.currency,
        })),
    ))
}
