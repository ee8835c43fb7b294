//! Order endpoints.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;
use validator::Validate;

use super::auth::{AdminUser, CurrentUser, ValidatedJson};
use super::AppState;
use crate::domain::aggregates::{ItemStatus, OrderStatus, OrderStatusChange, PaymentMethod};
use crate::services::{PlaceOrder, RazorpayPayment};
use crate::Result;

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct PlaceOrderRequest {
    pub address_id: Uuid,
    pub payment_method: PaymentMethod,
    pub checkout_token: Option<Uuid>,
    #[validate(length(min = 1, max = 64))]
    pub razorpay_order_id: Option<String>,
    #[validate(length(min = 1, max = 64))]
    pub razorpay_payment_id: Option<String>,
    #[validate(length(min = 1, max = 128))]
    pub razorpay_signature: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceOrderResponse {
    pub success: bool,
    pub order_id: Uuid,
    pub order_number: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub final_amount: Decimal,
}

pub async fn place(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    ValidatedJson(body): ValidatedJson<PlaceOrderRequest>,
) -> Result<(StatusCode, Json<PlaceOrderResponse>)> {
    let razorpay = match (body.razorpay_order_id, body.razorpay_payment_id, body.razorpay_signature) {
        (Some(order_id), Some(payment_id), Some(signature)) => Some(RazorpayPayment { order_id, payment_id, signature }),
        _ => None,
    };
    let request = PlaceOrder {
        address_id: body.address_id,
        payment_method: body.payment_method,
        checkout_token: body.checkout_token,
        razorpay,
    };
    let order = state.services.orders.place_order(actor.user_id, request, Utc::now()).await?;
    Ok((
        StatusCode::CREATED,
        Json(PlaceOrderResponse {
            success: true,
            order_id: order.id(),
            order_number: order.order_number().to_string(),
            final_amount: order.final_amount(),
        }),
    ))
}

pub async fn list_mine(State(state): State<AppState>, CurrentUser(actor): CurrentUser) -> Result<Json<Value>> {
    let orders = state.services.orders.list_for_user(actor.user_id).await?;
    Ok(Json(json!({ "success": true, "orders": orders })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

pub async fn list_all(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    Query(p): Query<Page>,
) -> Result<Json<Value>> {
    let page = p.page.unwrap_or(1).max(1);
    let per_page = p.per_page.unwrap_or(20).clamp(1, 100);
    let orders = state.services.orders.list_all(per_page, (page - 1).saturating_mul(per_page)).await?;
    Ok(Json(json!({ "success": true, "orders": orders, "page": page })))
}

pub async fn get_order(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Path(order_id): Path<Uuid>,
) -> Result<Json<Value>> {
    let order = state.services.orders.get(actor, order_id).await?;
    Ok(Json(json!({ "success": true, "order": order })))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderStatusResponse {
    pub success: bool,
    pub previous_status: OrderStatus,
    pub current_status: OrderStatus,
}

impl From<OrderStatusChange> for OrderStatusResponse {
    fn from(change: OrderStatusChange) -> Self {
        Self { success: true, previous_status: change.previous, current_status: change.current }
    }
}

pub async fn cancel(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Path(order_id): Path<Uuid>,
) -> Result<Json<OrderStatusResponse>> {
    let change = state.services.orders.cancel_order(actor, order_id, Utc::now()).await?;
    Ok(Json(change.into()))
}

#[derive(Debug, Deserialize, Validate)]
pub struct StatusRequest {
    #[validate(length(min = 1, max = 32))]
    pub status: String,
    #[validate(length(max = 500))]
    pub reason: Option<String>,
}

pub async fn update_status(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    Path(order_id): Path<Uuid>,
    ValidatedJson(body): ValidatedJson<StatusRequest>,
) -> Result<Json<OrderStatusResponse>> {
    let target: OrderStatus = body.status.parse()?;
    let change = state.services.orders.update_status(order_id, target, Utc::now()).await?;
    Ok(Json(change.into()))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemStatusResponse {
    pub success: bool,
    pub old_status: ItemStatus,
    pub new_status: ItemStatus,
    pub order_status: OrderStatus,
}

pub async fn update_item_status(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Path((order_id, item_id)): Path<(Uuid, Uuid)>,
    ValidatedJson(body): ValidatedJson<StatusRequest>,
) -> Result<Json<ItemStatusResponse>> {
    let target: ItemStatus = body.status.parse()?;
    let change = state
        .services
        .orders
        .update_item_status(actor, order_id, item_id, target, body.reason, Utc::now())
        .await?;
    Ok(Json(ItemStatusResponse {
        success: true,
        old_status: change.previous,
        new_status: change.current,
        order_status: change.order_status,
    }))
}

#[derive(Debug, Deserialize, Validate)]
pub struct ReturnVerifyRequest {
    pub action: ReturnAction,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReturnAction {
    Accept,
    Reject,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReturnVerifyResponse {
    pub success: bool,
    pub item_status: ItemStatus,
    pub order_status: OrderStatus,
    #[serde(with = "rust_decimal::serde::float")]
    pub refund: Decimal,
}

pub async fn verify_return(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    Path((order_id, item_id)): Path<(Uuid, Uuid)>,
    ValidatedJson(body): ValidatedJson<ReturnVerifyRequest>,
) -> Result<Json<ReturnVerifyResponse>> {
    let accept = matches!(body.action, ReturnAction::Accept);
    let resolution = state.services.orders.verify_return(order_id, item_id, accept, Utc::now()).await?;
    Ok(Json(ReturnVerifyResponse {
        success: true,
        item_status: resolution.item_status,
        order_status: resolution.order_status,
        refund: resolution.refund,
    }))
}
