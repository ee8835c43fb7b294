//! Coupon endpoints.
//!
//! Apply and remove accept the figures the storefront shows, as the old
//! clients send them. With a `checkoutToken` the figures are ignored and
//! the cart is priced server-side; the choice is stored on the checkout
//! context. Without one the call is a preview and nothing is stored.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;
use validator::Validate;

use super::auth::{AdminUser, CurrentUser, ValidatedJson};
use super::AppState;
use crate::domain::aggregates::{Coupon, DiscountType};
use crate::pricing::Totals;
use crate::services::NewCoupon;
use crate::{CommerceError, Result};

/// Pricing figures as displayed by the client.
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct DisplayedTotals {
    #[serde(default)]
    pub total: Decimal,
    #[serde(default)]
    pub item_discount: Decimal,
    #[serde(default)]
    pub platform_fee: Decimal,
    #[serde(default)]
    pub shipping_fee: Decimal,
}

impl DisplayedTotals {
    fn totals(&self) -> Result<Totals> {
        let figures = [self.total, self.item_discount, self.platform_fee, self.shipping_fee];
        if figures.iter().any(|f| *f < Decimal::ZERO) {
            return Err(CommerceError::Validation("Amounts cannot be negative".into()));
        }
        Ok(Totals {
            total_item_price: self.total,
            item_discount: self.item_discount,
            platform_fee: self.platform_fee,
            shipping_fee: self.shipping_fee,
        })
    }
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ApplyCouponRequest {
    #[validate(length(min = 1, max = 32))]
    pub code: String,
    pub checkout_token: Option<Uuid>,
    #[serde(flatten)]
    pub displayed: DisplayedTotals,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CouponResponse {
    pub success: bool,
    #[serde(with = "rust_decimal::serde::float")]
    pub coupon_discount: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub grand_total: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

pub async fn apply(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    ValidatedJson(body): ValidatedJson<ApplyCouponRequest>,
) -> Result<Json<CouponResponse>> {
    let checkout = &state.services.checkout;
    let now = Utc::now();
    let applied = match body.checkout_token {
        Some(token) => checkout.apply_coupon(actor.user_id, token, &body.code, now).await?,
        None => checkout.preview_coupon(actor.user_id, &body.code, &body.displayed.totals()?, now).await?,
    };
    Ok(Json(CouponResponse {
        success: true,
        coupon_discount: applied.discount,
        grand_total: applied.grand_total,
        code: Some(applied.code.to_string()),
    }))
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RemoveCouponRequest {
    pub checkout_token: Option<Uuid>,
    #[serde(flatten)]
    pub displayed: DisplayedTotals,
}

pub async fn remove(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    ValidatedJson(body): ValidatedJson<RemoveCouponRequest>,
) -> Result<Json<CouponResponse>> {
    let grand_total = match body.checkout_token {
        Some(token) => state.services.checkout.remove_coupon(actor.user_id, token, Utc::now()).await?.final_amount,
        None => body.displayed.totals()?.grand_total_before_coupon(),
    };
    Ok(Json(CouponResponse { success: true, coupon_discount: Decimal::ZERO, grand_total, code: None }))
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateCouponRequest {
    #[validate(length(min = 1, max = 32))]
    pub code: String,
    pub discount_type: DiscountType,
    pub discount_value: Decimal,
    #[serde(default)]
    pub min_purchase: Decimal,
    pub expiry_date: DateTime<Utc>,
}

pub async fn create(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    ValidatedJson(body): ValidatedJson<CreateCouponRequest>,
) -> Result<(StatusCode, Json<Value>)> {
    let coupon: Coupon = state
        .services
        .coupons
        .create(NewCoupon {
            code: body.code,
            discount_type: body.discount_type,
            discount_value: body.discount_value,
            min_purchase: body.min_purchase,
            expiry_date: body.expiry_date,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(json!({ "success": true, "coupon": coupon }))))
}

pub async fn list(State(state): State<AppState>, AdminUser(_): AdminUser) -> Result<Json<Value>> {
    let coupons = state.services.coupons.list().await?;
    Ok(Json(json!({ "success": true, "coupons": coupons })))
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SetActiveRequest {
    pub is_active: bool,
}

pub async fn set_active(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    Path(code): Path<String>,
    ValidatedJson(body): ValidatedJson<SetActiveRequest>,
) -> Result<Json<Value>> {
    state.services.coupons.set_active(&code, body.is_active).await?;
    Ok(Json(json!({ "success": true, "code": code.trim().to_uppercase(), "isActive": body.is_active })))
}
