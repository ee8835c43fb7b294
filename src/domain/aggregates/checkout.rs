//! Checkout context
//!
//! Server-side state that lives between "start checkout" and "place order":
//! the coupon the shopper picked and the gateway order a payment was
//! opened against. Keyed by an opaque token and dropped after expiry.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::value_objects::CouponCode;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppliedCoupon {
    pub code: CouponCode,
    pub discount: Decimal,
}

/// Gateway order opened for this checkout, pinned to the amount it was opened for.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayOrder {
    pub id: String,
    pub amount: Decimal,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutSession {
    pub token: Uuid,
    pub user_id: Uuid,
    pub coupon: Option<AppliedCoupon>,
    pub gateway_order: Option<GatewayOrder>,
    pub expires_at: DateTime<Utc>,
}

impl CheckoutSession {
    pub fn open(user_id: Uuid, ttl: Duration, now: DateTime<Utc>) -> Self {
        Self { token: Uuid::new_v4(), user_id, coupon: None, gateway_order: None, expires_at: now + ttl }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool { self.expires_at <= now }

    /// Any change to the coupon invalidates a gateway order opened for the old amount.
    pub fn set_coupon(&mut self, coupon: Option<AppliedCoupon>) {
        if self.coupon != coupon {
            self.gateway_order = None;
        }
        self.coupon = coupon;
    }
}
