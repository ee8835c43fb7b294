//! Razorpay payment gateway.

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::config::RazorpayConfig;
use crate::domain::aggregates::GatewayOrder;
use crate::domain::value_objects::round2;
use crate::CommerceError;

const RAZORPAY_API: &str = "https://api.razorpay.com/v1";

#[derive(Debug, thiserror::Error)]
pub enum PaymentError {
    #[error("online payment is not available")]
    Disabled,
    #[error("amount {0} cannot be charged")]
    InvalidAmount(Decimal),
    #[error("payment gateway request failed: {0}")]
    Http(#[from] reqwest::Error),
}

impl From<PaymentError> for CommerceError {
    fn from(e: PaymentError) -> Self {
        match e {
            PaymentError::Disabled | PaymentError::InvalidAmount(_) => Self::Validation(e.to_string()),
            PaymentError::Http(_) => Self::Internal(e.to_string()),
        }
    }
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Create a gateway order the client pays against.
    async fn create_order(&self, amount: Decimal, receipt: &str) -> Result<GatewayOrder, PaymentError>;

    /// Check the callback signature for a completed payment.
    fn verify_payment(&self, order_id: &str, payment_id: &str, signature: &str) -> bool;
}

/// Amount in paise.
pub fn to_minor_units(amount: Decimal) -> Result<i64, PaymentError> {
    (round2(amount) * Decimal::ONE_HUNDRED)
        .to_i64()
        .filter(|paise| *paise > 0)
        .ok_or(PaymentError::InvalidAmount(amount))
}

/// HMAC-SHA256 of `"{order_id}|{payment_id}"` with the key secret,
/// compared in constant time against the hex `signature`.
pub fn verify_signature(order_id: &str, payment_id: &str, signature: &str, secret: &str) -> bool {
    let Ok(expected) = hex::decode(signature) else {
        return false;
    };
    let Ok(mut mac) = Hmac::<Sha256>::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(format!("{order_id}|{payment_id}").as_bytes());
    mac.verify_slice(&expected).is_ok()
}

#[derive(Serialize)]
struct CreateOrderRequest<'a> {
    amount: i64,
    currency: &'a str,
    receipt: &'a str,
}

#[derive(Deserialize)]
struct RazorpayOrder {
    id: String,
    amount: i64,
}

pub struct RazorpayClient {
    http: reqwest::Client,
    key_id: String,
    key_secret: String,
    currency: String,
    base_url: String,
}

impl RazorpayClient {
    pub fn new(config: RazorpayConfig, currency: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            key_id: config.key_id,
            key_secret: config.key_secret,
            currency: currency.into(),
            base_url: RAZORPAY_API.into(),
        }
    }
}

#[async_trait]
impl PaymentGateway for RazorpayClient {
    #[tracing::instrument(skip(self))]
    async fn create_order(&self, amount: Decimal, receipt: &str) -> Result<GatewayOrder, PaymentError> {
        let body = CreateOrderRequest { amount: to_minor_units(amount)?, currency: &self.currency, receipt };
        let order: RazorpayOrder = self
            .http
            .post(format!("{}/orders", self.base_url))
            .basic_auth(&self.key_id, Some(&self.key_secret))
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        tracing::info!(gateway_order = %order.id, paise = order.amount, "razorpay order created");
        Ok(GatewayOrder { id: order.id, amount: Decimal::new(order.amount, 2) })
    }

    fn verify_payment(&self, order_id: &str, payment_id: &str, signature: &str) -> bool {
        verify_signature(order_id, payment_id, signature, &self.key_secret)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn sign(order_id: &str, payment_id: &str, secret: &str) -> String {
        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(format!("{order_id}|{payment_id}").as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    /// Gateway double; the order id is derived from the receipt.
    pub(crate) struct FakeGateway {
        pub secret: String,
    }

    #[async_trait]
    impl PaymentGateway for FakeGateway {
        async fn create_order(&self, amount: Decimal, receipt: &str) -> Result<GatewayOrder, PaymentError> {
            to_minor_units(amount)?;
            Ok(GatewayOrder { id: format!("order_{receipt}"), amount: round2(amount) })
        }

        fn verify_payment(&self, order_id: &str, payment_id: &str, signature: &str) -> bool {
            verify_signature(order_id, payment_id, signature, &self.secret)
        }
    }

    #[test]
    fn test_signature_round_trip() {
        let sig = sign("order_9A33XWu170gUtm", "pay_29QQoUBi66xm2f", "s3cret");
        assert!(verify_signature("order_9A33XWu170gUtm", "pay_29QQoUBi66xm2f", &sig, "s3cret"));
        assert!(!verify_signature("order_9A33XWu170gUtm", "pay_other", &sig, "s3cret"));
        assert!(!verify_signature("order_9A33XWu170gUtm", "pay_29QQoUBi66xm2f", &sig, "wrong"));
        assert!(!verify_signature("order_9A33XWu170gUtm", "pay_29QQoUBi66xm2f", "not-hex", "s3cret"));
    }

    #[test]
    fn test_minor_units() {
        assert_eq!(to_minor_units(Decimal::new(66050, 2)).unwrap(), 66050);
        assert_eq!(to_minor_units(Decimal::from(660)).unwrap(), 66000);
        assert!(to_minor_units(Decimal::ZERO).is_err());
    }
}
