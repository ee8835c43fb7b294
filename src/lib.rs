//! Wardrobe Commerce
//!
//! Order, pricing and wallet core of an apparel storefront.
//!
//! ## Features
//! - Cart pricing with item markdowns, coupons and fees
//! - Coupon validation (expiry, minimum purchase, one use per customer)
//! - Order placement with stock reservation and wallet/Razorpay/COD payment
//! - Per-item and whole-order status lifecycle with returns and refunds
//! - Wallet ledger with an append-only transaction log

pub mod api;
pub mod config;
pub mod domain;
pub mod pricing;
pub mod services;
pub mod store;

use thiserror::Error;

use crate::domain::aggregates::{CouponError, OrderError, ProductError, UnknownStatus, WalletError};
use crate::domain::value_objects::CouponCodeError;
use crate::store::StoreError;

// =============================================================================
// Error Types
// =============================================================================

#[derive(Error, Debug)]
pub enum CommerceError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("Authentication required")]
    Unauthorized,

    #[error("Insufficient wallet balance")]
    InsufficientBalance,

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, CommerceError>;

impl From<StoreError> for CommerceError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(what) => Self::NotFound(format!("{what} not found")),
            StoreError::VersionConflict(_) => {
                Self::Conflict("The order was changed by another request, reload and retry".into())
            }
            StoreError::InsufficientStock(_) => Self::Conflict(e.to_string()),
            StoreError::InsufficientBalance => Self::InsufficientBalance,
            StoreError::Duplicate(what) => Self::Conflict(format!("{what} already exists")),
            StoreError::Rejected(msg) => Self::Validation(msg),
            other => Self::Internal(other.to_string()),
        }
    }
}

impl From<OrderError> for CommerceError {
    fn from(e: OrderError) -> Self {
        match e {
            OrderError::ItemNotFound(_) => Self::NotFound(e.to_string()),
            _ => Self::BadRequest(e.to_string()),
        }
    }
}

impl From<WalletError> for CommerceError {
    fn from(e: WalletError) -> Self {
        match e {
            WalletError::InsufficientBalance { .. } => Self::InsufficientBalance,
            WalletError::NonPositiveAmount(_) => Self::Validation(e.to_string()),
        }
    }
}

impl From<validator::ValidationErrors> for CommerceError {
    fn from(e: validator::ValidationErrors) -> Self { Self::Validation(e.to_string()) }
}

impl From<CouponCodeError> for CommerceError {
    fn from(e: CouponCodeError) -> Self { Self::Validation(e.to_string()) }
}

impl From<CouponError> for CommerceError {
    fn from(e: CouponError) -> Self { Self::Validation(e.to_string()) }
}

impl From<ProductError> for CommerceError {
    fn from(e: ProductError) -> Self { Self::Validation(e.to_string()) }
}

impl From<UnknownStatus> for CommerceError {
    fn from(e: UnknownStatus) -> Self { Self::Validation(e.to_string()) }
}
