//! Persistence contracts.
//!
//! Each trait covers one group of collections. Hot counters (variant stock,
//! wallet balance) are changed with atomic store-side primitives, and order
//! documents are saved with an optimistic version check so concurrent
//! updates to the same order cannot silently overwrite each other.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use rust_decimal::Decimal;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::aggregates::{
    Cart, CheckoutSession, Coupon, Order, Product, ShippingAddress, Variant, Wallet, WalletTransaction,
};
use crate::domain::value_objects::CouponCode;

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("order {0} was modified concurrently")]
    VersionConflict(Uuid),

    #[error("insufficient stock for variant {0}")]
    InsufficientStock(Uuid),

    #[error("insufficient wallet balance")]
    InsufficientBalance,

    #[error("{0} already exists")]
    Duplicate(&'static str),

    #[error("write rejected: {0}")]
    Rejected(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn insert_order(&self, order: &Order) -> StoreResult<()>;

    async fn order(&self, id: Uuid) -> StoreResult<Option<Order>>;

    /// Write the order back only if the stored version still equals
    /// `order.version()`. Returns the new version.
    async fn save_order(&self, order: &Order) -> StoreResult<i64>;

    async fn orders_for_user(&self, user_id: Uuid) -> StoreResult<Vec<Order>>;

    async fn list_orders(&self, limit: u32, offset: u32) -> StoreResult<Vec<Order>>;

    /// Whether `user_id` has a non-cancelled order with `code` applied.
    async fn coupon_used(&self, user_id: Uuid, code: &CouponCode) -> StoreResult<bool>;
}

#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn product(&self, id: Uuid) -> StoreResult<Option<Product>>;

    async fn variant(&self, id: Uuid) -> StoreResult<Option<Variant>>;

    /// Atomically add `delta` (negative to take stock) and return the new
    /// count. Fails with `InsufficientStock` rather than going below zero.
    async fn adjust_stock(&self, variant_id: Uuid, delta: i32) -> StoreResult<i32>;
}

#[async_trait]
pub trait WalletStore: Send + Sync {
    /// The user's wallet, empty if it was never used.
    async fn wallet(&self, user_id: Uuid) -> StoreResult<Wallet>;

    /// Atomically append `tx` and move the balance, creating the wallet on
    /// first use. A debit beyond the balance fails with
    /// `InsufficientBalance` and changes nothing. Returns the new balance.
    async fn apply_transaction(&self, user_id: Uuid, tx: &WalletTransaction) -> StoreResult<Decimal>;
}

#[async_trait]
pub trait CouponStore: Send + Sync {
    async fn coupon(&self, code: &CouponCode) -> StoreResult<Option<Coupon>>;

    async fn insert_coupon(&self, coupon: &Coupon) -> StoreResult<()>;

    async fn list_coupons(&self) -> StoreResult<Vec<Coupon>>;

    async fn set_coupon_active(&self, code: &CouponCode, active: bool) -> StoreResult<()>;
}

#[async_trait]
pub trait ShopperStore: Send + Sync {
    async fn cart(&self, user_id: Uuid) -> StoreResult<Cart>;

    async fn save_cart(&self, cart: &Cart) -> StoreResult<()>;

    async fn clear_cart(&self, user_id: Uuid) -> StoreResult<()>;

    async fn address(&self, user_id: Uuid, address_id: Uuid) -> StoreResult<Option<ShippingAddress>>;
}

#[async_trait]
pub trait CheckoutStore: Send + Sync {
    async fn put_checkout(&self, session: &CheckoutSession) -> StoreResult<()>;

    async fn checkout(&self, token: Uuid) -> StoreResult<Option<CheckoutSession>>;

    async fn delete_checkout(&self, token: Uuid) -> StoreResult<()>;
}

/// Handles to every collection, shared by the services.
#[derive(Clone)]
pub struct Stores {
    pub orders: Arc<dyn OrderStore>,
    pub catalog: Arc<dyn CatalogStore>,
    pub wallets: Arc<dyn WalletStore>,
    pub coupons: Arc<dyn CouponStore>,
    pub shoppers: Arc<dyn ShopperStore>,
    pub checkouts: Arc<dyn CheckoutStore>,
}

impl Stores {
    /// Use one backend for every collection.
    pub fn from_backend<B>(backend: Arc<B>) -> Self
    where
        B: OrderStore + CatalogStore + WalletStore + CouponStore + ShopperStore + CheckoutStore + 'static,
    {
        Self {
            orders: backend.clone(),
            catalog: backend.clone(),
            wallets: backend.clone(),
            coupons: backend.clone(),
            shoppers: backend.clone(),
            checkouts: backend,
        }
    }
}
