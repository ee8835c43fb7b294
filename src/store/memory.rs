//! In-process store.
//!
//! All collections sit behind one mutex, so every trait method is a single
//! atomic step. Used by the tests and when no database is configured.

use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use uuid::Uuid;

use super::{
    CatalogStore, CheckoutStore, CouponStore, OrderStore, ShopperStore, StoreError, StoreResult, WalletStore,
};
use crate::domain::aggregates::{
    Cart, CheckoutSession, Coupon, Order, Product, ShippingAddress, Variant, Wallet, WalletError,
    WalletTransaction,
};
use crate::domain::value_objects::CouponCode;

#[derive(Default)]
struct State {
    orders: HashMap<Uuid, Order>,
    products: HashMap<Uuid, Product>,
    variants: HashMap<Uuid, Variant>,
    wallets: HashMap<Uuid, Wallet>,
    coupons: HashMap<CouponCode, Coupon>,
    carts: HashMap<Uuid, Cart>,
    addresses: HashMap<(Uuid, Uuid), ShippingAddress>,
    checkouts: HashMap<Uuid, CheckoutSession>,
}

#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self { Self::default() }

    fn state(&self) -> MutexGuard<'_, State> {
        // A panic while holding the lock cannot leave a half-applied write:
        // every method validates before it mutates.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn add_product(&self, product: Product) {
        self.state().products.insert(product.id, product);
    }

    pub fn add_variant(&self, variant: Variant) {
        self.state().variants.insert(variant.id, variant);
    }

    pub fn add_address(&self, user_id: Uuid, address_id: Uuid, address: ShippingAddress) {
        self.state().addresses.insert((user_id, address_id), address);
    }
}

#[async_trait]
impl OrderStore for MemoryStore {
    async fn insert_order(&self, order: &Order) -> StoreResult<()> {
        let mut state = self.state();
        if state.orders.contains_key(&order.id()) {
            return Err(StoreError::Duplicate("order"));
        }
        state.orders.insert(order.id(), order.clone());
        Ok(())
    }

    async fn order(&self, id: Uuid) -> StoreResult<Option<Order>> {
        Ok(self.state().orders.get(&id).cloned())
    }

    async fn save_order(&self, order: &Order) -> StoreResult<i64> {
        let mut state = self.state();
        let stored = state.orders.get_mut(&order.id()).ok_or(StoreError::NotFound("order"))?;
        if stored.version() != order.version() {
            return Err(StoreError::VersionConflict(order.id()));
        }
        let version = order.version() + 1;
        let mut next = order.clone();
        next.set_version(version);
        *stored = next;
        Ok(version)
    }

    async fn orders_for_user(&self, user_id: Uuid) -> StoreResult<Vec<Order>> {
        let mut orders: Vec<Order> =
            self.state().orders.values().filter(|o| o.user_id() == user_id).cloned().collect();
        orders.sort_by_key(|o| std::cmp::Reverse(o.created_at()));
        Ok(orders)
    }

    async fn list_orders(&self, limit: u32, offset: u32) -> StoreResult<Vec<Order>> {
        let mut orders: Vec<Order> = self.state().orders.values().cloned().collect();
        orders.sort_by_key(|o| std::cmp::Reverse(o.created_at()));
        Ok(orders.into_iter().skip(offset as usize).take(limit as usize).collect())
    }

    async fn coupon_used(&self, user_id: Uuid, code: &CouponCode) -> StoreResult<bool> {
        Ok(self.state().orders.values().any(|o| o.user_id() == user_id && o.uses_coupon(code)))
    }
}

#[async_trait]
impl CatalogStore for MemoryStore {
    async fn product(&self, id: Uuid) -> StoreResult<Option<Product>> {
        Ok(self.state().products.get(&id).cloned())
    }

    async fn variant(&self, id: Uuid) -> StoreResult<Option<Variant>> {
        Ok(self.state().variants.get(&id).cloned())
    }

    async fn adjust_stock(&self, variant_id: Uuid, delta: i32) -> StoreResult<i32> {
        let mut state = self.state();
        let variant = state.variants.get_mut(&variant_id).ok_or(StoreError::NotFound("variant"))?;
        let next = variant.stock.checked_add(delta).filter(|s| *s >= 0);
        match next {
            Some(stock) => {
                variant.stock = stock;
                Ok(stock)
            }
            None => Err(StoreError::InsufficientStock(variant_id)),
        }
    }
}

#[async_trait]
impl WalletStore for MemoryStore {
    async fn wallet(&self, user_id: Uuid) -> StoreResult<Wallet> {
        Ok(self.state().wallets.get(&user_id).cloned().unwrap_or_else(|| Wallet::new(user_id)))
    }

    async fn apply_transaction(&self, user_id: Uuid, tx: &WalletTransaction) -> StoreResult<Decimal> {
        let mut state = self.state();
        let wallet = state.wallets.entry(user_id).or_insert_with(|| Wallet::new(user_id));
        wallet.apply(tx.clone()).map_err(|e| match e {
            WalletError::InsufficientBalance { .. } => StoreError::InsufficientBalance,
            other => StoreError::Rejected(other.to_string()),
        })
    }
}

#[async_trait]
impl CouponStore for MemoryStore {
    async fn coupon(&self, code: &CouponCode) -> StoreResult<Option<Coupon>> {
        Ok(self.state().coupons.get(code).cloned())
    }

    async fn insert_coupon(&self, coupon: &Coupon) -> StoreResult<()> {
        let mut state = self.state();
        if state.coupons.contains_key(&coupon.code) {
            return Err(StoreError::Duplicate("coupon"));
        }
        state.coupons.insert(coupon.code.clone(), coupon.clone());
        Ok(())
    }

    async fn list_coupons(&self) -> StoreResult<Vec<Coupon>> {
        let mut coupons: Vec<Coupon> = self.state().coupons.values().cloned().collect();
        coupons.sort_by(|a, b| a.code.as_str().cmp(b.code.as_str()));
        Ok(coupons)
    }

    async fn set_coupon_active(&self, code: &CouponCode, active: bool) -> StoreResult<()> {
        let mut state = self.state();
        let coupon = state.coupons.get_mut(code).ok_or(StoreError::NotFound("coupon"))?;
        coupon.is_active = active;
        Ok(())
    }
}

#[async_trait]
impl ShopperStore for MemoryStore {
    async fn cart(&self, user_id: Uuid) -> StoreResult<Cart> {
        Ok(self.state().carts.get(&user_id).cloned().unwrap_or_else(|| Cart::new(user_id)))
    }

    async fn save_cart(&self, cart: &Cart) -> StoreResult<()> {
        self.state().carts.insert(cart.user_id(), cart.clone());
        Ok(())
    }

    async fn clear_cart(&self, user_id: Uuid) -> StoreResult<()> {
        self.state().carts.insert(user_id, Cart::new(user_id));
        Ok(())
    }

    async fn address(&self, user_id: Uuid, address_id: Uuid) -> StoreResult<Option<ShippingAddress>> {
        Ok(self.state().addresses.get(&(user_id, address_id)).cloned())
    }
}

#[async_trait]
impl CheckoutStore for MemoryStore {
    async fn put_checkout(&self, session: &CheckoutSession) -> StoreResult<()> {
        self.state().checkouts.insert(session.token, session.clone());
        Ok(())
    }

    async fn checkout(&self, token: Uuid) -> StoreResult<Option<CheckoutSession>> {
        Ok(self.state().checkouts.get(&token).cloned())
    }

    async fn delete_checkout(&self, token: Uuid) -> StoreResult<()> {
        self.state().checkouts.remove(&token);
        Ok(())
    }
}
