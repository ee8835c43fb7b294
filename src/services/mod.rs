//! Application services.
//!
//! Each service loads aggregates from the stores, runs the domain logic,
//! persists the result and then carries out side effects (stock, wallet,
//! events). Services are cheap to clone; they only hold `Arc`s.

pub mod checkout;
pub mod coupons;
pub mod inventory;
pub mod orders;
pub mod payment;
pub mod wallet;

use std::sync::Arc;
use uuid::Uuid;

use crate::config::Config;
use crate::domain::events::DomainEvent;
use crate::store::Stores;

pub use checkout::{CheckoutService, PricedCheckout};
pub use coupons::{CouponQuote, CouponValidator, NewCoupon};
pub use inventory::InventoryLedger;
pub use orders::{OrderLifecycle, PlaceOrder, RazorpayPayment};
pub use payment::{PaymentError, PaymentGateway, RazorpayClient};
pub use wallet::WalletLedger;

/// Who is making a request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Actor {
    pub user_id: Uuid,
    pub is_admin: bool,
}

impl Actor {
    pub fn customer(user_id: Uuid) -> Self { Self { user_id, is_admin: false } }
    pub fn admin(user_id: Uuid) -> Self { Self { user_id, is_admin: true } }
}

/// Publishes domain events to NATS. Without a client events are only logged.
#[derive(Clone, Default)]
pub struct EventPublisher {
    nats: Option<async_nats::Client>,
}

impl EventPublisher {
    pub fn new(nats: Option<async_nats::Client>) -> Self { Self { nats } }

    /// Never fails: an undelivered event must not undo a committed change.
    pub async fn publish(&self, events: Vec<DomainEvent>) {
        for event in events {
            let subject = event.subject();
            let Some(client) = &self.nats else {
                tracing::debug!(subject, "NATS disabled, event dropped");
                continue;
            };
            let payload = match serde_json::to_vec(&event) {
                Ok(payload) => payload,
                Err(e) => {
                    tracing::warn!(subject, error = %e, "failed to encode event");
                    continue;
                }
            };
            if let Err(e) = client.publish(subject.to_string(), payload.into()).await {
                tracing::warn!(subject, error = %e, "failed to publish event");
            }
        }
    }
}

/// Every service, wired to one set of stores.
#[derive(Clone)]
pub struct Services {
    pub checkout: CheckoutService,
    pub coupons: CouponValidator,
    pub inventory: InventoryLedger,
    pub orders: OrderLifecycle,
    pub wallet: WalletLedger,
}

impl Services {
    pub fn new(
        stores: Stores,
        config: &Config,
        gateway: Option<Arc<dyn PaymentGateway>>,
        events: EventPublisher,
    ) -> Self {
        let inventory = InventoryLedger::new(stores.catalog.clone());
        let wallet = WalletLedger::new(stores.wallets.clone(), events.clone());
        let coupons = CouponValidator::new(stores.coupons.clone(), stores.orders.clone());
        let checkout = CheckoutService::new(
            &stores,
            coupons.clone(),
            gateway.clone(),
            config.pricing.clone(),
            config.checkout_ttl(),
        );
        let orders = OrderLifecycle::new(&stores, checkout.clone(), inventory.clone(), wallet.clone(), gateway, events);
        Self { checkout, coupons, inventory, orders, wallet }
    }
}
