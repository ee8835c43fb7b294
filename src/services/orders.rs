//! Order lifecycle.
//!
//! Placement runs as a saga: payment, then stock, then the order insert.
//! A failing step undoes the steps before it. Status changes load the
//! order, apply the domain transition, save with a version check and only
//! then restock or refund.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;
use uuid::Uuid;

use super::checkout::CheckoutService;
use super::inventory::InventoryLedger;
use super::payment::{PaymentError, PaymentGateway};
use super::wallet::WalletLedger;
use super::{Actor, EventPublisher};
use crate::domain::aggregates::{
    CheckoutSession, ItemStatus, ItemStatusChange, NewOrder, Order, OrderStatus, OrderStatusChange, PaymentMethod,
    ReturnResolution, SideEffect,
};
use crate::domain::value_objects::Quantity;
use crate::store::{OrderStore, ShopperStore, Stores};
use crate::{CommerceError, Result};

/// Razorpay callback fields.
#[derive(Clone, Debug)]
pub struct RazorpayPayment {
    pub order_id: String,
    pub payment_id: String,
    pub signature: String,
}

#[derive(Clone, Debug)]
pub struct PlaceOrder {
    pub address_id: Uuid,
    pub payment_method: PaymentMethod,
    pub checkout_token: Option<Uuid>,
    pub razorpay: Option<RazorpayPayment>,
}

/// What placement has done so far, for compensation.
#[derive(Default)]
struct Reservation {
    taken: Vec<(Uuid, Quantity)>,
    debited: Option<Decimal>,
    /// Verified gateway payment id and amount, captured before any stock moved.
    captured: Option<(String, Decimal)>,
}

fn order_not_found() -> CommerceError { CommerceError::NotFound("Order not found".into()) }

#[derive(Clone)]
pub struct OrderLifecycle {
    orders: Arc<dyn OrderStore>,
    shoppers: Arc<dyn ShopperStore>,
    checkout: CheckoutService,
    inventory: InventoryLedger,
    wallet: WalletLedger,
    gateway: Option<Arc<dyn PaymentGateway>>,
    events: EventPublisher,
}

impl OrderLifecycle {
    pub fn new(
        stores: &Stores,
        checkout: CheckoutService,
        inventory: InventoryLedger,
        wallet: WalletLedger,
        gateway: Option<Arc<dyn PaymentGateway>>,
        events: EventPublisher,
    ) -> Self {
        Self {
            orders: stores.orders.clone(),
            shoppers: stores.shoppers.clone(),
            checkout,
            inventory,
            wallet,
            gateway,
            events,
        }
    }

    #[tracing::instrument(skip(self, request, now), fields(method = ?request.payment_method))]
    pub async fn place_order(&self, user_id: Uuid, request: PlaceOrder, now: DateTime<Utc>) -> Result<Order> {
        let shipping_address = self
            .shoppers
            .address(user_id, request.address_id)
            .await?
            .ok_or_else(|| CommerceError::NotFound("Address not found".into()))?;
        let priced = self.checkout.price_for_placement(user_id, request.checkout_token, now).await?;

        let payment_reference = match request.payment_method {
            PaymentMethod::Razorpay => {
                Some(self.verify_online_payment(&request, priced.quote.final_amount, priced.session.as_ref())?)
            }
            PaymentMethod::Cod | PaymentMethod::Wallet => None,
        };
        let mut order = Order::place(
            NewOrder {
                user_id,
                quote: priced.quote,
                coupon_code: priced.coupon,
                shipping_address,
                payment_method: request.payment_method,
                payment_reference,
            },
            now,
        );

        let mut reservation = Reservation {
            captured: order.payment_reference().map(|id| (id.to_string(), order.final_amount())),
            ..Reservation::default()
        };
        if let Err(e) = self.reserve(&order, &mut reservation).await {
            self.compensate(&order, reservation).await;
            return Err(e);
        }
        if let Err(e) = self.orders.insert_order(&order).await {
            self.compensate(&order, reservation).await;
            return Err(e.into());
        }
        tracing::info!(order_id = %order.id(), order_number = order.order_number(), final_amount = %order.final_amount(), "order placed");

        // The order exists from here on; cleanup failures are only logged.
        if let Err(e) = self.shoppers.clear_cart(user_id).await {
            tracing::error!(order_id = %order.id(), error = %e, "failed to clear cart after placement");
        }
        if let Some(token) = request.checkout_token {
            if let Err(e) = self.checkout.close(token).await {
                tracing::warn!(%token, error = %e, "failed to close checkout context");
            }
        }
        self.events.publish(order.take_events()).await;
        Ok(order)
    }

    /// Signature and pinned amount of a Razorpay payment. Returns the payment id.
    fn verify_online_payment(
        &self,
        request: &PlaceOrder,
        final_amount: Decimal,
        session: Option<&CheckoutSession>,
    ) -> Result<String> {
        let gateway = self.gateway.as_ref().ok_or(PaymentError::Disabled)?;
        let payment = request
            .razorpay
            .as_ref()
            .ok_or_else(|| CommerceError::Validation("Razorpay payment details are required".into()))?;
        if !gateway.verify_payment(&payment.order_id, &payment.payment_id, &payment.signature) {
            tracing::warn!(gateway_order = %payment.order_id, "razorpay signature mismatch");
            return Err(CommerceError::Validation("Payment verification failed".into()));
        }
        let pinned = session
            .and_then(|s| s.gateway_order.as_ref())
            .filter(|g| g.id == payment.order_id)
            .ok_or_else(|| CommerceError::Validation("Payment does not belong to this checkout".into()))?;
        if pinned.amount != final_amount {
            return Err(CommerceError::Validation("Payment amount does not match the order total".into()));
        }
        Ok(payment.payment_id.clone())
    }

    async fn reserve(&self, order: &Order, reservation: &mut Reservation) -> Result<()> {
        if order.payment_method() == PaymentMethod::Wallet && order.final_amount() > Decimal::ZERO {
            self.wallet
                .debit(order.user_id(), order.final_amount(), format!("Payment for order {}", order.order_number()))
                .await?;
            reservation.debited = Some(order.final_amount());
        }
        for item in order.items() {
            if let Some(variant_id) = item.variant_id {
                self.inventory.decrement(variant_id, item.quantity).await?;
                reservation.taken.push((variant_id, item.quantity));
            }
        }
        Ok(())
    }

    async fn compensate(&self, order: &Order, reservation: Reservation) {
        for (variant_id, quantity) in reservation.taken {
            match self.inventory.increment(variant_id, quantity).await {
                Ok(_) => tracing::warn!(%variant_id, quantity = quantity.value(), "placement failed, stock restored"),
                Err(e) => tracing::error!(%variant_id, error = %e, "placement failed and stock could not be restored"),
            }
        }
        if let Some(amount) = reservation.debited {
            let reason = format!("Reversal of payment for order {}", order.order_number());
            match self.wallet.credit(order.user_id(), amount, reason).await {
                Ok(_) => tracing::warn!(user_id = %order.user_id(), %amount, "placement failed, wallet re-credited"),
                Err(e) => tracing::error!(user_id = %order.user_id(), %amount, error = %e, "placement failed and wallet could not be re-credited"),
            }
        }
        // The gateway has the money but no order will exist; hold it in the wallet.
        if let Some((payment_id, amount)) = reservation.captured {
            let reason = format!("Refund of Razorpay payment {payment_id} for failed order {}", order.order_number());
            match self.wallet.credit(order.user_id(), amount, reason).await {
                Ok(_) => tracing::warn!(%payment_id, %amount, "placement failed, gateway payment credited to wallet"),
                Err(e) => tracing::error!(%payment_id, user_id = %order.user_id(), %amount, error = %e, "placement failed and gateway payment is unrefunded"),
            }
        }
    }

    pub async fn get(&self, actor: Actor, order_id: Uuid) -> Result<Order> {
        let order = self.orders.order(order_id).await?.ok_or_else(order_not_found)?;
        if !actor.is_admin && order.user_id() != actor.user_id {
            return Err(order_not_found());
        }
        Ok(order)
    }

    pub async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<Order>> {
        Ok(self.orders.orders_for_user(user_id).await?)
    }

    pub async fn list_all(&self, limit: u32, offset: u32) -> Result<Vec<Order>> {
        Ok(self.orders.list_orders(limit, offset).await?)
    }

    /// Administrative order-level status change.
    #[tracing::instrument(skip(self, now))]
    pub async fn update_status(&self, order_id: Uuid, target: OrderStatus, now: DateTime<Utc>) -> Result<OrderStatusChange> {
        let mut order = self.orders.order(order_id).await?.ok_or_else(order_not_found)?;
        let change = order.update_status(target, now)?;
        self.commit(&mut order, &change.effects).await?;
        tracing::info!(from = %change.previous, to = %change.current, "order status updated");
        Ok(change)
    }

    /// Cancel every item that can still be cancelled. Owners may cancel their own orders.
    pub async fn cancel_order(&self, actor: Actor, order_id: Uuid, now: DateTime<Utc>) -> Result<OrderStatusChange> {
        self.get(actor, order_id).await?;
        self.update_status(order_id, OrderStatus::Cancelled, now).await
    }

    /// Move one item. Customers may only cancel or ask for a return, and
    /// only on their own orders.
    #[tracing::instrument(skip(self, actor, reason, now), fields(actor = %actor.user_id))]
    pub async fn update_item_status(
        &self,
        actor: Actor,
        order_id: Uuid,
        item_id: Uuid,
        target: ItemStatus,
        reason: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<ItemStatusChange> {
        if !actor.is_admin && !matches!(target, ItemStatus::Cancelled | ItemStatus::ReturnRequested) {
            return Err(CommerceError::BadRequest("Customers may only cancel an item or request a return".into()));
        }
        let mut order = self.get(actor, order_id).await?;
        let change = order.update_item_status(item_id, target, reason, now)?;
        self.commit(&mut order, &change.effects).await?;
        tracing::info!(from = %change.previous, to = %change.current, order_status = %change.order_status, "item status updated");
        Ok(change)
    }

    /// Accept or reject a pending return.
    #[tracing::instrument(skip(self, now))]
    pub async fn verify_return(
        &self,
        order_id: Uuid,
        item_id: Uuid,
        accept: bool,
        now: DateTime<Utc>,
    ) -> Result<ReturnResolution> {
        let mut order = self.orders.order(order_id).await?.ok_or_else(order_not_found)?;
        let resolution = order.resolve_return(item_id, accept, now)?;
        self.commit(&mut order, &resolution.effects).await?;
        tracing::info!(refund = %resolution.refund, order_status = %resolution.order_status, "return resolved");
        Ok(resolution)
    }

    /// Save with the version check, then run the side effects and publish.
    /// A concurrent save fails before any effect has run.
    async fn commit(&self, order: &mut Order, effects: &[SideEffect]) -> Result<()> {
        let version = self.orders.save_order(order).await?;
        order.set_version(version);

        let mut failed = 0;
        for effect in effects {
            let result = match effect {
                SideEffect::Restock { variant_id, quantity } => self.inventory.increment(*variant_id, *quantity).await.map(|_| ()),
                SideEffect::Refund { user_id, amount, reason } => self.wallet.credit(*user_id, *amount, reason.clone()).await.map(|_| ()),
            };
            if let Err(e) = result {
                tracing::error!(order_id = %order.id(), ?effect, error = %e, "side effect failed after order save");
                failed += 1;
            }
        }
        self.events.publish(order.take_events()).await;

        if failed > 0 {
            return Err(CommerceError::Internal(format!(
                "order {} was updated but {failed} stock or wallet update(s) failed",
                order.order_number()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::domain::aggregates::{DiscountType, PaymentStatus, Product, Variant};
    use crate::services::coupons::NewCoupon;
    use crate::services::fixtures::Shop;
    use crate::services::payment::tests::{sign, FakeGateway};
    use crate::services::Services;
    use crate::store::{CatalogStore, StoreError, StoreResult, WalletStore};
    use chrono::Duration;

    fn qty(n: u32) -> Quantity { Quantity::new(n).unwrap() }

    fn cod(shop: &Shop) -> PlaceOrder {
        PlaceOrder { address_id: shop.address, payment_method: PaymentMethod::Cod, checkout_token: None, razorpay: None }
    }

    async fn add(shop: &Shop, regular: i64, sale: i64, stock: i32, quantity: u32) -> Uuid {
        let (product, variant) = shop.product(regular, sale, stock);
        shop.services.checkout.add_to_cart(shop.user, product, Some(variant), qty(quantity)).await.unwrap();
        variant
    }

    async fn coupon(shop: &Shop, code: &str, value: i64) {
        shop.services
            .coupons
            .create(NewCoupon {
                code: code.into(),
                discount_type: DiscountType::Fixed,
                discount_value: Decimal::from(value),
                min_purchase: Decimal::ZERO,
                expiry_date: Utc::now() + Duration::days(7),
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_cod_order_over_free_shipping() {
        let shop = Shop::new();
        let variant = add(&shop, 650, 650, 3, 1).await;

        let order = shop.services.orders.place_order(shop.user, cod(&shop), Utc::now()).await.unwrap();
        assert_eq!(order.final_amount(), Decimal::from(660));
        assert_eq!(order.status(), OrderStatus::Pending);
        assert_eq!(order.payment_status(), PaymentStatus::Pending);
        assert_eq!(order.shipping_address().city, "Kochi");
        assert_eq!(shop.stock(variant).await, 2);
        assert!(shop.services.checkout.cart(shop.user).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_address_places_nothing() {
        let shop = Shop::new();
        let variant = add(&shop, 650, 650, 3, 1).await;
        let request = PlaceOrder { address_id: Uuid::new_v4(), ..cod(&shop) };
        let err = shop.services.orders.place_order(shop.user, request, Utc::now()).await.unwrap_err();
        assert!(matches!(err, CommerceError::NotFound(_)));
        assert_eq!(shop.stock(variant).await, 3);
    }

    #[tokio::test]
    async fn test_wallet_order_debits_and_short_wallet_changes_nothing() {
        let shop = Shop::new();
        let variant = add(&shop, 200, 200, 5, 1).await;
        let request = PlaceOrder { payment_method: PaymentMethod::Wallet, ..cod(&shop) };

        let err = shop.services.orders.place_order(shop.user, request.clone(), Utc::now()).await.unwrap_err();
        assert!(matches!(err, CommerceError::InsufficientBalance));
        assert_eq!(shop.stock(variant).await, 5);

        shop.services.wallet.credit(shop.user, Decimal::from(500), "Top-up").await.unwrap();
        let order = shop.services.orders.place_order(shop.user, request, Utc::now()).await.unwrap();
        // 200 + 10 platform + 30 shipping
        assert_eq!(order.final_amount(), Decimal::from(240));
        assert_eq!(order.payment_status(), PaymentStatus::Paid);
        assert_eq!(shop.store.wallet(shop.user).await.unwrap().balance(), Decimal::from(260));
    }

    /// Catalog whose stock moves fail for one variant, as if it sold out
    /// between pricing and the decrement.
    struct SellsOutAtDecrement {
        inner: Arc<crate::store::MemoryStore>,
        variant: Uuid,
    }

    #[async_trait::async_trait]
    impl CatalogStore for SellsOutAtDecrement {
        async fn product(&self, id: Uuid) -> StoreResult<Option<Product>> { self.inner.product(id).await }
        async fn variant(&self, id: Uuid) -> StoreResult<Option<Variant>> { self.inner.variant(id).await }
        async fn adjust_stock(&self, variant_id: Uuid, delta: i32) -> StoreResult<i32> {
            if variant_id == self.variant && delta < 0 {
                return Err(StoreError::InsufficientStock(variant_id));
            }
            self.inner.adjust_stock(variant_id, delta).await
        }
    }

    #[tokio::test]
    async fn test_failed_stock_step_restores_earlier_lines_and_wallet() {
        let shop = Shop::new();
        let plenty = add(&shop, 200, 200, 5, 2).await;
        let scarce = add(&shop, 100, 100, 1, 1).await;
        shop.services.wallet.credit(shop.user, Decimal::from(1000), "Top-up").await.unwrap();

        let stores = Stores {
            catalog: Arc::new(SellsOutAtDecrement { inner: shop.store.clone(), variant: scarce }),
            ..Stores::from_backend(shop.store.clone())
        };
        let services = Services::new(stores, &Config::default(), None, EventPublisher::default());

        let request = PlaceOrder { payment_method: PaymentMethod::Wallet, ..cod(&shop) };
        let err = services.orders.place_order(shop.user, request, Utc::now()).await.unwrap_err();
        assert!(matches!(err, CommerceError::Conflict(_)));
        assert_eq!(shop.stock(plenty).await, 5);
        assert_eq!(shop.stock(scarce).await, 1);
        let wallet = services.wallet.wallet(shop.user).await.unwrap();
        assert_eq!(wallet.balance(), Decimal::from(1000));
        // top-up, debit, reversal
        assert_eq!(wallet.transactions().len(), 3);
        assert!(services.orders.list_for_user(shop.user).await.unwrap().is_empty());
        assert!(!services.checkout.cart(shop.user).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_coupon_is_single_use_until_cancelled() {
        let shop = Shop::new();
        coupon(&shop, "ONCE", 50).await;
        let checkout = &shop.services.checkout;

        add(&shop, 700, 700, 10, 1).await;
        let (session, _) = checkout.start(shop.user, Utc::now()).await.unwrap();
        checkout.apply_coupon(shop.user, session.token, "ONCE", Utc::now()).await.unwrap();
        let request = PlaceOrder { checkout_token: Some(session.token), ..cod(&shop) };
        let first = shop.services.orders.place_order(shop.user, request, Utc::now()).await.unwrap();
        assert!(first.coupon_applied());
        assert_eq!(first.final_amount(), Decimal::from(660));

        add(&shop, 700, 700, 10, 1).await;
        let (session, _) = checkout.start(shop.user, Utc::now()).await.unwrap();
        let err = checkout.apply_coupon(shop.user, session.token, "once", Utc::now()).await.unwrap_err();
        assert!(matches!(err, CommerceError::Conflict(_)));

        shop.services.orders.cancel_order(Actor::customer(shop.user), first.id(), Utc::now()).await.unwrap();
        assert!(checkout.apply_coupon(shop.user, session.token, "ONCE", Utc::now()).await.is_ok());
    }

    #[tokio::test]
    async fn test_accepted_return_refunds_share_and_restocks() {
        let shop = Shop::new();
        coupon(&shop, "FORTY", 40).await;
        let small = add(&shop, 100, 100, 5, 1).await;
        add(&shop, 300, 300, 5, 1).await;
        shop.services.wallet.credit(shop.user, Decimal::from(1000), "Top-up").await.unwrap();

        let checkout = &shop.services.checkout;
        let (session, _) = checkout.start(shop.user, Utc::now()).await.unwrap();
        checkout.apply_coupon(shop.user, session.token, "FORTY", Utc::now()).await.unwrap();
        let request = PlaceOrder {
            payment_method: PaymentMethod::Wallet,
            checkout_token: Some(session.token),
            ..cod(&shop)
        };
        let order = shop.services.orders.place_order(shop.user, request, Utc::now()).await.unwrap();
        let item = order.items().iter().find(|i| i.variant_id == Some(small)).unwrap().id;
        let customer = Actor::customer(shop.user);
        let lifecycle = &shop.services.orders;

        lifecycle.update_status(order.id(), OrderStatus::Delivered, Utc::now()).await.unwrap();
        lifecycle
            .update_item_status(customer, order.id(), item, ItemStatus::ReturnRequested, Some("Too tight".into()), Utc::now())
            .await
            .unwrap();
        let before = shop.services.wallet.wallet(shop.user).await.unwrap().balance();

        let resolution = lifecycle.verify_return(order.id(), item, true, Utc::now()).await.unwrap();
        assert_eq!(resolution.refund, Decimal::from(90));
        assert_eq!(resolution.item_status, ItemStatus::Returned);
        assert_eq!(resolution.order_status, OrderStatus::Delivered);
        assert_eq!(shop.services.wallet.wallet(shop.user).await.unwrap().balance(), before + Decimal::from(90));
        assert_eq!(shop.stock(small).await, 5);

        let again = lifecycle.verify_return(order.id(), item, true, Utc::now()).await.unwrap_err();
        assert!(matches!(again, CommerceError::BadRequest(_)));
    }

    #[tokio::test]
    async fn test_customer_limits() {
        let shop = Shop::new();
        add(&shop, 300, 300, 5, 1).await;
        let order = shop.services.orders.place_order(shop.user, cod(&shop), Utc::now()).await.unwrap();
        let item = order.items()[0].id;
        let lifecycle = &shop.services.orders;

        let err = lifecycle
            .update_item_status(Actor::customer(shop.user), order.id(), item, ItemStatus::Shipped, None, Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, CommerceError::BadRequest(_)));

        let stranger = Actor::customer(Uuid::new_v4());
        let err = lifecycle.update_item_status(stranger, order.id(), item, ItemStatus::Cancelled, None, Utc::now()).await.unwrap_err();
        assert!(matches!(err, CommerceError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_cancel_item_restocks_once() {
        let shop = Shop::new();
        let variant = add(&shop, 300, 300, 5, 2).await;
        let order = shop.services.orders.place_order(shop.user, cod(&shop), Utc::now()).await.unwrap();
        assert_eq!(shop.stock(variant).await, 3);
        let item = order.items()[0].id;
        let admin = Actor::admin(Uuid::new_v4());

        let change = shop.services.orders.update_item_status(admin, order.id(), item, ItemStatus::Cancelled, None, Utc::now()).await.unwrap();
        assert_eq!(change.order_status, OrderStatus::Cancelled);
        shop.services.orders.update_item_status(admin, order.id(), item, ItemStatus::Cancelled, None, Utc::now()).await.unwrap();
        assert_eq!(shop.stock(variant).await, 5);
    }

    #[tokio::test]
    async fn test_stale_save_is_rejected() {
        let shop = Shop::new();
        let variant = add(&shop, 300, 300, 5, 1).await;
        let order = shop.services.orders.place_order(shop.user, cod(&shop), Utc::now()).await.unwrap();
        let item = order.items()[0].id;

        // Two admins load the same version.
        let mut first = shop.store.order(order.id()).await.unwrap().unwrap();
        let mut second = first.clone();
        first.update_item_status(item, ItemStatus::Shipped, None, Utc::now()).unwrap();
        shop.store.save_order(&first).await.unwrap();

        second.update_item_status(item, ItemStatus::Cancelled, None, Utc::now()).unwrap();
        let err: CommerceError = shop.store.save_order(&second).await.unwrap_err().into();
        assert!(matches!(err, CommerceError::Conflict(_)));
        assert_eq!(shop.stock(variant).await, 4);
        let stored = shop.services.orders.get(Actor::admin(Uuid::new_v4()), order.id()).await.unwrap();
        assert_eq!(stored.items()[0].status, ItemStatus::Shipped);
    }

    #[tokio::test]
    async fn test_failed_stock_step_credits_gateway_payment_to_wallet() {
        let shop = Shop::new();
        let scarce = add(&shop, 650, 650, 1, 1).await;
        let gateway: Arc<dyn PaymentGateway> = Arc::new(FakeGateway { secret: "rzp_secret".into() });
        let stores = Stores {
            catalog: Arc::new(SellsOutAtDecrement { inner: shop.store.clone(), variant: scarce }),
            ..Stores::from_backend(shop.store.clone())
        };
        let services = Services::new(stores, &Config::default(), Some(gateway), EventPublisher::default());

        let (session, _) = services.checkout.start(shop.user, Utc::now()).await.unwrap();
        let gateway_order = services.checkout.create_payment_order(shop.user, session.token, Utc::now()).await.unwrap();
        let request = PlaceOrder {
            payment_method: PaymentMethod::Razorpay,
            checkout_token: Some(session.token),
            razorpay: Some(RazorpayPayment {
                order_id: gateway_order.id.clone(),
                payment_id: "pay_77".into(),
                signature: sign(&gateway_order.id, "pay_77", "rzp_secret"),
            }),
            ..cod(&shop)
        };
        let err = services.orders.place_order(shop.user, request, Utc::now()).await.unwrap_err();
        assert!(matches!(err, CommerceError::Conflict(_)));
        assert!(services.orders.list_for_user(shop.user).await.unwrap().is_empty());
        assert_eq!(shop.stock(scarce).await, 1);

        let wallet = services.wallet.wallet(shop.user).await.unwrap();
        assert_eq!(wallet.balance(), Decimal::from(660));
        assert!(wallet.transactions()[0].reason.contains("pay_77"));
    }

    #[tokio::test]
    async fn test_razorpay_payment_is_verified_against_checkout() {
        let gateway: Arc<dyn PaymentGateway> = Arc::new(FakeGateway { secret: "rzp_secret".into() });
        let shop = Shop::with_gateway(Some(gateway));
        add(&shop, 650, 650, 5, 1).await;
        let checkout = &shop.services.checkout;
        let (session, _) = checkout.start(shop.user, Utc::now()).await.unwrap();
        let gateway_order = checkout.create_payment_order(shop.user, session.token, Utc::now()).await.unwrap();
        assert_eq!(gateway_order.amount, Decimal::from(660));

        let forged = PlaceOrder {
            payment_method: PaymentMethod::Razorpay,
            checkout_token: Some(session.token),
            razorpay: Some(RazorpayPayment {
                order_id: gateway_order.id.clone(),
                payment_id: "pay_1".into(),
                signature: sign(&gateway_order.id, "pay_1", "guess"),
            }),
            ..cod(&shop)
        };
        let err = shop.services.orders.place_order(shop.user, forged, Utc::now()).await.unwrap_err();
        assert!(matches!(err, CommerceError::Validation(_)));

        let paid = PlaceOrder {
            payment_method: PaymentMethod::Razorpay,
            checkout_token: Some(session.token),
            razorpay: Some(RazorpayPayment {
                order_id: gateway_order.id.clone(),
                payment_id: "pay_1".into(),
                signature: sign(&gateway_order.id, "pay_1", "rzp_secret"),
            }),
            ..cod(&shop)
        };
        let order = shop.services.orders.place_order(shop.user, paid, Utc::now()).await.unwrap();
        assert_eq!(order.payment_status(), PaymentStatus::Paid);
    }
}
