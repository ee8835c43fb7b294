//! Cart and checkout context.
//!
//! A checkout context is opened against the user's cart and carries the
//! applied coupon and any gateway order until the order is placed. It
//! never stores amounts the client can influence: every total is
//! recomputed from the live cart through [`pricing::quote`].

use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use uuid::Uuid;

use super::coupons::{CouponQuote, CouponValidator};
use super::payment::{PaymentError, PaymentGateway};
use crate::domain::aggregates::{AppliedCoupon, Cart, CartItem, CheckoutSession, GatewayOrder};
use crate::domain::value_objects::{CouponCode, Quantity};
use crate::pricing::{self, PricedLine, PricingPolicy, Quote, Totals};
use crate::store::{CatalogStore, CheckoutStore, ShopperStore, Stores};
use crate::{CommerceError, Result};

/// The quote an order will be charged, with the context it came from.
#[derive(Clone, Debug)]
pub struct PricedCheckout {
    pub quote: Quote,
    pub coupon: Option<CouponCode>,
    pub session: Option<CheckoutSession>,
}

#[derive(Clone)]
pub struct CheckoutService {
    catalog: Arc<dyn CatalogStore>,
    shoppers: Arc<dyn ShopperStore>,
    checkouts: Arc<dyn CheckoutStore>,
    coupons: CouponValidator,
    gateway: Option<Arc<dyn PaymentGateway>>,
    policy: PricingPolicy,
    ttl: Duration,
}

impl CheckoutService {
    pub fn new(
        stores: &Stores,
        coupons: CouponValidator,
        gateway: Option<Arc<dyn PaymentGateway>>,
        policy: PricingPolicy,
        ttl: Duration,
    ) -> Self {
        Self {
            catalog: stores.catalog.clone(),
            shoppers: stores.shoppers.clone(),
            checkouts: stores.checkouts.clone(),
            coupons,
            gateway,
            policy,
            ttl,
        }
    }

    pub async fn cart(&self, user_id: Uuid) -> Result<Cart> { Ok(self.shoppers.cart(user_id).await?) }

    #[tracing::instrument(skip(self, quantity), fields(quantity = quantity.value()))]
    pub async fn add_to_cart(
        &self,
        user_id: Uuid,
        product_id: Uuid,
        variant_id: Option<Uuid>,
        quantity: Quantity,
    ) -> Result<Cart> {
        let mut cart = self.shoppers.cart(user_id).await?;
        let wanted = cart
            .items()
            .iter()
            .find(|i| i.product_id == product_id && i.variant_id == variant_id)
            .map_or(quantity, |i| i.quantity.add(quantity));
        self.price_line(product_id, variant_id, wanted).await?;

        cart.add_item(CartItem { product_id, variant_id, quantity });
        self.shoppers.save_cart(&cart).await?;
        Ok(cart)
    }

    /// Price one cart line: variant price if there is a variant, else the
    /// product price. Fails when the product cannot be sold or the variant
    /// does not have `quantity` in stock.
    async fn price_line(&self, product_id: Uuid, variant_id: Option<Uuid>, quantity: Quantity) -> Result<PricedLine> {
        let product = self
            .catalog
            .product(product_id)
            .await?
            .ok_or_else(|| CommerceError::NotFound("Product not found".into()))?;
        if !product.is_purchasable() {
            return Err(CommerceError::Validation(format!("{} is not available", product.name)));
        }

        let price = match variant_id {
            Some(id) => {
                let variant = self
                    .catalog
                    .variant(id)
                    .await?
                    .filter(|v| v.product_id == product.id)
                    .ok_or_else(|| CommerceError::NotFound("Variant not found".into()))?;
                if !variant.has_stock_for(quantity.value()) {
                    return Err(CommerceError::Conflict(format!(
                        "Only {} left in stock for {} ({}, {})",
                        variant.stock.max(0),
                        product.name,
                        variant.size,
                        variant.colour
                    )));
                }
                variant.price
            }
            None => product.price,
        };

        Ok(PricedLine {
            product_id,
            variant_id,
            product_name: product.name,
            base_price: price.regular_price,
            sale_price: price.sale_price,
            quantity,
        })
    }

    pub async fn resolve_lines(&self, cart: &Cart) -> Result<Vec<PricedLine>> {
        if cart.is_empty() {
            return Err(CommerceError::Validation("Cart is empty".into()));
        }
        let mut lines = Vec::with_capacity(cart.items().len());
        for item in cart.items() {
            lines.push(self.price_line(item.product_id, item.variant_id, item.quantity).await?);
        }
        Ok(lines)
    }

    /// The cart priced without a coupon.
    pub async fn quote_cart(&self, user_id: Uuid) -> Result<Quote> {
        let cart = self.shoppers.cart(user_id).await?;
        let lines = self.resolve_lines(&cart).await?;
        Ok(pricing::quote(lines, rust_decimal::Decimal::ZERO, &self.policy))
    }

    #[tracing::instrument(skip(self, now))]
    pub async fn start(&self, user_id: Uuid, now: DateTime<Utc>) -> Result<(CheckoutSession, Quote)> {
        let quote = self.quote_cart(user_id).await?;
        let session = CheckoutSession::open(user_id, self.ttl, now);
        self.checkouts.put_checkout(&session).await?;
        tracing::info!(token = %session.token, final_amount = %quote.final_amount, "checkout started");
        Ok((session, quote))
    }

    /// A live context owned by `user_id`. Unknown, foreign and expired
    /// tokens all read as not found.
    pub async fn session(&self, user_id: Uuid, token: Uuid, now: DateTime<Utc>) -> Result<CheckoutSession> {
        self.checkouts
            .checkout(token)
            .await?
            .filter(|s| s.user_id == user_id && !s.is_expired(now))
            .ok_or_else(|| CommerceError::NotFound("Checkout session not found or expired".into()))
    }

    #[tracing::instrument(skip(self, now))]
    pub async fn apply_coupon(&self, user_id: Uuid, token: Uuid, code: &str, now: DateTime<Utc>) -> Result<CouponQuote> {
        let mut session = self.session(user_id, token, now).await?;
        let quote = self.quote_cart(user_id).await?;
        let applied = self.coupons.validate(user_id, code, &quote.totals(), now).await?;

        session.set_coupon(Some(AppliedCoupon { code: applied.code.clone(), discount: applied.discount }));
        self.checkouts.put_checkout(&session).await?;
        Ok(applied)
    }

    /// Coupon check against client-supplied figures; nothing is stored.
    /// Placement prices the order again, so these figures are never charged.
    pub async fn preview_coupon(
        &self,
        user_id: Uuid,
        code: &str,
        totals: &Totals,
        now: DateTime<Utc>,
    ) -> Result<CouponQuote> {
        self.coupons.validate(user_id, code, totals, now).await
    }

    #[tracing::instrument(skip(self, now))]
    pub async fn remove_coupon(&self, user_id: Uuid, token: Uuid, now: DateTime<Utc>) -> Result<Quote> {
        let mut session = self.session(user_id, token, now).await?;
        let quote = self.quote_cart(user_id).await?;
        session.set_coupon(None);
        self.checkouts.put_checkout(&session).await?;
        Ok(quote)
    }

    /// Create a Razorpay order for the current total and pin it to the context.
    #[tracing::instrument(skip(self, now))]
    pub async fn create_payment_order(&self, user_id: Uuid, token: Uuid, now: DateTime<Utc>) -> Result<GatewayOrder> {
        let gateway = self.gateway.as_ref().ok_or(PaymentError::Disabled)?;
        let priced = self.price_for_placement(user_id, Some(token), now).await?;
        let mut session = priced
            .session
            .ok_or_else(|| CommerceError::NotFound("Checkout session not found or expired".into()))?;

        let order = gateway.create_order(priced.quote.final_amount, &token.simple().to_string()).await?;
        session.gateway_order = Some(order.clone());
        self.checkouts.put_checkout(&session).await?;
        Ok(order)
    }

    /// Price the cart for placement. The coupon held by the context is
    /// checked again, so a coupon that expired or was used in the meantime
    /// fails placement instead of being charged silently.
    pub async fn price_for_placement(
        &self,
        user_id: Uuid,
        token: Option<Uuid>,
        now: DateTime<Utc>,
    ) -> Result<PricedCheckout> {
        let quote = self.quote_cart(user_id).await?;
        let Some(token) = token else {
            return Ok(PricedCheckout { quote, coupon: None, session: None });
        };
        let session = self.session(user_id, token, now).await?;
        let Some(applied) = &session.coupon else {
            return Ok(PricedCheckout { quote, coupon: None, session: Some(session) });
        };

        let checked = self.coupons.validate(user_id, applied.code.as_str(), &quote.totals(), now).await?;
        Ok(PricedCheckout {
            quote: quote.with_coupon_discount(checked.discount),
            coupon: Some(checked.code),
            session: Some(session),
        })
    }

    pub async fn close(&self, token: Uuid) -> Result<()> { Ok(self.checkouts.delete_checkout(token).await?) }
}
