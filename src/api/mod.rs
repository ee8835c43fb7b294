//! HTTP surface.

pub mod auth;
pub mod checkout;
pub mod coupons;
pub mod error;
pub mod orders;
pub mod wallet;

use axum::{
    routing::{get, patch, post},
    Json, Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::services::Services;

#[derive(Clone)]
pub struct AppState {
    pub services: Services,
    /// Currency reported with gateway amounts
    pub currency: String,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { Json(serde_json::json!({"status": "healthy", "service": "wardrobe-commerce"})) }))
        .route("/cart", get(checkout::get_cart))
        .route("/cart/items", post(checkout::add_item))
        .route("/checkout", post(checkout::start))
        .route("/payment/razorpay/order", post(checkout::create_payment_order))
        .route("/coupon/apply", post(coupons::apply))
        .route("/coupon/remove", post(coupons::remove))
        .route("/order/place", post(orders::place))
        .route("/orders", get(orders::list_mine))
        .route("/order/:order_id", get(orders::get_order))
        .route("/order/:order_id/cancel", post(orders::cancel))
        .route("/order/:order_id/status", patch(orders::update_status))
        .route("/order/:order_id/item/:item_id/status", patch(orders::update_item_status))
        .route("/order/:order_id/item/:item_id/return-verify", post(orders::verify_return))
        .route("/wallet", get(wallet::get_wallet))
        .route("/admin/orders", get(orders::list_all))
        .route("/admin/coupons", get(coupons::list).post(coupons::create))
        .route("/admin/coupons/:code/active", patch(coupons::set_active))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
