//! Aggregates module
pub mod cart;
pub mod checkout;
pub mod coupon;
pub mod order;
pub mod product;
pub mod wallet;

pub use cart::{Cart, CartItem};
pub use checkout::{AppliedCoupon, CheckoutSession, GatewayOrder};
pub use coupon::{Coupon, CouponError, DiscountType};
pub use order::{
    derive_order_status, HistoryEvent, ItemStatus, ItemStatusChange, NewOrder, Order, OrderError,
    OrderLineItem, OrderStatus, OrderStatusChange, PaymentMethod, PaymentStatus, ReturnResolution,
    ShippingAddress, SideEffect, StatusHistoryEntry, UnknownStatus,
};
pub use product::{PricePair, Product, ProductError, ProductStatus, Variant};
pub use wallet::{TransactionKind, Wallet, WalletError, WalletTransaction};
