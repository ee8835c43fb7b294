//! Domain events
use crate::domain::aggregates::{ItemStatus, OrderStatus, PaymentMethod};
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

#[derive(Clone, Debug, Serialize)]
#[serde(tag = "aggregate", rename_all = "snake_case")]
pub enum DomainEvent {
    Order(OrderEvent),
    Wallet(WalletEvent),
}

impl DomainEvent {
    /// NATS subject the event is published on.
    pub fn subject(&self) -> &'static str {
        match self {
            Self::Order(OrderEvent::Placed { .. }) => "storefront.order.placed",
            Self::Order(OrderEvent::StatusChanged { .. }) => "storefront.order.status_changed",
            Self::Order(OrderEvent::ItemStatusChanged { .. }) => "storefront.order.item_status_changed",
            Self::Order(OrderEvent::ReturnResolved { .. }) => "storefront.order.return_resolved",
            Self::Wallet(WalletEvent::Credited { .. }) => "storefront.wallet.credited",
            Self::Wallet(WalletEvent::Debited { .. }) => "storefront.wallet.debited",
        }
    }
}

#[derive(Clone, Debug, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum OrderEvent {
    Placed { order_id: Uuid, user_id: Uuid, final_amount: Decimal, payment_method: PaymentMethod },
    StatusChanged { order_id: Uuid, from: OrderStatus, to: OrderStatus },
    ItemStatusChanged { order_id: Uuid, item_id: Uuid, from: ItemStatus, to: ItemStatus },
    ReturnResolved { order_id: Uuid, item_id: Uuid, accepted: bool, refund: Decimal },
}

#[derive(Clone, Debug, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum WalletEvent {
    Credited { user_id: Uuid, amount: Decimal, balance: Decimal },
    Debited { user_id: Uuid, amount: Decimal, balance: Decimal },
}
