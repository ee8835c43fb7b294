//! Order Aggregate
//!
//! An order owns its line items. Every status change goes through the
//! methods here; they mutate the in-memory document and report the stock
//! and wallet side effects the caller must carry out once the document is
//! persisted.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::domain::events::{DomainEvent, OrderEvent};
use crate::domain::value_objects::{non_negative, round2, CouponCode, Quantity};
use crate::pricing::Quote;

/// Lower-case and drop everything but letters and digits, so
/// "Out for Delivery", "out_for_delivery" and "OUT-FOR-DELIVERY" compare equal.
fn normalize(s: &str) -> String {
    s.chars().filter(char::is_ascii_alphanumeric).map(|c| c.to_ascii_lowercase()).collect()
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String")]
pub enum OrderStatus {
    Pending,
    Processing,
    Shipped,
    #[serde(rename = "Out for Delivery")]
    OutForDelivery,
    Delivered,
    Cancelled,
    #[serde(rename = "Return Request")]
    ReturnRequest,
    Returned,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Processing => "Processing",
            Self::Shipped => "Shipped",
            Self::OutForDelivery => "Out for Delivery",
            Self::Delivered => "Delivered",
            Self::Cancelled => "Cancelled",
            Self::ReturnRequest => "Return Request",
            Self::Returned => "Returned",
        }
    }

    /// Item status an administrative order-level update pushes onto live items.
    fn propagated_item_status(&self) -> Option<ItemStatus> {
        match self {
            Self::Processing => Some(ItemStatus::Ordered),
            Self::Shipped => Some(ItemStatus::Shipped),
            Self::OutForDelivery => Some(ItemStatus::OutForDelivery),
            Self::Delivered => Some(ItemStatus::Delivered),
            _ => None,
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl FromStr for OrderStatus {
    type Err = UnknownStatus;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize(s).as_str() {
            "pending" => Ok(Self::Pending),
            "processing" | "ordered" => Ok(Self::Processing),
            "shipped" => Ok(Self::Shipped),
            "outfordelivery" => Ok(Self::OutForDelivery),
            "delivered" => Ok(Self::Delivered),
            "cancelled" | "canceled" => Ok(Self::Cancelled),
            "returnrequest" | "returnrequested" => Ok(Self::ReturnRequest),
            "returned" => Ok(Self::Returned),
            _ => Err(UnknownStatus(s.to_string())),
        }
    }
}

impl TryFrom<String> for OrderStatus {
    type Error = UnknownStatus;
    fn try_from(value: String) -> Result<Self, Self::Error> { value.parse() }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String")]
pub enum ItemStatus {
    Ordered,
    Shipped,
    #[serde(rename = "Out for Delivery")]
    OutForDelivery,
    Delivered,
    Cancelled,
    #[serde(rename = "Return Requested")]
    ReturnRequested,
    Returned,
}

use ItemStatus::*;

/// Legal item transitions. Anything not listed is rejected; staying in
/// the same status is always allowed.
const ITEM_TRANSITIONS: &[(ItemStatus, &[ItemStatus])] = &[
    (Ordered, &[Shipped, OutForDelivery, Delivered, Cancelled]),
    (Shipped, &[OutForDelivery, Delivered, Cancelled]),
    (OutForDelivery, &[Delivered, Cancelled]),
    (Delivered, &[ReturnRequested]),
    (ReturnRequested, &[Returned, Delivered]),
    (Cancelled, &[]),
    (Returned, &[]),
];

impl ItemStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Ordered => "Ordered",
            Shipped => "Shipped",
            OutForDelivery => "Out for Delivery",
            Delivered => "Delivered",
            Cancelled => "Cancelled",
            ReturnRequested => "Return Requested",
            Returned => "Returned",
        }
    }

    /// Cancelled and Returned are never left again.
    pub fn is_terminal(&self) -> bool { matches!(self, Cancelled | Returned) }

    pub fn can_transition_to(&self, next: ItemStatus) -> bool {
        *self == next
            || ITEM_TRANSITIONS
                .iter()
                .find(|(from, _)| from == self)
                .is_some_and(|(_, to)| to.contains(&next))
    }
}

impl fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl FromStr for ItemStatus {
    type Err = UnknownStatus;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize(s).as_str() {
            "ordered" | "pending" | "processing" => Ok(Ordered),
            "shipped" => Ok(Shipped),
            "outfordelivery" => Ok(OutForDelivery),
            "delivered" => Ok(Delivered),
            "cancelled" | "canceled" => Ok(Cancelled),
            "returnrequested" | "returnrequest" => Ok(ReturnRequested),
            "returned" => Ok(Returned),
            _ => Err(UnknownStatus(s.to_string())),
        }
    }
}

impl TryFrom<String> for ItemStatus {
    type Error = UnknownStatus;
    fn try_from(value: String) -> Result<Self, Self::Error> { value.parse() }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown status '{0}'")]
pub struct UnknownStatus(pub String);

/// One row of the aggregate-status table: matches when every item status
/// is in `all_in` (empty = no constraint) and at least one is in `any_of`
/// (empty = no constraint).
struct StatusRule {
    all_in: &'static [ItemStatus],
    any_of: &'static [ItemStatus],
    result: OrderStatus,
}

/// Checked top to bottom; the first match wins.
const AGGREGATE_RULES: &[StatusRule] = &[
    StatusRule { all_in: &[Cancelled], any_of: &[], result: OrderStatus::Cancelled },
    StatusRule { all_in: &[Delivered], any_of: &[], result: OrderStatus::Delivered },
    StatusRule { all_in: &[], any_of: &[OutForDelivery], result: OrderStatus::OutForDelivery },
    StatusRule { all_in: &[], any_of: &[Shipped], result: OrderStatus::Shipped },
    StatusRule { all_in: &[Ordered], any_of: &[], result: OrderStatus::Processing },
    StatusRule { all_in: &[Returned, Cancelled], any_of: &[Returned], result: OrderStatus::Returned },
    StatusRule { all_in: &[], any_of: &[ReturnRequested], result: OrderStatus::ReturnRequest },
    StatusRule { all_in: &[Delivered, Returned, Cancelled], any_of: &[], result: OrderStatus::Delivered },
];

/// Fold item statuses into the order status. Keeps `current` when no rule matches.
pub fn derive_order_status(items: &[ItemStatus], current: OrderStatus) -> OrderStatus {
    if items.is_empty() {
        return current;
    }
    AGGREGATE_RULES
        .iter()
        .find(|rule| {
            (rule.all_in.is_empty() || items.iter().all(|s| rule.all_in.contains(s)))
                && (rule.any_of.is_empty() || items.iter().any(|s| rule.any_of.contains(s)))
        })
        .map_or(current, |rule| rule.result)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentMethod {
    #[serde(rename = "COD", alias = "cod", alias = "Cod")]
    Cod,
    #[serde(alias = "razorpay")]
    Razorpay,
    #[serde(alias = "wallet")]
    Wallet,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentStatus {
    #[default]
    Pending,
    Paid,
    Failed,
    Refunded,
}

/// Address copied onto the order at placement; later edits to the saved
/// address never reach it.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShippingAddress {
    pub name: String,
    pub phone: String,
    pub landmark: Option<String>,
    pub city: String,
    pub state: String,
    pub pincode: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLineItem {
    pub id: Uuid,
    pub product_id: Uuid,
    pub variant_id: Option<Uuid>,
    pub product_name: String,
    pub base_price: Decimal,
    pub sale_price: Decimal,
    pub quantity: Quantity,
    pub total: Decimal,
    pub status: ItemStatus,
    pub delivered_on: Option<DateTime<Utc>>,
    pub return_reason: Option<String>,
    #[serde(default)]
    pub refunded_amount: Decimal,
}

impl OrderLineItem {
    pub fn sale_total(&self) -> Decimal { self.sale_price * self.quantity.as_decimal() }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum HistoryEvent {
    Order { status: OrderStatus },
    Item { item_id: Uuid, status: ItemStatus },
    Return { item_id: Uuid, accepted: bool, refund: Decimal },
}

impl fmt::Display for HistoryEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Order { status } => write!(f, "{status}"),
            Self::Item { item_id, status } => write!(f, "Item {item_id} → {status}"),
            Self::Return { item_id, accepted: true, refund } => {
                write!(f, "Item {item_id} return accepted, refunded {refund}")
            }
            Self::Return { item_id, accepted: false, .. } => write!(f, "Item {item_id} return rejected"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusHistoryEntry {
    pub event: HistoryEvent,
    pub at: DateTime<Utc>,
}

/// Work the caller performs after the order document is saved.
#[derive(Clone, Debug, PartialEq)]
pub enum SideEffect {
    Restock { variant_id: Uuid, quantity: Quantity },
    Refund { user_id: Uuid, amount: Decimal, reason: String },
}

#[derive(Debug, Clone)]
pub struct OrderStatusChange {
    pub previous: OrderStatus,
    pub current: OrderStatus,
    pub effects: Vec<SideEffect>,
}

#[derive(Debug, Clone)]
pub struct ItemStatusChange {
    pub previous: ItemStatus,
    pub current: ItemStatus,
    pub order_status: OrderStatus,
    pub effects: Vec<SideEffect>,
}

#[derive(Debug, Clone)]
pub struct ReturnResolution {
    pub item_status: ItemStatus,
    pub order_status: OrderStatus,
    pub refund: Decimal,
    pub effects: Vec<SideEffect>,
}

/// Everything needed to create an order.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub user_id: Uuid,
    pub quote: Quote,
    pub coupon_code: Option<CouponCode>,
    pub shipping_address: ShippingAddress,
    pub payment_method: PaymentMethod,
    pub payment_reference: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    id: Uuid,
    order_number: String,
    user_id: Uuid,
    items: Vec<OrderLineItem>,
    total_price: Decimal,
    discount: Decimal,
    coupon_applied: bool,
    coupon_code: Option<CouponCode>,
    coupon_discount: Decimal,
    platform_fee: Decimal,
    shipping_fee: Decimal,
    final_amount: Decimal,
    shipping_address: ShippingAddress,
    payment_method: PaymentMethod,
    payment_status: PaymentStatus,
    payment_reference: Option<String>,
    status: OrderStatus,
    status_history: Vec<StatusHistoryEntry>,
    delivered_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    #[serde(default)]
    version: i64,
    #[serde(skip)]
    events: Vec<DomainEvent>,
}

impl Order {
    pub fn place(new: NewOrder, now: DateTime<Utc>) -> Self {
        let id = Uuid::now_v7();
        let quote = new.quote;
        let items = quote
            .lines
            .iter()
            .map(|line| OrderLineItem {
                id: Uuid::new_v4(),
                product_id: line.product_id,
                variant_id: line.variant_id,
                product_name: line.product_name.clone(),
                base_price: line.base_price,
                sale_price: line.sale_price,
                quantity: line.quantity,
                total: line.sale_total(),
                status: Ordered,
                delivered_on: None,
                return_reason: None,
                refunded_amount: Decimal::ZERO,
            })
            .collect();
        let payment_status = match new.payment_method {
            PaymentMethod::Cod => PaymentStatus::Pending,
            PaymentMethod::Razorpay | PaymentMethod::Wallet => PaymentStatus::Paid,
        };
        let coupon_applied = new.coupon_code.is_some() && quote.coupon_discount > Decimal::ZERO;

        let mut order = Self {
            id,
            order_number: format!("ORD-{:08}", rand::random::<u32>() % 100_000_000),
            user_id: new.user_id,
            items,
            total_price: quote.total_item_price,
            discount: quote.item_discount,
            coupon_applied,
            coupon_code: new.coupon_code.filter(|_| coupon_applied),
            coupon_discount: quote.coupon_discount,
            platform_fee: quote.platform_fee,
            shipping_fee: quote.shipping_fee,
            final_amount: quote.final_amount,
            shipping_address: new.shipping_address,
            payment_method: new.payment_method,
            payment_status,
            payment_reference: new.payment_reference,
            status: OrderStatus::Pending,
            status_history: vec![StatusHistoryEntry {
                event: HistoryEvent::Order { status: OrderStatus::Pending },
                at: now,
            }],
            delivered_at: None,
            created_at: now,
            updated_at: now,
            version: 0,
            events: vec![],
        };
        order.raise_event(DomainEvent::Order(OrderEvent::Placed {
            order_id: id,
            user_id: order.user_id,
            final_amount: order.final_amount,
            payment_method: order.payment_method,
        }));
        order
    }

    pub fn id(&self) -> Uuid { self.id }
    pub fn order_number(&self) -> &str { &self.order_number }
    pub fn user_id(&self) -> Uuid { self.user_id }
    pub fn items(&self) -> &[OrderLineItem] { &self.items }
    pub fn status(&self) -> OrderStatus { self.status }
    pub fn payment_method(&self) -> PaymentMethod { self.payment_method }
    pub fn payment_reference(&self) -> Option<&str> { self.payment_reference.as_deref() }
    pub fn payment_status(&self) -> PaymentStatus { self.payment_status }
    pub fn final_amount(&self) -> Decimal { self.final_amount }
    pub fn coupon_discount(&self) -> Decimal { self.coupon_discount }
    pub fn coupon_code(&self) -> Option<&CouponCode> { self.coupon_code.as_ref() }
    pub fn coupon_applied(&self) -> bool { self.coupon_applied }
    pub fn shipping_address(&self) -> &ShippingAddress { &self.shipping_address }
    pub fn status_history(&self) -> &[StatusHistoryEntry] { &self.status_history }
    pub fn delivered_at(&self) -> Option<DateTime<Utc>> { self.delivered_at }
    pub fn created_at(&self) -> DateTime<Utc> { self.created_at }
    pub fn version(&self) -> i64 { self.version }
    pub fn set_version(&mut self, version: i64) { self.version = version; }

    pub fn item(&self, item_id: Uuid) -> Option<&OrderLineItem> {
        self.items.iter().find(|i| i.id == item_id)
    }

    /// Whether this order counts as a use of `code`.
    pub fn uses_coupon(&self, code: &CouponCode) -> bool {
        self.coupon_applied
            && self.status != OrderStatus::Cancelled
            && self.coupon_code.as_ref() == Some(code)
    }

    /// Administrative order-level update.
    pub fn update_status(
        &mut self,
        target: OrderStatus,
        now: DateTime<Utc>,
    ) -> Result<OrderStatusChange, OrderError> {
        if matches!(self.status, OrderStatus::Cancelled | OrderStatus::Returned) {
            return Err(OrderError::Closed(self.status));
        }
        if matches!(target, OrderStatus::ReturnRequest | OrderStatus::Returned) {
            return Err(OrderError::IllegalOrderTransition { from: self.status, to: target });
        }
        let previous = self.status;
        let mut effects = vec![];

        if target == OrderStatus::Cancelled {
            let cancellable: Vec<usize> = (0..self.items.len())
                .filter(|&i| self.items[i].status != Cancelled && self.items[i].status.can_transition_to(Cancelled))
                .collect();
            if cancellable.is_empty() {
                return Err(OrderError::IllegalOrderTransition { from: previous, to: target });
            }
            for index in cancellable {
                effects.extend(self.transition_item(index, Cancelled, now));
            }
            self.settle_refunds();
            self.status = self.derived_status();
        } else {
            if let Some(item_status) = target.propagated_item_status() {
                // Pending returns only leave through return verification.
                for item in self.items.iter_mut().filter(|i| !i.status.is_terminal() && i.status != ReturnRequested) {
                    item.status = item_status;
                    if item_status == Delivered {
                        item.delivered_on = Some(now);
                    }
                }
            }
            if target == OrderStatus::Delivered {
                self.delivered_at = Some(now);
                self.collect_cash_on_delivery();
            }
            self.status = target;
        }

        self.push_history(HistoryEvent::Order { status: self.status }, now);
        self.raise_event(DomainEvent::Order(OrderEvent::StatusChanged {
            order_id: self.id,
            from: previous,
            to: self.status,
        }));
        self.touch(now);
        Ok(OrderStatusChange { previous, current: self.status, effects })
    }

    /// Move one line item. Return requests resolve through [`Order::resolve_return`].
    pub fn update_item_status(
        &mut self,
        item_id: Uuid,
        target: ItemStatus,
        reason: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<ItemStatusChange, OrderError> {
        let index = self.item_index(item_id)?;
        let previous = self.items[index].status;
        if previous == ReturnRequested && target != ReturnRequested {
            return Err(OrderError::ReturnPending(item_id));
        }
        if !previous.can_transition_to(target) {
            return Err(OrderError::IllegalItemTransition { from: previous, to: target });
        }

        let effects = self.transition_item(index, target, now);
        if target == ReturnRequested {
            self.items[index].return_reason = reason.filter(|r| !r.trim().is_empty());
        }
        self.settle_refunds();
        self.status = self.derived_status();

        self.push_history(HistoryEvent::Item { item_id, status: target }, now);
        self.raise_event(DomainEvent::Order(OrderEvent::ItemStatusChanged {
            order_id: self.id,
            item_id,
            from: previous,
            to: target,
        }));
        self.touch(now);
        Ok(ItemStatusChange { previous, current: target, order_status: self.status, effects })
    }

    /// Accept or reject a pending return.
    pub fn resolve_return(
        &mut self,
        item_id: Uuid,
        accept: bool,
        now: DateTime<Utc>,
    ) -> Result<ReturnResolution, OrderError> {
        let index = self.item_index(item_id)?;
        let current = self.items[index].status;
        if current != ReturnRequested {
            return Err(OrderError::ReturnNotRequested { item_id, status: current });
        }

        let mut effects = vec![];
        let mut refund = Decimal::ZERO;
        if accept {
            refund = self.refund_for(index);
            let item = &mut self.items[index];
            item.status = Returned;
            item.refunded_amount = refund;
            if let Some(variant_id) = item.variant_id {
                effects.push(SideEffect::Restock { variant_id, quantity: item.quantity });
            }
            if refund > Decimal::ZERO {
                effects.push(SideEffect::Refund {
                    user_id: self.user_id,
                    amount: refund,
                    reason: format!(
                        "Refund for returned item {} (order {})",
                        item.product_name, self.order_number
                    ),
                });
            }
            self.settle_refunds();
        } else {
            self.items[index].status = Delivered;
        }
        self.status = self.derived_status();

        self.push_history(HistoryEvent::Return { item_id, accepted: accept, refund }, now);
        self.raise_event(DomainEvent::Order(OrderEvent::ReturnResolved {
            order_id: self.id,
            item_id,
            accepted: accept,
            refund,
        }));
        self.touch(now);
        Ok(ReturnResolution {
            item_status: self.items[index].status,
            order_status: self.status,
            refund,
            effects,
        })
    }

    /// Item sale total less its proportional share of the order coupon,
    /// rounded to 2 places and never negative.
    fn refund_for(&self, index: usize) -> Decimal {
        let item_total = self.items[index].sale_total();
        let order_total: Decimal = self.items.iter().map(OrderLineItem::sale_total).sum();
        let coupon_share = if self.coupon_discount > Decimal::ZERO && order_total > Decimal::ZERO {
            self.coupon_discount * item_total / order_total
        } else {
            Decimal::ZERO
        };
        non_negative(round2(item_total - coupon_share))
    }

    /// The last item cancelled out of an order where nothing else survived
    /// also carries back the fees, so the whole payment is returned.
    fn cancellation_refund(&self, index: usize) -> Decimal {
        let others_cancelled = self
            .items
            .iter()
            .enumerate()
            .all(|(i, item)| i == index || item.status == Cancelled);
        if !others_cancelled {
            return self.refund_for(index);
        }
        let already: Decimal = self.items.iter().map(|i| i.refunded_amount).sum();
        non_negative(round2(self.final_amount - already))
    }

    fn transition_item(&mut self, index: usize, target: ItemStatus, now: DateTime<Utc>) -> Vec<SideEffect> {
        let mut effects = vec![];
        let previous = self.items[index].status;
        match target {
            Cancelled if previous != Cancelled => {
                let item = &self.items[index];
                if let Some(variant_id) = item.variant_id {
                    effects.push(SideEffect::Restock { variant_id, quantity: item.quantity });
                }
                // COD money is only collected on delivery, so there is nothing to give back.
                if self.payment_status == PaymentStatus::Paid && self.payment_method != PaymentMethod::Cod {
                    let amount = self.cancellation_refund(index);
                    if amount > Decimal::ZERO {
                        effects.push(SideEffect::Refund {
                            user_id: self.user_id,
                            amount,
                            reason: format!(
                                "Refund for cancelled item {} (order {})",
                                item.product_name, self.order_number
                            ),
                        });
                        self.items[index].refunded_amount = amount;
                    }
                }
            }
            Delivered => {
                self.items[index].delivered_on = Some(now);
                self.collect_cash_on_delivery();
            }
            _ => {}
        }
        self.items[index].status = target;
        effects
    }

    fn collect_cash_on_delivery(&mut self) {
        if self.payment_method == PaymentMethod::Cod {
            self.payment_status = PaymentStatus::Paid;
        }
    }

    /// A paid order whose every item was cancelled or returned with money
    /// handed back is fully refunded.
    fn settle_refunds(&mut self) {
        if self.payment_status == PaymentStatus::Paid
            && self.items.iter().all(|i| i.status.is_terminal())
            && self.items.iter().any(|i| i.refunded_amount > Decimal::ZERO)
        {
            self.payment_status = PaymentStatus::Refunded;
        }
    }

    fn derived_status(&self) -> OrderStatus {
        let statuses: Vec<ItemStatus> = self.items.iter().map(|i| i.status).collect();
        derive_order_status(&statuses, self.status)
    }

    fn item_index(&self, item_id: Uuid) -> Result<usize, OrderError> {
        self.items.iter().position(|i| i.id == item_id).ok_or(OrderError::ItemNotFound(item_id))
    }

    fn push_history(&mut self, event: HistoryEvent, at: DateTime<Utc>) {
        self.status_history.push(StatusHistoryEntry { event, at });
    }

    pub fn take_events(&mut self) -> Vec<DomainEvent> { std::mem::take(&mut self.events) }
    fn raise_event(&mut self, e: DomainEvent) { self.events.push(e); }
    fn touch(&mut self, now: DateTime<Utc>) { self.updated_at = now; }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum OrderError {
    #[error("order item {0} not found")]
    ItemNotFound(Uuid),
    #[error("order is {0} and can no longer change")]
    Closed(OrderStatus),
    #[error("cannot move order from {from} to {to}")]
    IllegalOrderTransition { from: OrderStatus, to: OrderStatus },
    #[error("cannot move item from {from} to {to}")]
    IllegalItemTransition { from: ItemStatus, to: ItemStatus },
    #[error("item {0} has a pending return; resolve it through return verification")]
    ReturnPending(Uuid),
    #[error("item {item_id} is {status}, not awaiting a return decision")]
    ReturnNotRequested { item_id: Uuid, status: ItemStatus },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pricing::{quote, PricedLine, PricingPolicy};

    fn line(sale: i64, variant: bool) -> PricedLine {
        PricedLine {
            product_id: Uuid::new_v4(),
            variant_id: variant.then(Uuid::new_v4),
            product_name: "Denim Jacket".into(),
            base_price: Decimal::from(sale),
            sale_price: Decimal::from(sale),
            quantity: Quantity::new(1).unwrap(),
        }
    }

    fn order(lines: Vec<PricedLine>, coupon: i64, method: PaymentMethod) -> Order {
        let q = quote(lines, Decimal::from(coupon), &PricingPolicy::default());
        Order::place(
            NewOrder {
                user_id: Uuid::new_v4(),
                quote: q,
                coupon_code: (coupon > 0).then(|| CouponCode::new("SAVE40").unwrap()),
                shipping_address: ShippingAddress::default(),
                payment_method: method,
                payment_reference: None,
            },
            Utc::now(),
        )
    }

    #[test]
    fn test_place_snapshots_quote() {
        let o = order(vec![line(650, true)], 0, PaymentMethod::Cod);
        assert_eq!(o.status(), OrderStatus::Pending);
        assert_eq!(o.payment_status(), PaymentStatus::Pending);
        assert_eq!(o.final_amount(), Decimal::from(660));
        assert_eq!(o.items()[0].status, Ordered);
        assert_eq!(o.status_history().len(), 1);
        assert!(!o.coupon_applied());

        let prepaid = order(vec![line(100, true)], 0, PaymentMethod::Wallet);
        assert_eq!(prepaid.payment_status(), PaymentStatus::Paid);
    }

    #[test]
    fn test_derive_order_status() {
        let keep = OrderStatus::Pending;
        assert_eq!(derive_order_status(&[Delivered, Delivered], keep), OrderStatus::Delivered);
        assert_eq!(derive_order_status(&[Cancelled, Cancelled], keep), OrderStatus::Cancelled);
        assert_eq!(derive_order_status(&[Shipped, Ordered], keep), OrderStatus::Shipped);
        assert_eq!(derive_order_status(&[OutForDelivery, Delivered], keep), OrderStatus::OutForDelivery);
        assert_eq!(derive_order_status(&[OutForDelivery, Shipped], keep), OrderStatus::OutForDelivery);
        assert_eq!(derive_order_status(&[Ordered, Ordered], keep), OrderStatus::Processing);
        assert_eq!(derive_order_status(&[Returned, Cancelled], keep), OrderStatus::Returned);
        assert_eq!(derive_order_status(&[Delivered, ReturnRequested], keep), OrderStatus::ReturnRequest);
        assert_eq!(derive_order_status(&[Returned, Delivered], keep), OrderStatus::Delivered);
        assert_eq!(derive_order_status(&[Ordered, Cancelled], OrderStatus::Processing), OrderStatus::Processing);
    }

    #[test]
    fn test_transition_table() {
        assert!(Ordered.can_transition_to(Shipped));
        assert!(Shipped.can_transition_to(Cancelled));
        assert!(Delivered.can_transition_to(ReturnRequested));
        assert!(!Delivered.can_transition_to(Cancelled));
        assert!(!Cancelled.can_transition_to(Ordered));
        assert!(!Returned.can_transition_to(Delivered));
        assert!(Cancelled.can_transition_to(Cancelled));
    }

    #[test]
    fn test_status_parsing_is_lenient() {
        assert_eq!("out for delivery".parse::<ItemStatus>().unwrap(), OutForDelivery);
        assert_eq!("Return_Requested".parse::<ItemStatus>().unwrap(), ReturnRequested);
        assert_eq!("Ordered".parse::<OrderStatus>().unwrap(), OrderStatus::Processing);
        assert!("lost".parse::<OrderStatus>().is_err());
        let s: OrderStatus = serde_json::from_str("\"OUT-FOR-DELIVERY\"").unwrap();
        assert_eq!(serde_json::to_string(&s).unwrap(), "\"Out for Delivery\"");
    }

    #[test]
    fn test_cancel_item_restocks_once() {
        let mut o = order(vec![line(200, true), line(300, true)], 0, PaymentMethod::Cod);
        let id = o.items()[0].id;
        let change = o.update_item_status(id, Cancelled, None, Utc::now()).unwrap();
        assert_eq!(change.previous, Ordered);
        assert!(matches!(change.effects.as_slice(), [SideEffect::Restock { .. }]));
        assert_eq!(change.order_status, OrderStatus::Pending);

        let again = o.update_item_status(id, Cancelled, None, Utc::now()).unwrap();
        assert!(again.effects.is_empty());
        assert_eq!(o.status_history().last().unwrap().event.to_string(), format!("Item {id} → Cancelled"));
    }

    #[test]
    fn test_cancel_prepaid_item_refunds() {
        let mut o = order(vec![line(200, true)], 0, PaymentMethod::Razorpay);
        let id = o.items()[0].id;
        let change = o.update_item_status(id, Cancelled, None, Utc::now()).unwrap();
        assert!(change
            .effects
            .iter()
            .any(|e| matches!(e, SideEffect::Refund { amount, .. } if *amount == Decimal::from(240))));
        assert_eq!(o.status(), OrderStatus::Cancelled);
        assert_eq!(o.payment_status(), PaymentStatus::Refunded);
    }

    #[test]
    fn test_full_cancel_returns_fees_with_last_item() {
        // 200 + 300 + fee 10 + shipping 30
        let mut o = order(vec![line(200, true), line(300, true)], 0, PaymentMethod::Wallet);
        assert_eq!(o.final_amount(), Decimal::from(540));
        let first = o.items()[0].id;

        let change = o.update_item_status(first, Cancelled, None, Utc::now()).unwrap();
        let refunded = |effects: &[SideEffect]| -> Decimal {
            effects
                .iter()
                .filter_map(|e| match e {
                    SideEffect::Refund { amount, .. } => Some(*amount),
                    _ => None,
                })
                .sum()
        };
        assert_eq!(refunded(&change.effects), Decimal::from(200));
        assert_eq!(o.payment_status(), PaymentStatus::Paid);

        let change = o.update_status(OrderStatus::Cancelled, Utc::now()).unwrap();
        assert_eq!(refunded(&change.effects), Decimal::from(340));
        assert_eq!(o.payment_status(), PaymentStatus::Refunded);
    }

    #[test]
    fn test_cancel_after_delivery_keeps_fees() {
        let mut o = order(vec![line(200, true), line(300, true)], 0, PaymentMethod::Wallet);
        let (first, second) = (o.items()[0].id, o.items()[1].id);
        o.update_item_status(first, Delivered, None, Utc::now()).unwrap();
        let change = o.update_item_status(second, Cancelled, None, Utc::now()).unwrap();
        assert!(change
            .effects
            .iter()
            .any(|e| matches!(e, SideEffect::Refund { amount, .. } if *amount == Decimal::from(300))));
    }

    #[test]
    fn test_cod_paid_on_delivery() {
        let mut o = order(vec![line(200, false)], 0, PaymentMethod::Cod);
        let id = o.items()[0].id;
        let change = o.update_item_status(id, Delivered, None, Utc::now()).unwrap();
        assert_eq!(change.order_status, OrderStatus::Delivered);
        assert_eq!(o.payment_status(), PaymentStatus::Paid);
        assert!(o.items()[0].delivered_on.is_some());
    }

    #[test]
    fn test_illegal_item_transition() {
        let mut o = order(vec![line(200, true)], 0, PaymentMethod::Cod);
        let id = o.items()[0].id;
        let err = o.update_item_status(id, ReturnRequested, None, Utc::now()).unwrap_err();
        assert_eq!(err, OrderError::IllegalItemTransition { from: Ordered, to: ReturnRequested });
        let missing = o.update_item_status(Uuid::new_v4(), Shipped, None, Utc::now()).unwrap_err();
        assert!(matches!(missing, OrderError::ItemNotFound(_)));
    }

    #[test]
    fn test_order_update_propagates_but_keeps_terminal_items() {
        let mut o = order(vec![line(200, true), line(300, true)], 0, PaymentMethod::Cod);
        let cancelled = o.items()[0].id;
        o.update_item_status(cancelled, Cancelled, None, Utc::now()).unwrap();

        let change = o.update_status(OrderStatus::Delivered, Utc::now()).unwrap();
        assert_eq!(change.previous, OrderStatus::Pending);
        assert_eq!(change.current, OrderStatus::Delivered);
        assert_eq!(o.item(cancelled).unwrap().status, Cancelled);
        assert_eq!(o.items()[1].status, Delivered);
        assert!(o.items()[1].delivered_on.is_some());
        assert!(o.delivered_at().is_some());
        assert_eq!(o.payment_status(), PaymentStatus::Paid);
    }

    #[test]
    fn test_order_cancel_cancels_live_items() {
        let mut o = order(vec![line(200, true), line(300, false)], 0, PaymentMethod::Cod);
        let change = o.update_status(OrderStatus::Cancelled, Utc::now()).unwrap();
        assert_eq!(change.current, OrderStatus::Cancelled);
        assert_eq!(change.effects.len(), 1);
        assert!(o.items().iter().all(|i| i.status == Cancelled));
        assert_eq!(o.update_status(OrderStatus::Shipped, Utc::now()).unwrap_err(), OrderError::Closed(OrderStatus::Cancelled));
    }

    #[test]
    fn test_order_update_leaves_pending_return() {
        let mut o = order(vec![line(200, true), line(300, true)], 0, PaymentMethod::Cod);
        let (first, second) = (o.items()[0].id, o.items()[1].id);
        o.update_item_status(first, Delivered, None, Utc::now()).unwrap();
        o.update_item_status(first, ReturnRequested, Some("wrong colour".into()), Utc::now()).unwrap();

        o.update_status(OrderStatus::Delivered, Utc::now()).unwrap();
        assert_eq!(o.item(first).unwrap().status, ReturnRequested);
        assert_eq!(o.item(second).unwrap().status, Delivered);
        let resolution = o.resolve_return(first, false, Utc::now()).unwrap();
        assert_eq!(resolution.item_status, Delivered);
    }

    #[test]
    fn test_order_update_rejects_return_targets() {
        let mut o = order(vec![line(200, true)], 0, PaymentMethod::Cod);
        assert!(o.update_status(OrderStatus::Returned, Utc::now()).is_err());
    }

    #[test]
    fn test_return_refund_takes_coupon_share() {
        let mut o = order(vec![line(100, true), line(300, true)], 40, PaymentMethod::Wallet);
        let first = o.items()[0].id;
        o.update_status(OrderStatus::Delivered, Utc::now()).unwrap();
        o.update_item_status(first, ReturnRequested, Some("too small".into()), Utc::now()).unwrap();
        assert_eq!(o.status(), OrderStatus::ReturnRequest);

        let resolution = o.resolve_return(first, true, Utc::now()).unwrap();
        assert_eq!(resolution.refund, Decimal::from(90));
        assert_eq!(resolution.item_status, Returned);
        assert_eq!(resolution.order_status, OrderStatus::Delivered);
        assert_eq!(resolution.effects.len(), 2);
        assert_eq!(o.payment_status(), PaymentStatus::Paid);

        let again = o.resolve_return(first, true, Utc::now()).unwrap_err();
        assert!(matches!(again, OrderError::ReturnNotRequested { status: Returned, .. }));
    }

    #[test]
    fn test_reject_return_restores_delivered() {
        let mut o = order(vec![line(100, true)], 0, PaymentMethod::Cod);
        let id = o.items()[0].id;
        o.update_item_status(id, Delivered, None, Utc::now()).unwrap();
        o.update_item_status(id, ReturnRequested, None, Utc::now()).unwrap();
        assert!(matches!(
            o.update_item_status(id, Cancelled, None, Utc::now()),
            Err(OrderError::ReturnPending(_))
        ));
        let resolution = o.resolve_return(id, false, Utc::now()).unwrap();
        assert_eq!(resolution.item_status, Delivered);
        assert_eq!(resolution.order_status, OrderStatus::Delivered);
        assert!(resolution.effects.is_empty());
    }

    #[test]
    fn test_history_is_append_only() {
        let mut o = order(vec![line(100, true)], 0, PaymentMethod::Cod);
        let before = o.status_history().to_vec();
        o.update_status(OrderStatus::Shipped, Utc::now()).unwrap();
        assert_eq!(&o.status_history()[..before.len()], before.as_slice());
        assert_eq!(o.status_history().len(), before.len() + 1);
    }

    #[test]
    fn test_document_round_trips_through_json() {
        let o = order(vec![line(100, true)], 0, PaymentMethod::Cod);
        let json = serde_json::to_value(&o).unwrap();
        assert_eq!(json["paymentMethod"], "COD");
        let back: Order = serde_json::from_value(json).unwrap();
        assert_eq!(back.id(), o.id());
        assert_eq!(back.items(), o.items());
    }
}
