//! Cart Aggregate

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::value_objects::Quantity;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cart {
    user_id: Uuid,
    items: Vec<CartItem>,
    updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    pub product_id: Uuid,
    pub variant_id: Option<Uuid>,
    pub quantity: Quantity,
}

impl Cart {
    pub fn new(user_id: Uuid) -> Self {
        Self { user_id, items: vec![], updated_at: Utc::now() }
    }

    pub fn user_id(&self) -> Uuid { self.user_id }
    pub fn items(&self) -> &[CartItem] { &self.items }
    pub fn is_empty(&self) -> bool { self.items.is_empty() }

    /// Adds to an existing line for the same product and variant, otherwise appends.
    pub fn add_item(&mut self, item: CartItem) {
        if let Some(existing) = self.items.iter_mut().find(|i| i.product_id == item.product_id && i.variant_id == item.variant_id) {
            existing.quantity = existing.quantity.add(item.quantity);
        } else {
            self.items.push(item);
        }
        self.updated_at = Utc::now();
    }

    /// Quantity already in the cart for a product/variant pair.
    pub fn quantity_of(&self, product_id: Uuid, variant_id: Option<Uuid>) -> u32 {
        self.items
            .iter()
            .find(|i| i.product_id == product_id && i.variant_id == variant_id)
            .map_or(0, |i| i.quantity.value())
    }
}
