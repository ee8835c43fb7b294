//! Inventory ledger: per-variant stock moves.

use std::sync::Arc;
use uuid::Uuid;

use crate::domain::value_objects::Quantity;
use crate::store::CatalogStore;
use crate::{CommerceError, Result};

#[derive(Clone)]
pub struct InventoryLedger {
    catalog: Arc<dyn CatalogStore>,
}

fn delta(quantity: Quantity) -> Result<i32> {
    i32::try_from(quantity.value())
        .map_err(|_| CommerceError::Validation(format!("quantity {} is too large", quantity.value())))
}

impl InventoryLedger {
    pub fn new(catalog: Arc<dyn CatalogStore>) -> Self { Self { catalog } }

    /// Take stock for an ordered line. Fails with `Conflict` instead of
    /// going below zero. Returns the remaining stock.
    #[tracing::instrument(skip(self, quantity), fields(quantity = quantity.value()))]
    pub async fn decrement(&self, variant_id: Uuid, quantity: Quantity) -> Result<i32> {
        let stock = self.catalog.adjust_stock(variant_id, -delta(quantity)?).await?;
        tracing::debug!(stock, "stock taken");
        Ok(stock)
    }

    /// Put stock back after a cancellation or an accepted return.
    #[tracing::instrument(skip(self, quantity), fields(quantity = quantity.value()))]
    pub async fn increment(&self, variant_id: Uuid, quantity: Quantity) -> Result<i32> {
        let stock = self.catalog.adjust_stock(variant_id, delta(quantity)?).await?;
        tracing::debug!(stock, "stock restored");
        Ok(stock)
    }
}

#[cfg(test)]
mod tests {
    use crate::services::fixtures::Shop;
    use crate::domain::value_objects::Quantity;
    use crate::CommerceError;
    use uuid::Uuid;

    #[tokio::test]
    async fn test_decrement_floors_at_zero() {
        let shop = Shop::new();
        let (_, variant) = shop.product(500, 500, 2);
        let ledger = &shop.services.inventory;

        assert_eq!(ledger.decrement(variant, Quantity::new(2).unwrap()).await.unwrap(), 0);
        let err = ledger.decrement(variant, Quantity::new(1).unwrap()).await.unwrap_err();
        assert!(matches!(err, CommerceError::Conflict(_)));
        assert_eq!(ledger.increment(variant, Quantity::new(3).unwrap()).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_unknown_variant() {
        let shop = Shop::new();
        let err = shop.services.inventory.increment(Uuid::new_v4(), Quantity::new(1).unwrap()).await.unwrap_err();
        assert!(matches!(err, CommerceError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_concurrent_order_and_cancel_both_apply() {
        let shop = Shop::new();
        let (_, variant) = shop.product(500, 500, 1);
        let one = Quantity::new(1).unwrap();

        let take = {
            let ledger = shop.services.inventory.clone();
            tokio::spawn(async move { ledger.decrement(variant, one).await })
        };
        let give = {
            let ledger = shop.services.inventory.clone();
            tokio::spawn(async move { ledger.increment(variant, one).await })
        };
        take.await.unwrap().unwrap();
        give.await.unwrap().unwrap();
        assert_eq!(shop.stock(variant).await, 1);
    }
}
