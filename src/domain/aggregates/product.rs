//! Product Aggregate

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Minimum number of images a variant must carry.
pub const MIN_VARIANT_IMAGES: usize = 3;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProductStatus { #[default] Draft, Active, Blocked }

/// Regular price and the price actually charged.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PricePair {
    pub regular_price: Decimal,
    pub sale_price: Decimal,
}

impl PricePair {
    pub fn new(regular_price: Decimal, sale_price: Decimal) -> Result<Self, ProductError> {
        if regular_price < Decimal::ZERO || sale_price < Decimal::ZERO {
            return Err(ProductError::NegativePrice);
        }
        Ok(Self { regular_price, sale_price })
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub category_id: Option<Uuid>,
    pub price: PricePair,
    pub status: ProductStatus,
    pub created_at: DateTime<Utc>,
}

impl Product {
    pub fn create(name: impl Into<String>, price: PricePair) -> Result<Self, ProductError> {
        let name = name.into();
        if name.trim().is_empty() { return Err(ProductError::MissingName); }
        Ok(Self {
            id: Uuid::now_v7(),
            name,
            category_id: None,
            price,
            status: ProductStatus::Active,
            created_at: Utc::now(),
        })
    }

    pub fn is_purchasable(&self) -> bool { self.status == ProductStatus::Active }
}

/// A purchasable size/colour SKU of a product.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Variant {
    pub id: Uuid,
    pub product_id: Uuid,
    pub size: String,
    pub colour: String,
    pub stock: i32,
    pub price: PricePair,
    pub images: Vec<String>,
}

impl Variant {
    pub fn create(
        product_id: Uuid,
        size: impl Into<String>,
        colour: impl Into<String>,
        stock: i32,
        price: PricePair,
        images: Vec<String>,
    ) -> Result<Self, ProductError> {
        if stock < 0 { return Err(ProductError::NegativeStock); }
        if images.len() < MIN_VARIANT_IMAGES { return Err(ProductError::NotEnoughImages(images.len())); }
        Ok(Self {
            id: Uuid::now_v7(),
            product_id,
            size: size.into(),
            colour: colour.into(),
            stock,
            price,
            images,
        })
    }

    pub fn has_stock_for(&self, quantity: u32) -> bool {
        i64::from(self.stock) >= i64::from(quantity)
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ProductError {
    #[error("product name is required")]
    MissingName,
    #[error("prices cannot be negative")]
    NegativePrice,
    #[error("stock cannot be negative")]
    NegativeStock,
    #[error("a variant needs at least {MIN_VARIANT_IMAGES} images, got {0}")]
    NotEnoughImages(usize),
}
