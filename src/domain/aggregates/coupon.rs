//! Coupon Aggregate

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::value_objects::{round2, CouponCode};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiscountType {
    Percentage,
    Fixed,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Coupon {
    pub code: CouponCode,
    pub discount_type: DiscountType,
    pub discount_value: Decimal,
    pub min_purchase: Decimal,
    pub expiry_date: DateTime<Utc>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl Coupon {
    pub fn new(
        code: CouponCode,
        discount_type: DiscountType,
        discount_value: Decimal,
        min_purchase: Decimal,
        expiry_date: DateTime<Utc>,
    ) -> Result<Self, CouponError> {
        if discount_value <= Decimal::ZERO {
            return Err(CouponError::InvalidValue("discount value must be positive"));
        }
        if discount_type == DiscountType::Percentage && discount_value > Decimal::ONE_HUNDRED {
            return Err(CouponError::InvalidValue("percentage discount cannot exceed 100"));
        }
        if min_purchase < Decimal::ZERO {
            return Err(CouponError::InvalidValue("minimum purchase cannot be negative"));
        }
        Ok(Self {
            code,
            discount_type,
            discount_value,
            min_purchase,
            expiry_date,
            is_active: true,
            created_at: Utc::now(),
        })
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool { self.expiry_date < now }

    /// Discount against the pre-coupon grand total.
    pub fn discount_for(&self, grand_total_before_coupon: Decimal) -> Decimal {
        match self.discount_type {
            DiscountType::Percentage => {
                round2(grand_total_before_coupon * self.discount_value / Decimal::ONE_HUNDRED)
            }
            DiscountType::Fixed => round2(self.discount_value),
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CouponError {
    #[error("invalid coupon: {0}")]
    InvalidValue(&'static str),
}
