//! Coupon validator and coupon administration.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::aggregates::{Coupon, DiscountType};
use crate::domain::value_objects::CouponCode;
use crate::pricing::Totals;
use crate::store::{CouponStore, OrderStore};
use crate::{CommerceError, Result};

/// Outcome of a successful coupon check.
#[derive(Clone, Debug, PartialEq)]
pub struct CouponQuote {
    pub code: CouponCode,
    pub discount: Decimal,
    pub grand_total: Decimal,
}

#[derive(Clone, Debug)]
pub struct NewCoupon {
    pub code: String,
    pub discount_type: DiscountType,
    pub discount_value: Decimal,
    pub min_purchase: Decimal,
    pub expiry_date: DateTime<Utc>,
}

#[derive(Clone)]
pub struct CouponValidator {
    coupons: Arc<dyn CouponStore>,
    orders: Arc<dyn OrderStore>,
}

impl CouponValidator {
    pub fn new(coupons: Arc<dyn CouponStore>, orders: Arc<dyn OrderStore>) -> Self { Self { coupons, orders } }

    /// Check `code` for `user_id` against a pricing snapshot. Checks run in
    /// a fixed order and the first failure is returned.
    #[tracing::instrument(skip(self, totals, now))]
    pub async fn validate(&self, user_id: Uuid, code: &str, totals: &Totals, now: DateTime<Utc>) -> Result<CouponQuote> {
        let invalid = || CommerceError::NotFound("Invalid coupon code".into());
        let code = CouponCode::new(code).map_err(|_| invalid())?;
        let coupon = self.coupons.coupon(&code).await?.filter(|c| c.is_active).ok_or_else(invalid)?;

        if coupon.is_expired(now) {
            return Err(CommerceError::Validation("Coupon has expired".into()));
        }
        if self.orders.coupon_used(user_id, &code).await? {
            return Err(CommerceError::Conflict("You have already used this coupon".into()));
        }
        if totals.subtotal_after_item_discount() < coupon.min_purchase {
            return Err(CommerceError::Validation(format!(
                "Minimum purchase of {} required for this coupon",
                coupon.min_purchase
            )));
        }

        let discount = coupon.discount_for(totals.grand_total_before_coupon());
        Ok(CouponQuote { code, discount, grand_total: totals.final_amount(discount) })
    }

    pub async fn create(&self, new: NewCoupon) -> Result<Coupon> {
        let coupon = Coupon::new(
            CouponCode::new(new.code)?,
            new.discount_type,
            new.discount_value,
            new.min_purchase,
            new.expiry_date,
        )?;
        self.coupons.insert_coupon(&coupon).await?;
        tracing::info!(code = %coupon.code, "coupon created");
        Ok(coupon)
    }

    pub async fn list(&self) -> Result<Vec<Coupon>> { Ok(self.coupons.list_coupons().await?) }

    pub async fn set_active(&self, code: &str, active: bool) -> Result<()> {
        let code = CouponCode::new(code)?;
        self.coupons.set_coupon_active(&code, active).await?;
        tracing::info!(%code, active, "coupon availability changed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::fixtures::Shop;
    use chrono::Duration;

    fn totals(subtotal: i64, item_discount: i64) -> Totals {
        Totals {
            total_item_price: Decimal::from(subtotal),
            item_discount: Decimal::from(item_discount),
            platform_fee: Decimal::from(10),
            shipping_fee: Decimal::from(30),
        }
    }

    async fn seed(shop: &Shop, code: &str, kind: DiscountType, value: i64, min: i64, expiry: DateTime<Utc>) {
        shop.services
            .coupons
            .create(NewCoupon {
                code: code.into(),
                discount_type: kind,
                discount_value: Decimal::from(value),
                min_purchase: Decimal::from(min),
                expiry_date: expiry,
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_percentage_applies_to_grand_total() {
        let shop = Shop::new();
        let tomorrow = Utc::now() + Duration::days(1);
        seed(&shop, "FEST10", DiscountType::Percentage, 10, 100, tomorrow).await;

        // grand total before coupon: 500 - 50 + 10 + 30 = 490
        let q = shop.services.coupons.validate(shop.user, " fest10 ", &totals(500, 50), Utc::now()).await.unwrap();
        assert_eq!(q.code.as_str(), "FEST10");
        assert_eq!(q.discount, Decimal::from(49));
        assert_eq!(q.grand_total, Decimal::from(441));
    }

    #[tokio::test]
    async fn test_failure_order() {
        let shop = Shop::new();
        let coupons = &shop.services.coupons;
        let now = Utc::now();
        seed(&shop, "OLD", DiscountType::Fixed, 50, 10_000, now - Duration::days(1)).await;
        seed(&shop, "BIG", DiscountType::Fixed, 50, 1000, now + Duration::days(1)).await;
        seed(&shop, "OFF", DiscountType::Fixed, 50, 0, now + Duration::days(1)).await;
        coupons.set_active("off", false).await.unwrap();

        let t = totals(500, 0);
        assert!(matches!(coupons.validate(shop.user, "NOPE", &t, now).await, Err(CommerceError::NotFound(_))));
        assert!(matches!(coupons.validate(shop.user, "SAVE 10", &t, now).await, Err(CommerceError::NotFound(_))));
        assert!(matches!(coupons.validate(shop.user, "  ", &t, now).await, Err(CommerceError::NotFound(_))));
        assert!(matches!(coupons.validate(shop.user, "OFF", &t, now).await, Err(CommerceError::NotFound(_))));
        // expiry is checked before minimum purchase
        assert!(
            matches!(coupons.validate(shop.user, "OLD", &t, now).await, Err(CommerceError::Validation(m)) if m.contains("expired"))
        );
        assert!(
            matches!(coupons.validate(shop.user, "BIG", &t, now).await, Err(CommerceError::Validation(m)) if m.contains("Minimum"))
        );
    }

    #[tokio::test]
    async fn test_duplicate_code_conflicts() {
        let shop = Shop::new();
        let tomorrow = Utc::now() + Duration::days(1);
        seed(&shop, "WELCOME", DiscountType::Fixed, 100, 0, tomorrow).await;
        let err = shop
            .services
            .coupons
            .create(NewCoupon {
                code: "welcome".into(),
                discount_type: DiscountType::Fixed,
                discount_value: Decimal::from(5),
                min_purchase: Decimal::ZERO,
                expiry_date: tomorrow,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, CommerceError::Conflict(_)));
        assert_eq!(shop.services.coupons.list().await.unwrap().len(), 1);
    }
}
