//! Cart pricing.
//!
//! Every caller that shows or charges a total (checkout, coupon apply and
//! remove, order placement) goes through [`quote`], so the displayed and
//! charged amounts cannot drift apart.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::value_objects::{non_negative, round2, Quantity};

/// Fees applied on top of the item prices.
#[derive(Clone, Debug, PartialEq)]
pub struct PricingPolicy {
    pub platform_fee: Decimal,
    pub shipping_fee: Decimal,
    /// Shipping is free when the base item total is strictly above this.
    pub free_shipping_above: Decimal,
}

impl Default for PricingPolicy {
    fn default() -> Self {
        Self {
            platform_fee: Decimal::from(10),
            shipping_fee: Decimal::from(30),
            free_shipping_above: Decimal::from(599),
        }
    }
}

impl PricingPolicy {
    pub fn shipping_for(&self, total_item_price: Decimal) -> Decimal {
        if total_item_price > self.free_shipping_above { Decimal::ZERO } else { self.shipping_fee }
    }
}

/// A cart line with its prices resolved (variant price if present, else product price).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PricedLine {
    pub product_id: Uuid,
    pub variant_id: Option<Uuid>,
    pub product_name: String,
    pub base_price: Decimal,
    pub sale_price: Decimal,
    pub quantity: Quantity,
}

impl PricedLine {
    pub fn base_total(&self) -> Decimal { self.base_price * self.quantity.as_decimal() }
    pub fn sale_total(&self) -> Decimal { self.sale_price * self.quantity.as_decimal() }

    /// Markdown on this line; zero unless the sale price is below the base price.
    pub fn discount(&self) -> Decimal {
        if self.base_price > self.sale_price {
            (self.base_price - self.sale_price) * self.quantity.as_decimal()
        } else {
            Decimal::ZERO
        }
    }
}

/// Full pricing breakdown for a set of lines.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
    pub lines: Vec<PricedLine>,
    pub total_item_price: Decimal,
    pub item_discount: Decimal,
    pub coupon_discount: Decimal,
    pub platform_fee: Decimal,
    pub shipping_fee: Decimal,
    pub final_amount: Decimal,
}

impl Quote {
    pub fn totals(&self) -> Totals {
        Totals {
            total_item_price: self.total_item_price,
            item_discount: self.item_discount,
            platform_fee: self.platform_fee,
            shipping_fee: self.shipping_fee,
        }
    }

    /// Same lines and fees, different coupon discount.
    pub fn with_coupon_discount(&self, coupon_discount: Decimal) -> Quote {
        let mut quote = self.clone();
        quote.coupon_discount = round2(non_negative(coupon_discount));
        quote.final_amount = self.totals().final_amount(quote.coupon_discount);
        quote
    }
}

/// Order-level figures of a quote, without the lines. Coupon checks work
/// on these so a bare snapshot and a full quote price identically.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Totals {
    pub total_item_price: Decimal,
    pub item_discount: Decimal,
    pub platform_fee: Decimal,
    pub shipping_fee: Decimal,
}

impl Totals {
    pub fn subtotal_after_item_discount(&self) -> Decimal { self.total_item_price - self.item_discount }

    pub fn grand_total_before_coupon(&self) -> Decimal { self.final_amount(Decimal::ZERO) }

    /// Clamped at zero, rounded to 2 places.
    pub fn final_amount(&self, coupon_discount: Decimal) -> Decimal {
        round2(non_negative(
            self.total_item_price - self.item_discount - coupon_discount + self.platform_fee + self.shipping_fee,
        ))
    }
}

/// Price a set of lines. Pure: no lookups, no side effects.
pub fn quote(lines: Vec<PricedLine>, coupon_discount: Decimal, policy: &PricingPolicy) -> Quote {
    let totals = Totals {
        total_item_price: lines.iter().map(PricedLine::base_total).sum(),
        item_discount: lines.iter().map(PricedLine::discount).sum(),
        platform_fee: policy.platform_fee,
        shipping_fee: Decimal::ZERO,
    };
    let totals = Totals { shipping_fee: policy.shipping_for(totals.total_item_price), ..totals };
    let coupon_discount = round2(non_negative(coupon_discount));

    Quote {
        lines,
        total_item_price: totals.total_item_price,
        item_discount: totals.item_discount,
        coupon_discount,
        platform_fee: totals.platform_fee,
        shipping_fee: totals.shipping_fee,
        final_amount: totals.final_amount(coupon_discount),
    }
}
