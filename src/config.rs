//! Service configuration, read from the environment.

use rust_decimal::Decimal;
use std::str::FromStr;

use crate::pricing::PricingPolicy;

#[derive(Debug, thiserror::Error)]
#[error("invalid value for {name}: '{value}'")]
pub struct ConfigError {
    pub name: &'static str,
    pub value: String,
}

/// Razorpay API credentials.
#[derive(Debug, Clone)]
pub struct RazorpayConfig {
    pub key_id: String,
    pub key_secret: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP listen port
    pub port: u16,
    /// Postgres URL; the in-memory store is used when unset
    pub database_url: Option<String>,
    pub nats_url: Option<String>,
    /// Razorpay is disabled unless both key id and secret are set
    pub razorpay: Option<RazorpayConfig>,
    pub currency: String,
    pub checkout_ttl_minutes: i64,
    pub pricing: PricingPolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8083,
            database_url: None,
            nats_url: None,
            razorpay: None,
            currency: "INR".into(),
            checkout_ttl_minutes: 30,
            pricing: PricingPolicy::default(),
        }
    }
}

fn optional(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|s| !s.trim().is_empty())
}

fn parsed<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match optional(name) {
        Some(value) => value.trim().parse().map_err(|_| ConfigError { name, value }),
        None => Ok(default),
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let razorpay = match (optional("RAZORPAY_KEY_ID"), optional("RAZORPAY_KEY_SECRET")) {
            (Some(key_id), Some(key_secret)) => Some(RazorpayConfig { key_id, key_secret }),
            _ => None,
        };
        let pricing = PricingPolicy {
            platform_fee: parsed("PLATFORM_FEE", defaults.pricing.platform_fee)?,
            shipping_fee: parsed("SHIPPING_FEE", defaults.pricing.shipping_fee)?,
            free_shipping_above: parsed::<Decimal>("FREE_SHIPPING_ABOVE", defaults.pricing.free_shipping_above)?,
        };

        Ok(Self {
            port: parsed("PORT", defaults.port)?,
            database_url: optional("DATABASE_URL"),
            nats_url: optional("NATS_URL"),
            razorpay,
            currency: optional("CURRENCY").unwrap_or(defaults.currency),
            checkout_ttl_minutes: parsed("CHECKOUT_TTL_MINUTES", defaults.checkout_ttl_minutes)?,
            pricing,
        })
    }

    pub fn checkout_ttl(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.checkout_ttl_minutes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_storefront_policy() {
        let c = Config::default();
        assert_eq!(c.port, 8083);
        assert_eq!(c.currency, "INR");
        assert_eq!(c.pricing.free_shipping_above, Decimal::from(599));
        assert_eq!(c.checkout_ttl(), chrono::Duration::minutes(30));
    }

    #[test]
    fn test_bad_number_reports_variable() {
        std::env::set_var("WARDROBE_TEST_PORT", "eighty");
        let err = parsed::<u16>("WARDROBE_TEST_PORT", 1).unwrap_err();
        assert_eq!(err.name, "WARDROBE_TEST_PORT");
        assert_eq!(err.value, "eighty");
        std::env::remove_var("WARDROBE_TEST_PORT");
    }
}
