//! Wardrobe Commerce - apparel storefront order service

use std::sync::Arc;

use anyhow::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use wardrobe_commerce::api::{router, AppState};
use wardrobe_commerce::config::Config;
use wardrobe_commerce::services::{EventPublisher, PaymentGateway, RazorpayClient, Services};
use wardrobe_commerce::store::{memory::MemoryStore, postgres::PgStore, Stores};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;

    let stores = match &config.database_url {
        Some(url) => Stores::from_backend(Arc::new(PgStore::connect(url, 10).await?)),
        None => {
            tracing::warn!("DATABASE_URL not set, using the in-memory store");
            Stores::from_backend(Arc::new(MemoryStore::new()))
        }
    };

    let nats = match &config.nats_url {
        Some(url) => match async_nats::connect(url.as_str()).await {
            Ok(client) => Some(client),
            Err(e) => {
                tracing::warn!(error = %e, "NATS unavailable, domain events will not be published");
                None
            }
        },
        None => None,
    };

    let gateway = config.razorpay.clone().map(|rp| {
        Arc::new(RazorpayClient::new(rp, config.currency.clone())) as Arc<dyn PaymentGateway>
    });
    if gateway.is_none() {
        tracing::info!("Razorpay keys not set, online payments disabled");
    }

    let services = Services::new(stores, &config, gateway, EventPublisher::new(nats));
    let app = router(AppState { services, currency: config.currency.clone() });

    tracing::info!("Wardrobe Commerce listening on 0.0.0.0:{}", config.port);
    axum::serve(tokio::net::TcpListener::bind(("0.0.0.0", config.port)).await?, app).await?;
    Ok(())
}
