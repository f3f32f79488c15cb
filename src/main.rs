//! cart-gateway server entry point.
//!
//! Wires the catalog, storage, identity and cart services together and
//! starts the Axum HTTP server.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use chrono::Utc;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::EnvFilter;

use cart_gateway::api;
use cart_gateway::app_state::AppState;
use cart_gateway::catalog::{
    InMemoryCatalog, InMemoryReservations, PostgresReservations, ProductCatalog,
    StockReservations,
};
use cart_gateway::config::CartConfig;
use cart_gateway::identity::{CookieSettings, IdentityResolver};
use cart_gateway::persistence::{
    CachedCartStore, CartCache, CartStore, InMemoryCartCache, MemoryCartStore, PostgresCartStore,
};
use cart_gateway::pricing::{CatalogPricing, PricingEngine};
use cart_gateway::service::{CartProjector, CartService};
use cart_gateway::session::SessionManager;
use cart_gateway::validation::{Extensions, ItemDataLimit, ValidationPipeline};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = CartConfig::from_env().map_err(|e| anyhow::anyhow!(e.to_string()))?;

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if config.log_json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
    tracing::info!(addr = %config.listen_addr, "starting cart-gateway");
    if config.ephemeral_secret {
        tracing::warn!("CART_SECRET not set, using an ephemeral signing secret");
    }

    // Catalog
    let catalog: Arc<dyn ProductCatalog> = match &config.catalog_path {
        Some(path) => {
            let catalog = InMemoryCatalog::from_json_file(path)
                .with_context(|| format!("loading catalog from {}", path.display()))?;
            tracing::info!(products = catalog.len(), path = %path.display(), "catalog loaded");
            Arc::new(catalog)
        }
        None => {
            tracing::warn!("CATALOG_PATH not set, starting with an empty catalog");
            Arc::new(InMemoryCatalog::default())
        }
    };

    // Storage
    let (store, reservations): (Arc<dyn CartStore>, Arc<dyn StockReservations>) =
        if config.persistence_enabled {
            let pool = PgPoolOptions::new()
                .max_connections(config.database_max_connections)
                .min_connections(config.database_min_connections)
                .acquire_timeout(Duration::from_secs(config.database_connect_timeout_secs))
                .connect(&config.database_url)
                .await
                .context("connecting to PostgreSQL")?;
            sqlx::migrate!("./migrations")
                .run(&pool)
                .await
                .context("running migrations")?;
            tracing::info!("database connected, migrations applied");
            (
                Arc::new(PostgresCartStore::new(pool.clone())),
                Arc::new(PostgresReservations::new(pool)),
            )
        } else {
            tracing::warn!("persistence disabled, carts are kept in process memory");
            (
                Arc::new(MemoryCartStore::new()),
                Arc::new(InMemoryReservations::new()),
            )
        };
    let cache: Option<Arc<dyn CartCache>> = if config.cache_enabled {
        Some(Arc::new(InMemoryCartCache::new()))
    } else {
        None
    };
    let store = CachedCartStore::new(store, cache);

    // Build service layer
    let extensions =
        Extensions::new().with(Arc::new(ItemDataLimit::new(config.max_item_data_entries)));
    let pipeline = ValidationPipeline::new(
        Arc::clone(&catalog),
        reservations,
        extensions.clone(),
    );
    let pricing: Arc<dyn PricingEngine> = Arc::new(CatalogPricing::new(
        Arc::clone(&catalog),
        config.tax_rate,
        config.currency_decimals,
    ));
    let carts = Arc::new(CartService::new(pipeline, pricing));

    let policy = config.expiry_policy();
    let resolver = Arc::new(IdentityResolver::new(
        config.secret.as_bytes(),
        CookieSettings {
            name: config.cookie_name.clone(),
            secure: config.cookie_secure,
        },
        policy,
    ));
    let sessions = Arc::new(SessionManager::new(
        store,
        resolver,
        policy,
        config.cart_source.clone(),
        extensions,
    ));
    let projector = Arc::new(CartProjector::new(
        catalog,
        config.currency.clone(),
        config.currency_decimals,
    ));

    // Expired cart sweeper
    if config.cart_sweep_interval_secs > 0 {
        let sessions = Arc::clone(&sessions);
        let period = Duration::from_secs(config.cart_sweep_interval_secs);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                ticker.tick().await;
                match sessions.sweep(Utc::now().timestamp()).await {
                    Ok(0) => {}
                    Ok(removed) => tracing::info!(removed, "expired carts swept"),
                    Err(e) => tracing::warn!(error = %e, "cart sweep failed"),
                }
            }
        });
    }

    // Build application state
    let app_state = AppState {
        sessions,
        carts,
        projector,
    };

    // Start server
    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;
    tracing::info!(addr = %config.listen_addr, "server listening");

    axum::serve(listener, api::build_app(app_state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for shutdown signal");
    }
}
