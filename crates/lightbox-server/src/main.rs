//! lightbox-shop HTTP Server
//!
//! Axum-based server exposing the two endpoints of the order-to-payment
//! flow: checkout session creation and the Stripe payment webhook.

mod handlers;
mod state;

use std::sync::Arc;

use axum::{
    Router,
    http::{HeaderValue, Method, header},
    routing::{get, post},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use lightbox_payments::{CheckoutConfig, MemoryOrderStore, OrderStore, StripeClient};

use crate::handlers::{create_checkout, health_check, stripe_webhook};
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load environment
    dotenvy::dotenv().ok();

    // Development store; a document-database client implementing
    // `OrderStore` slots in here for production.
    let orders: Arc<dyn OrderStore> = Arc::new(MemoryOrderStore::new());

    let stripe = StripeClient::from_env().ok();
    if stripe.is_some() {
        tracing::info!("✓ Stripe configured");
    } else {
        tracing::warn!("⚠ Stripe not configured - payments disabled");
        tracing::warn!("  Set STRIPE_SECRET_KEY and STRIPE_WEBHOOK_SECRET in .env");
    }

    let checkout = CheckoutConfig::from_env()?;

    let state = AppState {
        orders,
        stripe: stripe.map(Arc::new),
        checkout: checkout.clone(),
    };

    // Browser calls are limited to the one storefront origin; the webhook
    // is server-to-server and unaffected.
    let origin = std::env::var("ALLOWED_ORIGIN").unwrap_or_else(|_| checkout.public_base_url.clone());
    let cors = CorsLayer::new()
        .allow_origin(origin.parse::<HeaderValue>()?)
        .allow_methods([Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    // Build router; unmatched methods on these paths answer 405.
    let app = Router::new()
        .route("/health", get(health_check))
        .route("/api/checkout", post(create_checkout))
        .route("/webhook/stripe", post(stripe_webhook))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    // Start server
    let addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("lightbox-shop server running on http://{}", addr);
    tracing::info!("");
    tracing::info!("Endpoints:");
    tracing::info!("  GET  /health         - Health check");
    tracing::info!("  POST /api/checkout   - Create Stripe checkout session");
    tracing::info!("  POST /webhook/stripe - Stripe payment webhook");
    tracing::info!("");

    axum::serve(listener, app).await?;

    Ok(())
}
