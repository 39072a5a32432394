//! Application State

use std::sync::Arc;

use lightbox_payments::{CheckoutConfig, OrderStore, StripeClient};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Order document store, constructed once at startup and injected here
    pub orders: Arc<dyn OrderStore>,

    /// Stripe client (optional - None if not configured)
    pub stripe: Option<Arc<StripeClient>>,

    /// Redirect targets and line-item defaults for session creation
    pub checkout: CheckoutConfig,
}
