//! Stripe Checkout Integration
//!
//! Implements the hosted-checkout half of the payment flow: load the order
//! by tracking id, validate its state, derive the amount from its stored
//! price, claim the order against duplicate submissions and create the
//! provider session.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use stripe::{
    CheckoutSession as StripeCheckoutSession, CheckoutSessionMode, Client, CreateCheckoutSession,
    CreateCheckoutSessionLineItems, CreateCheckoutSessionLineItemsPriceData,
    CreateCheckoutSessionLineItemsPriceDataProductData, CreateCheckoutSessionPaymentMethodTypes,
    Currency,
};

use crate::amount::parse_price_minor_units;
use crate::error::{PaymentError, Result};
use crate::order::{ClaimOutcome, Order, OrderId, OrderStatus, OrderStore};

/// Stripe client wrapper
pub struct StripeClient {
    client: Client,
    webhook_secret: String,
}

impl StripeClient {
    /// Create a new Stripe client
    pub fn new(secret_key: &str, webhook_secret: &str) -> Self {
        Self {
            client: Client::new(secret_key),
            webhook_secret: webhook_secret.to_string(),
        }
    }

    /// Create from environment variables
    pub fn from_env() -> Result<Self> {
        let secret_key = std::env::var("STRIPE_SECRET_KEY")
            .map_err(|_| PaymentError::Config("STRIPE_SECRET_KEY not set".into()))?;
        let webhook_secret = std::env::var("STRIPE_WEBHOOK_SECRET")
            .map_err(|_| PaymentError::Config("STRIPE_WEBHOOK_SECRET not set".into()))?;

        Ok(Self::new(&secret_key, &webhook_secret))
    }

    /// Get the webhook secret
    pub fn webhook_secret(&self) -> &str {
        &self.webhook_secret
    }

    /// Get the underlying Stripe client
    pub fn inner(&self) -> &Client {
        &self.client
    }
}

/// Hosted-checkout provider contract
///
/// [`StripeClient`] is the production implementation; tests drive the flow
/// with a mock.
#[async_trait]
pub trait CheckoutProvider: Send + Sync {
    /// Create a hosted payment session and return the redirect target
    async fn create_session(&self, request: &SessionRequest) -> Result<CheckoutSession>;
}

/// Single-line-item session request assembled from a validated order
#[derive(Clone, Debug)]
pub struct SessionRequest {
    pub tracking_id: String,
    pub order_id: OrderId,
    pub product_name: String,
    pub description: String,
    pub unit_amount: i64,
    pub quantity: u64,
    pub customer_email: Option<String>,
    pub success_url: String,
    pub cancel_url: String,
}

#[async_trait]
impl CheckoutProvider for StripeClient {
    async fn create_session(&self, request: &SessionRequest) -> Result<CheckoutSession> {
        let mut params = CreateCheckoutSession::new();
        params.mode = Some(CheckoutSessionMode::Payment);
        params.payment_method_types = Some(vec![CreateCheckoutSessionPaymentMethodTypes::Card]);
        params.customer_email = request.customer_email.as_deref();
        params.success_url = Some(&request.success_url);
        params.cancel_url = Some(&request.cancel_url);

        // Correlation for the webhook
        let mut metadata = std::collections::HashMap::new();
        metadata.insert("trackingId".to_string(), request.tracking_id.clone());
        metadata.insert("orderId".to_string(), request.order_id.to_string());
        params.metadata = Some(metadata);

        params.line_items = Some(vec![CreateCheckoutSessionLineItems {
            quantity: Some(request.quantity),
            price_data: Some(CreateCheckoutSessionLineItemsPriceData {
                currency: Currency::EUR,
                unit_amount: Some(request.unit_amount),
                product_data: Some(CreateCheckoutSessionLineItemsPriceDataProductData {
                    name: request.product_name.clone(),
                    description: Some(request.description.clone()),
                    ..Default::default()
                }),
                ..Default::default()
            }),
            ..Default::default()
        }]);

        let session = StripeCheckoutSession::create(&self.client, params)
            .await
            .map_err(|e| PaymentError::Stripe(e.to_string()))?;

        let url = session
            .url
            .ok_or_else(|| PaymentError::Stripe("no checkout URL returned".into()))?;

        Ok(CheckoutSession {
            id: session.id.to_string(),
            url,
        })
    }
}

/// Checkout configuration
#[derive(Clone, Debug)]
pub struct CheckoutConfig {
    /// Base URL of the storefront, used to build the redirect targets
    pub public_base_url: String,

    /// Line-item name when the order carries none
    pub fallback_product_name: String,
}

impl CheckoutConfig {
    /// Create from environment variables
    pub fn from_env() -> Result<Self> {
        let public_base_url = std::env::var("PUBLIC_BASE_URL")
            .map_err(|_| PaymentError::Config("PUBLIC_BASE_URL not set".into()))?;

        Ok(Self {
            public_base_url,
            fallback_product_name: "Custom lightbox".into(),
        })
    }
}

/// Result of creating a checkout session
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CheckoutSession {
    /// Stripe session id
    pub id: String,

    /// Hosted payment page to redirect the customer to
    pub url: String,
}

/// Creates hosted checkout sessions for validated orders
///
/// All checks run against the stored order; the only client-supplied input
/// is the tracking id, so the charged amount cannot be tampered with.
pub struct SessionInitiator {
    store: Arc<dyn OrderStore>,
    provider: Arc<dyn CheckoutProvider>,
    config: CheckoutConfig,
}

impl SessionInitiator {
    pub fn new(
        store: Arc<dyn OrderStore>,
        provider: Arc<dyn CheckoutProvider>,
        config: CheckoutConfig,
    ) -> Self {
        Self {
            store,
            provider,
            config,
        }
    }

    /// Create a hosted checkout session for the order with this tracking id
    pub async fn create_session(&self, tracking_id: &str) -> Result<CheckoutSession> {
        let tracking_id = tracking_id.trim();
        if tracking_id.is_empty() {
            return Err(PaymentError::InvalidRequest("trackingId required".into()));
        }

        let (order_id, order) = self
            .store
            .find_by_tracking_id(tracking_id)
            .await?
            .ok_or_else(|| PaymentError::NotFound("order not found".into()))?;

        let amount = validate_order(&order)?;

        // The claim re-checks the paid state under the store's write guard,
        // so two concurrent submissions cannot both reach the provider.
        match self.store.claim_session(&order_id).await? {
            ClaimOutcome::Claimed => {}
            ClaimOutcome::AlreadyPaid => {
                return Err(PaymentError::Conflict("order already paid".into()));
            }
            ClaimOutcome::InProgress => {
                return Err(PaymentError::Conflict("checkout already in progress".into()));
            }
        }

        let request = self.session_request(tracking_id, &order_id, &order, amount);
        let result = self.provider.create_session(&request).await;

        // The claim covers only the check-then-create window. It is
        // released on both outcomes: an abandoned or expired hosted page
        // must not block the order, and `mark_paid` refuses re-checkout
        // permanently once payment lands. Failures are surfaced to the
        // caller for a manual retry; no retry happens here.
        if let Err(release_err) = self.store.release_session(&order_id).await {
            tracing::error!(
                %order_id,
                error = %release_err,
                "failed to release checkout claim"
            );
        }

        let session = result?;

        tracing::info!(
            %order_id,
            tracking_id,
            amount,
            session_id = %session.id,
            "created checkout session"
        );

        Ok(session)
    }

    fn session_request(
        &self,
        tracking_id: &str,
        order_id: &OrderId,
        order: &Order,
        amount: i64,
    ) -> SessionRequest {
        SessionRequest {
            tracking_id: tracking_id.to_string(),
            order_id: order_id.clone(),
            product_name: order
                .product_name
                .clone()
                .unwrap_or_else(|| self.config.fallback_product_name.clone()),
            description: format!("Order no. {tracking_id}"),
            unit_amount: amount,
            // An explicit zero quantity is as unusable as a missing one.
            quantity: order.quantity.filter(|&q| q > 0).unwrap_or(1),
            customer_email: order.customer_email.clone(),
            success_url: format!(
                "{}/payment.html?id={}&status=success",
                self.config.public_base_url, tracking_id
            ),
            cancel_url: format!(
                "{}/payment.html?id={}&status=cancel",
                self.config.public_base_url, tracking_id
            ),
        }
    }
}

/// Validate an order for checkout and return the amount in minor units.
///
/// Checks run in a fixed order so each rejection is a distinct failure:
/// paid orders win over unvalidated ones.
fn validate_order(order: &Order) -> Result<i64> {
    if order.is_paid() {
        return Err(PaymentError::Conflict("order already paid".into()));
    }

    if order.status != OrderStatus::Validated {
        return Err(PaymentError::Conflict("order not validated".into()));
    }

    let amount = parse_price_minor_units(&order.price);
    if amount <= 0 {
        return Err(PaymentError::InvalidRequest("invalid amount".into()));
    }

    Ok(amount)
}
