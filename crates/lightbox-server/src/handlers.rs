//! HTTP Handlers
//!
//! Thin axum adapters over the payment core: requests are decoded, handed
//! to the transport-free flow, and the error taxonomy is mapped onto HTTP
//! status codes.

use axum::{
    Json,
    extract::State,
    http::{HeaderMap, StatusCode},
};
use serde::{Deserialize, Serialize};

use lightbox_payments::{PaymentError, SessionInitiator, WebhookHandler};

use crate::state::AppState;

// ============================================================================
// Request / Response Types
// ============================================================================

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub stripe_configured: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionRequest {
    pub tracking_id: String,
}

#[derive(Debug, Serialize)]
pub struct CreateSessionResponse {
    pub url: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, Serialize)]
pub struct WebhookAck {
    pub received: bool,
}

/// Map a payment error onto the checkout endpoint's status and JSON body
fn error_response(err: &PaymentError) -> (StatusCode, Json<ErrorResponse>) {
    let status = match err {
        PaymentError::InvalidRequest(_)
        | PaymentError::Conflict(_)
        | PaymentError::WebhookSignature(_)
        | PaymentError::WebhookParse(_) => StatusCode::BAD_REQUEST,
        PaymentError::NotFound(_) => StatusCode::NOT_FOUND,
        PaymentError::Stripe(_) | PaymentError::Storage(_) | PaymentError::Config(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };

    (
        status,
        Json(ErrorResponse {
            error: err.user_message().to_string(),
        }),
    )
}

fn payments_disabled() -> (StatusCode, Json<ErrorResponse>) {
    (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(ErrorResponse {
            error: "Payments not configured".into(),
        }),
    )
}

// ============================================================================
// Handlers
// ============================================================================

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        stripe_configured: state.stripe.is_some(),
    })
}

/// Create a hosted checkout session for an order
pub async fn create_checkout(
    State(state): State<AppState>,
    Json(payload): Json<CreateSessionRequest>,
) -> Result<Json<CreateSessionResponse>, (StatusCode, Json<ErrorResponse>)> {
    let stripe = state.stripe.as_ref().ok_or_else(payments_disabled)?;

    let initiator = SessionInitiator::new(
        state.orders.clone(),
        stripe.clone(),
        state.checkout.clone(),
    );

    let session = initiator
        .create_session(&payload.tracking_id)
        .await
        .map_err(|e| {
            if e.is_retryable() {
                tracing::error!(error = %e, "checkout session creation failed");
            } else {
                tracing::warn!(
                    error = %e,
                    tracking_id = %payload.tracking_id,
                    "checkout request rejected"
                );
            }
            error_response(&e)
        })?;

    Ok(Json(CreateSessionResponse { url: session.url }))
}

/// Stripe webhook endpoint
///
/// The body must reach signature verification as the exact bytes Stripe
/// sent; any re-serialization would invalidate the signature. Non-2xx
/// responses make Stripe redeliver the event.
pub async fn stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: String,
) -> Result<Json<WebhookAck>, (StatusCode, String)> {
    let Some(stripe) = state.stripe.as_ref() else {
        return Err((
            StatusCode::SERVICE_UNAVAILABLE,
            "Stripe not configured".into(),
        ));
    };

    let signature = headers
        .get("stripe-signature")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| (StatusCode::BAD_REQUEST, "Missing Stripe signature".to_string()))?;

    let handler = WebhookHandler::new(state.orders.clone());

    let event = handler
        .parse_event(&body, signature, stripe.webhook_secret())
        .map_err(|e| {
            tracing::warn!(error = %e, "webhook signature verification failed");
            (StatusCode::BAD_REQUEST, format!("Webhook Error: {e}"))
        })?;

    handler.handle(event).await.map_err(|e| {
        tracing::error!(error = %e, "webhook processing failed");
        match e {
            // Redelivery cannot fix a malformed event; don't ask for it.
            PaymentError::WebhookParse(_) => {
                (StatusCode::BAD_REQUEST, format!("Webhook Error: {e}"))
            }
            _ => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal error".to_string(),
            ),
        }
    })?;

    Ok(Json(WebhookAck { received: true }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_taxonomy_maps_to_expected_status_codes() {
        let cases = [
            (PaymentError::InvalidRequest("x".into()), StatusCode::BAD_REQUEST),
            (PaymentError::Conflict("x".into()), StatusCode::BAD_REQUEST),
            (PaymentError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (PaymentError::Stripe("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
            (PaymentError::Storage("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];

        for (err, expected) in cases {
            let (status, _) = error_response(&err);
            assert_eq!(status, expected, "wrong status for {err}");
        }
    }

    #[test]
    fn client_errors_expose_their_message() {
        let (_, Json(body)) = error_response(&PaymentError::Conflict("order already paid".into()));
        assert_eq!(body.error, "order already paid");
    }

    #[test]
    fn upstream_errors_stay_generic() {
        let (_, Json(body)) =
            error_response(&PaymentError::Stripe("sk_live leaked detail".into()));
        assert!(!body.error.contains("sk_live"));
    }
}
