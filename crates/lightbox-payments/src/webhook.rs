//! Stripe Webhook Handling
//!
//! Verifies event signatures over the exact raw request body and applies
//! the payment confirmation to the order store. Stripe delivers events at
//! least once and retries on any non-2xx response, which is the only retry
//! mechanism this flow relies on.

use std::sync::Arc;

use stripe::{Event, EventObject, EventType, Webhook};

use crate::error::{PaymentError, Result};
use crate::order::{OrderId, OrderStore, PaymentConfirmation};

/// Parsed webhook event
#[derive(Clone, Debug)]
pub enum WebhookEvent {
    /// Hosted checkout completed; the referenced order is to be marked paid
    CheckoutCompleted(PaymentConfirmation),

    /// Unhandled event type, acknowledged without side effects
    Other { event_type: String },
}

impl WebhookEvent {
    /// Map a verified Stripe event onto the flow's own event type
    pub fn from_event(event: &Event) -> Result<Self> {
        match event.type_ {
            EventType::CheckoutSessionCompleted => {
                let EventObject::CheckoutSession(session) = &event.data.object else {
                    return Err(PaymentError::WebhookParse(
                        "invalid checkout session data".into(),
                    ));
                };

                // The metadata was set at session creation; without it the
                // order cannot be correlated and redelivery will not help.
                let metadata = session.metadata.as_ref().ok_or_else(|| {
                    PaymentError::WebhookParse("completed session carries no metadata".into())
                })?;
                let tracking_id = metadata.get("trackingId").cloned().ok_or_else(|| {
                    PaymentError::WebhookParse("metadata missing trackingId".into())
                })?;
                let order_id = metadata
                    .get("orderId")
                    .cloned()
                    .ok_or_else(|| PaymentError::WebhookParse("metadata missing orderId".into()))?;

                Ok(Self::CheckoutCompleted(PaymentConfirmation {
                    order_id: OrderId::from_string(order_id),
                    tracking_id,
                    session_id: session.id.to_string(),
                    payment_intent: session.payment_intent.as_ref().map(|pi| pi.id().to_string()),
                }))
            }

            _ => Ok(Self::Other {
                event_type: format!("{:?}", event.type_),
            }),
        }
    }
}

/// Webhook handler
pub struct WebhookHandler {
    store: Arc<dyn OrderStore>,
}

impl WebhookHandler {
    pub fn new(store: Arc<dyn OrderStore>) -> Self {
        Self { store }
    }

    /// Verify the signature over the raw body and parse the event
    pub fn parse_event(&self, payload: &str, signature: &str, secret: &str) -> Result<Event> {
        Webhook::construct_event(payload, signature, secret)
            .map_err(|e| PaymentError::WebhookSignature(e.to_string()))
    }

    /// Process a verified event
    pub async fn handle(&self, event: Event) -> Result<WebhookEvent> {
        tracing::info!(event_type = ?event.type_, "processing Stripe webhook");

        let parsed = WebhookEvent::from_event(&event)?;
        self.apply(&parsed).await?;

        Ok(parsed)
    }

    /// Apply the event's effect to the order store
    pub async fn apply(&self, event: &WebhookEvent) -> Result<()> {
        match event {
            WebhookEvent::CheckoutCompleted(confirmation) => {
                // Unconditional set: a redelivered event lands on the same
                // end state instead of failing a transition check.
                self.store
                    .mark_paid(&confirmation.order_id, confirmation)
                    .await?;

                tracing::info!(
                    tracking_id = %confirmation.tracking_id,
                    order_id = %confirmation.order_id,
                    session_id = %confirmation.session_id,
                    "payment confirmed"
                );
            }

            WebhookEvent::Other { event_type } => {
                tracing::debug!(event_type = %event_type, "unhandled webhook event");
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::order::{MemoryOrderStore, Order, OrderStatus, PaymentStatus};

    /// Forge a `stripe-signature` header the way Stripe computes it:
    /// HMAC-SHA256 over `"{timestamp}.{payload}"` with the endpoint secret.
    fn sign(payload: &str, secret: &str, timestamp: i64) -> String {
        use hmac::{Hmac, Mac};
        use sha2::Sha256;

        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
            .expect("HMAC accepts any key size");
        mac.update(format!("{timestamp}.{payload}").as_bytes());
        format!("t={timestamp},v1={}", hex::encode(mac.finalize().into_bytes()))
    }

    fn handler_with_store() -> (WebhookHandler, Arc<MemoryOrderStore>) {
        let store = Arc::new(MemoryOrderStore::new());
        (WebhookHandler::new(store.clone()), store)
    }

    #[test]
    fn rejects_malformed_signature_header() {
        let (handler, _) = handler_with_store();

        let err = handler
            .parse_event(r#"{"id":"evt_1"}"#, "not-a-signature", "whsec_test")
            .unwrap_err();
        assert!(matches!(err, PaymentError::WebhookSignature(_)));
    }

    #[test]
    fn rejects_tampered_body() {
        let secret = "whsec_test";
        let original = r#"{"id":"evt_1","type":"checkout.session.completed"}"#;
        let tampered = r#"{"id":"evt_1","type":"checkout.session.completed","hacked":true}"#;
        let header = sign(original, secret, chrono::Utc::now().timestamp());

        let (handler, _) = handler_with_store();
        let err = handler.parse_event(tampered, &header, secret).unwrap_err();
        assert!(matches!(err, PaymentError::WebhookSignature(_)));
    }

    #[test]
    fn rejects_signature_from_wrong_secret() {
        let payload = r#"{"id":"evt_1"}"#;
        let header = sign(payload, "whsec_other", chrono::Utc::now().timestamp());

        let (handler, _) = handler_with_store();
        let err = handler.parse_event(payload, &header, "whsec_test").unwrap_err();
        assert!(matches!(err, PaymentError::WebhookSignature(_)));
    }

    #[tokio::test]
    async fn checkout_completed_marks_order_paid_once_in_effect() {
        let (handler, store) = handler_with_store();
        let id = store
            .insert(Order::new("CMD-001", OrderStatus::Validated, "25€"))
            .await
            .unwrap();

        let event = WebhookEvent::CheckoutCompleted(PaymentConfirmation {
            order_id: id.clone(),
            tracking_id: "CMD-001".into(),
            session_id: "cs_test_123".into(),
            payment_intent: Some("pi_test_123".into()),
        });

        handler.apply(&event).await.unwrap();
        let paid = store.get(&id).await.unwrap().unwrap();
        assert_eq!(paid.payment_status, PaymentStatus::Paid);
        assert_eq!(paid.stripe_session_id.as_deref(), Some("cs_test_123"));
        assert!(paid.paid_at.is_some());

        // Redelivery of the identical event must not error and must leave
        // the order in the same paid state.
        handler.apply(&event).await.unwrap();
        let redelivered = store.get(&id).await.unwrap().unwrap();
        assert_eq!(redelivered.payment_status, PaymentStatus::Paid);
        assert_eq!(redelivered.stripe_session_id, paid.stripe_session_id);
    }

    #[tokio::test]
    async fn unrecognized_event_type_writes_nothing() {
        let (handler, store) = handler_with_store();
        let id = store
            .insert(Order::new("CMD-001", OrderStatus::Validated, "25€"))
            .await
            .unwrap();

        handler
            .apply(&WebhookEvent::Other {
                event_type: "invoice.created".into(),
            })
            .await
            .unwrap();

        let order = store.get(&id).await.unwrap().unwrap();
        assert_eq!(order.payment_status, PaymentStatus::Unpaid);
        assert!(order.stripe_session_id.is_none());
    }

    #[tokio::test]
    async fn confirmation_for_unknown_order_is_an_error() {
        let (handler, _) = handler_with_store();

        let event = WebhookEvent::CheckoutCompleted(PaymentConfirmation {
            order_id: OrderId::generate(),
            tracking_id: "CMD-001".into(),
            session_id: "cs_test_123".into(),
            payment_intent: None,
        });

        // Store failure must surface so Stripe redelivers the event.
        let err = handler.apply(&event).await.unwrap_err();
        assert!(matches!(err, PaymentError::Storage(_)));
    }
}
