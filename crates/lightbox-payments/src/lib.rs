//! # lightbox-payments
//!
//! Order-to-payment reconciliation for the lightbox storefront.
//!
//! ## Flow
//!
//! ```text
//! ┌──────────┐  POST {trackingId}  ┌──────────────────┐  create session  ┌────────┐
//! │  Client  │────────────────────▶│ SessionInitiator │─────────────────▶│ Stripe │
//! └──────────┘                     └──────────────────┘                  └────────┘
//!       │                                   │ read + claim                   │
//!       │ redirect to hosted page           ▼                               │
//!       │◀───{ url }───────────────  ┌────────────┐   signed webhook        │
//!       │                            │ OrderStore │◀───────────────────────┘
//!       │                            └────────────┘   (WebhookHandler)
//! ```
//!
//! An order is submitted out of band and lands in the [`OrderStore`] with a
//! human-facing tracking id. [`SessionInitiator`] validates the order (must
//! be `validated` and unpaid), parses its free-text price into minor units,
//! takes an exclusive checkout claim and creates a hosted Stripe Checkout
//! session carrying the tracking id and order id in its metadata.
//!
//! [`WebhookHandler`] receives Stripe's `checkout.session.completed` event,
//! verifies its signature over the raw body, and marks the referenced order
//! paid. The write uses unconditional-set semantics so Stripe's
//! at-least-once delivery cannot corrupt the end state.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use lightbox_payments::{
//!     CheckoutConfig, MemoryOrderStore, SessionInitiator, StripeClient,
//! };
//!
//! let store = Arc::new(MemoryOrderStore::new());
//! let stripe = Arc::new(StripeClient::from_env()?);
//! let initiator = SessionInitiator::new(store, stripe, CheckoutConfig::from_env()?);
//!
//! let session = initiator.create_session("CMD-001").await?;
//! // Redirect the customer to: session.url
//! ```

mod amount;
mod checkout;
mod error;
mod order;
mod webhook;

pub use amount::parse_price_minor_units;
pub use checkout::{
    CheckoutConfig, CheckoutProvider, CheckoutSession, SessionInitiator, SessionRequest,
    StripeClient,
};
pub use error::{PaymentError, Result};
pub use order::{
    ClaimOutcome, MemoryOrderStore, Order, OrderId, OrderStatus, OrderStore, PaymentConfirmation,
    PaymentStatus,
};
pub use webhook::{WebhookEvent, WebhookHandler};
