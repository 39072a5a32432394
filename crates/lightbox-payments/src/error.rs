//! Payment Error Types

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, PaymentError>;

/// Errors raised by the order-to-payment flow
#[derive(Error, Debug)]
pub enum PaymentError {
    /// Malformed or missing input (empty tracking id, non-positive amount)
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// No order matches the tracking id
    #[error("order not found: {0}")]
    NotFound(String),

    /// Order state refuses the operation (already paid, not validated,
    /// checkout claim held by another request)
    #[error("conflict: {0}")]
    Conflict(String),

    /// Stripe API error
    #[error("Stripe error: {0}")]
    Stripe(String),

    /// Webhook signature verification failed
    #[error("webhook signature invalid: {0}")]
    WebhookSignature(String),

    /// Webhook payload parsing failed
    #[error("webhook parse error: {0}")]
    WebhookParse(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Order store error
    #[error("storage error: {0}")]
    Storage(String),
}

impl PaymentError {
    /// Check if a retry (or a webhook redelivery) can resolve this error
    pub fn is_retryable(&self) -> bool {
        matches!(self, PaymentError::Stripe(_) | PaymentError::Storage(_))
    }

    /// Get user-friendly message; internal detail stays in the logs
    pub fn user_message(&self) -> &str {
        match self {
            PaymentError::InvalidRequest(msg)
            | PaymentError::NotFound(msg)
            | PaymentError::Conflict(msg) => msg,
            PaymentError::Stripe(_) => "Payment processing failed. Please try again.",
            PaymentError::Config(_) => "Service configuration error.",
            _ => "An error occurred processing your request.",
        }
    }
}
