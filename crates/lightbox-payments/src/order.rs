//! Order Model and Store
//!
//! Orders are created by the storefront's submission flow (out of scope
//! here), read and validated when a checkout session is requested, and
//! mutated exactly once in effect when the payment webhook confirms.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::error::{PaymentError, Result};

/// Opaque store-assigned order identifier, distinct from the tracking id
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderId(String);

impl OrderId {
    /// Generate a fresh identifier
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Parse from string (webhook metadata round-trip)
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for OrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Order workflow state; only `validated` permits checkout
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Draft,
    Validated,
    Cancelled,
}

/// Payment state; moves monotonically from unpaid to paid
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    #[default]
    Unpaid,
    Paid,
}

/// An order document
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    /// Client-visible correlation identifier, unique in practice
    pub tracking_id: String,

    /// Workflow state
    pub status: OrderStatus,

    /// Absent in freshly submitted documents, hence the default
    #[serde(default)]
    pub payment_status: PaymentStatus,

    /// Free-text price as entered in the configurator ("25,50€")
    pub price: String,

    #[serde(default)]
    pub customer_email: Option<String>,

    #[serde(default)]
    pub product_name: Option<String>,

    #[serde(default)]
    pub quantity: Option<u64>,

    /// Checkout claim marker; held while a provider session is being created
    #[serde(default)]
    pub session_pending: bool,

    /// Written only on payment confirmation
    #[serde(default)]
    pub stripe_session_id: Option<String>,

    #[serde(default)]
    pub stripe_payment_intent: Option<String>,

    #[serde(default)]
    pub paid_at: Option<DateTime<Utc>>,
}

impl Order {
    /// New unpaid order in the given workflow state
    pub fn new(
        tracking_id: impl Into<String>,
        status: OrderStatus,
        price: impl Into<String>,
    ) -> Self {
        Self {
            tracking_id: tracking_id.into(),
            status,
            payment_status: PaymentStatus::Unpaid,
            price: price.into(),
            customer_email: None,
            product_name: None,
            quantity: None,
            session_pending: false,
            stripe_session_id: None,
            stripe_payment_intent: None,
            paid_at: None,
        }
    }

    pub fn is_paid(&self) -> bool {
        self.payment_status == PaymentStatus::Paid
    }
}

/// Paid fields extracted from a completed checkout event
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PaymentConfirmation {
    pub order_id: OrderId,
    pub tracking_id: String,
    pub session_id: String,
    pub payment_intent: Option<String>,
}

/// Result of the checkout claim compare-and-swap
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClaimOutcome {
    /// Caller holds the claim and may create a provider session
    Claimed,
    /// Order was paid before the claim was taken
    AlreadyPaid,
    /// Another checkout for this order is in flight
    InProgress,
}

/// Order document store contract
///
/// A production deployment backs this with the shop's document database;
/// [`MemoryOrderStore`] serves development and tests. Implementations assign
/// the `paidAt` timestamp server-side.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Persist a new order and return its assigned id
    async fn insert(&self, order: Order) -> Result<OrderId>;

    /// Point lookup by primary id
    async fn get(&self, id: &OrderId) -> Result<Option<Order>>;

    /// Secondary-index lookup; returns the first match only
    async fn find_by_tracking_id(&self, tracking_id: &str) -> Result<Option<(OrderId, Order)>>;

    /// Atomically take the checkout claim for an unpaid order
    async fn claim_session(&self, id: &OrderId) -> Result<ClaimOutcome>;

    /// Drop the checkout claim once the provider call has completed
    async fn release_session(&self, id: &OrderId) -> Result<()>;

    /// Unconditionally set the paid fields; safe under webhook redelivery
    async fn mark_paid(&self, id: &OrderId, confirmation: &PaymentConfirmation) -> Result<()>;
}

/// In-memory order store (for development and tests)
pub struct MemoryOrderStore {
    orders: RwLock<HashMap<OrderId, Order>>,
}

impl Default for MemoryOrderStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryOrderStore {
    pub fn new() -> Self {
        Self {
            orders: RwLock::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl OrderStore for MemoryOrderStore {
    async fn insert(&self, order: Order) -> Result<OrderId> {
        let id = OrderId::generate();
        let mut orders = self.orders.write().await;
        orders.insert(id.clone(), order);
        Ok(id)
    }

    async fn get(&self, id: &OrderId) -> Result<Option<Order>> {
        let orders = self.orders.read().await;
        Ok(orders.get(id).cloned())
    }

    async fn find_by_tracking_id(&self, tracking_id: &str) -> Result<Option<(OrderId, Order)>> {
        let orders = self.orders.read().await;
        Ok(orders
            .iter()
            .find(|(_, order)| order.tracking_id == tracking_id)
            .map(|(id, order)| (id.clone(), order.clone())))
    }

    async fn claim_session(&self, id: &OrderId) -> Result<ClaimOutcome> {
        let mut orders = self.orders.write().await;
        let order = orders
            .get_mut(id)
            .ok_or_else(|| PaymentError::NotFound(format!("order {id} not found")))?;

        if order.is_paid() {
            return Ok(ClaimOutcome::AlreadyPaid);
        }
        if order.session_pending {
            return Ok(ClaimOutcome::InProgress);
        }

        order.session_pending = true;
        Ok(ClaimOutcome::Claimed)
    }

    async fn release_session(&self, id: &OrderId) -> Result<()> {
        let mut orders = self.orders.write().await;
        let order = orders
            .get_mut(id)
            .ok_or_else(|| PaymentError::NotFound(format!("order {id} not found")))?;

        order.session_pending = false;
        Ok(())
    }

    async fn mark_paid(&self, id: &OrderId, confirmation: &PaymentConfirmation) -> Result<()> {
        let mut orders = self.orders.write().await;
        let order = orders
            .get_mut(id)
            .ok_or_else(|| PaymentError::Storage(format!("order {id} not found")))?;

        order.payment_status = PaymentStatus::Paid;
        order.session_pending = false;
        order.stripe_session_id = Some(confirmation.session_id.clone());
        order.stripe_payment_intent = confirmation.payment_intent.clone();
        order.paid_at = Some(Utc::now());

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn validated_order(tracking_id: &str) -> Order {
        Order::new(tracking_id, OrderStatus::Validated, "25€")
    }

    #[tokio::test]
    async fn insert_and_lookup_by_tracking_id() {
        let store = MemoryOrderStore::new();
        let id = store.insert(validated_order("CMD-001")).await.unwrap();

        let (found_id, order) = store
            .find_by_tracking_id("CMD-001")
            .await
            .unwrap()
            .expect("order should be found");
        assert_eq!(found_id, id);
        assert_eq!(order.tracking_id, "CMD-001");

        assert!(store.find_by_tracking_id("CMD-999").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn claim_is_exclusive_until_released() {
        let store = MemoryOrderStore::new();
        let id = store.insert(validated_order("CMD-001")).await.unwrap();

        assert_eq!(store.claim_session(&id).await.unwrap(), ClaimOutcome::Claimed);
        assert_eq!(
            store.claim_session(&id).await.unwrap(),
            ClaimOutcome::InProgress
        );

        store.release_session(&id).await.unwrap();
        assert_eq!(store.claim_session(&id).await.unwrap(), ClaimOutcome::Claimed);
    }

    #[tokio::test]
    async fn claim_refuses_paid_orders() {
        let store = MemoryOrderStore::new();
        let mut order = validated_order("CMD-001");
        order.payment_status = PaymentStatus::Paid;
        let id = store.insert(order).await.unwrap();

        assert_eq!(
            store.claim_session(&id).await.unwrap(),
            ClaimOutcome::AlreadyPaid
        );
    }

    #[tokio::test]
    async fn mark_paid_sets_fields_and_clears_claim() {
        let store = MemoryOrderStore::new();
        let id = store.insert(validated_order("CMD-001")).await.unwrap();
        store.claim_session(&id).await.unwrap();

        let confirmation = PaymentConfirmation {
            order_id: id.clone(),
            tracking_id: "CMD-001".into(),
            session_id: "cs_test_123".into(),
            payment_intent: Some("pi_test_123".into()),
        };
        store.mark_paid(&id, &confirmation).await.unwrap();

        let order = store.get(&id).await.unwrap().unwrap();
        assert_eq!(order.payment_status, PaymentStatus::Paid);
        assert!(!order.session_pending);
        assert_eq!(order.stripe_session_id.as_deref(), Some("cs_test_123"));
        assert_eq!(order.stripe_payment_intent.as_deref(), Some("pi_test_123"));
        assert!(order.paid_at.is_some());
    }

    #[tokio::test]
    async fn mark_paid_is_idempotent_in_effect() {
        let store = MemoryOrderStore::new();
        let id = store.insert(validated_order("CMD-001")).await.unwrap();

        let confirmation = PaymentConfirmation {
            order_id: id.clone(),
            tracking_id: "CMD-001".into(),
            session_id: "cs_test_123".into(),
            payment_intent: None,
        };

        store.mark_paid(&id, &confirmation).await.unwrap();
        let first = store.get(&id).await.unwrap().unwrap();

        store.mark_paid(&id, &confirmation).await.unwrap();
        let second = store.get(&id).await.unwrap().unwrap();

        assert_eq!(second.payment_status, PaymentStatus::Paid);
        assert_eq!(second.stripe_session_id, first.stripe_session_id);
        assert_eq!(second.stripe_payment_intent, first.stripe_payment_intent);
    }

    #[tokio::test]
    async fn mark_paid_fails_for_unknown_order() {
        let store = MemoryOrderStore::new();
        let id = OrderId::generate();

        let confirmation = PaymentConfirmation {
            order_id: id.clone(),
            tracking_id: "CMD-001".into(),
            session_id: "cs_test_123".into(),
            payment_intent: None,
        };

        let err = store.mark_paid(&id, &confirmation).await.unwrap_err();
        assert!(matches!(err, PaymentError::Storage(_)));
    }
}
