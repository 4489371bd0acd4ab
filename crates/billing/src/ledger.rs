//! Orders ledger
//!
//! One row per payment intent created through this service, keyed by
//! (provider, provider_order_id) and, when present, (provider,
//! idempotency_key). Rows are inserted exactly once at creation, never
//! deleted, and only the status column mutates afterwards.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::BillingResult;

/// The single payment processor this system fronts.
pub const PROVIDER: &str = "stripe";

/// A persisted order row.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Order {
    pub id: Uuid,
    pub provider: String,
    /// Processor-assigned payment intent id; the webhook join key.
    pub provider_order_id: String,
    /// Minor currency units, as confirmed by the processor.
    pub amount: i64,
    pub currency: String,
    /// Processor-reported lifecycle state, copied verbatim from the event
    /// stream. No transition legality is enforced here.
    pub status: String,
    pub metadata: serde_json::Value,
    pub idempotency_key: Option<String>,
    pub created_at: OffsetDateTime,
}

/// Insert view of an order row.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub provider: String,
    pub provider_order_id: String,
    pub amount: i64,
    pub currency: String,
    pub status: String,
    pub metadata: serde_json::Value,
    pub idempotency_key: Option<String>,
}

/// Outcome of a best-effort ledger write.
///
/// Ledger durability is best-effort relative to processor-side truth: a
/// failed write is logged, reported through this type, and never surfaced
/// to the client. Kept distinct from the request result so tests can assert
/// on both independently.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerWrite {
    /// The row was inserted or updated.
    Recorded,
    /// A unique constraint absorbed the insert, or a replay short-circuited
    /// it. The row already existed.
    Duplicate,
    /// Nothing to write (unhandled event type, or no row matched).
    Skipped,
    /// The write failed; the reason was logged.
    Failed(String),
}

#[async_trait]
pub trait Ledger: Send + Sync {
    /// Look up a prior order for a (provider, idempotency_key) pair.
    async fn find_by_idempotency_key(
        &self,
        provider: &str,
        key: &str,
    ) -> BillingResult<Option<Order>>;

    /// Insert a new order row. Returns `false` when a unique constraint on
    /// (provider, idempotency_key) or (provider, provider_order_id)
    /// absorbed the insert, which is the replay signal for a concurrent
    /// duplicate creation.
    async fn insert_order(&self, order: NewOrder) -> BillingResult<bool>;

    /// Set the status of the order matching (provider, provider_order_id).
    /// Returns the number of rows affected; zero is not an error.
    async fn update_status(
        &self,
        provider: &str,
        provider_order_id: &str,
        status: &str,
    ) -> BillingResult<u64>;
}

#[async_trait]
impl<L: Ledger + ?Sized> Ledger for Arc<L> {
    async fn find_by_idempotency_key(
        &self,
        provider: &str,
        key: &str,
    ) -> BillingResult<Option<Order>> {
        (**self).find_by_idempotency_key(provider, key).await
    }

    async fn insert_order(&self, order: NewOrder) -> BillingResult<bool> {
        (**self).insert_order(order).await
    }

    async fn update_status(
        &self,
        provider: &str,
        provider_order_id: &str,
        status: &str,
    ) -> BillingResult<u64> {
        (**self).update_status(provider, provider_order_id, status).await
    }
}

/// Postgres-backed ledger.
#[derive(Clone)]
pub struct PgLedger {
    pool: PgPool,
}

impl PgLedger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Ledger for PgLedger {
    async fn find_by_idempotency_key(
        &self,
        provider: &str,
        key: &str,
    ) -> BillingResult<Option<Order>> {
        let order: Option<Order> = sqlx::query_as(
            r#"
            SELECT id, provider, provider_order_id, amount, currency, status,
                   metadata, idempotency_key, created_at
            FROM orders
            WHERE provider = $1 AND idempotency_key = $2
            "#,
        )
        .bind(provider)
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;

        Ok(order)
    }

    async fn insert_order(&self, order: NewOrder) -> BillingResult<bool> {
        // ON CONFLICT DO NOTHING: a concurrent creation sharing the same
        // idempotency key (or the same intent, via Stripe's own key
        // handling) loses the insert race silently instead of erroring.
        let result = sqlx::query(
            r#"
            INSERT INTO orders
                (provider, provider_order_id, amount, currency, status, metadata, idempotency_key)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(&order.provider)
        .bind(&order.provider_order_id)
        .bind(order.amount)
        .bind(&order.currency)
        .bind(&order.status)
        .bind(&order.metadata)
        .bind(&order.idempotency_key)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn update_status(
        &self,
        provider: &str,
        provider_order_id: &str,
        status: &str,
    ) -> BillingResult<u64> {
        let result = sqlx::query(
            "UPDATE orders SET status = $1 WHERE provider = $2 AND provider_order_id = $3",
        )
        .bind(status)
        .bind(provider)
        .bind(provider_order_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}
