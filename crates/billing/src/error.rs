//! Billing error taxonomy
//!
//! Client-input errors map to 4xx at the HTTP layer, configuration and
//! upstream errors to 500. Ledger write failures are deliberately absent
//! here: persistence is best-effort relative to processor-side truth and is
//! reported through [`crate::ledger::LedgerWrite`] instead.

use thiserror::Error;

pub type BillingResult<T> = Result<T, BillingError>;

#[derive(Debug, Error)]
pub enum BillingError {
    /// Missing credential or webhook secret. Operator-actionable, not
    /// client-actionable.
    #[error("Stripe is not configured: {0}")]
    NotConfigured(String),

    /// Amount missing, non-finite, or rounding to a non-positive number of
    /// minor currency units.
    #[error("Invalid amount")]
    InvalidAmount,

    #[error("Invalid currency: {0}")]
    InvalidCurrency(String),

    /// Signature verification or event decoding failed. The reason is
    /// logged and returned in the 400 body.
    #[error("Webhook signature verification failed: {0}")]
    SignatureVerification(String),

    /// A stored provider_order_id that no longer parses as a Stripe
    /// payment intent id.
    #[error("Invalid payment intent id: {0}")]
    InvalidIntentId(String),

    /// Stripe returned a payment intent without a client secret.
    #[error("Payment intent has no client secret")]
    MissingClientSecret,

    #[error("Stripe API error: {0}")]
    Stripe(#[from] stripe::StripeError),

    #[error("Database error: {0}")]
    Database(String),
}

impl From<sqlx::Error> for BillingError {
    fn from(err: sqlx::Error) -> Self {
        Self::Database(err.to_string())
    }
}
