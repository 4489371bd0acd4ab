// Test code patterns (expected in test files):
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Paygate Billing
//!
//! Stripe integration for the payment gateway:
//!
//! - **Intent creation**: validated, idempotency-aware payment intent
//!   creation with replay of duplicate requests
//! - **Orders ledger**: one row per created intent, reconciled by webhooks
//! - **Webhooks**: signature verification over the raw body and
//!   status-update dispatch

pub mod client;
pub mod error;
pub mod gateway;
pub mod intents;
pub mod ledger;
pub mod webhooks;


// Client
pub use client::{StripeClient, StripeConfig};

// Error
pub use error::{BillingError, BillingResult};

// Gateway
pub use gateway::{CreateIntent, GatewayIntent, PaymentGateway};

// Intents
pub use intents::{CreateIntentParams, CreatedIntent, IntentService};

// Ledger
pub use ledger::{Ledger, LedgerWrite, NewOrder, Order, PgLedger, PROVIDER};

// Webhooks
pub use webhooks::{WebhookEvent, WebhookHandler};

use sqlx::PgPool;

/// Main billing service combining the two request flows.
pub struct BillingService {
    pub intents: IntentService<StripeClient, PgLedger>,
    pub webhooks: WebhookHandler<PgLedger>,
}

impl BillingService {
    /// Create a new billing service from environment variables.
    pub fn from_env(pool: PgPool) -> BillingResult<Self> {
        Ok(Self::new(StripeClient::from_env()?, pool))
    }

    /// Create a new billing service with an explicit client.
    pub fn new(stripe: StripeClient, pool: PgPool) -> Self {
        let ledger = PgLedger::new(pool);
        let webhook_secret = stripe.config().webhook_secret.clone();
        let allow_unsigned = stripe.config().allow_unsigned_webhooks;

        Self {
            intents: IntentService::new(stripe, ledger.clone()),
            webhooks: WebhookHandler::new(ledger, webhook_secret, allow_unsigned),
        }
    }
}
