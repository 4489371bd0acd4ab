//! Stripe client wrapper and environment-sourced configuration
//!
//! Configuration is read once at process start and passed into the services
//! at construction time; handlers never touch the environment directly.

use std::sync::Arc;

use stripe::Client;

use crate::error::{BillingError, BillingResult};

/// Stripe configuration, sourced from the environment at startup.
#[derive(Debug, Clone)]
pub struct StripeConfig {
    /// Secret API key (sk_live_... or sk_test_...). Required.
    pub secret_key: String,
    /// Webhook signing secret (whsec_...). Optional; without it webhook
    /// events are rejected unless `allow_unsigned_webhooks` is set.
    pub webhook_secret: Option<String>,
    /// Explicit opt-in for accepting unverified webhook events. Intended
    /// for local development only.
    pub allow_unsigned_webhooks: bool,
}

impl StripeConfig {
    /// Read configuration from the environment.
    ///
    /// - `STRIPE_SECRET_KEY` (required)
    /// - `STRIPE_WEBHOOK_SECRET` (optional)
    /// - `STRIPE_ALLOW_UNSIGNED_WEBHOOKS` (optional, "true"/"1" to enable)
    pub fn from_env() -> BillingResult<Self> {
        let secret_key = std::env::var("STRIPE_SECRET_KEY")
            .map_err(|_| BillingError::NotConfigured("STRIPE_SECRET_KEY is not set".into()))?;
        let webhook_secret = std::env::var("STRIPE_WEBHOOK_SECRET")
            .ok()
            .filter(|s| !s.is_empty());
        let allow_unsigned_webhooks = std::env::var("STRIPE_ALLOW_UNSIGNED_WEBHOOKS")
            .map(|v| v == "true" || v == "1")
            .unwrap_or(false);

        Ok(Self {
            secret_key,
            webhook_secret,
            allow_unsigned_webhooks,
        })
    }
}

/// Thin wrapper around the async-stripe client carrying its configuration.
#[derive(Clone)]
pub struct StripeClient {
    inner: Client,
    config: Arc<StripeConfig>,
}

impl StripeClient {
    pub fn new(config: StripeConfig) -> Self {
        let inner = Client::new(config.secret_key.clone());
        Self {
            inner,
            config: Arc::new(config),
        }
    }

    pub fn from_env() -> BillingResult<Self> {
        Ok(Self::new(StripeConfig::from_env()?))
    }

    pub fn inner(&self) -> &Client {
        &self.inner
    }

    pub fn config(&self) -> &StripeConfig {
        &self.config
    }
}
