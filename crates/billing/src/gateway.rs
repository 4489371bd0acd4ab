//! Payment gateway seam
//!
//! Provider-agnostic view of the two Stripe operations this system needs:
//! creating a payment intent (with the processor's own idempotency-key
//! mechanism) and retrieving one by id. The trait exists as a seam for
//! testing, not as a multi-provider framework.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use stripe::{CreatePaymentIntent, Currency, PaymentIntent, PaymentIntentId, RequestStrategy};

use crate::client::StripeClient;
use crate::error::{BillingError, BillingResult};

/// Parameters for creating a payment intent.
#[derive(Debug, Clone)]
pub struct CreateIntent {
    /// Amount in minor currency units.
    pub amount: i64,
    /// ISO currency code, e.g. "USD".
    pub currency: String,
    pub metadata: HashMap<String, String>,
    /// Forwarded to the processor's idempotency mechanism when present.
    /// Backstop for the non-atomic ledger lookup-then-insert sequence.
    pub idempotency_key: Option<String>,
}

/// Processor response, reduced to the fields this system records.
#[derive(Debug, Clone)]
pub struct GatewayIntent {
    pub id: String,
    pub client_secret: Option<String>,
    pub amount: i64,
    pub currency: String,
    pub status: String,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_intent(&self, req: CreateIntent) -> BillingResult<GatewayIntent>;

    async fn retrieve_intent(&self, intent_id: &str) -> BillingResult<GatewayIntent>;
}

#[async_trait]
impl<G: PaymentGateway + ?Sized> PaymentGateway for Arc<G> {
    async fn create_intent(&self, req: CreateIntent) -> BillingResult<GatewayIntent> {
        (**self).create_intent(req).await
    }

    async fn retrieve_intent(&self, intent_id: &str) -> BillingResult<GatewayIntent> {
        (**self).retrieve_intent(intent_id).await
    }
}

fn to_view(intent: PaymentIntent) -> GatewayIntent {
    GatewayIntent {
        id: intent.id.to_string(),
        client_secret: intent.client_secret,
        amount: intent.amount,
        currency: intent.currency.to_string(),
        status: intent.status.to_string(),
    }
}

#[async_trait]
impl PaymentGateway for StripeClient {
    async fn create_intent(&self, req: CreateIntent) -> BillingResult<GatewayIntent> {
        let currency: Currency = req
            .currency
            .to_lowercase()
            .parse()
            .map_err(|_| BillingError::InvalidCurrency(req.currency.clone()))?;

        let mut params = CreatePaymentIntent::new(req.amount, currency);
        if !req.metadata.is_empty() {
            params.metadata = Some(req.metadata);
        }

        let intent = match req.idempotency_key {
            Some(key) => {
                let client = self
                    .inner()
                    .clone()
                    .with_strategy(RequestStrategy::Idempotent(key));
                PaymentIntent::create(&client, params).await?
            }
            None => PaymentIntent::create(self.inner(), params).await?,
        };

        Ok(to_view(intent))
    }

    async fn retrieve_intent(&self, intent_id: &str) -> BillingResult<GatewayIntent> {
        let id: PaymentIntentId = intent_id
            .parse()
            .map_err(|_| BillingError::InvalidIntentId(intent_id.to_string()))?;
        let intent = PaymentIntent::retrieve(self.inner(), &id, &[]).await?;
        Ok(to_view(intent))
    }
}
