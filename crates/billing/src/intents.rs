//! Payment intent creation with idempotency replay
//!
//! The only state-transition concern on the create path: a repeated request
//! carrying a known idempotency key must replay the prior result instead of
//! creating a second intent, and the ledger write after creation must never
//! fail the client-visible response (the intent already exists on the
//! processor side at that point; a 500 here would provoke a retry and a
//! duplicate processor-side object).

use std::collections::HashMap;

use crate::error::{BillingError, BillingResult};
use crate::gateway::{CreateIntent, GatewayIntent, PaymentGateway};
use crate::ledger::{Ledger, LedgerWrite, NewOrder, PROVIDER};

/// Caller-supplied creation parameters, validated here.
#[derive(Debug, Clone, Default)]
pub struct CreateIntentParams {
    /// Must round to a positive integer of minor currency units.
    pub amount: Option<f64>,
    /// Defaults to "USD".
    pub currency: Option<String>,
    pub metadata: HashMap<String, String>,
    pub idempotency_key: Option<String>,
}

/// Result of a creation request.
#[derive(Debug, Clone)]
pub struct CreatedIntent {
    pub id: String,
    pub client_secret: String,
    /// True when a prior intent was replayed for the idempotency key.
    pub replayed: bool,
    /// Best-effort ledger outcome, independent of the request result.
    pub ledger: LedgerWrite,
}

pub struct IntentService<G, L> {
    gateway: G,
    ledger: L,
}

impl<G: PaymentGateway, L: Ledger> IntentService<G, L> {
    pub fn new(gateway: G, ledger: L) -> Self {
        Self { gateway, ledger }
    }

    /// Create a payment intent, replaying a prior one when the idempotency
    /// key is already in the ledger.
    pub async fn create(&self, params: CreateIntentParams) -> BillingResult<CreatedIntent> {
        let amount = validate_amount(params.amount)?;
        let currency = params.currency.unwrap_or_else(|| "USD".to_string());

        if let Some(key) = params.idempotency_key.as_deref() {
            if let Some(replayed) = self.try_replay(key).await? {
                return Ok(replayed);
            }
        }

        let intent = self
            .gateway
            .create_intent(CreateIntent {
                amount,
                currency,
                metadata: params.metadata.clone(),
                idempotency_key: params.idempotency_key.clone(),
            })
            .await?;

        let client_secret = intent
            .client_secret
            .clone()
            .ok_or(BillingError::MissingClientSecret)?;

        let ledger = self
            .record(&intent, params.metadata, params.idempotency_key)
            .await;

        tracing::info!(
            intent_id = %intent.id,
            amount = intent.amount,
            currency = %intent.currency,
            ledger = ?ledger,
            "Created payment intent"
        );

        Ok(CreatedIntent {
            id: intent.id,
            client_secret,
            replayed: false,
            ledger,
        })
    }

    /// Look up a prior order for the key and re-fetch its intent from the
    /// processor. Any failure here degrades to fresh creation rather than
    /// failing the request; Stripe's own idempotency key is the backstop.
    async fn try_replay(&self, key: &str) -> BillingResult<Option<CreatedIntent>> {
        let existing = match self.ledger.find_by_idempotency_key(PROVIDER, key).await {
            Ok(existing) => existing,
            Err(err) => {
                tracing::warn!(
                    idempotency_key = %key,
                    error = %err,
                    "Idempotency lookup failed, falling back to creation"
                );
                return Ok(None);
            }
        };

        let Some(order) = existing else {
            return Ok(None);
        };

        match self.gateway.retrieve_intent(&order.provider_order_id).await {
            Ok(intent) => {
                // An intent without a client secret is unusable for the
                // caller; degrade to fresh creation like a failed fetch.
                let Some(client_secret) = intent.client_secret else {
                    tracing::warn!(
                        idempotency_key = %key,
                        provider_order_id = %order.provider_order_id,
                        "Replayed intent has no client secret, creating a new one"
                    );
                    return Ok(None);
                };
                tracing::info!(
                    idempotency_key = %key,
                    intent_id = %intent.id,
                    "Replaying previously created payment intent"
                );
                Ok(Some(CreatedIntent {
                    id: intent.id,
                    client_secret,
                    replayed: true,
                    ledger: LedgerWrite::Duplicate,
                }))
            }
            Err(err) => {
                tracing::warn!(
                    idempotency_key = %key,
                    provider_order_id = %order.provider_order_id,
                    error = %err,
                    "Stored intent no longer retrievable, creating a new one"
                );
                Ok(None)
            }
        }
    }

    /// Persist the order row. Amount, currency, and status come from the
    /// processor response, not the raw input. Failure is logged and
    /// swallowed.
    async fn record(
        &self,
        intent: &GatewayIntent,
        metadata: HashMap<String, String>,
        idempotency_key: Option<String>,
    ) -> LedgerWrite {
        let order = NewOrder {
            provider: PROVIDER.to_string(),
            provider_order_id: intent.id.clone(),
            amount: intent.amount,
            currency: intent.currency.clone(),
            status: intent.status.clone(),
            metadata: serde_json::to_value(metadata).unwrap_or_else(|_| serde_json::json!({})),
            idempotency_key,
        };

        match self.ledger.insert_order(order).await {
            Ok(true) => LedgerWrite::Recorded,
            Ok(false) => {
                tracing::info!(
                    intent_id = %intent.id,
                    "Order insert absorbed by unique constraint (concurrent duplicate)"
                );
                LedgerWrite::Duplicate
            }
            Err(err) => {
                tracing::error!(
                    intent_id = %intent.id,
                    error = %err,
                    "Order ledger insert failed; intent exists on Stripe"
                );
                LedgerWrite::Failed(err.to_string())
            }
        }
    }
}

fn validate_amount(amount: Option<f64>) -> BillingResult<i64> {
    let raw = amount.ok_or(BillingError::InvalidAmount)?;
    if !raw.is_finite() {
        return Err(BillingError::InvalidAmount);
    }
    let minor = raw.round() as i64;
    if minor <= 0 {
        return Err(BillingError::InvalidAmount);
    }
    Ok(minor)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn amount_rounds_to_minor_units() {
        assert_eq!(validate_amount(Some(1000.0)).ok(), Some(1000));
        assert_eq!(validate_amount(Some(999.6)).ok(), Some(1000));
    }

    #[test]
    fn non_positive_amounts_rejected() {
        assert!(matches!(
            validate_amount(None),
            Err(BillingError::InvalidAmount)
        ));
        assert!(matches!(
            validate_amount(Some(0.0)),
            Err(BillingError::InvalidAmount)
        ));
        assert!(matches!(
            validate_amount(Some(-10.0)),
            Err(BillingError::InvalidAmount)
        ));
        // Rounds to zero.
        assert!(matches!(
            validate_amount(Some(0.4)),
            Err(BillingError::InvalidAmount)
        ));
        assert!(matches!(
            validate_amount(Some(f64::NAN)),
            Err(BillingError::InvalidAmount)
        ));
    }
}
