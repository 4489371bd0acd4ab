//! Stripe webhook verification and order reconciliation
//!
//! Signature verification operates over the raw request body, so parsing is
//! deferred until after the HMAC check. Verification is done manually (the
//! SDK's `Webhook::construct_event` rejects payloads from newer Stripe API
//! versions than the one it was generated against), following the scheme
//! Stripe documents: HMAC-SHA256 over `"{t}.{payload}"` with a tolerance
//! window on `t`.
//!
//! The receiver is a passive observer: it copies whatever status string the
//! processor reports onto the matching order row, enforcing no transition
//! legality and no terminal-state protection.

use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use time::OffsetDateTime;

use crate::error::{BillingError, BillingResult};
use crate::ledger::{Ledger, LedgerWrite, PROVIDER};

type HmacSha256 = Hmac<Sha256>;

/// Tolerance for the signature timestamp (replay protection).
const SIGNATURE_TOLERANCE_SECS: i64 = 300;

/// Lean event envelope: only the fields this system dispatches on.
/// Lenient by design so events with unrecognized payload shapes still
/// parse and no-op.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEvent {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default)]
    pub data: Option<EventData>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventData {
    #[serde(default)]
    pub object: EventObject,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventObject {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

impl WebhookEvent {
    fn subject(&self) -> (Option<&str>, Option<&str>) {
        match &self.data {
            Some(data) => (data.object.id.as_deref(), data.object.status.as_deref()),
            None => (None, None),
        }
    }
}

/// Webhook receiver: verifies authenticity, then reconciles the ledger.
pub struct WebhookHandler<L> {
    ledger: L,
    webhook_secret: Option<String>,
    allow_unsigned: bool,
}

impl<L: Ledger> WebhookHandler<L> {
    pub fn new(ledger: L, webhook_secret: Option<String>, allow_unsigned: bool) -> Self {
        Self {
            ledger,
            webhook_secret,
            allow_unsigned,
        }
    }

    /// Verify the signature over the raw payload and decode the event.
    ///
    /// Without a configured secret, events are only accepted when unsigned
    /// webhooks were explicitly enabled; a missing secret is otherwise a
    /// configuration error, not a silent fallback.
    pub fn verify_and_parse(&self, payload: &str, signature: &str) -> BillingResult<WebhookEvent> {
        match &self.webhook_secret {
            Some(secret) => {
                verify_signature(payload, signature, secret).map_err(|reason| {
                    tracing::error!(reason = %reason, "Webhook signature verification failed");
                    BillingError::SignatureVerification(reason)
                })?;
                parse_event(payload)
            }
            None if self.allow_unsigned => {
                tracing::warn!(
                    "Accepting webhook event without signature verification \
                     (STRIPE_ALLOW_UNSIGNED_WEBHOOKS is set)"
                );
                parse_event(payload)
            }
            None => Err(BillingError::NotConfigured(
                "STRIPE_WEBHOOK_SECRET is not set and unsigned webhooks are not allowed".into(),
            )),
        }
    }

    /// Apply a verified event to the ledger.
    ///
    /// Never fails: the receiver acknowledges the processor once
    /// verification has passed, regardless of downstream outcome, so that
    /// ledger trouble does not trigger redelivery storms for events that
    /// were validly received.
    pub async fn apply(&self, event: WebhookEvent) -> LedgerWrite {
        match event.event_type.as_str() {
            "payment_intent.succeeded" | "payment_intent.payment_failed" => {
                let (Some(intent_id), Some(status)) = event.subject() else {
                    tracing::error!(
                        event_id = ?event.id,
                        event_type = %event.event_type,
                        "Payment intent event missing subject id or status"
                    );
                    return LedgerWrite::Failed("event payload missing id or status".into());
                };

                match self.ledger.update_status(PROVIDER, intent_id, status).await {
                    Ok(0) => {
                        tracing::warn!(
                            provider_order_id = %intent_id,
                            "No order row matched webhook subject"
                        );
                        LedgerWrite::Skipped
                    }
                    Ok(_) => {
                        tracing::info!(
                            provider_order_id = %intent_id,
                            status = %status,
                            "Order status updated from webhook"
                        );
                        LedgerWrite::Recorded
                    }
                    Err(err) => {
                        tracing::error!(
                            provider_order_id = %intent_id,
                            error = %err,
                            "Failed to apply webhook status update"
                        );
                        LedgerWrite::Failed(err.to_string())
                    }
                }
            }
            other => {
                tracing::debug!(event_type = %other, "Ignoring unhandled webhook event type");
                LedgerWrite::Skipped
            }
        }
    }
}

fn parse_event(payload: &str) -> BillingResult<WebhookEvent> {
    serde_json::from_str(payload).map_err(|err| {
        tracing::error!(error = %err, "Failed to parse webhook event JSON");
        BillingError::SignatureVerification(format!("invalid event payload: {err}"))
    })
}

/// Verify a `t=...,v1=...` signature header against the raw payload.
fn verify_signature(payload: &str, signature: &str, secret: &str) -> Result<(), String> {
    let mut timestamp: Option<i64> = None;
    let mut v1_signature: Option<&str> = None;

    for part in signature.split(',') {
        if let Some((key, value)) = part.split_once('=') {
            match key {
                "t" => timestamp = value.parse().ok(),
                "v1" => v1_signature = Some(value),
                _ => {}
            }
        }
    }

    let timestamp = timestamp.ok_or("missing timestamp in stripe-signature header")?;
    let v1_signature = v1_signature.ok_or("missing v1 signature in stripe-signature header")?;

    let now = OffsetDateTime::now_utc().unix_timestamp();
    if (now - timestamp).abs() > SIGNATURE_TOLERANCE_SECS {
        return Err(format!(
            "timestamp outside tolerance ({}s old)",
            (now - timestamp).abs()
        ));
    }

    // The whsec_ prefix is not part of the HMAC key.
    let secret_key = secret.strip_prefix("whsec_").unwrap_or(secret);
    let signed_payload = format!("{timestamp}.{payload}");

    let mut mac = HmacSha256::new_from_slice(secret_key.as_bytes())
        .map_err(|_| "invalid webhook secret".to_string())?;
    mac.update(signed_payload.as_bytes());
    let computed = hex::encode(mac.finalize().into_bytes());

    if computed != v1_signature {
        return Err("signature mismatch".to_string());
    }

    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) fn sign_for_tests(secret: &str, timestamp: i64, payload: &str) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
    mac.update(format!("{timestamp}.{payload}").as_bytes());
    format!(
        "t={timestamp},v1={}",
        hex::encode(mac.finalize().into_bytes())
    )
}
