//! Route registration

pub mod payments;

use axum::routing::{get, post};
use axum::Router;

use crate::state::AppState;

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/payments/intents", post(payments::create_payment_intent))
        .route("/api/stripe/webhook", post(payments::stripe_webhook))
        .with_state(state)
}

async fn health() -> &'static str {
    "OK"
}
