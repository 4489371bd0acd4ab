//! HTTP error mapping
//!
//! Failures answer with a status code and a short plain-text message, never
//! a structured payload. Internal details are logged, not returned.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use paygate_billing::BillingError;

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    pub fn not_configured() -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: "Stripe secret key not configured".to_string(),
        }
    }

    pub fn internal() -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: "Internal Server Error".to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, self.message).into_response()
    }
}

impl From<BillingError> for ApiError {
    fn from(err: BillingError) -> Self {
        match err {
            BillingError::InvalidAmount => Self::bad_request("Invalid amount"),
            BillingError::InvalidCurrency(currency) => {
                Self::bad_request(format!("Invalid currency: {currency}"))
            }
            BillingError::SignatureVerification(reason) => {
                Self::bad_request(format!("Webhook Error: {reason}"))
            }
            BillingError::NotConfigured(reason) => {
                tracing::error!(reason = %reason, "Request hit missing configuration");
                Self {
                    status: StatusCode::INTERNAL_SERVER_ERROR,
                    message: format!("Stripe is not configured: {reason}"),
                }
            }
            BillingError::Stripe(_)
            | BillingError::Database(_)
            | BillingError::InvalidIntentId(_)
            | BillingError::MissingClientSecret => {
                tracing::error!(error = %err, "Request failed");
                Self::internal()
            }
        }
    }
}
