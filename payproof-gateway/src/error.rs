//! HTTP error mapping for the gateway.
//!
//! Every verification failure surfaces as `{is_valid: false,
//! failure_reason: <code>}` with a status matching the failure class, so
//! client integrations branch on stable codes rather than messages.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use payproof::error::{FailureCode, VerifyError};
use payproof::token::QuotaError;

/// Errors a gateway handler can surface.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Payment verification failed.
    #[error("{0}")]
    Verify(#[from] VerifyError),

    /// Token redemption failed.
    #[error("{0}")]
    Quota(#[from] QuotaError),

    /// No token with the given hash exists.
    #[error("token not found")]
    TokenNotFound,
}

fn verify_status(code: FailureCode) -> StatusCode {
    match code {
        FailureCode::UnsupportedChain | FailureCode::MalformedTxRef => StatusCode::BAD_REQUEST,
        FailureCode::TxNotFound => StatusCode::NOT_FOUND,
        FailureCode::ChainUnavailable => StatusCode::SERVICE_UNAVAILABLE,
        FailureCode::AlreadyRedeemed => StatusCode::CONFLICT,
        FailureCode::NoQualifyingTransfer
        | FailureCode::RecipientMismatch
        | FailureCode::InsufficientAmount
        | FailureCode::StaleTransaction
        | FailureCode::InsufficientConfirmations => StatusCode::PAYMENT_REQUIRED,
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        match self {
            Self::Verify(err) => {
                let code = err.code();
                let body = serde_json::json!({
                    "is_valid": false,
                    "failure_reason": code,
                    "retryable": matches!(
                        err.kind(),
                        payproof::error::FailureKind::Transient
                            | payproof::error::FailureKind::Infrastructure
                    ),
                    "detail": err.to_string(),
                });
                (verify_status(code), axum::Json(body)).into_response()
            }
            Self::Quota(err) => {
                let status = match err {
                    QuotaError::QuotaExceeded => StatusCode::TOO_MANY_REQUESTS,
                    QuotaError::Expired | QuotaError::UnknownToken => StatusCode::UNAUTHORIZED,
                };
                let body = serde_json::json!({ "error": err.code() });
                (status, axum::Json(body)).into_response()
            }
            Self::TokenNotFound => {
                let body = serde_json::json!({ "error": "token_not_found" });
                (StatusCode::NOT_FOUND, axum::Json(body)).into_response()
            }
        }
    }
}
