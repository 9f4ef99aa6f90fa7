use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::auth::AuthError;
use crate::billing::payments::PaymentError;
use crate::documents::DocumentError;
use crate::interview::session::SessionError;
use crate::interview::store::StoreError;
use crate::llm_client::LlmError;

/// User-facing message for a missing LLM credential. Never varies.
pub const AI_NOT_CONFIGURED: &str =
    "The AI interview service is not configured. Please contact support.";

/// User-facing message for missing payment gateway credentials.
pub const PAYMENTS_NOT_CONFIGURED: &str =
    "Payments are not configured. Please contact support.";

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Unsupported file: {0}")]
    UnsupportedFile(String),

    #[error("Unprocessable entity: {0}")]
    UnprocessableEntity(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Upgrade required: {0}")]
    UpgradeRequired(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Configuration error: {0}")]
    Configuration(&'static str),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Session store error: {0}")]
    Store(String),

    #[error("LLM error: {0}")]
    Llm(String),

    #[error("Payment gateway error: {0}")]
    Payment(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            AppError::UnsupportedFile(msg) => (
                StatusCode::UNSUPPORTED_MEDIA_TYPE,
                "UNSUPPORTED_FILE",
                msg.clone(),
            ),
            AppError::UnprocessableEntity(msg) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "UNPROCESSABLE_ENTITY",
                msg.clone(),
            ),
            AppError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "UNAUTHORIZED",
                "Authentication required".to_string(),
            ),
            AppError::UpgradeRequired(msg) => {
                (StatusCode::PAYMENT_REQUIRED, "UPGRADE_REQUIRED", msg.clone())
            }
            AppError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg.clone()),
            AppError::Configuration(msg) => {
                tracing::error!("Configuration error: {msg}");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "CONFIGURATION_ERROR",
                    msg.to_string(),
                )
            }
            AppError::Database(e) => {
                tracing::error!("Database error: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "DATABASE_ERROR",
                    "A database error occurred".to_string(),
                )
            }
            AppError::Store(msg) => {
                tracing::error!("Session store error: {msg}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "STORE_ERROR",
                    "Interview session storage is unavailable".to_string(),
                )
            }
            // Upstream AI and payment failures are shown to the user as-is so they
            // can decide whether to try again.
            AppError::Llm(msg) => {
                tracing::warn!("LLM error: {msg}");
                (StatusCode::BAD_GATEWAY, "LLM_ERROR", msg.clone())
            }
            AppError::Payment(msg) => {
                tracing::warn!("Payment gateway error: {msg}");
                (StatusCode::BAD_GATEWAY, "PAYMENT_ERROR", msg.clone())
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal server error occurred".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}

impl From<LlmError> for AppError {
    fn from(err: LlmError) -> Self {
        match err {
            LlmError::MissingApiKey => AppError::Configuration(AI_NOT_CONFIGURED),
            LlmError::Parse(e) => {
                AppError::UnprocessableEntity(format!("The AI returned a malformed response: {e}"))
            }
            LlmError::InvalidShape(msg) => {
                AppError::UnprocessableEntity(format!("The AI returned a malformed response: {msg}"))
            }
            other => AppError::Llm(other.to_string()),
        }
    }
}

impl From<SessionError> for AppError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::MissingSource | SessionError::SkipConfirmationRequired => {
                AppError::Validation(err.to_string())
            }
            SessionError::InvalidPhase { .. } | SessionError::InFlight(_) => {
                AppError::Conflict(err.to_string())
            }
        }
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        AppError::Store(err.to_string())
    }
}

impl From<DocumentError> for AppError {
    fn from(err: DocumentError) -> Self {
        match err {
            DocumentError::LegacyWord | DocumentError::Unsupported(_) => {
                AppError::UnsupportedFile(err.to_string())
            }
            DocumentError::Unreadable(_) | DocumentError::Empty => {
                AppError::UnprocessableEntity(err.to_string())
            }
        }
    }
}

impl From<PaymentError> for AppError {
    fn from(err: PaymentError) -> Self {
        match err {
            PaymentError::InvalidSignature | PaymentError::OrderMismatch(_) => {
                AppError::Validation(err.to_string())
            }
            other => AppError::Payment(other.to_string()),
        }
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        tracing::debug!("Rejected request: {err}");
        AppError::Unauthorized
    }
}
