use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

/// Failures raised by the courier subsystem.
///
/// `Config` and `Auth` need an operator to act (fix credentials, reconnect).
/// `Gateway` is recoverable: the caller may simply retry. `NotFound` means the
/// caller asked about a shipment we cannot resolve.
#[derive(Debug, Error)]
pub enum CourierError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("auth error: {0}")]
    Auth(String),

    #[error("courier gateway error: {message}")]
    Gateway {
        message: String,
        /// HTTP status returned by the provider, if a response was received.
        status: Option<u16>,
    },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl CourierError {
    pub fn gateway(message: impl Into<String>, status: Option<u16>) -> Self {
        CourierError::Gateway {
            message: message.into(),
            status,
        }
    }

    pub fn timed_out() -> Self {
        CourierError::gateway("request timed out", None)
    }

    pub fn reconnect_required() -> Self {
        CourierError::Auth("token expired, reconnection required".to_string())
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Error type returned by HTTP handlers.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Courier(#[from] CourierError),

    #[error("invalid request: {0}")]
    BadRequest(String),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        AppError::Courier(CourierError::Store(e))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let mut provider_status = None;
        let (status, error_type, code, msg) = match &self {
            AppError::Courier(CourierError::Config(m)) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "configuration_error",
                "courier_not_configured",
                m.clone(),
            ),
            AppError::Courier(CourierError::Auth(m)) => (
                StatusCode::UNAUTHORIZED,
                "authentication_error",
                "courier_reconnect_required",
                m.clone(),
            ),
            AppError::Courier(CourierError::Gateway { message, status }) => {
                provider_status = *status;
                (
                    StatusCode::BAD_GATEWAY,
                    "upstream_error",
                    "courier_request_failed",
                    message.clone(),
                )
            }
            AppError::Courier(CourierError::NotFound(m)) => (
                StatusCode::NOT_FOUND,
                "not_found_error",
                "shipment_not_found",
                m.clone(),
            ),
            AppError::Courier(CourierError::Conflict(m)) => (
                StatusCode::CONFLICT,
                "invalid_request_error",
                "shipment_exists",
                m.clone(),
            ),
            AppError::Courier(CourierError::Store(e)) => {
                tracing::error!("Store error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "internal_server_error",
                    "internal server error".to_string(),
                )
            }
            AppError::BadRequest(m) => (
                StatusCode::BAD_REQUEST,
                "invalid_request_error",
                "invalid_request",
                m.clone(),
            ),
            AppError::Internal(e) => {
                tracing::error!("Internal error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "internal_server_error",
                    "internal server error".to_string(),
                )
            }
        };

        let mut error = json!({
            "message": msg,
            "type": error_type,
            "code": code,
        });
        if let Some(s) = provider_status {
            error["provider_status"] = json!(s);
        }

        (status, Json(json!({ "error": error }))).into_response()
    }
}
