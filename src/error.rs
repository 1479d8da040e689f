//! Application-level error type
//!
//! Maps every failure class the payment flow can produce onto an HTTP
//! status at the axum boundary.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::database::error::DatabaseError;

/// Result alias used across the service layer
pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, thiserror::Error)]
pub enum AppErrorKind {
    /// Inbound callback failed signature verification
    #[error("callback signature verification failed")]
    SignatureMismatch,

    /// Unknown order reference, course, user or payment id
    #[error("{entity} '{id}' not found")]
    NotFound { entity: &'static str, id: String },

    /// Purchase rejected before any processor interaction
    #[error("{0}")]
    Conflict(String),

    /// Purchasing globally disabled by configuration
    #[error("course purchasing is currently disabled")]
    PurchasingDisabled,

    /// Bad input from the caller
    #[error("{0}")]
    Validation(String),

    /// Network/timeout/protocol failure talking to the payment processor.
    /// Callers reporting a transaction status must render this as
    /// "unknown", never as a definitive failure.
    #[error("payment processor unavailable: {message}")]
    Upstream { message: String },

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

#[derive(Debug, thiserror::Error)]
#[error("{kind}")]
pub struct AppError {
    pub kind: AppErrorKind,
}

impl AppError {
    pub fn new(kind: AppErrorKind) -> Self {
        Self { kind }
    }

    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::new(AppErrorKind::NotFound {
            entity,
            id: id.into(),
        })
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(AppErrorKind::Conflict(message.into()))
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(AppErrorKind::Validation(message.into()))
    }

    pub fn upstream(message: impl Into<String>) -> Self {
        Self::new(AppErrorKind::Upstream {
            message: message.into(),
        })
    }

    fn status_code(&self) -> StatusCode {
        match &self.kind {
            AppErrorKind::SignatureMismatch => StatusCode::BAD_REQUEST,
            AppErrorKind::NotFound { .. } => StatusCode::NOT_FOUND,
            AppErrorKind::Conflict(_) => StatusCode::CONFLICT,
            AppErrorKind::PurchasingDisabled => StatusCode::SERVICE_UNAVAILABLE,
            AppErrorKind::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppErrorKind::Upstream { .. } => StatusCode::BAD_GATEWAY,
            AppErrorKind::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<DatabaseError> for AppError {
    fn from(e: DatabaseError) -> Self {
        Self::new(AppErrorKind::Database(e))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        // Internal details stay in the logs, not the response body
        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!("internal error: {}", self);
            "internal server error".to_string()
        } else {
            self.to_string()
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            AppError::new(AppErrorKind::SignatureMismatch).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::not_found("payment", "abc").status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::conflict("pending payment exists").status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AppError::new(AppErrorKind::PurchasingDisabled).status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            AppError::upstream("timeout").status_code(),
            StatusCode::BAD_GATEWAY
        );
    }

    #[test]
    fn test_not_found_display() {
        let err = AppError::not_found("course", "42");
        assert_eq!(err.to_string(), "course '42' not found");
    }
}
