use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use sea_orm::DbErr;
use serde_json::json;
use thiserror::Error;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    /// Malformed input, rejected before anything is written.
    #[error("{0}")]
    Validation(String),

    /// Missing or invalid credentials.
    #[error("{0}")]
    Unauthorized(String),

    /// The caller is not the ride owner or booker the action requires.
    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    /// Requested seats exceed what the ride still has.
    #[error("{0}")]
    Capacity(String),

    /// The action is not valid for the ride's or booking's current status.
    #[error("{0}")]
    StateConflict(String),

    /// Uniqueness violation outside the booking lifecycle (e.g. duplicate account).
    #[error("{0}")]
    Conflict(String),

    #[error("Invalid or expired code")]
    OtpMismatch,

    #[error("Failed to send email: {0}")]
    Mail(String),

    #[error("Database error: {0}")]
    Database(#[from] DbErr),

    #[error("{0}")]
    Internal(String),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) | AppError::OtpMismatch => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Capacity(_) | AppError::StateConflict(_) | AppError::Conflict(_) => {
                StatusCode::CONFLICT
            }
            AppError::Mail(_) => StatusCode::BAD_GATEWAY,
            AppError::Database(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable identifier clients can branch on without parsing messages.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "validation_error",
            AppError::Unauthorized(_) => "unauthorized",
            AppError::Forbidden(_) => "forbidden",
            AppError::NotFound(_) => "not_found",
            AppError::Capacity(_) => "capacity_exceeded",
            AppError::StateConflict(_) => "state_conflict",
            AppError::Conflict(_) => "conflict",
            AppError::OtpMismatch => "invalid_otp",
            AppError::Mail(_) => "mail_error",
            AppError::Database(_) | AppError::Internal(_) => "internal_error",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Don't leak driver or SQL details to clients
        let message = match &self {
            AppError::Database(e) => {
                tracing::error!(error = %e, "Database error");
                "Internal server error".to_string()
            }
            AppError::Internal(msg) => {
                tracing::error!(error = %msg, "Internal error");
                "Internal server error".to_string()
            }
            AppError::Mail(msg) => {
                tracing::error!(error = %msg, "Mail delivery failed");
                self.to_string()
            }
            other => other.to_string(),
        };

        let body = Json(json!({
            "error": message,
            "code": self.code(),
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lifecycle_errors_have_distinct_codes() {
        let errors = [
            AppError::Validation("x".into()),
            AppError::Forbidden("x".into()),
            AppError::NotFound("x".into()),
            AppError::Capacity("x".into()),
            AppError::StateConflict("x".into()),
            AppError::OtpMismatch,
        ];

        let mut codes: Vec<_> = errors.iter().map(AppError::code).collect();
        codes.sort();
        codes.dedup();
        assert_eq!(codes.len(), errors.len());
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            AppError::Validation("bad".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(AppError::OtpMismatch.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            AppError::Capacity("full".into()).status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AppError::Database(DbErr::Custom("boom".into())).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_database_error_is_masked() {
        let response = AppError::Database(DbErr::Custom("secret table".into())).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
