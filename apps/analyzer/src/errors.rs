use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::analysis::error::AnalysisError;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Analysis(#[from] AnalysisError),
}

impl AppError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            AppError::Analysis(e) => match e.root() {
                AnalysisError::InvalidInput(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
                AnalysisError::BudgetExceeded(_) => {
                    (StatusCode::PAYLOAD_TOO_LARGE, "PAYLOAD_TOO_LARGE")
                }
                AnalysisError::Configuration(_) => {
                    (StatusCode::INTERNAL_SERVER_ERROR, "CONFIGURATION_ERROR")
                }
                AnalysisError::Auth(_) => (StatusCode::BAD_GATEWAY, "UPSTREAM_AUTH"),
                AnalysisError::Billing(_) => (StatusCode::BAD_GATEWAY, "UPSTREAM_BILLING"),
                AnalysisError::RateLimited(_) => (StatusCode::TOO_MANY_REQUESTS, "RATE_LIMITED"),
                _ => (StatusCode::BAD_GATEWAY, "ANALYSIS_FAILED"),
            },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        if status.is_server_error() {
            tracing::error!("{code}: {self}");
        }

        // Analysis errors already carry user-facing wording and remediation.
        let message = match &self {
            AppError::Analysis(e) => e.to_string(),
            other => other.to_string(),
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
