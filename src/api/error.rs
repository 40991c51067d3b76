use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use crate::api::types::ErrorResponse;
use crate::error::RaasError;

impl IntoResponse for RaasError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            RaasError::JobNotFound(_) | RaasError::HardwareNotFound(_) => {
                (StatusCode::NOT_FOUND, "NOT_FOUND", self.to_string())
            }
            RaasError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            RaasError::Forbidden => (StatusCode::FORBIDDEN, "FORBIDDEN", self.to_string()),
            RaasError::InvalidTransition { .. } => {
                (StatusCode::CONFLICT, "CONFLICT", self.to_string())
            }
            _ => {
                tracing::error!(error = %self, "Request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal error occurred".to_string(),
                )
            }
        };

        (
            status,
            Json(ErrorResponse {
                error: message,
                code: code.to_string(),
            }),
        )
            .into_response()
    }
}

impl From<JsonRejection> for RaasError {
    fn from(rejection: JsonRejection) -> Self {
        RaasError::Validation(rejection.body_text())
    }
}

impl From<QueryRejection> for RaasError {
    fn from(rejection: QueryRejection) -> Self {
        RaasError::Validation(rejection.body_text())
    }
}
