use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

use crate::usecases::{payments::PaymentError, recipe_access::AccessError};

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub code: u16,
    pub message: String,
}

fn error_body(status: StatusCode, message: String) -> Response {
    let body = Json(ErrorResponse {
        code: status.as_u16(),
        message,
    });

    (status, body).into_response()
}

/// Request-level failures that happen before a use case runs.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("sign in required")]
    Unauthorized,

    #[error("Bad request: {0}")]
    BadRequest(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match self {
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
        };
        error_body(status, self.to_string())
    }
}

impl IntoResponse for AccessError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if let AccessError::StorageFault(err) = &self {
            error!(db_error = ?err, "http: access request failed on storage");
        }
        error_body(status, self.to_string())
    }
}

impl IntoResponse for PaymentError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = match &self {
            PaymentError::StorageFault(err) | PaymentError::Internal(err) => {
                error!(error = ?err, "http: payment request failed");
                // internal detail stays in the logs
                status
                    .canonical_reason()
                    .unwrap_or("Internal server error")
                    .to_string()
            }
            _ => self.to_string(),
        };
        error_body(status, message)
    }
}
