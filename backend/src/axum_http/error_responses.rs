use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::usecases::{installment_plans::InstallmentPlanError, payment_webhooks::WebhookError};

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub code: u16,
    pub message: String,
}

pub fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    let body = Json(ErrorResponse {
        code: status.as_u16(),
        message: message.into(),
    });

    (status, body).into_response()
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Internal server error")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            // Internal details stay in the logs.
            AppError::Internal(_) => error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error",
            ),
        }
    }
}

impl IntoResponse for InstallmentPlanError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = match &self {
            InstallmentPlanError::Internal(_) => "Internal server error".to_string(),
            other => other.to_string(),
        };

        error_response(status, message)
    }
}

impl IntoResponse for WebhookError {
    fn into_response(self) -> Response {
        error_response(self.status_code(), self.public_message())
    }
}
