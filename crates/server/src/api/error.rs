//! # API Errors
//!
//! Maps wizard errors onto HTTP status codes.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use stataforge_core::WizardError;

use crate::ApiResponse;

#[derive(Debug)]
pub enum ApiError {
    Wizard(WizardError),
    /// Path or body named something that does not exist
    BadRequest(String),
    Internal(anyhow::Error),
}

impl From<WizardError> for ApiError {
    fn from(err: WizardError) -> Self {
        ApiError::Wizard(err)
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError::Internal(err)
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Wizard(err) => match err {
                WizardError::SuggestionFetch(_)
                | WizardError::CodeGeneration(_)
                | WizardError::SchemaMismatch(_) => StatusCode::BAD_GATEWAY,
                WizardError::InvalidTransition { .. }
                | WizardError::Busy(_)
                | WizardError::StaleResponse(_) => StatusCode::CONFLICT,
                WizardError::InvalidRoleConfig(_) | WizardError::InvalidIdentifier(_) => {
                    StatusCode::UNPROCESSABLE_ENTITY
                }
                WizardError::UnknownVariable(_) | WizardError::UnknownMethod { .. } => {
                    StatusCode::NOT_FOUND
                }
            },
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            ApiError::Wizard(err) => err.to_string(),
            ApiError::BadRequest(message) => message.clone(),
            ApiError::Internal(err) => format!("{:#}", err),
        };
        if status.is_server_error() {
            tracing::error!(%status, error = %message, "Request failed");
        }
        (
            status,
            Json(ApiResponse {
                success: false,
                message,
            }),
        )
            .into_response()
    }
}
