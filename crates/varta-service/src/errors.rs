use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Title cannot be turned into a slug")]
    InvalidTitle,

    #[error("Could not allocate a unique slug for '{base}' after {attempts} attempts")]
    SlugAllocationExhausted { base: String, attempts: u32 },

    #[error("Invalid cursor: {0}")]
    InvalidCursor(String),

    #[error("Limit must be between 1 and {max}")]
    InvalidLimit { max: u32 },

    #[error("Validation failed: {0}")]
    Validation(#[from] crate::validation::ValidationError),

    #[error("{0}")]
    BadRequest(String),

    #[error("Caller identity is required")]
    Unauthenticated,

    #[error("Not allowed to modify this item")]
    Forbidden,

    #[error("Not found")]
    NotFound,

    #[error("Store unavailable: {0}")]
    StoreUnavailable(#[from] diesel::result::Error),

    #[error("Internal server error")]
    Internal,
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::InvalidTitle
            | ApiError::InvalidCursor(_)
            | ApiError::InvalidLimit { .. }
            | ApiError::Validation(_)
            | ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::SlugAllocationExhausted { .. } => StatusCode::CONFLICT,
            ApiError::Unauthenticated => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::StoreUnavailable(_) | ApiError::Internal => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_message = match self {
            ApiError::StoreUnavailable(ref err) => {
                // Log the detailed error but don't expose it to the client
                error!(error = %err, "Content store error occurred");
                "Internal server error".to_string()
            }
            ref other => other.to_string(),
        };

        let body = Json(json!({
            "error": error_message
        }));

        (status, body).into_response()
    }
}
