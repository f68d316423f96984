use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tracing::error;

use hearth_core::{Declined, HouseError};
use hearth_db::StoreError;
use hearth_types::api::ErrorResponse;

#[derive(Debug)]
pub enum ApiError {
    Declined(Declined),
    Unauthorized,
    Forbidden,
    NotFound(String),
    Internal,
}

impl From<HouseError> for ApiError {
    fn from(e: HouseError) -> Self {
        match e {
            HouseError::Declined(reason) => Self::Declined(reason),
            HouseError::Store(e @ StoreError::NotFound { .. }) => Self::NotFound(e.to_string()),
            other => {
                error!("Request failed: {}", other);
                Self::Internal
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::Declined(reason) => {
                let status = match reason {
                    Declined::UsernameTaken(_) | Declined::CapacityReached { .. } => {
                        StatusCode::CONFLICT
                    }
                    _ => StatusCode::BAD_REQUEST,
                };
                (status, reason.to_string())
            }
            Self::Unauthorized => (StatusCode::UNAUTHORIZED, "not signed in".to_string()),
            Self::Forbidden => (StatusCode::FORBIDDEN, "admin only".to_string()),
            Self::NotFound(what) => (StatusCode::NOT_FOUND, what),
            Self::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal error".to_string(),
            ),
        };

        (status, Json(ErrorResponse { error: message })).into_response()
    }
}
