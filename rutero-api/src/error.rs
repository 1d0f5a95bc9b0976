use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use rutero_core::error::CoreError;

/// HTTP projection of the business error taxonomy.
#[derive(Debug)]
pub struct AppError(pub CoreError);

impl From<CoreError> for AppError {
    fn from(err: CoreError) -> Self {
        Self(err)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self.0 {
            CoreError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            CoreError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            CoreError::Expired(msg) => (StatusCode::GONE, msg),
            CoreError::Validation(msg) => (StatusCode::BAD_REQUEST, msg),
            CoreError::Configuration(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg),
            CoreError::Storage(msg) => {
                tracing::error!("storage failure: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal Server Error".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": message,
        }));

        (status, body).into_response()
    }
}
