use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use board::BoardError;
use serde_json::json;
use thiserror::Error;
use tracing::error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    #[error("Not found")]
    NotFound,

    #[error("Internal error: {0}")]
    InternalError(#[source] BoardError),
}

impl From<BoardError> for AppError {
    fn from(e: BoardError) -> Self {
        match e {
            BoardError::InvalidInput(reason) => AppError::MalformedPayload(reason),
            other => AppError::InternalError(other),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match self {
            AppError::MalformedPayload { .. } => StatusCode::BAD_REQUEST,
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::InternalError { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let message = match &self {
            AppError::InternalError(e) => {
                error!("Request failed: {e}");
                "Internal error".to_string()
            }
            other => other.to_string(),
        };

        (
            status,
            Json(json!({ "message": message, "status": status.as_u16() })),
        )
            .into_response()
    }
}
