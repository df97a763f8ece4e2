//! HTTP handlers for the server.

pub mod products;
pub mod templates;
pub mod upload;

use axum::{Json, http::StatusCode};
use serde::Serialize;
use tracing::warn;

use crate::error::KvError;

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

pub type ApiError = (StatusCode, Json<ErrorBody>);

pub fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorBody {
            error: message.into(),
        }),
    )
}

/// Map a library error onto a response.
pub fn from_kv(e: KvError) -> ApiError {
    let status = match &e {
        KvError::Input(_) => StatusCode::BAD_REQUEST,
        KvError::ProductNotFound(_) => StatusCode::NOT_FOUND,
        KvError::Network(_) => StatusCode::BAD_GATEWAY,
        KvError::Asset(_) => StatusCode::UNPROCESSABLE_ENTITY,
        KvError::Export(_) | KvError::Storage(_) | KvError::Io(_) | KvError::Json(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    if status.is_server_error() {
        warn!(error = %e, "request failed");
    }
    api_error(status, e.to_string())
}
