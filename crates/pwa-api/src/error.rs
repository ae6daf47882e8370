//! API error types

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Misdirected request: {0}")]
    Misdirected(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Core error: {0}")]
    Core(#[from] pwa_core::CoreError),

    #[error("Storage error: {0}")]
    Storage(#[from] pwa_storage::StorageError),

    #[error("Network error: {0}")]
    Proxy(#[from] pwa_proxy::ProxyError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
            ApiError::Misdirected(msg) => (
                StatusCode::MISDIRECTED_REQUEST,
                "MISDIRECTED_REQUEST",
                msg.clone(),
            ),
            ApiError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                msg.clone(),
            ),
            ApiError::Core(e) => match e {
                pwa_core::CoreError::InvalidConfig(msg) => {
                    (StatusCode::BAD_REQUEST, "INVALID_CONFIG", msg.clone())
                }
                pwa_core::CoreError::Storage(e) => (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "STORAGE_ERROR",
                    e.to_string(),
                ),
            },
            ApiError::Storage(e) => match e {
                pwa_storage::StorageError::BucketNotFound(msg) => {
                    (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone())
                }
                _ => (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "STORAGE_ERROR",
                    e.to_string(),
                ),
            },
            ApiError::Proxy(e) => match e {
                pwa_proxy::ProxyError::ForeignOrigin(msg) => (
                    StatusCode::MISDIRECTED_REQUEST,
                    "MISDIRECTED_REQUEST",
                    msg.clone(),
                ),
                _ => (StatusCode::BAD_GATEWAY, "NETWORK_ERROR", e.to_string()),
            },
        };

        tracing::debug!("Request failed: {}", self);

        let body = axum::Json(json!({
            "error": {
                "code": code,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}
