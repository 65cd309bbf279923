use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use std::fmt;

use super::ApiResponse;
use crate::errors::{ConversionError, ScraperError};

#[derive(Debug)]
pub enum ApiError {
    NotFound(String),

    ValidationError(String),

    UpstreamError { service: String, message: String },

    Conflict(String),

    InternalError(String),
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::NotFound(msg) => write!(f, "Not found: {msg}"),
            ApiError::UpstreamError { service, message } => {
                write!(f, "{service} error: {message}")
            }
            ApiError::ValidationError(msg) => write!(f, "Validation error: {msg}"),
            ApiError::Conflict(msg) => write!(f, "Conflict: {msg}"),
            ApiError::InternalError(msg) => write!(f, "Internal error: {msg}"),
        }
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_message) = match &self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            ApiError::UpstreamError { service, message } => {
                tracing::warn!("{service} error: {message}");
                (StatusCode::BAD_GATEWAY, format!("{service}: {message}"))
            }
            ApiError::ValidationError(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
            ApiError::InternalError(msg) => {
                tracing::error!("Internal error: {msg}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "An internal error occurred".to_string(),
                )
            }
        };

        let body = ApiResponse::<()>::error(error_message);
        (status, Json(body)).into_response()
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        // Typed failures travel through anyhow from the engine handle.
        match err.downcast::<ConversionError>() {
            Ok(conversion) => ApiError::from(conversion),
            Err(err) => ApiError::InternalError(err.to_string()),
        }
    }
}

impl From<ScraperError> for ApiError {
    fn from(err: ScraperError) -> Self {
        match &err {
            ScraperError::ContentNotFound(_) => ApiError::NotFound(err.to_string()),
            ScraperError::MissingEpisodeInfo
            | ScraperError::InvalidContentId(_)
            | ScraperError::InvalidConfiguration(_) => ApiError::ValidationError(err.to_string()),
            _ => ApiError::UpstreamError {
                service: "Provider".to_string(),
                message: err.to_string(),
            },
        }
    }
}

impl From<ConversionError> for ApiError {
    fn from(err: ConversionError) -> Self {
        match &err {
            ConversionError::UnsupportedFormat(_) | ConversionError::MissingSegment(_) => {
                ApiError::ValidationError(err.to_string())
            }
            ConversionError::Io(_) => ApiError::InternalError(err.to_string()),
        }
    }
}

impl ApiError {
    pub fn not_found(resource: &str, id: impl fmt::Display) -> Self {
        ApiError::NotFound(format!("{resource} {id} not found"))
    }

    pub fn download_not_found(id: &str) -> Self {
        Self::not_found("Download", id)
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        ApiError::ValidationError(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        ApiError::InternalError(msg.into())
    }
}
