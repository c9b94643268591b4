//! Error types for the ConvertKit server

use axum::{
    extract::multipart::{MultipartError, MultipartRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use convertkit_core::{DecodeError, EncodeError, PdfError, ReencodeError};
use serde::Serialize;
use thiserror::Error;

/// Server error types
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Invalid target size: {0}")]
    InvalidTarget(String),

    #[error("Unreadable file: {0}")]
    UnreadableFile(String),

    #[error("Upload exceeds the size limit")]
    PayloadTooLarge,

    #[error("Processing timeout after {0}ms")]
    Timeout(u64),

    #[error("Encoding failed: {0}")]
    EncodeFailed(String),

    #[error("Background removal failed: {0}")]
    BackgroundRemoval(String),

    #[error("Feature not enabled in this build: {0}")]
    FeatureDisabled(&'static str),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ServerError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            ServerError::InvalidRequest(_) => (StatusCode::BAD_REQUEST, "INVALID_REQUEST"),
            ServerError::InvalidTarget(_) => (StatusCode::BAD_REQUEST, "INVALID_TARGET"),
            ServerError::UnreadableFile(_) => (StatusCode::BAD_REQUEST, "UNREADABLE_FILE"),
            ServerError::PayloadTooLarge => (StatusCode::PAYLOAD_TOO_LARGE, "PAYLOAD_TOO_LARGE"),
            ServerError::Timeout(_) => (StatusCode::REQUEST_TIMEOUT, "TIMEOUT"),
            ServerError::EncodeFailed(_) => (StatusCode::INTERNAL_SERVER_ERROR, "ENCODE_ERROR"),
            ServerError::BackgroundRemoval(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "BACKGROUND_REMOVAL_ERROR")
            }
            ServerError::FeatureDisabled(_) => (StatusCode::NOT_IMPLEMENTED, "FEATURE_DISABLED"),
            ServerError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }
}

/// Error response body
#[derive(Serialize)]
struct ErrorResponse {
    success: bool,
    error: String,
    code: String,
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        if status.is_server_error() {
            tracing::error!(code, "{self}");
        }

        let body = ErrorResponse {
            success: false,
            error: self.to_string(),
            code: code.to_string(),
        };

        (status, Json(body)).into_response()
    }
}

impl From<ReencodeError> for ServerError {
    fn from(err: ReencodeError) -> Self {
        match err {
            ReencodeError::InvalidTarget(kb) => {
                ServerError::InvalidTarget(format!("{kb} KB (must be a positive number)"))
            }
            ReencodeError::EncodeFailure { quality, source } => {
                ServerError::EncodeFailed(format!("quality {quality}: {source}"))
            }
        }
    }
}

impl From<DecodeError> for ServerError {
    fn from(err: DecodeError) -> Self {
        ServerError::UnreadableFile(err.to_string())
    }
}

impl From<EncodeError> for ServerError {
    fn from(err: EncodeError) -> Self {
        ServerError::EncodeFailed(err.to_string())
    }
}

impl From<PdfError> for ServerError {
    fn from(err: PdfError) -> Self {
        match err {
            PdfError::NoDocuments | PdfError::NoImages => {
                ServerError::InvalidRequest(err.to_string())
            }
            PdfError::Parse { .. } | PdfError::Image { .. } | PdfError::Structure(_) => {
                ServerError::UnreadableFile(err.to_string())
            }
            PdfError::Write(_) => ServerError::Internal(err.to_string()),
        }
    }
}

#[cfg(feature = "remove-bg")]
impl From<imgly_bgremove::BgRemovalError> for ServerError {
    fn from(err: imgly_bgremove::BgRemovalError) -> Self {
        ServerError::BackgroundRemoval(err.to_string())
    }
}

impl From<MultipartError> for ServerError {
    fn from(err: MultipartError) -> Self {
        if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ServerError::PayloadTooLarge
        } else {
            ServerError::InvalidRequest(err.body_text())
        }
    }
}

impl From<MultipartRejection> for ServerError {
    fn from(err: MultipartRejection) -> Self {
        if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ServerError::PayloadTooLarge
        } else {
            ServerError::InvalidRequest(err.body_text())
        }
    }
}
