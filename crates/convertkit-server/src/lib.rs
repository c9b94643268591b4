//! ConvertKit Server
//!
//! HTTP front end for `convertkit-core`. Provides endpoints for:
//!
//! - Image resize to a target size (JPEG)
//! - Image to PDF conversion
//! - PDF merging and compression
//! - Image auto enhancement (PNG)
//! - Background removal (PNG, `remove-bg` feature)
//!
//! All tool endpoints accept `multipart/form-data` and answer with the
//! produced file as an attachment, or a JSON error body.

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

pub mod background;
pub mod config;
pub mod error;
pub mod handlers;
pub mod upload;

pub use config::Args;
pub use error::ServerError;

/// Shared application state
#[derive(Debug, Clone)]
pub struct AppState {
    /// Per-request processing timeout in milliseconds
    pub timeout_ms: u64,
    /// Largest accepted request body in bytes
    pub max_upload_bytes: usize,
    /// Background removal model id or directory
    pub bg_model: String,
}

impl From<&Args> for AppState {
    fn from(args: &Args) -> Self {
        Self {
            timeout_ms: args.timeout_ms,
            max_upload_bytes: args.max_upload_bytes(),
            bg_model: args.bg_model.clone(),
        }
    }
}

/// Build the application router with its middleware.
pub fn router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(handlers::health))
        // Image tools
        .route("/api/resize-image", post(handlers::resize_image))
        .route("/api/enhance-image", post(handlers::enhance))
        .route("/api/remove-bg", post(handlers::remove_bg))
        // PDF tools
        .route("/api/img-to-pdf", post(handlers::img_to_pdf))
        .route("/api/merge-pdf", post(handlers::merge_pdf))
        .route("/api/compress-pdf", post(handlers::compress))
        // Apply middleware
        .layer(DefaultBodyLimit::max(state.max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
