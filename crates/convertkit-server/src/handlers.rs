//! HTTP handlers for the conversion tools
//!
//! Each tool endpoint reads a multipart upload, runs its conversion on the
//! blocking thread pool under the configured timeout, and returns the
//! produced file as an attachment.

use std::time::Duration;

use axum::{
    extract::{multipart::MultipartRejection, Multipart, State},
    http::{header, HeaderName, HeaderValue},
    response::{IntoResponse, Response},
    Json,
};
use convertkit_core::{
    compress_pdf, decode_image, encode_png, enhance_image, images_to_pdf, merge_pdfs, reencode,
    EnhanceSettings,
};
use serde::Serialize;
use tracing::{info, warn};

use crate::background::remove_background;
use crate::error::ServerError;
use crate::upload::{parse_target_kb, Upload};
use crate::AppState;

/// Response header reporting the JPEG quality a resize settled on.
pub const JPEG_QUALITY_HEADER: &str = "x-jpeg-quality";

/// Response header reporting whether a resize met its target size.
pub const TARGET_MET_HEADER: &str = "x-target-met";

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
}

/// Handler: GET /health
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        service: "convertkit-server",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Handler: POST /api/resize-image
///
/// Re-encodes the upload as JPEG under the `kb` form field's size.
pub async fn resize_image(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, ServerError> {
    let upload = Upload::read(multipart?).await?;
    let target_kb = parse_target_kb(upload.field("kb"))?;
    let file = upload.into_file()?;

    let result = run_blocking(&state, "resize-image", move || {
        let image = decode_image(&file)?;
        Ok(reencode(&image, target_kb)?)
    })
    .await?;

    info!(
        target_kb,
        quality = result.quality,
        bytes = result.bytes.len(),
        target_met = result.target_met,
        "resized image"
    );

    let mut response = attachment("image/jpeg", "resized.jpg", result.bytes);
    let headers = response.headers_mut();
    headers.insert(
        HeaderName::from_static(JPEG_QUALITY_HEADER),
        HeaderValue::from(u16::from(result.quality)),
    );
    headers.insert(
        HeaderName::from_static(TARGET_MET_HEADER),
        HeaderValue::from_static(if result.target_met { "true" } else { "false" }),
    );
    Ok(response)
}

/// Handler: POST /api/img-to-pdf
pub async fn img_to_pdf(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, ServerError> {
    let files = Upload::read(multipart?).await?.into_files()?;
    let count = files.len();

    let pdf = run_blocking(&state, "img-to-pdf", move || Ok(images_to_pdf(&files)?)).await?;

    info!(images = count, bytes = pdf.len(), "converted images to PDF");
    Ok(attachment("application/pdf", "converted.pdf", pdf))
}

/// Handler: POST /api/merge-pdf
pub async fn merge_pdf(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, ServerError> {
    let files = Upload::read(multipart?).await?.into_files()?;
    let count = files.len();

    let pdf = run_blocking(&state, "merge-pdf", move || Ok(merge_pdfs(&files)?)).await?;

    info!(documents = count, bytes = pdf.len(), "merged PDFs");
    Ok(attachment("application/pdf", "merged.pdf", pdf))
}

/// Handler: POST /api/compress-pdf
pub async fn compress(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, ServerError> {
    let file = Upload::read(multipart?).await?.into_file()?;
    let before = file.len();

    let pdf = run_blocking(&state, "compress-pdf", move || Ok(compress_pdf(&file)?)).await?;

    info!(before, after = pdf.len(), "compressed PDF");
    Ok(attachment("application/pdf", "compressed.pdf", pdf))
}

/// Handler: POST /api/enhance-image
pub async fn enhance(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, ServerError> {
    let file = Upload::read(multipart?).await?.into_file()?;

    let png = run_blocking(&state, "enhance-image", move || {
        let image = decode_image(&file)?;
        let enhanced = enhance_image(&image, &EnhanceSettings::default())?;
        Ok(encode_png(&enhanced)?)
    })
    .await?;

    info!(bytes = png.len(), "enhanced image");
    Ok(attachment("image/png", "enhanced.png", png))
}

/// Handler: POST /api/remove-bg
///
/// Answers with the subject on a transparent background as PNG.
pub async fn remove_bg(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, ServerError> {
    let file = Upload::read(multipart?).await?.into_file()?;
    let model = state.bg_model.clone();

    let png = run_blocking(&state, "remove-bg", move || remove_background(&file, &model)).await?;

    info!(bytes = png.len(), "removed background");
    Ok(attachment("image/png", "no-background.png", png))
}

/// Run CPU-bound work off the async runtime, bounded by the request timeout.
///
/// On timeout the response is sent immediately; the blocking task keeps
/// running to completion and its result is dropped.
async fn run_blocking<T, F>(state: &AppState, task: &'static str, work: F) -> Result<T, ServerError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, ServerError> + Send + 'static,
{
    let handle = tokio::task::spawn_blocking(work);

    match tokio::time::timeout(Duration::from_millis(state.timeout_ms), handle).await {
        Ok(Ok(result)) => result,
        Ok(Err(join_err)) => Err(ServerError::Internal(format!(
            "{task} worker failed: {join_err}"
        ))),
        Err(_) => {
            warn!(task, timeout_ms = state.timeout_ms, "processing timed out");
            Err(ServerError::Timeout(state.timeout_ms))
        }
    }
}

/// Wrap `body` as a downloadable file response.
fn attachment(content_type: &'static str, filename: &'static str, body: Vec<u8>) -> Response {
    (
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{filename}\""),
            ),
        ],
        body,
    )
        .into_response()
}
