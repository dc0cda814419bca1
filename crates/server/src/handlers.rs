//! HTTP handlers.

use std::collections::BTreeMap;

use axum::{
    body::Bytes,
    extract::{Multipart, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use fatura_ocr::{BillReport, ExtractionResult};
use fatura_vision::VisionReport;

use super::error::ApiError;
use super::AppState;

/// One uploaded file from a multipart `file` field.
struct Upload {
    filename: String,
    content_type: Option<String>,
    data: Bytes,
}

async fn read_upload(mut multipart: Multipart) -> Result<Upload, ApiError> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field.file_name().unwrap_or_default().to_string();
        let content_type = field.content_type().map(str::to_string);
        let data = field.bytes().await?;
        return Ok(Upload { filename, content_type, data });
    }
    Err(ApiError::BadRequest("Missing 'file' field".into()))
}

/// Content type must be `image/*` and the size within limits.
fn check_image(state: &AppState, upload: &Upload) -> Result<(), ApiError> {
    state.policy.check_content_type(upload.content_type.as_deref())?;
    state.policy.check_size(upload.data.len())?;
    Ok(())
}

pub async fn root() -> Json<Value> {
    Json(json!({
        "message": "Turkish Bill OCR API",
        "status": "running",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub ocr_available: BTreeMap<String, bool>,
    pub vision_available: bool,
    pub timestamp: DateTime<Utc>,
}

pub async fn health(State(state): State<AppState>) -> Result<Json<HealthResponse>, ApiError> {
    // Probing engines may spawn processes.
    let pipeline = state.pipeline.clone();
    let ocr_available = tokio::task::spawn_blocking(move || pipeline.engine_availability())
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    Ok(Json(HealthResponse {
        status: "healthy",
        ocr_available,
        vision_available: state.analyzer.is_some(),
        timestamp: Utc::now(),
    }))
}

#[derive(Debug, Serialize)]
pub struct ProcessResponse {
    pub success: bool,
    pub filename: String,
    pub result: BillReport,
}

/// Full classical pipeline: OCR every engine, extract, assemble.
pub async fn process_bill(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<ProcessResponse>, ApiError> {
    let upload = read_upload(multipart).await?;
    check_image(&state, &upload)?;

    let pipeline = state.pipeline.clone();
    let data = upload.data.clone();
    let result = tokio::task::spawn_blocking(move || pipeline.process_bytes(&data))
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?
        .map_err(|e| ApiError::Internal(format!("Error processing image: {e}")))?;

    Ok(Json(ProcessResponse { success: true, filename: upload.filename, result }))
}

#[derive(Debug, Serialize)]
pub struct TextResponse {
    pub success: bool,
    pub filename: String,
    pub text: BTreeMap<String, String>,
}

/// Raw OCR text per engine, without extraction.
pub async fn extract_text(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<TextResponse>, ApiError> {
    let upload = read_upload(multipart).await?;
    check_image(&state, &upload)?;

    let pipeline = state.pipeline.clone();
    let data = upload.data.clone();
    let outputs = tokio::task::spawn_blocking(move || pipeline.recognize_bytes(&data))
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?
        .map_err(|e| ApiError::Internal(format!("Error extracting text: {e}")))?;

    let text = outputs.into_iter().map(|o| (o.engine, o.text)).collect();
    Ok(Json(TextResponse { success: true, filename: upload.filename, text }))
}

#[derive(Debug, Deserialize)]
pub struct ExtractRequest {
    pub text: String,
}

/// Structured extraction over text the caller already has.
pub async fn extract(
    State(state): State<AppState>,
    Json(req): Json<ExtractRequest>,
) -> Json<ExtractionResult> {
    Json(state.extractor.process(&req.text))
}

#[derive(Debug, Serialize)]
pub struct AnalyzeResponse {
    pub success: bool,
    pub filename: String,
    pub result: VisionReport,
}

pub async fn analyze_bill(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<AnalyzeResponse>, ApiError> {
    let Some(analyzer) = state.analyzer.clone() else {
        return Err(ApiError::Unavailable(
            "OpenAI API key not configured (set OPENAI_API_KEY)".into(),
        ));
    };

    let upload = read_upload(multipart).await?;
    if upload.filename.is_empty() {
        return Err(ApiError::BadRequest("No file selected".into()));
    }
    let report = analyzer.analyze_bytes(&upload.filename, &upload.data).await?;

    Ok(Json(AnalyzeResponse { success: report.success, filename: upload.filename, result: report }))
}
