use axum::body::Bytes;
use axum::extract::{Multipart, State};
use axum::Json;
use pumpslip_ocr::{OcrBackend, OcrResult, PartResult, ReceiptPart, SplitPolicy};
use serde::Serialize;
use uuid::Uuid;

use crate::error::ApiError;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: &'static str,
    pub backend: &'static str,
    pub engine_available: bool,
    pub max_upload_bytes: usize,
    pub split_policy: SplitPolicy,
    pub default_split: bool,
}

pub async fn status(State(state): State<AppState>) -> Json<StatusResponse> {
    let recognizer = state.pipeline.recognizer();
    Json(StatusResponse {
        status: "OCR Service is running",
        backend: recognizer.name(),
        engine_available: recognizer.is_available(),
        max_upload_bytes: state.max_upload_bytes,
        split_policy: state.pipeline.config().split_policy,
        default_split: state.default_split,
    })
}

/// One receipt region in the response: its extraction, or why it has none.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum ResultEntry {
    Receipt(OcrResult),
    Failed { part: ReceiptPart, error: String },
}

impl From<PartResult> for ResultEntry {
    fn from(result: PartResult) -> Self {
        match result {
            Ok(r) => ResultEntry::Receipt(r),
            Err(f) => ResultEntry::Failed { part: f.part, error: f.source.to_string() },
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ProcessResponse {
    /// False when any region failed; the other regions are still reported.
    pub success: bool,
    pub results: Vec<ResultEntry>,
}

struct Upload {
    file_name: String,
    bytes: Bytes,
    split: Option<bool>,
}

async fn read_upload(multipart: &mut Multipart) -> Result<Upload, ApiError> {
    let mut image: Option<(String, Bytes)> = None;
    let mut split = None;

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().map(str::to_owned);
        match name.as_deref() {
            // A part without a filename is a plain form value, not a file.
            Some("image") => {
                if let Some(file_name) = field.file_name().map(str::to_owned) {
                    image = Some((file_name, field.bytes().await?));
                }
            }
            Some("split") => {
                let value = field.text().await?;
                split = Some(value.trim().eq_ignore_ascii_case("true"));
            }
            _ => {}
        }
    }

    let (file_name, bytes) = image.ok_or(ApiError::MissingImage)?;
    if file_name.is_empty() {
        return Err(ApiError::EmptyFilename);
    }
    Ok(Upload { file_name, bytes, split })
}

pub async fn process(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<ProcessResponse>, ApiError> {
    let request_id = Uuid::new_v4();
    let upload = read_upload(&mut multipart).await?;
    let split = upload.split.unwrap_or(state.default_split);

    tracing::info!(
        %request_id,
        file = %upload.file_name,
        bytes = upload.bytes.len(),
        split,
        "processing receipt upload"
    );

    let permit = state
        .ocr_slots
        .clone()
        .acquire_owned()
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    let pipeline = state.pipeline.clone();
    let results = tokio::task::spawn_blocking(move || {
        let _permit = permit;
        pipeline.run_bytes(&upload.bytes, split)
    })
    .await
    .map_err(|e| ApiError::Internal(e.to_string()))??;

    for r in results.iter().flatten() {
        tracing::debug!(%request_id, part = %r.part, "extracted receipt\n{}", r.record);
    }

    let success = results.iter().all(Result::is_ok);
    tracing::info!(%request_id, regions = results.len(), success, "receipt upload processed");

    Ok(Json(ProcessResponse {
        success,
        results: results.into_iter().map(ResultEntry::from).collect(),
    }))
}

// ── Tests ─────────────────────────────────────────────────────────────────────
