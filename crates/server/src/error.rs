use axum::extract::multipart::MultipartError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use pumpslip_ocr::PipelineError;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("No image provided")]
    MissingImage,
    #[error("No file selected")]
    EmptyFilename,
    #[error("{0}")]
    Multipart(#[from] MultipartError),
    #[error("{0}")]
    Pipeline(#[from] PipelineError),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::MissingImage | ApiError::EmptyFilename => StatusCode::BAD_REQUEST,
            ApiError::Multipart(e) => e.status(),
            ApiError::Pipeline(PipelineError::UnreadableImage(_)) => StatusCode::UNPROCESSABLE_ENTITY,
            // OCR failures are reported per region inside a 200 body, so an
            // outer one would mean the pipeline broke its own contract.
            ApiError::Pipeline(PipelineError::Ocr(_)) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::info!(error = %self, %status, "request rejected");
        }
        (status, Json(json!({ "success": false, "error": self.to_string() }))).into_response()
    }
}
