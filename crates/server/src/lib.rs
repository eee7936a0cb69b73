use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use pumpslip_ocr::{OcrBackend, ReceiptPipeline};
use tokio::sync::Semaphore;
use tower_http::trace::TraceLayer;

pub mod config;
pub mod error;
pub mod routes;

pub use config::{ServerConfig, TesseractConfig};
pub use error::ApiError;

pub type SharedPipeline = Arc<ReceiptPipeline<Box<dyn OcrBackend>>>;

#[derive(Clone)]
pub struct AppState {
    pub pipeline: SharedPipeline,
    /// Bounds simultaneous OCR runs; OCR is the CPU bottleneck.
    pub ocr_slots: Arc<Semaphore>,
    pub default_split: bool,
    pub max_upload_bytes: usize,
}

impl AppState {
    pub fn new(recognizer: Box<dyn OcrBackend>, config: &ServerConfig) -> Self {
        Self {
            pipeline: Arc::new(ReceiptPipeline::new(recognizer, config.pipeline.clone())),
            ocr_slots: Arc::new(Semaphore::new(config.max_concurrent_ocr)),
            default_split: config.default_split,
            max_upload_bytes: config.max_upload_bytes,
        }
    }
}

/// The OCR engine this build was compiled with.
#[cfg(feature = "tesseract")]
pub fn build_recognizer(config: &TesseractConfig) -> Box<dyn OcrBackend> {
    Box::new(pumpslip_ocr::TesseractRecognizer::new(config.data_path.clone(), &config.lang))
}

/// The OCR engine this build was compiled with.
#[cfg(not(feature = "tesseract"))]
pub fn build_recognizer(_config: &TesseractConfig) -> Box<dyn OcrBackend> {
    Box::new(pumpslip_ocr::UnavailableRecognizer)
}

pub fn router(state: AppState) -> Router {
    let body_limit = state.max_upload_bytes;
    Router::new()
        .route("/", get(routes::status))
        .route("/process", post(routes::process))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
