use image::DynamicImage;
use thiserror::Error;

use crate::config::PipelineConfig;
use crate::extract::Extractor;
use crate::preprocess::{self, UnreadableImageError};
use crate::recognizer::{OcrBackend, OcrError};
use crate::split;
use crate::types::{OcrResult, ReceiptPart};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Unreadable image: {0}")]
    UnreadableImage(#[from] UnreadableImageError),
    #[error("OCR recognition failed: {0}")]
    Ocr(#[from] OcrError),
}

/// A receipt region whose own run failed.
#[derive(Debug, Error)]
#[error("{part} receipt: {source}")]
pub struct PartFailure {
    pub part: ReceiptPart,
    #[source]
    pub source: PipelineError,
}

/// Outcome for one receipt region. A failed half never hides the other.
pub type PartResult = Result<OcrResult, PartFailure>;

/// Orchestrates: split → preprocess → OCR → extract, once per receipt region.
pub struct ReceiptPipeline<R: OcrBackend> {
    recognizer: R,
    config: PipelineConfig,
}

impl<R: OcrBackend> ReceiptPipeline<R> {
    pub fn new(recognizer: R, config: PipelineConfig) -> Self {
        Self { recognizer, config }
    }

    pub fn recognizer(&self) -> &R {
        &self.recognizer
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Decode raw bytes and run the pipeline.
    pub fn run_bytes(&self, data: &[u8], split_requested: bool) -> Result<Vec<PartResult>, PipelineError> {
        let img = preprocess::load_image(data, self.config.preprocess.max_dimension)?;
        self.run(img, split_requested)
    }

    /// Run every receipt region of `img` through the pipeline.
    ///
    /// Results come back in split order (left, then right), or as a single
    /// entry when splitting was not requested or does not apply. The outer
    /// error means the image as a whole could not be read.
    pub fn run(&self, img: DynamicImage, split_requested: bool) -> Result<Vec<PartResult>, PipelineError> {
        preprocess::ensure_within(&img, self.config.preprocess.max_dimension)?;
        let parts = if split_requested {
            split::split(img, self.config.split_policy)?
        } else {
            preprocess::ensure_readable(&img)?;
            vec![(ReceiptPart::Whole, img)]
        };

        tracing::debug!(parts = parts.len(), split_requested, "running receipt pipeline");

        Ok(parts
            .into_iter()
            .map(|(part, region)| {
                self.run_part(part, &region).map_err(|source| {
                    tracing::warn!(%part, error = %source, "receipt region failed");
                    PartFailure { part, source }
                })
            })
            .collect())
    }

    fn run_part(&self, part: ReceiptPart, region: &DynamicImage) -> Result<OcrResult, PipelineError> {
        // 1. Normalize for OCR contrast.
        let prepared = preprocess::preprocess(region, &self.config.preprocess)?;

        // 2. Run OCR.
        let raw_text = self.recognizer.recognize(&prepared)?;
        tracing::trace!(%part, text = %raw_text, "ocr output");

        // 3. Extract structured fields.
        let record = Extractor::extract(&raw_text);
        tracing::debug!(%part, nozzles = record.nozzles.len(), empty = record.is_empty(), "extracted receipt");

        Ok(OcrResult { part, record, raw_text })
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
