use image::GrayImage;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum OcrError {
    #[error("Image handoff to OCR engine failed: {0}")]
    ImageDecode(String),
    #[error("OCR engine error: {0}")]
    Engine(String),
    #[error("Tesseract not available; build with the `tesseract` feature")]
    NotAvailable,
}

/// Abstraction over an OCR backend.
/// Implementations take a preprocessed single-channel image and return the
/// recognized text.
pub trait OcrBackend: Send + Sync {
    fn recognize(&self, image: &GrayImage) -> Result<String, OcrError>;

    /// Short backend name for status reporting.
    fn name(&self) -> &'static str;

    /// Whether the backend can actually recognize anything.
    fn is_available(&self) -> bool {
        true
    }
}

impl<R: OcrBackend + ?Sized> OcrBackend for Box<R> {
    fn recognize(&self, image: &GrayImage) -> Result<String, OcrError> {
        (**self).recognize(image)
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn is_available(&self) -> bool {
        (**self).is_available()
    }
}

// ── Mock backend (always available, used for tests) ───────────────────────────

/// Returns a pre-set string. Used to test extraction without an engine
/// without requiring Tesseract to be installed.
pub struct MockRecognizer {
    pub text: String,
}

impl MockRecognizer {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

impl OcrBackend for MockRecognizer {
    fn recognize(&self, _image: &GrayImage) -> Result<String, OcrError> {
        Ok(self.text.clone())
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

// ── Placeholder when no engine is compiled in ─────────────────────────────────

/// Fails every call with [`OcrError::NotAvailable`].
pub struct UnavailableRecognizer;

impl OcrBackend for UnavailableRecognizer {
    fn recognize(&self, _image: &GrayImage) -> Result<String, OcrError> {
        Err(OcrError::NotAvailable)
    }

    fn name(&self) -> &'static str {
        "none"
    }

    fn is_available(&self) -> bool {
        false
    }
}

// ── Tesseract backend (optional, gated behind `tesseract` feature) ─────────────

#[cfg(feature = "tesseract")]
pub mod tesseract_backend {
    use super::{OcrBackend, OcrError};
    use crate::preprocess::encode_as_png;
    use image::GrayImage;
    use leptess::{LepTess, Variable};

    /// Receipts are read as one uniform block of text.
    const PAGE_SEG_MODE: &str = "6";

    pub struct TesseractRecognizer {
        data_path: Option<String>,
        lang: String,
    }

    impl TesseractRecognizer {
        pub fn new(data_path: Option<String>, lang: &str) -> Self {
            Self { data_path, lang: lang.to_string() }
        }
    }

    impl OcrBackend for TesseractRecognizer {
        fn recognize(&self, image: &GrayImage) -> Result<String, OcrError> {
            let png = encode_as_png(image).map_err(|e| OcrError::ImageDecode(e.to_string()))?;
            let mut lt = LepTess::new(self.data_path.as_deref(), &self.lang)
                .map_err(|e| OcrError::Engine(e.to_string()))?;
            lt.set_variable(Variable::TesseditPagesegMode, PAGE_SEG_MODE)
                .map_err(|e| OcrError::Engine(e.to_string()))?;
            lt.set_image_from_mem(&png)
                .map_err(|e| OcrError::ImageDecode(e.to_string()))?;
            lt.get_utf8_text().map_err(|e| OcrError::Engine(e.to_string()))
        }

        fn name(&self) -> &'static str {
            "tesseract"
        }
    }
}
