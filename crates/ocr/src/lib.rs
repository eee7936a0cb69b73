pub mod config;
pub mod denoise;
pub mod extract;
pub mod pipeline;
pub mod preprocess;
pub mod recognizer;
pub mod split;
pub mod types;

pub use config::{ConfigError, DenoiseConfig, PipelineConfig, PreprocessConfig, SplitPolicy, ThresholdConfig};
pub use extract::Extractor;
pub use pipeline::{PartFailure, PartResult, PipelineError, ReceiptPipeline};
pub use preprocess::{load_image, preprocess, UnreadableImageError};
pub use recognizer::{MockRecognizer, OcrBackend, OcrError, UnavailableRecognizer};
pub use split::split;
pub use types::{NozzleReading, OcrResult, ReceiptPart, ReceiptRecord};

#[cfg(feature = "tesseract")]
pub use recognizer::tesseract_backend::TesseractRecognizer;
