use std::path::Path;

use pumpslip_ocr::{ConfigError, PipelineConfig};
use serde::{Deserialize, Serialize};

/// Environment variable naming a TOML config file.
pub const CONFIG_ENV: &str = "PUMPSLIP_CONFIG";
/// Environment variable overriding `bind`.
pub const BIND_ENV: &str = "PUMPSLIP_BIND";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TesseractConfig {
    /// Directory holding `tessdata`; `None` uses the engine's default lookup.
    pub data_path: Option<String>,
    pub lang: String,
}

impl Default for TesseractConfig {
    fn default() -> Self {
        Self { data_path: None, lang: "eng".to_string() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    /// Largest accepted request body.
    pub max_upload_bytes: usize,
    /// OCR runs allowed at once; further requests wait for a slot.
    pub max_concurrent_ocr: usize,
    /// Used when a request does not say whether to split.
    pub default_split: bool,
    pub tesseract: TesseractConfig,
    pub pipeline: PipelineConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:5001".to_string(),
            max_upload_bytes: 10 * 1024 * 1024,
            max_concurrent_ocr: 2,
            default_split: true,
            tesseract: TesseractConfig::default(),
            pipeline: PipelineConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn from_toml(toml_content: &str) -> Result<Self, ConfigError> {
        let config: ServerConfig = toml::from_str(toml_content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_concurrent_ocr == 0 {
            return Err(ConfigError::Invalid {
                field: "max_concurrent_ocr",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.max_upload_bytes == 0 {
            return Err(ConfigError::Invalid {
                field: "max_upload_bytes",
                reason: "must be at least 1".to_string(),
            });
        }
        self.pipeline.validate()
    }

    /// Read the file named by `PUMPSLIP_CONFIG` (defaults when unset), then
    /// apply `PUMPSLIP_BIND`.
    pub fn load() -> anyhow::Result<Self> {
        let mut config = match std::env::var_os(CONFIG_ENV) {
            Some(path) => Self::load_file(Path::new(&path))?,
            None => Self::default(),
        };
        if let Ok(bind) = std::env::var(BIND_ENV) {
            config.bind = bind;
        }
        Ok(config)
    }

    pub fn load_file(path: &Path) -> anyhow::Result<Self> {
        use anyhow::Context;

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_toml(&content).with_context(|| format!("Invalid config file {}", path.display()))
    }
}
