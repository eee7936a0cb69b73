use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid setting `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// How a scan is divided into receipts when splitting is requested.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum SplitPolicy {
    /// Split only landscape scans (width > height).
    #[default]
    AspectRatio,
    /// Split every scan at least two pixels wide.
    Always,
}

impl std::fmt::Display for SplitPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SplitPolicy::AspectRatio => write!(f, "aspect-ratio"),
            SplitPolicy::Always => write!(f, "always"),
        }
    }
}

/// Non-local-means settings, tuned for thermal receipt paper.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DenoiseConfig {
    /// Filter strength `h`; larger removes more noise and more detail.
    pub strength: f32,
    /// Side of the square patch compared between pixels (odd).
    pub template_window: u32,
    /// Side of the square area searched for similar patches (odd).
    pub search_window: u32,
}

impl Default for DenoiseConfig {
    fn default() -> Self {
        Self { strength: 30.0, template_window: 7, search_window: 21 }
    }
}

/// Gaussian adaptive threshold settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ThresholdConfig {
    /// Side of the neighbourhood the local mean is taken over (odd, >= 3).
    pub block_size: u32,
    /// Subtracted from the local mean before comparing.
    pub offset: i32,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self { block_size: 11, offset: 2 }
    }
}

/// Largest accepted upscale factor.
pub const MAX_UPSCALE_FACTOR: u32 = 8;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PreprocessConfig {
    /// Longest side, in pixels, of an image accepted for processing.
    /// Checked before upscaling, while decoding.
    pub max_dimension: u32,
    pub upscale_factor: u32,
    pub denoise: DenoiseConfig,
    pub threshold: ThresholdConfig,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            max_dimension: 6000,
            upscale_factor: 2,
            denoise: DenoiseConfig::default(),
            threshold: ThresholdConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PipelineConfig {
    pub split_policy: SplitPolicy,
    pub preprocess: PreprocessConfig,
}

impl PipelineConfig {
    pub fn from_toml(toml_content: &str) -> Result<Self, ConfigError> {
        let config: PipelineConfig = toml::from_str(toml_content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let p = &self.preprocess;
        if p.upscale_factor == 0 || p.upscale_factor > MAX_UPSCALE_FACTOR {
            return Err(invalid(
                "preprocess.upscale_factor",
                format!("must be between 1 and {MAX_UPSCALE_FACTOR}, got {}", p.upscale_factor),
            ));
        }
        if p.max_dimension == 0 {
            return Err(invalid("preprocess.max_dimension", "must be at least 1"));
        }
        if p.max_dimension.checked_mul(p.upscale_factor).is_none() {
            return Err(invalid("preprocess.max_dimension", "overflows once upscaled"));
        }
        if p.denoise.strength.is_nan() || p.denoise.strength <= 0.0 {
            return Err(invalid("preprocess.denoise.strength", "must be positive"));
        }
        check_odd("preprocess.denoise.template_window", p.denoise.template_window, 1)?;
        check_odd("preprocess.denoise.search_window", p.denoise.search_window, 1)?;
        check_odd("preprocess.threshold.block_size", p.threshold.block_size, 3)?;
        Ok(())
    }
}

fn check_odd(field: &'static str, value: u32, min: u32) -> Result<(), ConfigError> {
    if value < min || value % 2 == 0 {
        return Err(invalid(field, format!("must be odd and at least {min}, got {value}")));
    }
    Ok(())
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid { field, reason: reason.into() }
}
