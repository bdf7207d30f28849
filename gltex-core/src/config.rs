//! Transcode configuration.
//!
//! Loaded from an optional TOML file; missing keys take their defaults.
//!
//! ```toml
//! format = "avif"
//! quality = 80
//! speed = 2
//! codec = "aom"
//! avifenc = "/usr/local/bin/avifenc"
//! replicate_occlusion = true
//! ```

use crate::policy::TargetFormat;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const DEFAULT_QUALITY: u8 = 80;
pub const DEFAULT_SPEED: u8 = 2;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TranscodeConfig {
    /// Output image format
    pub format: TargetFormat,
    /// Encoder quality, 0-100
    pub quality: u8,
    /// Encoder speed, 0 (slowest) - 10 (fastest)
    pub speed: u8,
    /// AV1 codec passed to `avifenc -c`
    pub codec: String,
    /// AVIF encoder executable
    pub avifenc: String,
    /// WebP encoder executable
    pub cwebp: String,
    /// Store occlusion-only textures as greyscale (R replicated to RGB)
    pub replicate_occlusion: bool,
}

impl Default for TranscodeConfig {
    fn default() -> Self {
        Self {
            format: TargetFormat::Avif,
            quality: DEFAULT_QUALITY,
            speed: DEFAULT_SPEED,
            codec: "aom".to_string(),
            avifenc: "avifenc".to_string(),
            cwebp: "cwebp".to_string(),
            replicate_occlusion: true,
        }
    }
}

impl TranscodeConfig {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: Self = toml::from_str(s).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let s = std::fs::read_to_string(path)?;
        Self::from_toml_str(&s).map_err(|e| match e {
            Error::Config(msg) => Error::Config(format!("{}: {}", path.display(), msg)),
            other => other,
        })
    }

    pub fn validate(&self) -> Result<()> {
        if self.quality > 100 {
            return Err(Error::Config(format!(
                "quality must be 0-100, got {}",
                self.quality
            )));
        }
        if self.speed > 10 {
            return Err(Error::Config(format!("speed must be 0-10, got {}", self.speed)));
        }
        Ok(())
    }

    /// Encoder executable for the configured format
    pub fn encoder_program(&self) -> &str {
        match self.format {
            TargetFormat::Avif => &self.avifenc,
            TargetFormat::Webp => &self.cwebp,
        }
    }
}
