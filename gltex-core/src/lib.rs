//! # glTF Texture Core
//!
//! Offline tooling for the textures embedded in glTF model containers.
//! Designed for use by the `gltex` CLI and batch scripts.
//!
//! ## Architecture
//!
//! - [`container`] - Model container I/O (GLB and glTF) and texture replacement
//! - [`roles`] - Texture role classification from material slot bindings
//! - [`channels`] - Channel preprocessing (normal renormalization, red replication)
//! - [`policy`] - Per-role encoding parameters and GPU block sizes
//! - [`encoder`] - External image encoder invocation
//! - [`transcode`] - Texture transcoding orchestrator
//! - [`probe`] - Image dimension probing from headers
//! - [`mips`] - Mip chain GPU size accumulation
//! - [`estimate`] - GPU memory estimation and reporting
//! - [`config`] - Transcode configuration (TOML)

pub mod channels;
pub mod config;
pub mod container;
pub mod encoder;
pub mod estimate;
pub mod mips;
pub mod policy;
pub mod probe;
pub mod roles;
pub mod transcode;

#[cfg(test)]
mod test_support;

// Re-export main types for convenient access
pub use channels::{NormalLayout, Preprocess};
pub use config::TranscodeConfig;
pub use container::{Document, Replacement, ReplacementSet, Texture};
pub use encoder::{EncoderInvocation, ImageEncoder, ProcessEncoder};
pub use estimate::{estimate, format_bytes, EstimateReport, EstimateTotals, TextureEstimate};
pub use mips::{mip_chain_bytes, mip_levels, MipLevel, MIN_MIP_SIZE, ROW_PITCH_ALIGNMENT};
pub use policy::{block_size, Chroma, ColorTagging, EncodingPolicy, QualityTier, TargetFormat, Tune};
pub use probe::{probe_dimensions, sniff_mime_type};
pub use roles::{classify, RoleCategory, RoleSet};
pub use transcode::{transcode_document, transcode_file, Stage, TextureOutcome, TranscodeSummary};

/// Common result type for texture pipeline operations
pub type Result<T> = std::result::Result<T, Error>;

/// Library-wide error type
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Base64 error: {0}")]
    Base64(#[from] base64::DecodeError),

    /// The input container could not be parsed.
    #[error("Invalid container: {0}")]
    Container(String),

    #[error("Unsupported: {0}")]
    Unsupported(String),

    /// The external encoder exited with a non-zero status or could not be started.
    #[error("{command} failed ({status})\n{}", encoder::failure_detail(.stdout, .stderr))]
    EncodeFailure {
        command: String,
        status: String,
        stdout: String,
        stderr: String,
    },

    #[error("Config error: {0}")]
    Config(String),
}
