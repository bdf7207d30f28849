//! Per-role encoding parameters and GPU block sizes.
//!
//! Both policies are total functions over [`RoleCategory`].

use crate::channels::{NormalLayout, Preprocess};
use crate::config::TranscodeConfig;
use crate::container::{EXT_TEXTURE_AVIF, EXT_TEXTURE_WEBP};
use crate::encoder::EncoderInvocation;
use crate::roles::RoleCategory;
use crate::Error;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;

/// Output image format of the transcode pipeline
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetFormat {
    #[default]
    Avif,
    Webp,
}

impl TargetFormat {
    pub fn mime_type(&self) -> &'static str {
        match self {
            TargetFormat::Avif => "image/avif",
            TargetFormat::Webp => "image/webp",
        }
    }

    /// Extension declared as required by the rewritten container
    pub fn extension_name(&self) -> &'static str {
        match self {
            TargetFormat::Avif => EXT_TEXTURE_AVIF,
            TargetFormat::Webp => EXT_TEXTURE_WEBP,
        }
    }

    pub fn file_extension(&self) -> &'static str {
        match self {
            TargetFormat::Avif => "avif",
            TargetFormat::Webp => "webp",
        }
    }
}

impl FromStr for TargetFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "avif" => Ok(TargetFormat::Avif),
            "webp" => Ok(TargetFormat::Webp),
            _ => Err(Error::Config(format!("Unknown format: {}. Use avif or webp.", s))),
        }
    }
}

/// Colorimetric tagging of the encoded image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorTagging {
    /// Identity matrix, linear transfer: channels are stored as data
    Identity,
    /// Regular YUV transform for color content
    Standard,
}

/// Chroma subsampling of the encoded image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Chroma {
    Yuv444,
    /// Luma only
    Yuv400,
}

impl Chroma {
    fn avifenc_value(&self) -> &'static str {
        match self {
            Chroma::Yuv444 => "444",
            Chroma::Yuv400 => "400",
        }
    }
}

/// Encoder tuning metric
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Tune {
    Ssim,
    Iq,
}

/// How one texture gets encoded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodingPolicy {
    pub format: TargetFormat,
    pub preprocess: Preprocess,
    pub color: ColorTagging,
    pub chroma: Chroma,
    pub tune: Tune,
    /// WebP near-lossless level; lossy `-q` when `None`
    pub near_lossless: Option<u8>,
}

/// cicp triple: BT.709 primaries, linear transfer, identity matrix
const CICP_IDENTITY: &str = "1/8/0";

const WEBP_NORMAL_NEAR_LOSSLESS: u8 = 50;

impl EncodingPolicy {
    pub fn for_category(category: RoleCategory, config: &TranscodeConfig) -> Self {
        match config.format {
            TargetFormat::Avif => Self::avif(category, config),
            TargetFormat::Webp => Self::webp(category),
        }
    }

    fn avif(category: RoleCategory, config: &TranscodeConfig) -> Self {
        let base = Self {
            format: TargetFormat::Avif,
            preprocess: Preprocess::None,
            color: ColorTagging::Standard,
            chroma: Chroma::Yuv444,
            tune: Tune::Iq,
            near_lossless: None,
        };
        match category {
            RoleCategory::Normal => Self {
                preprocess: Preprocess::RenormalizeNormal(NormalLayout::XyZeroZ),
                color: ColorTagging::Identity,
                tune: Tune::Ssim,
                ..base
            },
            RoleCategory::Occlusion => Self {
                preprocess: if config.replicate_occlusion {
                    Preprocess::ReplicateRed
                } else {
                    Preprocess::None
                },
                chroma: Chroma::Yuv400,
                tune: Tune::Ssim,
                ..base
            },
            RoleCategory::MetallicRoughness => Self {
                color: ColorTagging::Identity,
                tune: Tune::Ssim,
                ..base
            },
            RoleCategory::Other => base,
        }
    }

    fn webp(category: RoleCategory) -> Self {
        let base = Self {
            format: TargetFormat::Webp,
            preprocess: Preprocess::None,
            color: ColorTagging::Standard,
            chroma: Chroma::Yuv444,
            tune: Tune::Iq,
            near_lossless: None,
        };
        match category {
            RoleCategory::Normal => Self {
                preprocess: Preprocess::RenormalizeNormal(NormalLayout::Xxxy),
                color: ColorTagging::Identity,
                near_lossless: Some(WEBP_NORMAL_NEAR_LOSSLESS),
                ..base
            },
            RoleCategory::MetallicRoughness => Self {
                color: ColorTagging::Identity,
                ..base
            },
            RoleCategory::Occlusion | RoleCategory::Other => base,
        }
    }

    /// Encoder argument vector, without input and output paths
    pub fn encoder_args(&self, config: &TranscodeConfig) -> Vec<String> {
        match self.format {
            TargetFormat::Avif => {
                let tune = match self.tune {
                    Tune::Ssim => "tune=ssim",
                    Tune::Iq => "tune=iq",
                };
                let mut args = vec![
                    "-q".to_string(),
                    config.quality.to_string(),
                    "-s".to_string(),
                    config.speed.to_string(),
                    "-c".to_string(),
                    config.codec.clone(),
                    "-a".to_string(),
                    tune.to_string(),
                    "--yuv".to_string(),
                    self.chroma.avifenc_value().to_string(),
                ];
                if self.color == ColorTagging::Identity {
                    args.push("--cicp".to_string());
                    args.push(CICP_IDENTITY.to_string());
                }
                args
            }
            TargetFormat::Webp => match self.near_lossless {
                Some(level) => vec!["-near_lossless".to_string(), level.to_string()],
                None => vec!["-q".to_string(), config.quality.to_string()],
            },
        }
    }

    /// Full encoder call reading `input` and writing `output`.
    pub fn invocation(&self, config: &TranscodeConfig, input: &Path, output: &Path) -> EncoderInvocation {
        let mut args = self.encoder_args(config);
        let input_arg = input.display().to_string();
        let output_arg = output.display().to_string();
        match self.format {
            TargetFormat::Avif => {
                args.push(input_arg);
                args.push(output_arg);
            }
            TargetFormat::Webp => {
                args.push(input_arg);
                args.push("-o".to_string());
                args.push(output_arg);
            }
        }
        EncoderInvocation {
            program: config.encoder_program().to_string(),
            args,
            input: input.to_path_buf(),
            output: output.to_path_buf(),
        }
    }
}

/// Quality tier of the assumed GPU block format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum QualityTier {
    High,
    Low,
}

/// Bytes per 4x4 block assumed for a texture of `category` at `tier`.
///
/// High: BC5/EAC-RG for normals, BC4/EAC-R for occlusion, BC7/ASTC 4x4 for the rest.
/// Low: BC1/ETC2 for color and metallic-roughness; normals and occlusion unchanged.
pub fn block_size(category: RoleCategory, tier: QualityTier) -> u32 {
    match (category, tier) {
        (RoleCategory::Normal, _) => 16,
        (RoleCategory::Occlusion, _) => 8,
        (RoleCategory::MetallicRoughness, QualityTier::High) => 16,
        (RoleCategory::MetallicRoughness, QualityTier::Low) => 8,
        (RoleCategory::Other, QualityTier::High) => 16,
        (RoleCategory::Other, QualityTier::Low) => 8,
    }
}
