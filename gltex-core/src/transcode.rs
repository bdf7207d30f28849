//! Texture transcoding orchestrator.
//!
//! Each texture with image data moves through
//! `Pending -> RolesClassified -> Preprocessed -> Encoded -> Staged`, where a
//! staged texture has its replacement waiting in the batch's side table.
//! Textures are processed one at a time in container order. The first failure
//! (including an image that could not be loaded) aborts the batch; staged
//! replacements are committed to the document together once every texture has
//! been encoded, and the output file is only written after that.
//!
//! Intermediate files live in a batch-scoped temporary directory that is
//! removed on every exit path. Each texture gets its own file names in it.

use crate::channels;
use crate::config::TranscodeConfig;
use crate::container::{Document, Replacement, ReplacementSet, Texture};
use crate::encoder::ImageEncoder;
use crate::policy::{EncodingPolicy, TargetFormat};
use crate::roles::{classify, RoleCategory, RoleSet};
use crate::{Error, Result};
use serde::Serialize;
use std::fmt;
use std::path::Path;

/// Longest texture name fragment used in temp file names
const MAX_STEM_NAME: usize = 48;

/// Per-texture state in the transcode state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Pending,
    RolesClassified,
    Preprocessed,
    Encoded,
    /// Replacement recorded, not yet applied to the document
    Staged,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::Pending => "pending",
            Stage::RolesClassified => "roles-classified",
            Stage::Preprocessed => "preprocessed",
            Stage::Encoded => "encoded",
            Stage::Staged => "staged",
        };
        f.write_str(s)
    }
}

/// Result of one transcoded texture
#[derive(Debug, Clone, Serialize)]
pub struct TextureOutcome {
    pub index: usize,
    pub name: String,
    pub roles: RoleSet,
    pub category: RoleCategory,
    pub original_mime_type: String,
    pub original_bytes: usize,
    pub encoded_bytes: usize,
}

/// Summary of a whole batch
#[derive(Debug, Clone, Serialize)]
pub struct TranscodeSummary {
    pub format: TargetFormat,
    pub transcoded: Vec<TextureOutcome>,
    /// Textures left untouched: (index, reason)
    pub skipped: Vec<(usize, String)>,
}

impl TranscodeSummary {
    fn new(format: TargetFormat) -> Self {
        Self {
            format,
            transcoded: Vec::new(),
            skipped: Vec::new(),
        }
    }

    pub fn original_bytes(&self) -> usize {
        self.transcoded.iter().map(|t| t.original_bytes).sum()
    }

    pub fn encoded_bytes(&self) -> usize {
        self.transcoded.iter().map(|t| t.encoded_bytes).sum()
    }
}

/// Read `input`, transcode its textures and write the result to `output`.
/// Nothing is written when any texture fails.
pub fn transcode_file<P: AsRef<Path>, Q: AsRef<Path>>(
    input: P,
    output: Q,
    config: &TranscodeConfig,
    encoder: &dyn ImageEncoder,
) -> Result<TranscodeSummary> {
    let mut doc = Document::read(input.as_ref())?;
    doc.check_writable()?;

    let summary = transcode_document(&mut doc, config, encoder)?;

    doc.write(output.as_ref())?;
    tracing::info!("Wrote {}", output.as_ref().display());
    Ok(summary)
}

/// Transcode every texture of `doc` in place and declare the format extension
/// as required. On error `doc` is left unchanged.
pub fn transcode_document(
    doc: &mut Document,
    config: &TranscodeConfig,
    encoder: &dyn ImageEncoder,
) -> Result<TranscodeSummary> {
    config.validate()?;

    let scratch = tempfile::Builder::new().prefix("gltex-").tempdir()?;
    let mut summary = TranscodeSummary::new(config.format);
    let mut replacements = ReplacementSet::new();

    for texture in doc.textures() {
        if let Some(reason) = &texture.load_error {
            tracing::error!(texture = %texture.display_name(), "image could not be loaded");
            return Err(Error::Container(format!(
                "texture {} could not be loaded: {}",
                texture.display_name(),
                reason
            )));
        }
        let Some(data) = texture.data.as_deref() else {
            tracing::debug!(texture = texture.index, "no image data, skipping");
            summary.skipped.push((texture.index, "no image data".into()));
            continue;
        };
        if texture.mime_type == config.format.mime_type() {
            tracing::info!(
                "Skipping {}: already {}",
                texture.display_name(),
                texture.mime_type
            );
            summary
                .skipped
                .push((texture.index, format!("already {}", texture.mime_type)));
            continue;
        }

        let (replacement, outcome) =
            transcode_texture(doc, texture, data, config, encoder, scratch.path())?;
        replacements.push(replacement);
        summary.transcoded.push(outcome);
    }

    let staged = replacements.len();
    doc.apply(replacements)?;
    doc.require_extension(config.format.extension_name());
    tracing::debug!("Committed {} staged replacement(s)", staged);
    Ok(summary)
}

fn transcode_texture(
    doc: &Document,
    texture: &Texture,
    data: &[u8],
    config: &TranscodeConfig,
    encoder: &dyn ImageEncoder,
    scratch: &Path,
) -> Result<(Replacement, TextureOutcome)> {
    let name = texture.display_name();
    let stem = format!("{:03}-{}", texture.index, sanitize(&name));
    let mut stage = Stage::Pending;

    let result: Result<(Replacement, TextureOutcome)> = (|| {
        let roles = classify(doc, texture.index);
        let category = roles.category();
        let policy = EncodingPolicy::for_category(category, config);
        stage = Stage::RolesClassified;

        let input = channels::prepare(policy.preprocess, data, &texture.mime_type, scratch, &stem)?;
        stage = Stage::Preprocessed;

        let output = scratch.join(format!("{}-out.{}", stem, config.format.file_extension()));
        let invocation = policy.invocation(config, &input, &output);
        tracing::info!(
            "Encoding {} ({}) -> {} with slots: {}",
            name,
            texture.mime_type,
            config.format.file_extension(),
            roles
        );
        encoder.run(&invocation)?;
        stage = Stage::Encoded;

        let encoded = std::fs::read(&output)?;
        let outcome = TextureOutcome {
            index: texture.index,
            name: name.clone(),
            roles,
            category,
            original_mime_type: texture.mime_type.clone(),
            original_bytes: data.len(),
            encoded_bytes: encoded.len(),
        };
        let replacement = Replacement {
            texture: texture.index,
            data: encoded,
            mime_type: config.format.mime_type().to_string(),
        };
        stage = Stage::Staged;
        Ok((replacement, outcome))
    })();

    if let Err(e) = &result {
        tracing::error!(texture = %name, after = %stage, "transcode failed: {}", e);
    }
    result
}

/// Texture name reduced to a safe file name fragment
fn sanitize(name: &str) -> String {
    name.chars()
        .take(MAX_STEM_NAME)
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}
