//! GPU memory estimation for container textures.
//!
//! Estimates the GPU footprint of every texture as if it were uploaded in a
//! block-compressed format with a full mip chain, for a high and a low quality
//! block-size policy, next to the naive uncompressed RGBA8 size (no mips).
//! Textures are never decoded; dimensions come from image headers.

use crate::container::{Document, Texture};
use crate::mips::mip_chain_bytes;
use crate::policy::{block_size, QualityTier};
use crate::roles::{classify, RoleCategory, RoleSet};
use serde::Serialize;
use std::fmt::Write as _;

/// Bytes per pixel for RGBA8 (uncompressed)
const BYTES_PER_PIXEL_RGBA8: u64 = 4;

/// Estimate for one texture
#[derive(Debug, Clone, Serialize)]
pub struct TextureEstimate {
    pub index: usize,
    pub name: String,
    pub mime_type: String,
    pub roles: RoleSet,
    pub category: RoleCategory,
    /// 0 when the header could not be read
    pub width: u32,
    pub height: u32,
    /// Size of the encoded image in the container
    pub encoded_bytes: u64,
    pub gpu_high_bytes: u64,
    pub gpu_low_bytes: u64,
    pub uncompressed_bytes: u64,
    /// Set when the image bytes could not be loaded
    #[serde(skip_serializing_if = "Option::is_none")]
    pub load_error: Option<String>,
}

impl TextureEstimate {
    pub fn has_dimensions(&self) -> bool {
        self.width > 0 && self.height > 0
    }
}

/// Running totals over all textures
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EstimateTotals {
    pub texture_count: usize,
    /// Textures whose dimensions could not be determined
    pub unknown_dimensions: usize,
    pub encoded_bytes: u64,
    pub gpu_high_bytes: u64,
    pub gpu_low_bytes: u64,
    pub uncompressed_bytes: u64,
}

impl EstimateTotals {
    fn add(&mut self, entry: &TextureEstimate) {
        self.texture_count += 1;
        if !entry.has_dimensions() {
            self.unknown_dimensions += 1;
        }
        self.encoded_bytes += entry.encoded_bytes;
        self.gpu_high_bytes += entry.gpu_high_bytes;
        self.gpu_low_bytes += entry.gpu_low_bytes;
        self.uncompressed_bytes += entry.uncompressed_bytes;
    }
}

/// Per-texture estimates plus totals
#[derive(Debug, Clone, Serialize)]
pub struct EstimateReport {
    pub textures: Vec<TextureEstimate>,
    pub totals: EstimateTotals,
}

impl EstimateReport {
    /// Human-readable report, one line per texture followed by totals
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        for t in &self.textures {
            if let Some(reason) = &t.load_error {
                let _ = writeln!(out, "Texture {}, {}: unavailable ({})", t.name, t.roles, reason);
                continue;
            }
            let dims = if t.has_dimensions() {
                format!("{}x{}", t.width, t.height)
            } else {
                "unknown size".to_string()
            };
            let _ = writeln!(
                out,
                "Texture {}, {}, {} ({}), {}: size = {}, gpu (high) = {}, gpu (low) = {}, uncompressed = {}",
                t.name,
                t.mime_type,
                t.roles,
                t.category.label(),
                dims,
                format_bytes(t.encoded_bytes),
                format_bytes(t.gpu_high_bytes),
                format_bytes(t.gpu_low_bytes),
                format_bytes(t.uncompressed_bytes),
            );
        }

        let totals = &self.totals;
        let _ = writeln!(out, "Total size: {}", format_bytes(totals.encoded_bytes));
        let _ = writeln!(out, "Total GPU (high quality): {}", format_bytes(totals.gpu_high_bytes));
        let _ = writeln!(out, "Total GPU (low quality): {}", format_bytes(totals.gpu_low_bytes));
        let _ = write!(out, "Total uncompressed: {}", format_bytes(totals.uncompressed_bytes));
        if totals.unknown_dimensions > 0 {
            let _ = write!(
                out,
                "\n{} texture(s) with unknown dimensions excluded from GPU totals",
                totals.unknown_dimensions
            );
        }
        out
    }

    pub fn to_json(&self) -> crate::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Estimate one texture. Unknown dimensions contribute zero GPU bytes.
fn estimate_texture(doc: &Document, texture: &Texture) -> TextureEstimate {
    let roles = classify(doc, texture.index);
    let category = roles.category();
    let (width, height) = texture.dimensions();

    let gpu_high_bytes = mip_chain_bytes(width, height, block_size(category, QualityTier::High), true);
    let gpu_low_bytes = mip_chain_bytes(width, height, block_size(category, QualityTier::Low), true);
    let uncompressed_bytes = u64::from(width) * u64::from(height) * BYTES_PER_PIXEL_RGBA8;

    TextureEstimate {
        index: texture.index,
        name: texture.display_name(),
        mime_type: texture.mime_type.clone(),
        roles,
        category,
        width,
        height,
        encoded_bytes: texture.byte_len() as u64,
        gpu_high_bytes,
        gpu_low_bytes,
        uncompressed_bytes,
        load_error: texture.load_error.clone(),
    }
}

/// Estimate every texture that carries image data. Read-only.
///
/// Images whose bytes failed to load are listed with zero sizes and a warning;
/// the remaining textures are still estimated.
pub fn estimate(doc: &Document) -> EstimateReport {
    let mut textures = Vec::new();
    let mut totals = EstimateTotals::default();

    for texture in doc.textures() {
        if let Some(reason) = &texture.load_error {
            tracing::warn!("Skipping texture {}: {}", texture.display_name(), reason);
        } else if texture.data.is_none() {
            continue;
        }
        let entry = estimate_texture(doc, texture);
        totals.add(&entry);
        textures.push(entry);
    }

    EstimateReport { textures, totals }
}

/// Format a byte count with base-1024 units and one decimal.
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    if bytes == 0 {
        return "0 B".to_string();
    }

    let mut unit = 0;
    let mut threshold = 1u64;
    while unit + 1 < UNITS.len() && bytes >= threshold * 1024 {
        threshold *= 1024;
        unit += 1;
    }
    format!("{:.1} {}", bytes as f64 / threshold as f64, UNITS[unit])
}
