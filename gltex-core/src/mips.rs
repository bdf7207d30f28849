//! Mip chain GPU size accumulation for block-compressed textures.
//!
//! Every level is laid out as 4x4 blocks, with each block row padded to the
//! 256-byte buffer row pitch required by the graphics API for texture uploads.

use serde::Serialize;

/// Buffer row pitch alignment for texture copies
pub const ROW_PITCH_ALIGNMENT: u64 = 256;

/// Width and height of one compressed block, in pixels
pub const BLOCK_EXTENT: u32 = 4;

/// Mips with both dimensions below this are not generated by the runtime
pub const MIN_MIP_SIZE: u32 = 4;

/// One level of a mip chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MipLevel {
    pub width: u32,
    pub height: u32,
    /// Aligned bytes per row of blocks
    pub bytes_per_row: u64,
    pub block_rows: u64,
    pub bytes: u64,
}

/// Per-level layout of a texture. Without `full_chain` only the base level is
/// returned. A zero dimension yields no levels.
pub fn mip_levels(width: u32, height: u32, block_size: u32, full_chain: bool) -> Vec<MipLevel> {
    let mut levels = Vec::new();
    if width == 0 || height == 0 {
        return levels;
    }

    let (mut w, mut h) = (width, height);
    loop {
        let blocks_per_row = u64::from(w.div_ceil(BLOCK_EXTENT));
        let block_rows = u64::from(h.div_ceil(BLOCK_EXTENT));
        let bytes_per_row = (blocks_per_row * u64::from(block_size)).div_ceil(ROW_PITCH_ALIGNMENT)
            * ROW_PITCH_ALIGNMENT;

        levels.push(MipLevel {
            width: w,
            height: h,
            bytes_per_row,
            block_rows,
            bytes: bytes_per_row * block_rows,
        });

        if !full_chain {
            break;
        }
        w = (w / 2).max(1);
        h = (h / 2).max(1);
        if w < MIN_MIP_SIZE && h < MIN_MIP_SIZE {
            break;
        }
    }
    levels
}

/// Total GPU bytes of a texture's mip chain.
pub fn mip_chain_bytes(width: u32, height: u32, block_size: u32, full_chain: bool) -> u64 {
    mip_levels(width, height, block_size, full_chain)
        .iter()
        .map(|level| level.bytes)
        .sum()
}
