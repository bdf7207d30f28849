//! Image dimension probing.
//!
//! Reads width and height from encoded image headers without decoding pixels.
//! PNG, JPEG, WebP, GIF, BMP and TGA go through the `image` crate's header
//! readers; AVIF and KTX2 are parsed directly.

use image::{ImageFormat, ImageReader};
use std::io::Cursor;

/// Formats probed through the `image` crate
pub const HEADER_FORMATS: &[ImageFormat] = &[
    ImageFormat::Png,
    ImageFormat::Jpeg,
    ImageFormat::WebP,
    ImageFormat::Gif,
    ImageFormat::Bmp,
    ImageFormat::Tga,
];

const KTX2_IDENTIFIER: &[u8; 12] = b"\xABKTX 20\xBB\r\n\x1A\n";

/// Width and height of an encoded image, by declared mime type.
///
/// Returns (0, 0) when the type is unknown or the header is unreadable.
/// Callers treat that as "unknown size".
pub fn probe_dimensions(data: &[u8], mime_type: &str) -> (u32, u32) {
    match try_probe(data, mime_type) {
        Some(dims) => dims,
        None => {
            tracing::warn!(mime_type, bytes = data.len(), "could not determine image dimensions");
            (0, 0)
        }
    }
}

fn try_probe(data: &[u8], mime_type: &str) -> Option<(u32, u32)> {
    match mime_type {
        "image/avif" => avif_dimensions(data),
        "image/ktx2" => ktx2_dimensions(data),
        _ => {
            let format = ImageFormat::from_mime_type(mime_type)?;
            if !HEADER_FORMATS.contains(&format) {
                return None;
            }
            ImageReader::with_format(Cursor::new(data), format)
                .into_dimensions()
                .ok()
        }
    }
}

/// Guess a mime type from magic bytes.
pub fn sniff_mime_type(data: &[u8]) -> Option<&'static str> {
    if data.starts_with(b"\x89PNG\r\n\x1a\n") {
        Some("image/png")
    } else if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
        Some("image/jpeg")
    } else if data.len() >= 12 && &data[0..4] == b"RIFF" && &data[8..12] == b"WEBP" {
        Some("image/webp")
    } else if data.starts_with(KTX2_IDENTIFIER) {
        Some("image/ktx2")
    } else if is_avif(data) {
        Some("image/avif")
    } else {
        None
    }
}

fn is_avif(data: &[u8]) -> bool {
    let Some(ftyp) = find_box(data, b"ftyp") else {
        return false;
    };
    // major brand, minor version, then compatible brands
    ftyp.chunks_exact(4)
        .enumerate()
        .any(|(i, brand)| i != 1 && (brand == b"avif" || brand == b"avis"))
}

/// `meta` -> `iprp` -> `ipco` -> first `ispe`.
fn avif_dimensions(data: &[u8]) -> Option<(u32, u32)> {
    let meta = find_box(data, b"meta")?;
    // meta is a full box: skip version and flags
    let iprp = find_box(meta.get(4..)?, b"iprp")?;
    let ipco = find_box(iprp, b"ipco")?;
    let ispe = find_box(ipco, b"ispe")?;
    let width = be_u32(ispe, 4)?;
    let height = be_u32(ispe, 8)?;
    Some((width, height))
}

fn ktx2_dimensions(data: &[u8]) -> Option<(u32, u32)> {
    if !data.starts_with(KTX2_IDENTIFIER) {
        return None;
    }
    let width = u32::from_le_bytes(data.get(20..24)?.try_into().ok()?);
    let height = u32::from_le_bytes(data.get(24..28)?.try_into().ok()?);
    // pixelHeight is 0 for 1D textures
    Some((width, height.max(1)))
}

/// Payload of the first ISO-BMFF box of `kind` at this level.
fn find_box<'a>(data: &'a [u8], kind: &[u8; 4]) -> Option<&'a [u8]> {
    let mut pos = 0usize;
    while pos + 8 <= data.len() {
        let size = be_u32(data, pos)? as usize;
        let box_type = &data[pos + 4..pos + 8];
        let (header, size) = match size {
            0 => (8, data.len() - pos),
            1 => (16, usize::try_from(be_u64(data, pos + 8)?).ok()?),
            n => (8, n),
        };
        if size < header || pos.checked_add(size)? > data.len() {
            return None;
        }
        if box_type == kind {
            return Some(&data[pos + header..pos + size]);
        }
        pos += size;
    }
    None
}

fn be_u32(data: &[u8], at: usize) -> Option<u32> {
    Some(u32::from_be_bytes(data.get(at..at + 4)?.try_into().ok()?))
}

fn be_u64(data: &[u8], at: usize) -> Option<u64> {
    Some(u64::from_be_bytes(data.get(at..at + 8)?.try_into().ok()?))
}
