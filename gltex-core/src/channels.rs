//! Channel preprocessing before encoding.
//!
//! - **Normal renormalization**: reinterpret RGB as a signed vector, divide by
//!   its (clamped) length and store X/Y back as unsigned values
//! - **Red replication**: copy R into G and B for single-channel maps
//!
//! Every output is a PNG written into the caller's scratch directory.

use crate::{Error, Result};
use image::{DynamicImage, ImageBuffer, ImageFormat, Rgb, RgbImage, Rgba, RgbaImage};
use std::path::{Path, PathBuf};

/// Lower bound on vector length before dividing
pub const NORMAL_EPSILON: f32 = 1e-6;

/// Channel layout of a renormalized normal map.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NormalLayout {
    /// R = x, G = y, B = 0. Z is reconstructed at sample time.
    XyZeroZ,
    /// R = G = B = x, A = y (four-channel output)
    Xxxy,
}

/// Pixel work required before a texture is handed to the encoder
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Preprocess {
    None,
    RenormalizeNormal(NormalLayout),
    ReplicateRed,
}

/// Map an unsigned channel to [-1, 1].
#[inline]
pub fn decode_unit(c: u8) -> f32 {
    f32::from(c) / 255.0 * 2.0 - 1.0
}

/// Map [-1, 1] back to an unsigned channel.
#[inline]
pub fn encode_unit(n: f32) -> u8 {
    ((n / 2.0 + 0.5) * 255.0).round().clamp(0.0, 255.0) as u8
}

/// Unit-length vector from an encoded RGB normal.
pub fn renormalize_normal(rgb: [u8; 3]) -> [f32; 3] {
    let [x, y, z] = rgb.map(decode_unit);
    let len = (x * x + y * y + z * z).max(0.0).sqrt().max(NORMAL_EPSILON);
    [x / len, y / len, z / len]
}

/// Renormalize every pixel of a normal map into `layout`.
pub fn renormalize_image(img: &RgbaImage, layout: NormalLayout) -> DynamicImage {
    match layout {
        NormalLayout::XyZeroZ => {
            let out: RgbImage = ImageBuffer::from_fn(img.width(), img.height(), |x, y| {
                let p = img.get_pixel(x, y).0;
                let [nx, ny, _] = renormalize_normal([p[0], p[1], p[2]]);
                Rgb([encode_unit(nx), encode_unit(ny), 0])
            });
            DynamicImage::ImageRgb8(out)
        }
        NormalLayout::Xxxy => {
            let out: RgbaImage = ImageBuffer::from_fn(img.width(), img.height(), |x, y| {
                let p = img.get_pixel(x, y).0;
                let [nx, ny, _] = renormalize_normal([p[0], p[1], p[2]]);
                let (x, y) = (encode_unit(nx), encode_unit(ny));
                Rgba([x, x, x, y])
            });
            DynamicImage::ImageRgba8(out)
        }
    }
}

/// Copy the red channel into all three color channels.
pub fn replicate_red(img: &RgbaImage) -> RgbImage {
    ImageBuffer::from_fn(img.width(), img.height(), |x, y| {
        let r = img.get_pixel(x, y).0[0];
        Rgb([r, r, r])
    })
}

/// File extension for an image mime type.
pub fn extension_for_mime(mime_type: &str) -> &'static str {
    match mime_type {
        "image/png" => "png",
        "image/jpeg" => "jpg",
        "image/webp" => "webp",
        "image/avif" => "avif",
        _ => "bin",
    }
}

/// Write the encoder input for one texture into `dir` and return its path.
///
/// With [`Preprocess::None`], PNG and JPEG bytes are written as they are and
/// WebP is decoded to PNG first. Other source formats cannot be re-encoded.
pub fn prepare(
    preprocess: Preprocess,
    data: &[u8],
    mime_type: &str,
    dir: &Path,
    stem: &str,
) -> Result<PathBuf> {
    match preprocess {
        Preprocess::None => write_source(data, mime_type, dir, stem),
        Preprocess::RenormalizeNormal(layout) => {
            let img = decode(data, mime_type)?.to_rgba8();
            let path = dir.join(format!("{}-pre.png", stem));
            renormalize_image(&img, layout).save_with_format(&path, ImageFormat::Png)?;
            Ok(path)
        }
        Preprocess::ReplicateRed => {
            let img = decode(data, mime_type)?.to_rgba8();
            let path = dir.join(format!("{}-pre.png", stem));
            replicate_red(&img).save_with_format(&path, ImageFormat::Png)?;
            Ok(path)
        }
    }
}

fn write_source(data: &[u8], mime_type: &str, dir: &Path, stem: &str) -> Result<PathBuf> {
    match mime_type {
        "image/png" | "image/jpeg" => {
            let path = dir.join(format!("{}-src.{}", stem, extension_for_mime(mime_type)));
            std::fs::write(&path, data)?;
            Ok(path)
        }
        "image/webp" => {
            let path = dir.join(format!("{}-src.png", stem));
            decode(data, mime_type)?.save_with_format(&path, ImageFormat::Png)?;
            Ok(path)
        }
        other => Err(Error::Unsupported(format!(
            "cannot use {} texture as encoder input",
            other
        ))),
    }
}

fn decode(data: &[u8], mime_type: &str) -> Result<DynamicImage> {
    let image = match ImageFormat::from_mime_type(mime_type) {
        Some(format) => image::load_from_memory_with_format(data, format)?,
        None => image::load_from_memory(data)?,
    };
    Ok(image)
}
