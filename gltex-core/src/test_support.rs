//! In-memory fixtures for unit tests.

use image::{ImageFormat, Rgba, RgbaImage};
use serde_json::{json, Value};
use std::io::Cursor;

/// Encode a solid-color PNG.
pub fn png(width: u32, height: u32, color: [u8; 4]) -> Vec<u8> {
    encode(&RgbaImage::from_pixel(width, height, Rgba(color)))
}

pub fn encode(img: &RgbaImage) -> Vec<u8> {
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, ImageFormat::Png).unwrap();
    out.into_inner()
}

/// Builds a GLB by hand: one buffer view per raw blob and per image, one
/// glTF texture per image (texture `i` sources image `i`).
#[derive(Default)]
pub struct ModelBuilder {
    views: Vec<Vec<u8>>,
    images: Vec<Value>,
    textures: Vec<Value>,
    extra_textures: Vec<Value>,
    materials: Vec<Value>,
    pub extensions_used: Vec<String>,
}

impl ModelBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raw_view(mut self, data: Vec<u8>) -> Self {
        self.views.push(data);
        self
    }

    pub fn image(mut self, name: &str, data: Vec<u8>, mime_type: &str) -> Self {
        let view = self.views.len();
        self.views.push(data);
        let mut image = json!({ "bufferView": view, "mimeType": mime_type });
        if !name.is_empty() {
            image["name"] = json!(name);
        }
        self.textures.push(json!({ "source": self.images.len() }));
        self.images.push(image);
        self
    }

    /// Extra glTF texture entry, appended after the per-image ones.
    pub fn texture(mut self, texture: Value) -> Self {
        self.extra_textures.push(texture);
        self
    }

    pub fn material(mut self, material: Value) -> Self {
        self.materials.push(material);
        self
    }

    pub fn build_glb(self) -> Vec<u8> {
        let mut bin = Vec::new();
        let mut view_json = Vec::new();
        for view in &self.views {
            while bin.len() % 4 != 0 {
                bin.push(0);
            }
            view_json.push(json!({
                "buffer": 0,
                "byteOffset": bin.len(),
                "byteLength": view.len(),
            }));
            bin.extend_from_slice(view);
        }
        while bin.len() % 4 != 0 {
            bin.push(0);
        }

        let mut root = json!({ "asset": { "version": "2.0", "generator": "test" } });
        if !bin.is_empty() {
            root["buffers"] = json!([{ "byteLength": bin.len() }]);
            root["bufferViews"] = Value::Array(view_json);
        }
        if !self.images.is_empty() {
            let mut textures = self.textures;
            textures.extend(self.extra_textures);
            root["images"] = Value::Array(self.images);
            root["textures"] = Value::Array(textures);
        }
        if !self.materials.is_empty() {
            root["materials"] = Value::Array(self.materials);
        }
        if !self.extensions_used.is_empty() {
            root["extensionsUsed"] = json!(self.extensions_used);
        }

        let mut json_bytes = serde_json::to_vec(&root).unwrap();
        while json_bytes.len() % 4 != 0 {
            json_bytes.push(b' ');
        }

        let bin_chunk = if bin.is_empty() { 0 } else { 8 + bin.len() };
        let total = 12 + 8 + json_bytes.len() + bin_chunk;

        let mut out = Vec::with_capacity(total);
        out.extend_from_slice(b"glTF");
        out.extend_from_slice(&2u32.to_le_bytes());
        out.extend_from_slice(&(total as u32).to_le_bytes());
        out.extend_from_slice(&(json_bytes.len() as u32).to_le_bytes());
        out.extend_from_slice(b"JSON");
        out.extend_from_slice(&json_bytes);
        if !bin.is_empty() {
            out.extend_from_slice(&(bin.len() as u32).to_le_bytes());
            out.extend_from_slice(b"BIN\0");
            out.extend_from_slice(&bin);
        }
        out
    }
}

pub mod glb {
    use serde_json::Value;

    /// Parse the JSON chunk of a GLB produced by the writer.
    pub fn json_chunk(glb: &[u8]) -> Value {
        let len = u32::from_le_bytes(glb[12..16].try_into().unwrap()) as usize;
        serde_json::from_slice(&glb[20..20 + len]).unwrap()
    }
}
