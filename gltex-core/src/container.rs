//! Model container I/O.
//!
//! Reads binary (`.glb`) and text (`.gltf`) containers into a [`Document`],
//! exposes the embedded images as [`Texture`] entities and writes the document
//! back after texture replacements. The JSON tree is kept generic so that
//! meshes, animations and unknown extensions round-trip untouched.

use crate::probe::sniff_mime_type;
use crate::{Error, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde_json::{json, Map, Value};
use std::path::{Path, PathBuf};

/// "glTF" magic at the start of a binary container
const GLB_MAGIC: &[u8; 4] = b"glTF";
const GLB_VERSION: u32 = 2;
const GLB_HEADER_LEN: usize = 12;
const GLB_CHUNK_JSON: u32 = 0x4E4F534A;
const GLB_CHUNK_BIN: u32 = 0x004E4942;

pub const EXT_TEXTURE_AVIF: &str = "EXT_texture_avif";
pub const EXT_TEXTURE_WEBP: &str = "EXT_texture_webp";
pub const KHR_TEXTURE_BASISU: &str = "KHR_texture_basisu";
pub const EXT_MESHOPT_COMPRESSION: &str = "EXT_meshopt_compression";

/// Texture extensions that carry an alternate `source`, in lookup order.
const SOURCE_EXTENSIONS: &[&str] = &[EXT_TEXTURE_AVIF, EXT_TEXTURE_WEBP, KHR_TEXTURE_BASISU];

/// An image embedded in (or referenced by) the container.
#[derive(Debug, Clone)]
pub struct Texture {
    /// Position in the document's image list
    pub index: usize,
    /// Optional human-readable name
    pub name: Option<String>,
    /// Declared (or sniffed) mime type
    pub mime_type: String,
    /// Encoded image bytes, when the image resolves to data
    pub data: Option<Vec<u8>>,
    /// Why the image bytes could not be loaded (missing file, bad data URI)
    pub load_error: Option<String>,
}

impl Texture {
    /// Name used in logs and temp file names (`tex_<index>` when unnamed).
    pub fn display_name(&self) -> String {
        match self.name.as_deref() {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => format!("tex_{}", self.index),
        }
    }

    /// Encoded size in bytes (0 without data)
    pub fn byte_len(&self) -> usize {
        self.data.as_ref().map_or(0, Vec::len)
    }

    /// Pixel dimensions probed from the image header, (0, 0) when unknown.
    pub fn dimensions(&self) -> (u32, u32) {
        match self.data.as_deref() {
            Some(data) => crate::probe::probe_dimensions(data, &self.mime_type),
            None => (0, 0),
        }
    }
}

/// New image content for one texture
#[derive(Debug, Clone)]
pub struct Replacement {
    pub texture: usize,
    pub data: Vec<u8>,
    pub mime_type: String,
}

/// Side table of pending texture replacements, applied in one pass by
/// [`Document::apply`].
#[derive(Debug, Clone, Default)]
pub struct ReplacementSet {
    entries: Vec<Replacement>,
}

impl ReplacementSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, replacement: Replacement) {
        self.entries.push(replacement);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Replacement> {
        self.entries.iter()
    }
}

/// A parsed model container.
#[derive(Debug, Clone)]
pub struct Document {
    root: Map<String, Value>,
    /// Bytes of every buffer view, indexed like `bufferViews`
    views: Vec<Vec<u8>>,
    textures: Vec<Texture>,
}

impl Document {
    /// Read a container from disk. Relative URIs resolve against the file's directory.
    pub fn read<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)?;
        let base_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
        Self::from_bytes(&bytes, Some(&base_dir))
    }

    /// Parse a container from memory. GLB is detected from the magic bytes.
    /// Without `base_dir`, external buffers are rejected and external images
    /// are recorded as load errors.
    pub fn from_bytes(bytes: &[u8], base_dir: Option<&Path>) -> Result<Self> {
        let (json_bytes, bin) = if bytes.starts_with(GLB_MAGIC) {
            parse_glb(bytes)?
        } else {
            (bytes, None)
        };

        let root = match serde_json::from_slice::<Value>(json_bytes)? {
            Value::Object(root) => root,
            _ => return Err(Error::Container("document root is not a JSON object".into())),
        };

        let buffers = load_buffers(&root, bin, base_dir)?;
        let views = slice_views(&root, &buffers)?;
        let textures = load_textures(&root, &views, base_dir)?;

        Ok(Self {
            root,
            views,
            textures,
        })
    }

    /// Textures in container order
    pub fn textures(&self) -> &[Texture] {
        &self.textures
    }

    pub fn texture(&self, index: usize) -> Option<&Texture> {
        self.textures.get(index)
    }

    /// Material JSON objects
    pub fn materials(&self) -> &[Value] {
        array(&self.root, "materials")
    }

    /// Image a glTF texture entry samples: an extension source when present,
    /// otherwise the core `source`.
    pub fn texture_image(&self, gltf_texture: usize) -> Option<usize> {
        array(&self.root, "textures")
            .get(gltf_texture)
            .and_then(Value::as_object)
            .and_then(image_source)
    }

    /// Every image a glTF texture entry references, extension sources first
    /// and the core `source` fallback last.
    pub fn texture_images(&self, gltf_texture: usize) -> Vec<usize> {
        array(&self.root, "textures")
            .get(gltf_texture)
            .and_then(Value::as_object)
            .map(image_sources)
            .unwrap_or_default()
    }

    pub fn extensions_used(&self) -> Vec<&str> {
        string_list(&self.root, "extensionsUsed")
    }

    pub fn extensions_required(&self) -> Vec<&str> {
        string_list(&self.root, "extensionsRequired")
    }

    /// Declare an extension as used and required.
    pub fn require_extension(&mut self, name: &str) {
        for key in ["extensionsUsed", "extensionsRequired"] {
            let list = self
                .root
                .entry(key)
                .or_insert_with(|| Value::Array(Vec::new()));
            if let Value::Array(items) = list {
                if !items.iter().any(|v| v.as_str() == Some(name)) {
                    items.push(Value::String(name.to_string()));
                }
            }
        }
    }

    /// Fails when the document cannot be rewritten.
    pub fn check_writable(&self) -> Result<()> {
        if self.extensions_used().contains(&EXT_MESHOPT_COMPRESSION) {
            return Err(Error::Unsupported(format!(
                "cannot rewrite documents using {}",
                EXT_MESHOPT_COMPRESSION
            )));
        }
        Ok(())
    }

    /// Apply all replacements. Indices are validated before anything changes.
    pub fn apply(&mut self, replacements: ReplacementSet) -> Result<()> {
        if let Some(bad) = replacements
            .iter()
            .find(|r| r.texture >= self.textures.len())
        {
            return Err(Error::Container(format!(
                "replacement targets missing texture {}",
                bad.texture
            )));
        }

        for replacement in replacements.entries {
            let texture = &mut self.textures[replacement.texture];
            texture.data = Some(replacement.data);
            texture.mime_type = replacement.mime_type;
            texture.load_error = None;
        }
        Ok(())
    }

    /// Write the document. `.glb` paths produce a binary container; anything
    /// else produces JSON plus a `<stem>.bin` sidecar.
    pub fn write<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let is_glb = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("glb"));

        if is_glb {
            std::fs::write(path, self.to_glb()?)?;
            return Ok(());
        }

        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("model");
        let bin_name = format!("{}.bin", stem);
        let (json, bin) = self.to_gltf(&bin_name)?;
        if !bin.is_empty() {
            std::fs::write(path.with_file_name(&bin_name), bin)?;
        }
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Serialize as a binary container.
    pub fn to_glb(&self) -> Result<Vec<u8>> {
        let (root, bin) = self.pack()?;
        let mut json = serde_json::to_vec(&Value::Object(root))?;
        while json.len() % 4 != 0 {
            json.push(b' ');
        }

        let bin_chunk_len = if bin.is_empty() { 0 } else { 8 + bin.len() };
        let total_len = GLB_HEADER_LEN + 8 + json.len() + bin_chunk_len;
        let total_len = u32::try_from(total_len)
            .map_err(|_| Error::Unsupported("container exceeds 4 GiB".into()))?;

        let mut glb = Vec::with_capacity(total_len as usize);
        glb.extend_from_slice(GLB_MAGIC);
        glb.extend_from_slice(&GLB_VERSION.to_le_bytes());
        glb.extend_from_slice(&total_len.to_le_bytes());

        glb.extend_from_slice(&(json.len() as u32).to_le_bytes());
        glb.extend_from_slice(&GLB_CHUNK_JSON.to_le_bytes());
        glb.extend_from_slice(&json);

        if !bin.is_empty() {
            glb.extend_from_slice(&(bin.len() as u32).to_le_bytes());
            glb.extend_from_slice(&GLB_CHUNK_BIN.to_le_bytes());
            glb.extend_from_slice(&bin);
        }

        Ok(glb)
    }

    /// Serialize as pretty JSON plus the bytes of the single buffer, which the
    /// JSON references as `bin_uri`.
    pub fn to_gltf(&self, bin_uri: &str) -> Result<(Vec<u8>, Vec<u8>)> {
        let (mut root, bin) = self.pack()?;
        if let Some(Value::Array(buffers)) = root.get_mut("buffers") {
            if let Some(Value::Object(buffer)) = buffers.first_mut() {
                buffer.insert("uri".into(), Value::String(bin_uri.to_string()));
            }
        }
        let json = serde_json::to_vec_pretty(&Value::Object(root))?;
        Ok((json, bin))
    }

    /// Embed every image into a buffer view and repack all views into one
    /// 4-byte aligned buffer.
    fn pack(&self) -> Result<(Map<String, Value>, Vec<u8>)> {
        self.check_writable()?;

        let mut root = self.root.clone();
        let mut views = self.views.clone();
        let mut view_json: Vec<Value> = array(&root, "bufferViews").to_vec();
        let mut image_json: Vec<Value> = array(&root, "images").to_vec();

        for texture in &self.textures {
            let (Some(data), Some(Value::Object(image))) =
                (texture.data.as_ref(), image_json.get_mut(texture.index))
            else {
                continue;
            };

            match image.get("bufferView").and_then(Value::as_u64) {
                Some(view) => views[view as usize] = data.clone(),
                None => {
                    image.insert("bufferView".into(), json!(views.len()));
                    views.push(data.clone());
                    view_json.push(json!({ "buffer": 0 }));
                }
            }
            image.remove("uri");
            image.insert("mimeType".into(), Value::String(texture.mime_type.clone()));
        }

        let mut bin = Vec::new();
        for (view, entry) in views.iter().zip(view_json.iter_mut()) {
            pad_to_four(&mut bin);
            if let Value::Object(entry) = entry {
                entry.insert("buffer".into(), json!(0));
                entry.insert("byteOffset".into(), json!(bin.len()));
                entry.insert("byteLength".into(), json!(view.len()));
            }
            bin.extend_from_slice(view);
        }
        pad_to_four(&mut bin);

        if view_json.is_empty() {
            root.remove("bufferViews");
        } else {
            root.insert("bufferViews".into(), Value::Array(view_json));
        }
        if bin.is_empty() {
            root.remove("buffers");
        } else {
            root.insert("buffers".into(), json!([{ "byteLength": bin.len() }]));
        }
        if !image_json.is_empty() {
            root.insert("images".into(), Value::Array(image_json));
        }

        let mime_types: Vec<&str> = self.textures.iter().map(|t| t.mime_type.as_str()).collect();
        retarget_textures(&mut root, &mime_types);

        Ok((root, bin))
    }
}

/// Split a GLB into its JSON chunk and optional BIN chunk.
fn parse_glb(bytes: &[u8]) -> Result<(&[u8], Option<Vec<u8>>)> {
    if bytes.len() < GLB_HEADER_LEN {
        return Err(Error::Container("truncated GLB header".into()));
    }
    let version = read_u32(bytes, 4)?;
    if version != GLB_VERSION {
        return Err(Error::Container(format!("unsupported GLB version {}", version)));
    }
    let length = read_u32(bytes, 8)? as usize;
    if length > bytes.len() {
        return Err(Error::Container(format!(
            "GLB declares {} bytes but file has {}",
            length,
            bytes.len()
        )));
    }

    let mut json = None;
    let mut bin = None;
    let mut pos = GLB_HEADER_LEN;
    while pos + 8 <= length {
        let chunk_len = read_u32(bytes, pos)? as usize;
        let chunk_type = read_u32(bytes, pos + 4)?;
        let start = pos + 8;
        let end = start
            .checked_add(chunk_len)
            .filter(|&end| end <= length)
            .ok_or_else(|| Error::Container("GLB chunk exceeds file length".into()))?;

        match chunk_type {
            GLB_CHUNK_JSON if json.is_none() => json = Some(&bytes[start..end]),
            GLB_CHUNK_BIN if bin.is_none() => bin = Some(bytes[start..end].to_vec()),
            // Unknown chunks are ignored
            _ => {}
        }
        pos = end;
    }

    let json = json.ok_or_else(|| Error::Container("GLB has no JSON chunk".into()))?;
    Ok((json, bin))
}

fn read_u32(bytes: &[u8], at: usize) -> Result<u32> {
    bytes
        .get(at..at + 4)
        .and_then(|b| b.try_into().ok())
        .map(u32::from_le_bytes)
        .ok_or_else(|| Error::Container(format!("truncated data at byte {}", at)))
}

/// Resolve every buffer's bytes. `None` marks a meshopt fallback buffer with no data.
fn load_buffers(
    root: &Map<String, Value>,
    mut bin: Option<Vec<u8>>,
    base_dir: Option<&Path>,
) -> Result<Vec<Option<Vec<u8>>>> {
    let mut buffers = Vec::new();
    for (i, buffer) in array(root, "buffers").iter().enumerate() {
        let data = match buffer.get("uri").and_then(Value::as_str) {
            Some(uri) => Some(load_uri(uri, base_dir)?.0),
            None if i == 0 && bin.is_some() => bin.take(),
            None if is_meshopt_fallback(buffer) => None,
            None => {
                return Err(Error::Container(format!("buffer {} has no data", i)));
            }
        };
        buffers.push(data);
    }
    Ok(buffers)
}

fn is_meshopt_fallback(buffer: &Value) -> bool {
    buffer
        .pointer("/extensions/EXT_meshopt_compression/fallback")
        .and_then(Value::as_bool)
        .unwrap_or(false)
}

fn slice_views(root: &Map<String, Value>, buffers: &[Option<Vec<u8>>]) -> Result<Vec<Vec<u8>>> {
    let mut views = Vec::new();
    for (i, view) in array(root, "bufferViews").iter().enumerate() {
        let buffer = usize_field(view, "buffer")
            .ok_or_else(|| Error::Container(format!("bufferView {} has no buffer", i)))?;
        let offset = usize_field(view, "byteOffset").unwrap_or(0);
        let length = usize_field(view, "byteLength")
            .ok_or_else(|| Error::Container(format!("bufferView {} has no byteLength", i)))?;

        let data = match buffers.get(buffer) {
            Some(Some(data)) => data
                .get(offset..offset + length)
                .ok_or_else(|| {
                    Error::Container(format!("bufferView {} is out of range of buffer {}", i, buffer))
                })?
                .to_vec(),
            Some(None) => Vec::new(),
            None => {
                return Err(Error::Container(format!(
                    "bufferView {} references missing buffer {}",
                    i, buffer
                )))
            }
        };
        views.push(data);
    }
    Ok(views)
}

fn load_textures(
    root: &Map<String, Value>,
    views: &[Vec<u8>],
    base_dir: Option<&Path>,
) -> Result<Vec<Texture>> {
    let mut textures = Vec::new();
    for (index, image) in array(root, "images").iter().enumerate() {
        let declared = image.get("mimeType").and_then(Value::as_str);
        let name = image.get("name").and_then(Value::as_str).map(String::from);

        let mut load_error = None;
        let (data, uri_mime) = if let Some(view) = usize_field(image, "bufferView") {
            let data = views.get(view).cloned().ok_or_else(|| {
                Error::Container(format!("image {} references missing bufferView {}", index, view))
            })?;
            (Some(data), None)
        } else if let Some(uri) = image.get("uri").and_then(Value::as_str) {
            match load_uri(uri, base_dir) {
                Ok((data, mime)) => (Some(data), mime),
                Err(e) => {
                    tracing::debug!("Image {} could not be loaded: {}", index, e);
                    load_error = Some(e.to_string());
                    (None, None)
                }
            }
        } else {
            (None, None)
        };

        let mime_type = declared
            .map(String::from)
            .or(uri_mime)
            .or_else(|| data.as_deref().and_then(sniff_mime_type).map(String::from))
            .unwrap_or_else(|| "application/octet-stream".to_string());

        textures.push(Texture {
            index,
            name,
            mime_type,
            data,
            load_error,
        });
    }
    Ok(textures)
}

/// Load a `data:` URI or a file relative to `base_dir`. Returns the bytes and,
/// for data URIs, the media type from the header.
fn load_uri(uri: &str, base_dir: Option<&Path>) -> Result<(Vec<u8>, Option<String>)> {
    if let Some(rest) = uri.strip_prefix("data:") {
        let (header, payload) = rest
            .split_once(',')
            .ok_or_else(|| Error::Container("malformed data URI".into()))?;
        let (media_type, is_base64) = match header.strip_suffix(";base64") {
            Some(media_type) => (media_type, true),
            None => (header, false),
        };
        let data = if is_base64 {
            BASE64.decode(payload)?
        } else {
            percent_decode(payload)
        };
        let mime = media_type
            .starts_with("image/")
            .then(|| media_type.to_string());
        return Ok((data, mime));
    }

    let base_dir = base_dir.ok_or_else(|| {
        Error::Container(format!("external URI {} cannot be resolved in memory", uri))
    })?;
    let decoded = percent_decode(uri);
    let path: PathBuf = base_dir.join(String::from_utf8_lossy(&decoded).as_ref());
    let data = std::fs::read(&path)
        .map_err(|e| Error::Container(format!("{}: {}", path.display(), e)))?;
    Ok((data, None))
}

/// Decode `%XX` escapes; malformed escapes are kept as-is.
fn percent_decode(input: &str) -> Vec<u8> {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            if let (Some(hi), Some(lo)) = (hex_digit(bytes[i + 1]), hex_digit(bytes[i + 2])) {
                out.push(hi << 4 | lo);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    out
}

fn hex_digit(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

/// Point textures whose image became AVIF/WebP at it through the matching
/// extension. Other textures are left as they are.
fn retarget_textures(root: &mut Map<String, Value>, mime_types: &[&str]) {
    let Some(Value::Array(textures)) = root.get_mut("textures") else {
        return;
    };

    for texture in textures.iter_mut() {
        let Value::Object(texture) = texture else {
            continue;
        };
        let Some(image) = image_source(texture) else {
            continue;
        };
        let extension = match mime_types.get(image).copied() {
            Some("image/avif") => EXT_TEXTURE_AVIF,
            Some("image/webp") => EXT_TEXTURE_WEBP,
            _ => continue,
        };

        texture.remove("source");
        let extensions = texture
            .entry("extensions")
            .or_insert_with(|| Value::Object(Map::new()));
        if let Value::Object(extensions) = extensions {
            extensions.remove(EXT_TEXTURE_AVIF);
            extensions.remove(EXT_TEXTURE_WEBP);
            extensions.insert(extension.to_string(), json!({ "source": image }));
        }
    }
}

fn image_source(texture: &Map<String, Value>) -> Option<usize> {
    image_sources(texture).first().copied()
}

fn image_sources(texture: &Map<String, Value>) -> Vec<usize> {
    let mut sources = Vec::new();
    if let Some(extensions) = texture.get("extensions") {
        for name in SOURCE_EXTENSIONS {
            if let Some(source) = extensions
                .get(*name)
                .and_then(|ext| ext.get("source"))
                .and_then(Value::as_u64)
            {
                sources.push(source as usize);
            }
        }
    }
    if let Some(source) = texture.get("source").and_then(Value::as_u64) {
        if !sources.contains(&(source as usize)) {
            sources.push(source as usize);
        }
    }
    sources
}

fn array<'a>(root: &'a Map<String, Value>, key: &str) -> &'a [Value] {
    root.get(key)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

fn string_list<'a>(root: &'a Map<String, Value>, key: &str) -> Vec<&'a str> {
    array(root, key).iter().filter_map(Value::as_str).collect()
}

fn usize_field(value: &Value, key: &str) -> Option<usize> {
    value.get(key).and_then(Value::as_u64).map(|v| v as usize)
}

fn pad_to_four(bytes: &mut Vec<u8>) {
    while bytes.len() % 4 != 0 {
        bytes.push(0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{glb, png, ModelBuilder};

    #[test]
    fn reads_glb_images_from_buffer_views() {
        let bytes = ModelBuilder::new()
            .image("albedo", png(4, 2, [255, 0, 0, 255]), "image/png")
            .image("", png(8, 8, [0, 0, 0, 255]), "image/png")
            .build_glb();

        let doc = Document::from_bytes(&bytes, None).unwrap();
        assert_eq!(doc.textures().len(), 2);

        let first = doc.texture(0).unwrap();
        assert_eq!(first.display_name(), "albedo");
        assert_eq!(first.mime_type, "image/png");
        assert_eq!(first.dimensions(), (4, 2));

        let second = doc.texture(1).unwrap();
        assert_eq!(second.display_name(), "tex_1");
        assert_eq!(second.dimensions(), (8, 8));
    }

    #[test]
    fn rejects_bad_glb() {
        let mut bytes = ModelBuilder::new().build_glb();
        bytes[4] = 1; // version
        assert!(matches!(
            Document::from_bytes(&bytes, None),
            Err(Error::Container(_))
        ));

        assert!(matches!(
            Document::from_bytes(b"glTF\x02\x00", None),
            Err(Error::Container(_))
        ));
    }

    #[test]
    fn reads_gltf_with_data_uri_and_sniffs_mime() {
        let encoded = BASE64.encode(png(2, 2, [1, 2, 3, 255]));
        let json = serde_json::json!({
            "asset": { "version": "2.0" },
            "images": [{ "uri": format!("data:application/octet-stream;base64,{}", encoded) }],
            "textures": [{ "source": 0 }]
        });
        let doc = Document::from_bytes(&serde_json::to_vec(&json).unwrap(), None).unwrap();
        let tex = doc.texture(0).unwrap();
        assert_eq!(tex.mime_type, "image/png");
        assert_eq!(tex.dimensions(), (2, 2));
    }

    #[test]
    fn reads_external_image_relative_to_file() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("albedo.png"), png(3, 3, [9, 9, 9, 255])).unwrap();
        let json = serde_json::json!({
            "asset": { "version": "2.0" },
            "images": [{ "uri": "albedo.png" }]
        });
        let path = tmp.path().join("model.gltf");
        std::fs::write(&path, serde_json::to_vec(&json).unwrap()).unwrap();

        let doc = Document::read(&path).unwrap();
        assert_eq!(doc.texture(0).unwrap().dimensions(), (3, 3));
    }

    #[test]
    fn decodes_percent_escapes_in_uris() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("Body #1 é.png"), png(5, 3, [9, 9, 9, 255])).unwrap();
        let json = serde_json::json!({
            "asset": { "version": "2.0" },
            "images": [
                { "uri": "Body%20%231%20%C3%A9.png" },
                { "uri": "data:image/svg+xml,%3Csvg%2F%3E" }
            ]
        });
        let path = tmp.path().join("model.gltf");
        std::fs::write(&path, serde_json::to_vec(&json).unwrap()).unwrap();

        let doc = Document::read(&path).unwrap();
        assert_eq!(doc.texture(0).unwrap().dimensions(), (5, 3));
        let svg = doc.texture(1).unwrap();
        assert_eq!(svg.data.as_deref(), Some(&b"<svg/>"[..]));
        assert_eq!(svg.mime_type, "image/svg+xml");

        assert_eq!(percent_decode("100%"), b"100%");
        assert_eq!(percent_decode("%zz%41"), b"%zzA");
    }

    #[test]
    fn missing_external_image_is_recorded_per_texture() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("a.png"), png(2, 2, [0, 0, 0, 255])).unwrap();
        std::fs::write(tmp.path().join("c.png"), png(4, 4, [0, 0, 0, 255])).unwrap();
        let json = serde_json::json!({
            "asset": { "version": "2.0" },
            "images": [{ "uri": "a.png" }, { "uri": "b_missing.png" }, { "uri": "c.png" }]
        });
        let path = tmp.path().join("model.gltf");
        std::fs::write(&path, serde_json::to_vec(&json).unwrap()).unwrap();

        let doc = Document::read(&path).unwrap();
        assert_eq!(doc.textures().len(), 3);
        assert!(doc.texture(0).unwrap().load_error.is_none());
        assert_eq!(doc.texture(2).unwrap().dimensions(), (4, 4));

        let missing = doc.texture(1).unwrap();
        assert!(missing.data.is_none());
        let reason = missing.load_error.as_deref().expect("load error recorded");
        assert!(reason.contains("b_missing.png"), "{}", reason);
    }

    #[test]
    fn extension_source_is_resolved_before_fallback() {
        let json = serde_json::json!({
            "asset": { "version": "2.0" },
            "images": [{ "uri": "fallback.png" }, { "uri": "sampled.avif" }],
            "textures": [
                { "source": 0, "extensions": { "EXT_texture_avif": { "source": 1 } } },
                { "source": 0 },
                { "extensions": { "EXT_texture_webp": { "source": 1 } } }
            ]
        });
        let doc = Document::from_bytes(&serde_json::to_vec(&json).unwrap(), None).unwrap();
        assert_eq!(doc.texture_image(0), Some(1));
        assert_eq!(doc.texture_images(0), vec![1, 0]);
        assert_eq!(doc.texture_images(1), vec![0]);
        assert_eq!(doc.texture_images(2), vec![1]);
        assert!(doc.texture_images(9).is_empty());
    }

    #[test]
    fn require_extension_is_idempotent() {
        let mut doc = Document::from_bytes(&ModelBuilder::new().build_glb(), None).unwrap();
        doc.require_extension(EXT_TEXTURE_AVIF);
        doc.require_extension(EXT_TEXTURE_AVIF);
        assert_eq!(doc.extensions_used(), vec![EXT_TEXTURE_AVIF]);
        assert_eq!(doc.extensions_required(), vec![EXT_TEXTURE_AVIF]);
    }

    #[test]
    fn apply_then_write_moves_textures_to_extension() {
        let bytes = ModelBuilder::new()
            .image("albedo", png(4, 4, [10, 20, 30, 255]), "image/png")
            .image("normal", png(4, 4, [128, 128, 255, 255]), "image/png")
            .material(serde_json::json!({
                "pbrMetallicRoughness": { "baseColorTexture": { "index": 0 } },
                "normalTexture": { "index": 1 }
            }))
            .build_glb();
        let mut doc = Document::from_bytes(&bytes, None).unwrap();

        let mut set = ReplacementSet::new();
        set.push(Replacement {
            texture: 1,
            data: b"not really avif".to_vec(),
            mime_type: "image/avif".into(),
        });
        doc.apply(set).unwrap();
        doc.require_extension(EXT_TEXTURE_AVIF);

        let written = doc.to_glb().unwrap();
        assert_eq!(&written[0..4], b"glTF");
        assert_eq!(written.len() % 4, 0);

        let reread = Document::from_bytes(&written, None).unwrap();
        assert_eq!(reread.textures().len(), 2);
        assert_eq!(reread.texture(0).unwrap().mime_type, "image/png");
        assert_eq!(reread.texture(0).unwrap().dimensions(), (4, 4));
        assert_eq!(reread.texture(1).unwrap().mime_type, "image/avif");
        assert_eq!(
            reread.texture(1).unwrap().data.as_deref(),
            Some(&b"not really avif"[..])
        );
        assert_eq!(reread.texture_image(0), Some(0));
        assert_eq!(reread.texture_image(1), Some(1));
        assert_eq!(reread.extensions_required(), vec![EXT_TEXTURE_AVIF]);

        let json = glb::json_chunk(&written);
        assert_eq!(json["textures"][0]["source"], 0);
        assert!(json["textures"][1].get("source").is_none());
        assert_eq!(json["textures"][1]["extensions"]["EXT_texture_avif"]["source"], 1);
    }

    #[test]
    fn apply_rejects_unknown_texture_without_mutating() {
        let bytes = ModelBuilder::new()
            .image("a", png(2, 2, [0, 0, 0, 255]), "image/png")
            .build_glb();
        let mut doc = Document::from_bytes(&bytes, None).unwrap();

        let mut set = ReplacementSet::new();
        set.push(Replacement {
            texture: 0,
            data: vec![1],
            mime_type: "image/avif".into(),
        });
        set.push(Replacement {
            texture: 5,
            data: vec![2],
            mime_type: "image/avif".into(),
        });
        assert!(doc.apply(set).is_err());
        assert_eq!(doc.texture(0).unwrap().mime_type, "image/png");
    }

    #[test]
    fn write_keeps_non_image_buffer_views() {
        let bytes = ModelBuilder::new()
            .raw_view(vec![1, 2, 3, 4, 5, 6])
            .image("a", png(2, 2, [0, 0, 0, 255]), "image/png")
            .build_glb();
        let doc = Document::from_bytes(&bytes, None).unwrap();
        let reread = Document::from_bytes(&doc.to_glb().unwrap(), None).unwrap();
        assert_eq!(reread.views[0], vec![1, 2, 3, 4, 5, 6]);
        assert_eq!(reread.texture(0).unwrap().dimensions(), (2, 2));
    }

    #[test]
    fn write_gltf_emits_sidecar_bin() {
        let bytes = ModelBuilder::new()
            .image("a", png(2, 2, [0, 0, 0, 255]), "image/png")
            .build_glb();
        let doc = Document::from_bytes(&bytes, None).unwrap();

        let tmp = tempfile::tempdir().unwrap();
        let out = tmp.path().join("out.gltf");
        doc.write(&out).unwrap();
        assert!(tmp.path().join("out.bin").exists());

        let reread = Document::read(&out).unwrap();
        assert_eq!(reread.texture(0).unwrap().dimensions(), (2, 2));
    }

    #[test]
    fn meshopt_documents_are_read_only() {
        let mut builder = ModelBuilder::new().image("a", png(2, 2, [0, 0, 0, 255]), "image/png");
        builder.extensions_used.push(EXT_MESHOPT_COMPRESSION.into());
        let doc = Document::from_bytes(&builder.build_glb(), None).unwrap();
        assert_eq!(doc.texture(0).unwrap().dimensions(), (2, 2));
        assert!(matches!(doc.to_glb(), Err(Error::Unsupported(_))));
    }
}
