//! Texture role classification.
//!
//! A texture's roles are the names of the material slots that reference it
//! (`normalTexture`, `occlusionTexture`, ...). Slots are found by walking the
//! material JSON, so extension slots like `clearcoatTexture` are included.

use crate::container::Document;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeSet;
use std::fmt;

pub const BASE_COLOR: &str = "baseColorTexture";
pub const METALLIC_ROUGHNESS: &str = "metallicRoughnessTexture";
pub const NORMAL: &str = "normalTexture";
pub const OCCLUSION: &str = "occlusionTexture";
pub const EMISSIVE: &str = "emissiveTexture";

/// Set of slot names through which a texture is reachable
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct RoleSet(BTreeSet<String>);

impl RoleSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, slot: impl Into<String>) {
        self.0.insert(slot.into());
    }

    pub fn contains(&self, slot: &str) -> bool {
        self.0.contains(slot)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// True when `slot` is the only role.
    pub fn is_exactly(&self, slot: &str) -> bool {
        self.len() == 1 && self.contains(slot)
    }

    /// Exact single-role matches take precedence over "includes" checks.
    pub fn category(&self) -> RoleCategory {
        if self.is_exactly(NORMAL) {
            RoleCategory::Normal
        } else if self.is_exactly(OCCLUSION) {
            RoleCategory::Occlusion
        } else if self.contains(METALLIC_ROUGHNESS) {
            RoleCategory::MetallicRoughness
        } else {
            RoleCategory::Other
        }
    }
}

impl<'a> FromIterator<&'a str> for RoleSet {
    fn from_iter<I: IntoIterator<Item = &'a str>>(iter: I) -> Self {
        Self(iter.into_iter().map(String::from).collect())
    }
}

impl fmt::Display for RoleSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("[]");
        }
        let names: Vec<&str> = self.iter().collect();
        write!(f, "[{}]", names.join(", "))
    }
}

/// Closed set of role categories driving encoding and block-size policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RoleCategory {
    Normal,
    Occlusion,
    MetallicRoughness,
    /// Base color, emissive and everything else
    Other,
}

impl RoleCategory {
    pub fn label(&self) -> &'static str {
        match self {
            RoleCategory::Normal => "normal",
            RoleCategory::Occlusion => "occlusion",
            RoleCategory::MetallicRoughness => "metallic-roughness",
            RoleCategory::Other => "color",
        }
    }
}

/// Roles of image `texture` across every material of `doc`. A slot bound to a
/// glTF texture counts for every image it references: extension sources such as
/// `EXT_texture_avif` and the core `source` fallback alike.
pub fn classify(doc: &Document, texture: usize) -> RoleSet {
    let mut roles = RoleSet::new();
    for material in doc.materials() {
        collect_slots(doc, material, texture, &mut roles);
    }
    roles
}

fn collect_slots(doc: &Document, value: &Value, texture: usize, roles: &mut RoleSet) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                if key.ends_with("Texture") {
                    let bound = child
                        .get("index")
                        .and_then(Value::as_u64)
                        .is_some_and(|index| doc.texture_images(index as usize).contains(&texture));
                    if bound {
                        roles.insert(key.as_str());
                    }
                }
                collect_slots(doc, child, texture, roles);
            }
        }
        Value::Array(items) => {
            for item in items {
                collect_slots(doc, item, texture, roles);
            }
        }
        _ => {}
    }
}
