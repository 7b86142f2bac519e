use serde::Deserialize;
use std::collections::HashMap;

use crate::types::RenderLayer;

// Top-level blocks config file
#[derive(Deserialize, Debug, Clone)]
pub struct BlocksConfig {
    pub blocks: Vec<BlockDef>,
    // Block used when a legacy id is not registered. Falls back to `air`
    // when absent or not found.
    #[serde(default)]
    pub unknown_block: Option<String>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct BlockDef {
    pub name: String,
    #[serde(default)]
    pub legacy_id: Option<u16>,
    #[serde(default)]
    pub shape: Option<ShapeConfig>,
    #[serde(default)]
    pub layer: Option<RenderLayer>,
    // Declaration order is the packing order.
    #[serde(default)]
    pub properties: Vec<PropertyConfig>,
    #[serde(default)]
    pub textures: Option<TexturesDef>,
}

// Shape config supports either a simple string ("cube") or a detailed table
#[derive(Deserialize, Debug, Clone)]
#[serde(untagged)]
pub enum ShapeConfig {
    Simple(String),
    Detailed(ShapeDetailed),
}

#[derive(Deserialize, Debug, Clone)]
pub struct ShapeDetailed {
    pub kind: String,
    #[serde(default)]
    pub half: Option<String>,
}

// A property without `values` is a boolean.
#[derive(Deserialize, Debug, Clone)]
pub struct PropertyConfig {
    pub name: String,
    #[serde(default)]
    pub values: Option<Vec<String>>,
}

// Texture mapping: all/top/bottom/side, each a name or a by-property map
#[derive(Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct TexturesDef {
    #[serde(default)]
    pub all: Option<TextureSelector>,
    #[serde(default)]
    pub top: Option<TextureSelector>,
    #[serde(default)]
    pub bottom: Option<TextureSelector>,
    #[serde(default)]
    pub side: Option<TextureSelector>,
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(untagged)]
pub enum TextureSelector {
    Name(String),
    By {
        by: String,
        #[serde(default)]
        map: HashMap<String, String>,
    },
}

impl TexturesDef {
    pub fn all(name: impl Into<String>) -> Self {
        Self {
            all: Some(TextureSelector::Name(name.into())),
            ..Self::default()
        }
    }
}
