//! Texture atlas lookup. Packing happens elsewhere; this only maps names to UV rectangles.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;
use std::sync::Arc;

use serde::Deserialize;

use crate::error::ConfigError;

/// Name of the placeholder substituted for any texture the atlas does not contain.
pub const MISSING_TEXTURE: &str = "missing_texture";

const BUILTIN_ATLAS: &str = include_str!("../assets/atlas.toml");

/// Atlas-space rectangle, all coordinates in `[0, 1]`.
#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub struct UvRect {
    pub u0: f32,
    pub v0: f32,
    pub u1: f32,
    pub v1: f32,
}

impl UvRect {
    /// Maps a sub-rectangle of the 16x16 logical block-texture space into this rectangle.
    #[inline]
    pub fn sub(&self, x: f32, y: f32, w: f32, h: f32) -> UvRect {
        let du = (self.u1 - self.u0) / 16.0;
        let dv = (self.v1 - self.v0) / 16.0;
        UvRect {
            u0: self.u0 + x * du,
            v0: self.v0 + y * dv,
            u1: self.u0 + (x + w) * du,
            v1: self.v0 + (y + h) * dv,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Texture {
    pub name: Arc<str>,
    pub uv: UvRect,
}

impl Texture {
    #[inline]
    pub fn is_missing(&self) -> bool {
        &*self.name == MISSING_TEXTURE
    }
}

#[derive(Clone, Debug)]
pub struct TextureAtlas {
    width: u32,
    height: u32,
    textures: HashMap<String, Texture>,
    missing: Texture,
}

impl TextureAtlas {
    /// Empty atlas of the given pixel size; the placeholder covers the top-left 16x16 tile.
    pub fn new(width: u32, height: u32) -> Self {
        let width = width.max(1);
        let height = height.max(1);
        let missing = Texture {
            name: Arc::from(MISSING_TEXTURE),
            uv: pixel_rect(width, height, [0, 0, 16, 16]),
        };
        Self {
            width,
            height,
            textures: HashMap::new(),
            missing,
        }
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.textures.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.textures.is_empty()
    }

    /// Adds a texture from its pixel rectangle `[x, y, w, h]`.
    /// Inserting `missing_texture` replaces the placeholder.
    pub fn insert(&mut self, name: &str, rect: [u32; 4]) -> Result<(), ConfigError> {
        let [x, y, w, h] = rect;
        if x.saturating_add(w) > self.width || y.saturating_add(h) > self.height {
            return Err(ConfigError::TextureOutOfBounds {
                name: name.to_string(),
                width: self.width,
                height: self.height,
            });
        }
        let tex = Texture {
            name: Arc::from(name),
            uv: pixel_rect(self.width, self.height, rect),
        };
        if name == MISSING_TEXTURE {
            self.missing = tex.clone();
        }
        self.textures.insert(name.to_string(), tex);
        Ok(())
    }

    #[inline]
    pub fn try_get(&self, name: &str) -> Option<&Texture> {
        self.textures.get(name)
    }

    /// Looks up a texture, substituting the placeholder when the name is unknown.
    pub fn get(&self, name: &str) -> Texture {
        match self.textures.get(name) {
            Some(t) => t.clone(),
            None => {
                log::warn!("texture not found: {name}");
                self.missing.clone()
            }
        }
    }

    #[inline]
    pub fn missing(&self) -> &Texture {
        &self.missing
    }

    pub fn from_config(cfg: AtlasConfig) -> Result<Self, ConfigError> {
        let mut atlas = TextureAtlas::new(cfg.width, cfg.height);
        for (name, rect) in &cfg.textures {
            atlas.insert(name, *rect)?;
        }
        Ok(atlas)
    }

    pub fn from_toml_str(toml_str: &str) -> Result<Self, ConfigError> {
        let cfg: AtlasConfig = toml::from_str(toml_str)?;
        Self::from_config(cfg)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let s = fs::read_to_string(path)?;
        Self::from_toml_str(&s)
    }

    /// Atlas matching the built-in block set.
    pub fn builtin() -> Result<Self, ConfigError> {
        Self::from_toml_str(BUILTIN_ATLAS)
    }
}

fn pixel_rect(width: u32, height: u32, rect: [u32; 4]) -> UvRect {
    let [x, y, w, h] = rect;
    let fw = width as f32;
    let fh = height as f32;
    UvRect {
        u0: x as f32 / fw,
        v0: y as f32 / fh,
        u1: (x + w) as f32 / fw,
        v1: (y + h) as f32 / fh,
    }
}

// --- Config ---

#[derive(Deserialize, Debug, Clone)]
pub struct AtlasConfig {
    pub width: u32,
    pub height: u32,
    // name = [x, y, w, h] in pixels
    #[serde(default)]
    pub textures: BTreeMap<String, [u32; 4]>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_name_returns_placeholder() {
        let mut atlas = TextureAtlas::new(64, 64);
        atlas.insert("stone", [16, 0, 16, 16]).unwrap();
        let t = atlas.get("no_such_texture");
        assert!(t.is_missing());
        assert_eq!(&t, atlas.missing());
        assert_eq!(&*atlas.get("stone").name, "stone");
    }

    #[test]
    fn pixel_rect_is_normalized() {
        let mut atlas = TextureAtlas::new(64, 32);
        atlas.insert("dirt", [16, 16, 16, 16]).unwrap();
        let uv = atlas.get("dirt").uv;
        assert_eq!(uv, UvRect { u0: 0.25, v0: 0.5, u1: 0.5, v1: 1.0 });
        let half = uv.sub(0.0, 8.0, 16.0, 8.0);
        assert_eq!(half.v0, 0.75);
        assert_eq!(half.v1, 1.0);
    }

    #[test]
    fn out_of_bounds_rect_is_an_error() {
        let mut atlas = TextureAtlas::new(32, 32);
        assert!(atlas.insert("big", [16, 16, 32, 16]).is_err());
    }

    #[test]
    fn builtin_atlas_parses() {
        let atlas = TextureAtlas::builtin().unwrap();
        assert!(atlas.try_get(MISSING_TEXTURE).is_some());
        assert!(atlas.try_get("stone_slab_top").is_some());
    }
}
