//! Block types, states, texture atlas, and block models.
#![forbid(unsafe_code)]

pub mod config;
pub mod error;
pub mod model;
pub mod property;
pub mod registry;
pub mod texture;
pub mod types;

pub use error::{ConfigError, RegistryError};
pub use model::{Model, ModelFace};
pub use property::{PropertyDef, StateLayout};
pub use registry::{BlockRegistry, BlockType, MAX_LEGACY_ID};
pub use texture::{MISSING_TEXTURE, Texture, TextureAtlas, UvRect};
pub use types::{Block, BlockId, Face, FaceRole, RenderLayer, Shape, StateBits};
