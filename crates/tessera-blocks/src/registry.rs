use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::{Arc, OnceLock};

use crate::config::{BlockDef, BlocksConfig, ShapeConfig, TextureSelector, TexturesDef};
use crate::error::{ConfigError, RegistryError};
use crate::model::{self, Model};
use crate::property::{PropertyDef, StateLayout};
use crate::texture::{Texture, TextureAtlas};
use crate::types::{Block, BlockId, FaceRole, RenderLayer, Shape, StateBits};

const BUILTIN_BLOCKS: &str = include_str!("../assets/blocks.toml");
const LEGACY_DATA_BITS: u32 = 4;
/// Largest legacy id that still fits next to the data nibble in a `u16` cell.
pub const MAX_LEGACY_ID: u16 = u16::MAX >> LEGACY_DATA_BITS;
const AIR_NAME: &str = "air";

/// Immutable definition of one block kind.
#[derive(Debug)]
pub struct BlockType {
    pub id: BlockId,
    pub name: String,
    pub legacy_id: Option<u16>,
    pub shape: Shape,
    pub layer: RenderLayer,
    pub properties: Vec<PropertyDef>,
    pub textures: TexturesDef,
    layout: StateLayout,
    // One slot per bit pattern, filled on first use.
    models: Vec<OnceLock<Model>>,
}

impl BlockType {
    pub fn new(name: impl Into<String>, shape: Shape) -> Self {
        Self {
            id: 0,
            name: name.into(),
            legacy_id: None,
            shape,
            layer: RenderLayer::Opaque,
            properties: Vec::new(),
            textures: TexturesDef::default(),
            layout: StateLayout::default(),
            models: Vec::new(),
        }
    }

    pub fn with_property(mut self, prop: PropertyDef) -> Self {
        self.properties.push(prop);
        self
    }

    pub fn with_legacy_id(mut self, legacy_id: u16) -> Self {
        self.legacy_id = Some(legacy_id);
        self
    }

    pub fn with_layer(mut self, layer: RenderLayer) -> Self {
        self.layer = layer;
        self
    }

    pub fn with_textures(mut self, textures: TexturesDef) -> Self {
        self.textures = textures;
        self
    }

    #[inline]
    pub fn layout(&self) -> &StateLayout {
        &self.layout
    }

    #[inline]
    pub fn is_transparent(&self) -> bool {
        self.layer == RenderLayer::Transparent
    }

    /// Opaque full cube: hides any neighbor face it touches.
    #[inline]
    pub fn is_full_opaque(&self) -> bool {
        self.shape.is_full_cube() && !self.is_transparent()
    }

    #[inline]
    pub fn prop_index(&self, name: &str) -> Option<usize> {
        self.properties.iter().position(|p| p.name == name)
    }

    pub fn state_prop_value(&self, state: StateBits, name: &str) -> Option<&str> {
        let field = self.prop_index(name)?;
        let ix = self.layout.value_index(state, field)?;
        self.properties[field].values.get(ix).map(String::as_str)
    }

    /// Packs a property map; omitted properties take their first value.
    /// Returns `None` when a value is not part of its property's domain.
    pub fn pack_state(&self, props: &HashMap<String, String>) -> Option<StateBits> {
        let mut indices = Vec::with_capacity(self.properties.len());
        for p in &self.properties {
            match props.get(&p.name) {
                Some(v) => indices.push(p.index_of(v)?),
                None => indices.push(0),
            }
        }
        Some(self.layout.pack(&indices))
    }

    /// Resolves the texture name for a face role, if the selectors cover it.
    pub fn texture_name(&self, role: FaceRole, state: StateBits) -> Option<&str> {
        let t = &self.textures;
        let pick = match role {
            FaceRole::Top => t.top.as_ref().or(t.all.as_ref()),
            FaceRole::Bottom => t.bottom.as_ref().or(t.all.as_ref()),
            FaceRole::Side => t.side.as_ref().or(t.all.as_ref()),
        }?;
        match pick {
            TextureSelector::Name(name) => Some(name.as_str()),
            TextureSelector::By { by, map } => {
                let val = self.state_prop_value(state, by)?;
                map.get(val).map(String::as_str)
            }
        }
    }

    /// Memoized model for `state`; invalid patterns fall back to the default state.
    /// Only registered types carry a cache, see [`BlockRegistry::model`].
    pub(crate) fn model(&self, state: StateBits, atlas: &TextureAtlas) -> Option<&Model> {
        let state = if self.layout.is_valid(state) { state } else { 0 };
        let slot = self.models.get(state as usize)?;
        Some(slot.get_or_init(|| model::generate(self, state, atlas)))
    }

    // Same definition with empty caches.
    fn unbound_copy(&self) -> BlockType {
        BlockType {
            id: self.id,
            name: self.name.clone(),
            legacy_id: self.legacy_id,
            shape: self.shape.clone(),
            layer: self.layer,
            properties: self.properties.clone(),
            textures: self.textures.clone(),
            layout: self.layout.clone(),
            models: (0..self.models.len()).map(|_| OnceLock::new()).collect(),
        }
    }
}

/// Registry of block types bound to one texture atlas.
///
/// Built once before any worker starts and shared read-only afterwards; a new atlas
/// produces a new registry via [`BlockRegistry::rebind`].
#[derive(Debug)]
pub struct BlockRegistry {
    atlas: Arc<TextureAtlas>,
    blocks: Vec<BlockType>,
    by_name: HashMap<String, BlockId>,
    by_legacy: HashMap<u16, BlockId>,
    unknown_block: Block,
}

impl BlockRegistry {
    /// Registry holding only `air` (id 0, legacy id 0).
    pub fn new(atlas: Arc<TextureAtlas>) -> Self {
        let mut reg = Self {
            atlas,
            blocks: Vec::new(),
            by_name: HashMap::new(),
            by_legacy: HashMap::new(),
            unknown_block: Block::AIR,
        };
        let air = BlockType::new(AIR_NAME, Shape::None)
            .with_legacy_id(0)
            .with_layer(RenderLayer::Transparent);
        // Cannot collide in an empty registry.
        let _ = reg.register(air);
        reg
    }

    pub fn register(&mut self, mut ty: BlockType) -> Result<BlockId, RegistryError> {
        if self.by_name.contains_key(&ty.name) {
            return Err(RegistryError::DuplicateType(ty.name));
        }
        if let Some(legacy) = ty.legacy_id {
            if legacy > MAX_LEGACY_ID {
                return Err(RegistryError::LegacyIdRange {
                    id: legacy,
                    max: MAX_LEGACY_ID,
                });
            }
            if let Some(&owner) = self.by_legacy.get(&legacy) {
                return Err(RegistryError::DuplicateLegacyId {
                    id: legacy,
                    owner: self.blocks[owner as usize].name.clone(),
                });
            }
        }
        if let Some(p) = ty.properties.iter().find(|p| p.values.is_empty()) {
            return Err(RegistryError::EmptyProperty {
                block: ty.name.clone(),
                property: p.name.clone(),
            });
        }
        if let Shape::Slab { half } = &ty.shape {
            let ok = ty
                .properties
                .iter()
                .any(|p| &p.name == half && p.is_boolean());
            if !ok {
                return Err(RegistryError::BadShapeProperty {
                    block: ty.name.clone(),
                    property: half.clone(),
                });
            }
        }
        let max_bits = if ty.legacy_id.is_some() {
            LEGACY_DATA_BITS
        } else {
            StateBits::BITS
        };
        let layout = StateLayout::new(&ty.properties).map_err(|bits| RegistryError::StateTooWide {
            name: ty.name.clone(),
            bits,
            max: max_bits,
        })?;
        if layout.total_bits() > max_bits {
            return Err(RegistryError::StateTooWide {
                name: ty.name.clone(),
                bits: layout.total_bits(),
                max: max_bits,
            });
        }
        // Keep the top id free for the unloaded sentinel.
        if self.blocks.len() >= usize::from(Block::UNLOADED.id) {
            return Err(RegistryError::Full);
        }
        let id = self.blocks.len() as BlockId;
        ty.id = id;
        ty.models = (0..layout.state_count()).map(|_| OnceLock::new()).collect();
        ty.layout = layout;
        self.by_name.insert(ty.name.clone(), id);
        if let Some(legacy) = ty.legacy_id {
            self.by_legacy.insert(legacy, id);
        }
        log::debug!("registered block `{}` as id {}", ty.name, id);
        self.blocks.push(ty);
        Ok(id)
    }

    #[inline]
    pub fn get(&self, id: BlockId) -> Option<&BlockType> {
        self.blocks.get(id as usize)
    }

    #[inline]
    pub fn block_type(&self, block: Block) -> Option<&BlockType> {
        self.get(block.id)
    }

    pub fn id_by_name(&self, name: &str) -> Option<BlockId> {
        self.by_name.get(name).copied()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn types(&self) -> impl Iterator<Item = &BlockType> {
        self.blocks.iter()
    }

    #[inline]
    pub fn atlas(&self) -> &Arc<TextureAtlas> {
        &self.atlas
    }

    /// State substituted for unregistered legacy ids.
    #[inline]
    pub fn unknown_block(&self) -> Block {
        self.unknown_block
    }

    /// Sets the fallback for unregistered legacy ids; unknown names keep the current one.
    pub fn set_unknown_block(&mut self, name: &str) -> bool {
        match self.id_by_name(name) {
            Some(id) => {
                self.unknown_block = Block::new(id, 0);
                true
            }
            None => false,
        }
    }

    #[inline]
    pub fn is_known_legacy(&self, legacy_id: u16) -> bool {
        self.by_legacy.contains_key(&legacy_id)
    }

    /// Decodes a legacy id and data nibble. Never fails: unregistered ids give the
    /// fallback state, data that names no valid state gives the type's default state.
    pub fn resolve_legacy(&self, legacy_id: u16, data: u8) -> Block {
        let Some(&id) = self.by_legacy.get(&legacy_id) else {
            log::debug!("unknown legacy block {legacy_id}:{data}, using fallback");
            return self.unknown_block;
        };
        let ty = &self.blocks[id as usize];
        let state = StateBits::from(data & 0x0F);
        if ty.layout.is_valid(state) {
            Block::new(id, state)
        } else {
            log::debug!("invalid data {data} for `{}`, using default state", ty.name);
            Block::new(id, 0)
        }
    }

    /// Inverse of [`resolve_legacy`](Self::resolve_legacy) for types with a legacy id.
    pub fn encode_legacy(&self, block: Block) -> Option<(u16, u8)> {
        let ty = self.block_type(block)?;
        let legacy = ty.legacy_id?;
        Some((legacy, block.state as u8))
    }

    pub fn state_from_props(&self, name: &str, props: &HashMap<String, String>) -> Option<Block> {
        let id = self.id_by_name(name)?;
        let state = self.blocks[id as usize].pack_state(props)?;
        Some(Block::new(id, state))
    }

    pub fn prop_value(&self, block: Block, prop: &str) -> Option<&str> {
        self.block_type(block)?.state_prop_value(block.state, prop)
    }

    /// Texture lookup that always succeeds, see [`TextureAtlas::get`].
    pub fn texture(&self, name: &str) -> Texture {
        self.atlas.get(name)
    }

    /// Model for `block`, or `None` for ids this registry does not know (including the
    /// unloaded sentinel).
    pub fn model(&self, block: Block) -> Option<&Model> {
        self.block_type(block)?.model(block.state, &self.atlas)
    }

    #[inline]
    pub fn is_full_opaque(&self, block: Block) -> bool {
        self.block_type(block)
            .map(BlockType::is_full_opaque)
            .unwrap_or(false)
    }

    /// Whether both blocks are registered and generated by the same shape kind.
    pub fn same_shape(&self, a: Block, b: Block) -> bool {
        match (self.block_type(a), self.block_type(b)) {
            (Some(ta), Some(tb)) => ta.shape.same_kind(&tb.shape),
            _ => false,
        }
    }

    #[inline]
    pub fn layer(&self, block: Block) -> RenderLayer {
        self.block_type(block)
            .map(|t| t.layer)
            .unwrap_or(RenderLayer::Opaque)
    }

    /// Same block types bound to another atlas, with empty model caches.
    pub fn rebind(&self, atlas: Arc<TextureAtlas>) -> BlockRegistry {
        BlockRegistry {
            atlas,
            blocks: self.blocks.iter().map(BlockType::unbound_copy).collect(),
            by_name: self.by_name.clone(),
            by_legacy: self.by_legacy.clone(),
            unknown_block: self.unknown_block,
        }
    }

    pub fn from_config(atlas: Arc<TextureAtlas>, cfg: BlocksConfig) -> Result<Self, ConfigError> {
        let mut reg = BlockRegistry::new(atlas);
        for def in cfg.blocks {
            reg.register(block_type_from_def(def)?)?;
        }
        if let Some(name) = cfg.unknown_block.as_deref() {
            if !reg.set_unknown_block(name) {
                log::warn!("unknown_block `{name}` is not defined, falling back to air");
            }
        }
        Ok(reg)
    }

    pub fn from_toml_str(atlas: Arc<TextureAtlas>, toml_str: &str) -> Result<Self, ConfigError> {
        let cfg: BlocksConfig = toml::from_str(toml_str)?;
        Self::from_config(atlas, cfg)
    }

    pub fn from_path(atlas: Arc<TextureAtlas>, path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let s = fs::read_to_string(path)?;
        Self::from_toml_str(atlas, &s)
    }

    /// The built-in block set.
    pub fn builtin(atlas: Arc<TextureAtlas>) -> Result<Self, ConfigError> {
        Self::from_toml_str(atlas, BUILTIN_BLOCKS)
    }
}

fn compile_shape(cfg: Option<ShapeConfig>) -> Result<Shape, RegistryError> {
    let (kind, half) = match cfg {
        None => return Ok(Shape::Cube),
        Some(ShapeConfig::Simple(kind)) => (kind, None),
        Some(ShapeConfig::Detailed(d)) => (d.kind, d.half),
    };
    match kind.as_str() {
        "cube" => Ok(Shape::Cube),
        "cross" => Ok(Shape::Cross),
        "none" => Ok(Shape::None),
        "slab" => Ok(Shape::Slab {
            half: half.unwrap_or_else(|| "top".to_string()),
        }),
        _ => Err(RegistryError::UnknownShape(kind)),
    }
}

fn block_type_from_def(def: BlockDef) -> Result<BlockType, RegistryError> {
    let shape = compile_shape(def.shape)?;
    let mut ty = BlockType::new(def.name, shape)
        .with_layer(def.layer.unwrap_or_default())
        .with_textures(def.textures.unwrap_or_default());
    if let Some(legacy) = def.legacy_id {
        ty = ty.with_legacy_id(legacy);
    }
    for p in def.properties {
        ty = ty.with_property(match p.values {
            Some(values) => PropertyDef::enumeration(p.name, values),
            None => PropertyDef::boolean(p.name),
        });
    }
    Ok(ty)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Face;

    fn builtin() -> BlockRegistry {
        let atlas = Arc::new(TextureAtlas::builtin().unwrap());
        BlockRegistry::builtin(atlas).unwrap()
    }

    #[test]
    fn air_is_id_zero() {
        let reg = builtin();
        assert_eq!(reg.id_by_name("air"), Some(0));
        assert_eq!(reg.resolve_legacy(0, 0), Block::AIR);
        assert!(reg.model(Block::AIR).unwrap().is_empty());
    }

    #[test]
    fn duplicate_name_is_rejected() {
        let mut reg = builtin();
        let err = reg
            .register(BlockType::new("stone", Shape::Cube))
            .unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateType(name) if name == "stone"));
    }

    #[test]
    fn duplicate_legacy_id_is_rejected() {
        let mut reg = builtin();
        let err = reg
            .register(BlockType::new("stone2", Shape::Cube).with_legacy_id(1))
            .unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateLegacyId { id: 1, .. }));
    }

    #[test]
    fn legacy_id_must_fit_beside_the_data_nibble() {
        let mut reg = builtin();
        let err = reg
            .register(BlockType::new("far", Shape::Cube).with_legacy_id(5000))
            .unwrap_err();
        assert!(matches!(
            err,
            RegistryError::LegacyIdRange { id: 5000, max: 0x0FFF }
        ));
        assert!(reg.id_by_name("far").is_none());
        let edge = reg
            .register(BlockType::new("edge", Shape::Cube).with_legacy_id(MAX_LEGACY_ID))
            .unwrap();
        assert_eq!(reg.resolve_legacy(MAX_LEGACY_ID, 0).id, edge);
    }

    #[test]
    fn legacy_types_are_limited_to_the_data_nibble() {
        let mut reg = builtin();
        let wide = BlockType::new("wide", Shape::Cube)
            .with_legacy_id(250)
            .with_property(PropertyDef::enumeration("v", (0..20).map(|i| i.to_string())));
        assert!(matches!(
            reg.register(wide),
            Err(RegistryError::StateTooWide { bits: 5, max: 4, .. })
        ));
    }

    #[test]
    fn slab_needs_its_boolean_property() {
        let mut reg = builtin();
        let bad = BlockType::new("bad_slab", Shape::Slab { half: "top".into() });
        assert!(matches!(
            reg.register(bad),
            Err(RegistryError::BadShapeProperty { .. })
        ));
    }

    #[test]
    fn unknown_legacy_id_falls_back() {
        let reg = builtin();
        assert!(!reg.is_known_legacy(4000));
        assert_eq!(reg.resolve_legacy(4000, 3), reg.unknown_block());
        assert_eq!(reg.unknown_block(), Block::AIR);
    }

    #[test]
    fn invalid_data_gives_default_state() {
        let reg = builtin();
        // red_flower has 9 values, 4 bits; 12 names nothing
        let b = reg.resolve_legacy(38, 12);
        assert_eq!(b.id, reg.id_by_name("red_flower").unwrap());
        assert_eq!(b.state, 0);
    }

    #[test]
    fn slab_legacy_top_bit() {
        let reg = builtin();
        let b = reg.resolve_legacy(44, 0x8 | 3);
        assert_eq!(reg.prop_value(b, "variant"), Some("cobblestone"));
        assert_eq!(reg.prop_value(b, "top"), Some("true"));
        assert_eq!(reg.encode_legacy(b), Some((44, 0xB)));
    }

    #[test]
    fn texture_selectors_follow_properties() {
        let reg = builtin();
        let ty = reg.get(reg.id_by_name("stone_slab").unwrap()).unwrap();
        let sandstone = ty
            .pack_state(&HashMap::from([("variant".into(), "sandstone".into())]))
            .unwrap();
        assert_eq!(ty.texture_name(FaceRole::Top, sandstone), Some("sandstone_top"));
        assert_eq!(ty.texture_name(FaceRole::Side, sandstone), Some("sandstone_normal"));
    }

    #[test]
    fn model_is_memoized() {
        let reg = builtin();
        let grass = reg.resolve_legacy(2, 0);
        let a = reg.model(grass).unwrap() as *const Model;
        let b = reg.model(grass).unwrap() as *const Model;
        assert_eq!(a, b);
        let top = reg.model(grass).unwrap().faces()[Face::Top.index()].texture.clone();
        assert_eq!(&*top.name, "grass_top");
    }

    #[test]
    fn rebind_keeps_ids_and_swaps_textures() {
        let reg = builtin();
        let mut atlas = TextureAtlas::new(32, 32);
        atlas.insert("stone", [16, 16, 16, 16]).unwrap();
        let rebound = reg.rebind(Arc::new(atlas));
        assert_eq!(rebound.len(), reg.len());
        let stone = rebound.resolve_legacy(1, 0);
        let face = &rebound.model(stone).unwrap().faces()[0];
        assert_eq!(face.texture.uv.u0, 0.5);
        let dirt = rebound.resolve_legacy(3, 0);
        assert!(rebound.model(dirt).unwrap().faces()[0].texture.is_missing());
    }

    #[test]
    fn unloaded_sentinel_has_no_type() {
        let reg = builtin();
        assert!(reg.model(Block::UNLOADED).is_none());
        assert!(!reg.is_full_opaque(Block::UNLOADED));
    }
}
