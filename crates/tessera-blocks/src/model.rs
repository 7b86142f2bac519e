//! Block models: ordered lists of oriented, textured quads in 16x16 logical texel space.

use crate::registry::BlockType;
use crate::texture::{Texture, TextureAtlas};
use crate::types::{Face, Shape, StateBits};

/// Full extent of a block along any axis, in logical texels.
pub const BLOCK_TEXELS: u8 = 16;
const HALF: u8 = BLOCK_TEXELS / 2;

#[derive(Clone, Debug, PartialEq)]
pub struct ModelFace {
    pub face: Face,
    pub texture: Texture,
    /// Sub-rectangle in the face plane: `x` runs along X (or Z for left/right faces), `y` is vertical
    /// on side faces and Z on top/bottom faces.
    pub x: u8,
    pub y: u8,
    pub width: u8,
    pub height: u8,
    /// Offset of the face plane along its own axis.
    pub depth: u8,
    /// Face lies on the block boundary and may be hidden by a neighbor.
    pub cullable: bool,
    /// Quad sits on a vertical diagonal through the block instead of an axis plane.
    pub diagonal: bool,
}

impl ModelFace {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        face: Face,
        texture: Texture,
        x: u8,
        y: u8,
        width: u8,
        height: u8,
        depth: u8,
        cullable: bool,
    ) -> Self {
        Self {
            face,
            texture,
            x,
            y,
            width,
            height,
            depth,
            cullable,
            diagonal: false,
        }
    }

    pub fn diagonal(face: Face, texture: Texture) -> Self {
        Self {
            face,
            texture,
            x: 0,
            y: 0,
            width: BLOCK_TEXELS,
            height: BLOCK_TEXELS,
            depth: HALF,
            cullable: false,
            diagonal: true,
        }
    }

    #[inline]
    pub fn same_rect(&self, other: &ModelFace) -> bool {
        self.x == other.x
            && self.y == other.y
            && self.width == other.width
            && self.height == other.height
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Model {
    faces: Vec<ModelFace>,
}

impl Model {
    pub fn new() -> Self {
        Self { faces: Vec::new() }
    }

    pub fn add_face(&mut self, face: ModelFace) {
        self.faces.push(face);
    }

    #[inline]
    pub fn faces(&self) -> &[ModelFace] {
        &self.faces
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.faces.is_empty()
    }

    /// True when a cullable face on `side` covers exactly the rectangle of `other`.
    /// Used to decide whether two partial shapes seal each other.
    pub fn seals(&self, side: Face, other: &ModelFace) -> bool {
        self.faces
            .iter()
            .any(|f| f.face == side && f.cullable && !f.diagonal && f.same_rect(other))
    }
}

/// Generates the geometry for one state of a block type.
pub(crate) fn generate(ty: &BlockType, state: StateBits, atlas: &TextureAtlas) -> Model {
    let tex = |face: Face| match ty.texture_name(face.role(), state) {
        Some(name) => atlas.get(name),
        None => {
            log::warn!("block `{}` has no texture for {:?}", ty.name, face);
            atlas.missing().clone()
        }
    };
    let mut model = Model::new();
    match &ty.shape {
        Shape::None => {}
        Shape::Cube => {
            for face in Face::ALL {
                let depth = match face {
                    Face::Top | Face::Front | Face::Left => BLOCK_TEXELS,
                    Face::Bottom | Face::Back | Face::Right => 0,
                };
                model.add_face(ModelFace::new(
                    face,
                    tex(face),
                    0,
                    0,
                    BLOCK_TEXELS,
                    BLOCK_TEXELS,
                    depth,
                    true,
                ));
            }
        }
        Shape::Cross => {
            // Two diagonal planes, each emitted from both sides.
            for face in [Face::Front, Face::Back, Face::Left, Face::Right] {
                model.add_face(ModelFace::diagonal(face, tex(face)));
            }
        }
        Shape::Slab { half } => {
            let top = ty.state_prop_value(state, half) == Some("true");
            let side_y = if top { HALF } else { 0 };
            model.add_face(ModelFace::new(
                Face::Top,
                tex(Face::Top),
                0,
                0,
                BLOCK_TEXELS,
                BLOCK_TEXELS,
                if top { BLOCK_TEXELS } else { HALF },
                top,
            ));
            model.add_face(ModelFace::new(
                Face::Bottom,
                tex(Face::Bottom),
                0,
                0,
                BLOCK_TEXELS,
                BLOCK_TEXELS,
                if top { HALF } else { 0 },
                !top,
            ));
            for (face, depth) in [
                (Face::Front, BLOCK_TEXELS),
                (Face::Back, 0),
                (Face::Left, BLOCK_TEXELS),
                (Face::Right, 0),
            ] {
                model.add_face(ModelFace::new(
                    face,
                    tex(face),
                    0,
                    side_y,
                    BLOCK_TEXELS,
                    HALF,
                    depth,
                    true,
                ));
            }
        }
    }
    model
}
