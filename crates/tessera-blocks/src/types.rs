use serde::{Deserialize, Serialize};

pub type BlockId = u16;
pub type StateBits = u16;

/// Compact resolved block state: the type id plus its packed property values.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Default, Debug, Serialize, Deserialize)]
pub struct Block {
    pub id: BlockId,
    pub state: StateBits,
}

impl Block {
    pub const AIR: Block = Block { id: 0, state: 0 };
    /// Read in place of cells that belong to chunks which are not loaded.
    pub const UNLOADED: Block = Block {
        id: BlockId::MAX,
        state: 0,
    };

    #[inline]
    pub const fn new(id: BlockId, state: StateBits) -> Self {
        Self { id, state }
    }

    #[inline]
    pub fn is_air(self) -> bool {
        self.id == Self::AIR.id
    }

    #[inline]
    pub fn is_unloaded(self) -> bool {
        self.id == Self::UNLOADED.id
    }
}

/// The six block faces. Front/back run along Z, left/right along X.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub enum Face {
    Top = 0,
    Bottom = 1,
    Front = 2,
    Back = 3,
    Left = 4,
    Right = 5,
}

impl Face {
    pub const ALL: [Face; 6] = [
        Face::Top,
        Face::Bottom,
        Face::Front,
        Face::Back,
        Face::Left,
        Face::Right,
    ];

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    /// Integer grid step `(dx,dy,dz)` taken when leaving the block through this face.
    #[inline]
    pub fn delta(self) -> (i32, i32, i32) {
        match self {
            Face::Top => (0, 1, 0),
            Face::Bottom => (0, -1, 0),
            Face::Front => (0, 0, 1),
            Face::Back => (0, 0, -1),
            Face::Left => (1, 0, 0),
            Face::Right => (-1, 0, 0),
        }
    }

    #[inline]
    pub fn opposite(self) -> Face {
        match self {
            Face::Top => Face::Bottom,
            Face::Bottom => Face::Top,
            Face::Front => Face::Back,
            Face::Back => Face::Front,
            Face::Left => Face::Right,
            Face::Right => Face::Left,
        }
    }

    #[inline]
    pub fn normal(self) -> [f32; 3] {
        let (x, y, z) = self.delta();
        [x as f32, y as f32, z as f32]
    }

    /// Classifies the face into top/bottom/side role for texture lookup.
    #[inline]
    pub fn role(self) -> FaceRole {
        match self {
            Face::Top => FaceRole::Top,
            Face::Bottom => FaceRole::Bottom,
            _ => FaceRole::Side,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum FaceRole {
    Top,
    Bottom,
    Side,
}

/// Output buffer a block's faces are written to.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderLayer {
    #[default]
    Opaque,
    Transparent,
}

// Shape kinds consumed by the model generator
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Shape {
    None,
    Cube,
    Cross,
    /// Half-height box; `half` names the boolean property that selects the top half.
    Slab { half: String },
}

impl Shape {
    #[inline]
    pub fn is_full_cube(&self) -> bool {
        matches!(self, Shape::Cube)
    }

    /// Same generator, ignoring which properties drive it.
    #[inline]
    pub fn same_kind(&self, other: &Shape) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }
}
