use std::sync::Arc;

use tessera_blocks::Block;

pub const SECTION_SIZE: usize = 16;
pub const SECTION_VOLUME: usize = SECTION_SIZE * SECTION_SIZE * SECTION_SIZE;
pub const SECTIONS_PER_CHUNK: usize = 16;
pub const WORLD_HEIGHT: i32 = (SECTION_SIZE * SECTIONS_PER_CHUNK) as i32;

#[inline]
pub(crate) fn idx(x: usize, y: usize, z: usize) -> usize {
    (y * SECTION_SIZE + z) * SECTION_SIZE + x
}

#[inline]
fn in_bounds(x: i32, y: i32, z: i32) -> bool {
    let s = SECTION_SIZE as i32;
    (0..s).contains(&x) && (0..s).contains(&y) && (0..s).contains(&z)
}

/// 16x16x16 block states plus the build number of their current contents.
///
/// Storage is copy-on-write: snapshots share the array until the next mutation.
#[derive(Clone, Debug)]
pub struct Section {
    blocks: Arc<Vec<Block>>,
    build: u64,
}

impl Default for Section {
    fn default() -> Self {
        Self::new()
    }
}

impl Section {
    /// All-air section at build 0.
    pub fn new() -> Self {
        Self {
            blocks: Arc::new(vec![Block::AIR; SECTION_VOLUME]),
            build: 0,
        }
    }

    /// Section at build 0 holding `blocks`, padded or truncated to the section volume.
    pub fn from_blocks(mut blocks: Vec<Block>) -> Self {
        blocks.resize(SECTION_VOLUME, Block::AIR);
        Self {
            blocks: Arc::new(blocks),
            build: 0,
        }
    }

    #[inline]
    pub fn build(&self) -> u64 {
        self.build
    }

    #[inline]
    pub fn get_local(&self, x: usize, y: usize, z: usize) -> Block {
        self.blocks[idx(x, y, z)]
    }

    /// In-bounds lookup; coordinates outside the section give `None`.
    #[inline]
    pub fn get(&self, x: i32, y: i32, z: i32) -> Option<Block> {
        in_bounds(x, y, z).then(|| self.get_local(x as usize, y as usize, z as usize))
    }

    /// Sets one cell and bumps the build number. Out-of-range coordinates change nothing.
    pub fn set_block(&mut self, x: usize, y: usize, z: usize, block: Block) -> Option<u64> {
        if x >= SECTION_SIZE || y >= SECTION_SIZE || z >= SECTION_SIZE {
            return None;
        }
        Arc::make_mut(&mut self.blocks)[idx(x, y, z)] = block;
        self.build += 1;
        Some(self.build)
    }

    /// Replaces every cell at once; the build number moves by one.
    pub fn replace(&mut self, mut blocks: Vec<Block>) -> u64 {
        blocks.resize(SECTION_VOLUME, Block::AIR);
        self.blocks = Arc::new(blocks);
        self.build += 1;
        self.build
    }

    /// Bumps the build number without touching contents, e.g. when a neighbor changed.
    pub fn invalidate(&mut self) -> u64 {
        self.build += 1;
        self.build
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.blocks.iter().all(|b| b.is_air())
    }

    #[inline]
    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// Frozen view of the current contents.
    #[inline]
    pub fn snapshot(&self) -> SectionSnapshot {
        SectionSnapshot {
            blocks: Arc::clone(&self.blocks),
            build: self.build,
        }
    }
}

/// Immutable copy of a section taken at submission time.
#[derive(Clone, Debug)]
pub struct SectionSnapshot {
    blocks: Arc<Vec<Block>>,
    build: u64,
}

impl SectionSnapshot {
    #[inline]
    pub fn build(&self) -> u64 {
        self.build
    }

    #[inline]
    pub fn get_local(&self, x: usize, y: usize, z: usize) -> Block {
        self.blocks[idx(x, y, z)]
    }

    #[inline]
    pub fn get(&self, x: i32, y: i32, z: i32) -> Option<Block> {
        in_bounds(x, y, z).then(|| self.get_local(x as usize, y as usize, z as usize))
    }

    #[inline]
    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.blocks.iter().all(|b| b.is_air())
    }
}

impl From<Section> for SectionSnapshot {
    fn from(section: Section) -> Self {
        section.snapshot()
    }
}

/// What lies across one face of a section.
#[derive(Clone, Debug, Default)]
pub enum Neighbor {
    Loaded(SectionSnapshot),
    /// Loaded chunk without this section, or beyond the world's vertical range.
    Empty,
    /// Chunk not loaded.
    #[default]
    Unloaded,
}

impl Neighbor {
    /// Cell lookup with the neighbor's own local coordinates.
    #[inline]
    pub fn get_local(&self, x: usize, y: usize, z: usize) -> Block {
        match self {
            Neighbor::Loaded(s) => s.get_local(x, y, z),
            Neighbor::Empty => Block::AIR,
            Neighbor::Unloaded => Block::UNLOADED,
        }
    }
}
