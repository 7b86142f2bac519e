use hashbrown::HashMap;
use tessera_blocks::{Block, BlockRegistry, Face};

use crate::chunk::Chunk;
use crate::coord::{ChunkCoord, SectionKey};
use crate::payload::{DecodeError, decode_section};
use crate::section::{Neighbor, SECTION_SIZE, SECTIONS_PER_CHUNK, SectionSnapshot, WORLD_HEIGHT};

/// Result of a single-block write.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlockUpdate {
    pub key: SectionKey,
    pub build: u64,
    /// Present neighbor sections across the borders the written cell touches.
    pub invalidated: Vec<SectionKey>,
}

/// Sections touched by a chunk load.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ChunkLoad {
    pub epoch: u64,
    /// Sections of the loaded chunk whose contents changed.
    pub replaced: Vec<SectionKey>,
    /// Sections of adjacent chunks whose border now sees different data.
    pub invalidated: Vec<SectionKey>,
}

/// Client-side cache of loaded chunks, keyed by chunk coordinate.
#[derive(Debug)]
pub struct World<R = ()> {
    chunks: HashMap<ChunkCoord, Chunk<R>>,
    next_epoch: u64,
}

impl<R> Default for World<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R> World<R> {
    pub fn new() -> Self {
        Self {
            chunks: HashMap::new(),
            next_epoch: 1,
        }
    }

    #[inline]
    pub fn get(&self, coord: ChunkCoord) -> Option<&Chunk<R>> {
        self.chunks.get(&coord)
    }

    #[inline]
    pub fn get_mut(&mut self, coord: ChunkCoord) -> Option<&mut Chunk<R>> {
        self.chunks.get_mut(&coord)
    }

    #[inline]
    pub fn contains(&self, coord: ChunkCoord) -> bool {
        self.chunks.contains_key(&coord)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Loaded coordinates, sorted.
    pub fn coords(&self) -> Vec<ChunkCoord> {
        let mut v: Vec<ChunkCoord> = self.chunks.keys().copied().collect();
        v.sort_unstable();
        v
    }

    /// Every present section of every loaded chunk, sorted.
    pub fn section_keys(&self) -> Vec<SectionKey> {
        let mut v: Vec<SectionKey> = self
            .chunks
            .values()
            .flat_map(|c| c.sections().map(move |(sy, _)| c.key(sy)))
            .collect();
        v.sort_unstable();
        v
    }

    /// Creates or refreshes the chunk at `coord` from section payloads.
    ///
    /// Every payload is decoded before anything is applied, so a bad payload leaves the
    /// world untouched. A chunk that is already loaded keeps its epoch and build numbers;
    /// its sections missing from `payloads` are cleared. Either way every present section
    /// of the four adjacent chunks is invalidated.
    pub fn load_chunk<'a, I>(
        &mut self,
        coord: ChunkCoord,
        payloads: I,
        reg: &BlockRegistry,
    ) -> Result<ChunkLoad, DecodeError>
    where
        I: IntoIterator<Item = (u8, &'a [u8])>,
    {
        let mut decoded = Vec::new();
        for (sy, raw) in payloads {
            if usize::from(sy) >= SECTIONS_PER_CHUNK {
                return Err(DecodeError::SectionIndex(sy));
            }
            decoded.push((sy, decode_section(raw, reg)?));
        }

        let fresh = !self.chunks.contains_key(&coord);
        if fresh {
            let epoch = self.next_epoch;
            self.next_epoch += 1;
            self.chunks.insert(coord, Chunk::new(coord, epoch));
        }
        let Some(chunk) = self.chunks.get_mut(&coord) else {
            return Ok(ChunkLoad::default());
        };

        let mut given = [false; SECTIONS_PER_CHUNK];
        let mut replaced = Vec::with_capacity(decoded.len());
        for (sy, blocks) in decoded {
            given[usize::from(sy)] = true;
            if chunk.put_section(usize::from(sy), blocks).is_some() {
                replaced.push(chunk.key(sy));
            }
        }
        for (sy, was_given) in given.iter().enumerate() {
            if !was_given && chunk.clear_section(sy).is_some() {
                replaced.push(chunk.key(sy as u8));
            }
        }
        replaced.sort_unstable();
        replaced.dedup();
        let epoch = chunk.epoch();

        // border cells may differ from what the neighbors were meshed against
        let invalidated = self.invalidate_around(coord);
        log::debug!(
            "chunk ({}, {}) loaded: epoch {epoch}, {} sections replaced",
            coord.cx,
            coord.cz,
            replaced.len()
        );
        Ok(ChunkLoad {
            epoch,
            replaced,
            invalidated,
        })
    }

    /// Removes a chunk. Returns the adjacent sections that now border unloaded space,
    /// or `None` if the chunk was not loaded.
    pub fn unload(&mut self, coord: ChunkCoord) -> Option<Vec<SectionKey>> {
        self.chunks.remove(&coord)?;
        log::debug!("chunk ({}, {}) unloaded", coord.cx, coord.cz);
        Some(self.invalidate_around(coord))
    }

    fn invalidate_around(&mut self, coord: ChunkCoord) -> Vec<SectionKey> {
        let mut out = Vec::new();
        for n in coord.neighbors() {
            if let Some(chunk) = self.chunks.get_mut(&n) {
                for sy in 0..SECTIONS_PER_CHUNK {
                    if chunk.invalidate_section(sy).is_some() {
                        out.push(chunk.key(sy as u8));
                    }
                }
            }
        }
        out.sort_unstable();
        out
    }

    /// World-space block lookup. Unloaded chunks read as [`Block::UNLOADED`].
    pub fn block_at(&self, wx: i32, wy: i32, wz: i32) -> Block {
        let coord = ChunkCoord::containing(wx, wz);
        let s = SECTION_SIZE as i32;
        match self.chunks.get(&coord) {
            Some(chunk) => {
                chunk.get_block(wx.rem_euclid(s) as usize, wy, wz.rem_euclid(s) as usize)
            }
            None => Block::UNLOADED,
        }
    }

    /// Writes one block in world space. Writes into unloaded chunks or outside the
    /// world height are ignored.
    pub fn set_block(&mut self, wx: i32, wy: i32, wz: i32, block: Block) -> Option<BlockUpdate> {
        if !(0..WORLD_HEIGHT).contains(&wy) {
            return None;
        }
        let coord = ChunkCoord::containing(wx, wz);
        let s = SECTION_SIZE as i32;
        let (lx, lz) = (wx.rem_euclid(s), wz.rem_euclid(s));
        let ly = wy.rem_euclid(s);
        let (sy, build) = self
            .chunks
            .get_mut(&coord)?
            .set_block(lx as usize, wy, lz as usize, block)?;
        let key = SectionKey::new(coord, sy);

        let mut touched = Vec::new();
        if lx == 0 {
            touched.push(Face::Right);
        }
        if lx == s - 1 {
            touched.push(Face::Left);
        }
        if lz == 0 {
            touched.push(Face::Back);
        }
        if lz == s - 1 {
            touched.push(Face::Front);
        }
        if ly == 0 {
            touched.push(Face::Bottom);
        }
        if ly == s - 1 {
            touched.push(Face::Top);
        }
        let invalidated = touched
            .into_iter()
            .filter_map(|face| {
                let n = Self::neighbor_key(key, face)?;
                self.invalidate(n).map(|_| n)
            })
            .collect();

        Some(BlockUpdate {
            key,
            build,
            invalidated,
        })
    }

    /// Bumps the build number of a present section.
    pub fn invalidate(&mut self, key: SectionKey) -> Option<u64> {
        self.chunks
            .get_mut(&key.coord)?
            .invalidate_section(usize::from(key.sy))
    }

    /// Bumps every present section, e.g. after new textures were broadcast.
    pub fn invalidate_all(&mut self) -> Vec<SectionKey> {
        let keys = self.section_keys();
        for &k in &keys {
            self.invalidate(k);
        }
        keys
    }

    fn neighbor_key(key: SectionKey, face: Face) -> Option<SectionKey> {
        let (dx, dy, dz) = face.delta();
        let sy = i32::from(key.sy) + dy;
        if !(0..SECTIONS_PER_CHUNK as i32).contains(&sy) {
            return None;
        }
        Some(SectionKey::new(key.coord.offset(dx, dz), sy as u8))
    }

    /// What lies across `face` of section `key`.
    pub fn neighbor(&self, key: SectionKey, face: Face) -> Neighbor {
        let Some(nk) = Self::neighbor_key(key, face) else {
            return Neighbor::Empty;
        };
        match self.chunks.get(&nk.coord) {
            None => Neighbor::Unloaded,
            Some(chunk) => match chunk.section(usize::from(nk.sy)) {
                Some(s) => Neighbor::Loaded(s.snapshot()),
                None => Neighbor::Empty,
            },
        }
    }

    /// Snapshot of a present section and its six neighbors, indexed by [`Face::index`].
    pub fn neighborhood(&self, key: SectionKey) -> Option<(SectionSnapshot, [Neighbor; 6])> {
        let center = self
            .chunks
            .get(&key.coord)?
            .section(usize::from(key.sy))?
            .snapshot();
        let neighbors = Face::ALL.map(|f| self.neighbor(key, f));
        Some((center, neighbors))
    }
}
