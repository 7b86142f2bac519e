use tessera_blocks::{Block, BlockRegistry};

use crate::coord::{ChunkCoord, SectionKey};
use crate::guard::BuildGuard;
use crate::payload::{DecodeError, decode_section};
use crate::section::{SECTION_SIZE, SECTIONS_PER_CHUNK, Section, WORLD_HEIGHT};

#[derive(Debug)]
struct SectionSlot<R> {
    section: Option<Section>,
    guard: BuildGuard,
    installed: Option<R>,
}

impl<R> Default for SectionSlot<R> {
    fn default() -> Self {
        Self {
            section: None,
            guard: BuildGuard::new(),
            installed: None,
        }
    }
}

/// A vertical stack of sections plus whatever render payload `R` is installed per section.
#[derive(Debug)]
pub struct Chunk<R = ()> {
    coord: ChunkCoord,
    epoch: u64,
    slots: Vec<SectionSlot<R>>,
}

impl<R> Chunk<R> {
    pub fn new(coord: ChunkCoord, epoch: u64) -> Self {
        Self {
            coord,
            epoch,
            slots: (0..SECTIONS_PER_CHUNK).map(|_| SectionSlot::default()).collect(),
        }
    }

    #[inline]
    pub fn coord(&self) -> ChunkCoord {
        self.coord
    }

    /// World-unique id of this chunk's lifetime; replies from an older lifetime carry another.
    #[inline]
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    #[inline]
    pub fn key(&self, sy: u8) -> SectionKey {
        SectionKey::new(self.coord, sy)
    }

    #[inline]
    pub fn section(&self, sy: usize) -> Option<&Section> {
        self.slots.get(sy)?.section.as_ref()
    }

    #[inline]
    pub fn section_mut(&mut self, sy: usize) -> Option<&mut Section> {
        self.slots.get_mut(sy)?.section.as_mut()
    }

    /// Present sections in ascending order.
    pub fn sections(&self) -> impl Iterator<Item = (u8, &Section)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.section.as_ref().map(|sec| (i as u8, sec)))
    }

    /// Bulk replace from a network payload. On a decode error nothing changes.
    pub fn replace_section(
        &mut self,
        sy: u8,
        raw: &[u8],
        reg: &BlockRegistry,
    ) -> Result<u64, DecodeError> {
        let slot = self
            .slots
            .get_mut(usize::from(sy))
            .ok_or(DecodeError::SectionIndex(sy))?;
        let blocks = decode_section(raw, reg)?;
        let section = slot.section.get_or_insert_with(Section::new);
        Ok(section.replace(blocks))
    }

    /// Replaces section `sy` with already decoded blocks, creating it if absent.
    pub fn put_section(&mut self, sy: usize, blocks: Vec<Block>) -> Option<u64> {
        let slot = self.slots.get_mut(sy)?;
        let section = slot.section.get_or_insert_with(Section::new);
        Some(section.replace(blocks))
    }

    /// Clears a present section to air. Absent sections stay absent.
    pub fn clear_section(&mut self, sy: usize) -> Option<u64> {
        let section = self.section_mut(sy)?;
        Some(section.replace(Vec::new()))
    }

    /// Reads a block with chunk-local x/z and world y. Absent sections and
    /// heights outside the world read as air.
    pub fn get_block(&self, lx: usize, wy: i32, lz: usize) -> Block {
        if !(0..WORLD_HEIGHT).contains(&wy) || lx >= SECTION_SIZE || lz >= SECTION_SIZE {
            return Block::AIR;
        }
        let sy = wy as usize / SECTION_SIZE;
        let ly = wy as usize % SECTION_SIZE;
        self.section(sy)
            .map(|s| s.get_local(lx, ly, lz))
            .unwrap_or(Block::AIR)
    }

    /// Writes a block with chunk-local x/z and world y, creating the section if needed.
    /// Returns the section index and its new build number.
    pub fn set_block(&mut self, lx: usize, wy: i32, lz: usize, block: Block) -> Option<(u8, u64)> {
        if !(0..WORLD_HEIGHT).contains(&wy) {
            return None;
        }
        let sy = wy as usize / SECTION_SIZE;
        let ly = wy as usize % SECTION_SIZE;
        let slot = self.slots.get_mut(sy)?;
        let section = slot.section.get_or_insert_with(Section::new);
        let build = section.set_block(lx, ly, lz, block)?;
        Some((sy as u8, build))
    }

    pub fn invalidate_section(&mut self, sy: usize) -> Option<u64> {
        self.section_mut(sy).map(Section::invalidate)
    }

    /// Reconciliation check for a finished mesh of section `sy`; see [`BuildGuard::try_accept`].
    #[inline]
    pub fn try_accept(&self, sy: usize, build: u64) -> bool {
        self.slots
            .get(sy)
            .map(|s| s.guard.try_accept(build))
            .unwrap_or(false)
    }

    /// Runs the guard and, on acceptance, stores `payload` as the installed mesh.
    pub fn accept_and_install(&mut self, sy: usize, build: u64, payload: R) -> bool {
        let Some(slot) = self.slots.get_mut(sy) else {
            return false;
        };
        if !slot.guard.try_accept(build) {
            return false;
        }
        slot.installed = Some(payload);
        true
    }

    #[inline]
    pub fn installed(&self, sy: usize) -> Option<&R> {
        self.slots.get(sy)?.installed.as_ref()
    }

    #[inline]
    pub fn installed_build(&self, sy: usize) -> Option<u64> {
        self.slots.get(sy)?.guard.installed()
    }
}
