//! Deterministic stand-in for a server: generates terrain around the origin, streams it
//! through a [`Session`] and then pokes at it with block updates.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use fastnoise_lite::{FastNoiseLite, NoiseType};
use tessera_blocks::{Block, BlockRegistry, ConfigError, TextureAtlas};
use tessera_chunk::{
    ChunkCoord, SECTION_SIZE, SECTION_VOLUME, SECTIONS_PER_CHUNK, SectionKey, WORLD_HEIGHT,
    encode_section,
};
use tessera_mesh_cpu::SectionMesh;
use tessera_runtime::{
    DrainStats, RenderSink, SectionPayload, ServerMessage, Session, SessionError,
};
use thiserror::Error;

use crate::config::ViewerConfig;

const PUMP_TIMEOUT: Duration = Duration::from_secs(30);
const MIN_HEIGHT: i32 = 40;
const MAX_HEIGHT: i32 = 90;

#[derive(Debug, Error)]
pub enum DemoError {
    #[error(transparent)]
    Assets(#[from] ConfigError),
    #[error(transparent)]
    Session(#[from] SessionError),
}

/// Counts what the renderer would have uploaded.
#[derive(Default)]
pub struct MeshCounter {
    sections: hashbrown::HashMap<SectionKey, (usize, usize)>,
    installs: usize,
}

impl MeshCounter {
    pub fn totals(&self) -> (usize, usize) {
        self.sections
            .values()
            .fold((0, 0), |(o, t), &(a, b)| (o + a, t + b))
    }
}

impl RenderSink for MeshCounter {
    fn install(&mut self, key: SectionKey, mesh: &SectionMesh) {
        self.installs += 1;
        self.sections.insert(
            key,
            (mesh.opaque.quad_count(), mesh.transparent.quad_count()),
        );
    }

    fn remove_chunk(&mut self, coord: ChunkCoord) {
        self.sections.retain(|k, _| k.coord != coord);
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct DemoReport {
    pub chunks: usize,
    pub sections: usize,
    pub installs: usize,
    pub opaque_quads: usize,
    pub transparent_quads: usize,
    pub rejected_messages: usize,
    pub replies: DrainStats,
}

#[inline]
fn splitmix(mut x: u64) -> u64 {
    x = x.wrapping_add(0x9E37_79B9_7F4A_7C15);
    x = (x ^ (x >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    x = (x ^ (x >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    x ^ (x >> 31)
}

fn column_hash(seed: i32, wx: i32, wz: i32) -> u64 {
    let k = (u64::from(seed as u32) << 32) ^ (u64::from(wx as u32) << 16) ^ u64::from(wz as u32);
    splitmix(k)
}

struct Palette {
    stone: Block,
    dirt: Block,
    grass: Block,
    sand: Block,
    slab: Block,
    flower: Block,
    glass: Block,
}

impl Palette {
    fn from_registry(reg: &BlockRegistry) -> Self {
        let named = |name: &str| {
            reg.state_from_props(name, &HashMap::new()).unwrap_or_else(|| {
                log::warn!("block `{name}` missing from registry; using air");
                Block::AIR
            })
        };
        Self {
            stone: named("stone"),
            dirt: named("dirt"),
            grass: named("grass"),
            sand: named("sand"),
            slab: named("stone_slab"),
            flower: named("yellow_flower"),
            glass: named("glass"),
        }
    }
}

struct Terrain {
    noise: FastNoiseLite,
    seed: i32,
    palette: Palette,
}

impl Terrain {
    fn new(seed: i32, reg: &BlockRegistry) -> Self {
        let mut noise = FastNoiseLite::with_seed(seed);
        noise.set_noise_type(Some(NoiseType::OpenSimplex2));
        noise.set_frequency(Some(0.02));
        Self {
            noise,
            seed,
            palette: Palette::from_registry(reg),
        }
    }

    fn height(&self, wx: i32, wz: i32) -> i32 {
        let h = self.noise.get_noise_2d(wx as f32, wz as f32);
        let hh = ((h + 1.0) * 0.5 * (MAX_HEIGHT - MIN_HEIGHT) as f32) as i32 + MIN_HEIGHT;
        hh.clamp(1, WORLD_HEIGHT - 2)
    }

    fn block(&self, wx: i32, wy: i32, wz: i32, height: i32) -> Block {
        let p = &self.palette;
        if wy < height - 3 {
            return p.stone;
        }
        if wy < height - 1 {
            return p.dirt;
        }
        if wy == height - 1 {
            return if height <= MIN_HEIGHT + 4 { p.sand } else { p.grass };
        }
        if wy == height {
            return match column_hash(self.seed, wx, wz) % 97 {
                0..=2 => p.slab,
                3..=6 => p.flower,
                7 => p.glass,
                _ => Block::AIR,
            };
        }
        Block::AIR
    }

    /// Encoded non-empty sections of one chunk.
    fn chunk_sections(&self, coord: ChunkCoord, reg: &BlockRegistry) -> Vec<SectionPayload> {
        let s = SECTION_SIZE as i32;
        let mut sections = vec![vec![Block::AIR; SECTION_VOLUME]; SECTIONS_PER_CHUNK];
        for lz in 0..SECTION_SIZE {
            for lx in 0..SECTION_SIZE {
                let wx = coord.cx * s + lx as i32;
                let wz = coord.cz * s + lz as i32;
                let height = self.height(wx, wz);
                for wy in 0..=height {
                    let b = self.block(wx, wy, wz, height);
                    let (sy, ly) = (wy as usize / SECTION_SIZE, wy as usize % SECTION_SIZE);
                    sections[sy][(ly * SECTION_SIZE + lz) * SECTION_SIZE + lx] = b;
                }
            }
        }
        sections
            .into_iter()
            .enumerate()
            .filter(|(_, blocks)| blocks.iter().any(|b| !b.is_air()))
            .map(|(sy, blocks)| SectionPayload {
                y: sy as u8,
                data: encode_section(&blocks, reg),
            })
            .collect()
    }

    fn chunk_message(&self, coord: ChunkCoord, reg: &BlockRegistry) -> ServerMessage {
        ServerMessage::ChunkLoaded {
            x: coord.cx,
            z: coord.cz,
            sections: self.chunk_sections(coord, reg),
        }
    }
}

/// Chunks within `radius` of the origin, nearest first.
fn chunks_in_view(radius: i32) -> Vec<ChunkCoord> {
    let origin = ChunkCoord::new(0, 0);
    let r2 = i64::from(radius) * i64::from(radius);
    let mut v: Vec<ChunkCoord> = (-radius..=radius)
        .flat_map(|cx| (-radius..=radius).map(move |cz| ChunkCoord::new(cx, cz)))
        .filter(|c| c.distance_sq(origin) <= r2)
        .collect();
    v.sort_by_key(|c| (c.distance_sq(origin), *c));
    v
}

fn load_assets(cfg: &ViewerConfig) -> Result<BlockRegistry, ConfigError> {
    let atlas = match &cfg.atlas {
        Some(path) => TextureAtlas::from_path(path)?,
        None => TextureAtlas::builtin()?,
    };
    let atlas = Arc::new(atlas);
    match &cfg.blocks {
        Some(path) => BlockRegistry::from_path(atlas, path),
        None => BlockRegistry::builtin(atlas),
    }
}

fn send(
    session: &mut Session<MeshCounter>,
    msg: ServerMessage,
    report: &mut DemoReport,
) {
    let name = msg.name();
    if let Err(e) = session.handle(msg) {
        log::debug!("{name} rejected: {e}");
        report.rejected_messages += 1;
    }
    session.flush_builds();
    report.replies += session.drain_replies();
}

/// Streams the demo world through a fresh session and reports what came out.
pub fn run(cfg: &ViewerConfig) -> Result<DemoReport, DemoError> {
    let reg = Arc::new(load_assets(cfg)?);
    log::info!(
        "{} block types, {} textures",
        reg.len(),
        reg.atlas().len()
    );
    let terrain = Terrain::new(cfg.seed, &reg);
    let mut session = Session::new(Arc::clone(&reg), cfg.pool(), MeshCounter::default())?;
    let mut report = DemoReport::default();

    let t0 = Instant::now();
    let coords = chunks_in_view(cfg.view_distance);
    for &coord in &coords {
        send(&mut session, terrain.chunk_message(coord, &reg), &mut report);
    }
    report.replies += session.pump_until_idle(PUMP_TIMEOUT);
    log::info!(
        "streamed {} chunks in {:?} ({} section meshes installed)",
        coords.len(),
        t0.elapsed(),
        report.replies.installed
    );

    let s = SECTION_SIZE as u64;
    for i in 0..cfg.updates {
        let r = splitmix(u64::from(cfg.seed as u32) ^ (i as u64).wrapping_mul(0x2545_F491));
        let Some(&coord) = coords.get((r % coords.len().max(1) as u64) as usize) else {
            break;
        };
        let wx = coord.cx * SECTION_SIZE as i32 + ((r >> 8) % s) as i32;
        let wz = coord.cz * SECTION_SIZE as i32 + ((r >> 16) % s) as i32;
        let surface = terrain.height(wx, wz);
        let (y, id, data) = match (r >> 24) % 4 {
            0 => (surface - 1, 0, 0),
            1 => (surface, 20, 0),
            2 => (surface, 44, ((r >> 32) % 8) as u8),
            _ => (surface + 1, 4, 0),
        };
        let msg = ServerMessage::BlockUpdate {
            x: wx,
            y,
            z: wz,
            id,
            data,
        };
        send(&mut session, msg, &mut report);
        if i == cfg.updates / 2 {
            session.publish_textures(Arc::clone(reg.atlas()))?;
        }
    }

    // cycle the farthest chunk to exercise unload and epoch checks
    if let Some(&far) = coords.last() {
        send(
            &mut session,
            ServerMessage::ChunkUnload {
                x: far.cx,
                z: far.cz,
            },
            &mut report,
        );
        send(&mut session, terrain.chunk_message(far, &reg), &mut report);
    }
    report.replies += session.pump_until_idle(PUMP_TIMEOUT);

    let (opaque, transparent) = session.sink().totals();
    report.chunks = session.world().len();
    report.sections = session.world().section_keys().len();
    report.installs = session.sink().installs;
    report.opaque_quads = opaque;
    report.transparent_quads = transparent;
    let pool = session.pool_stats();
    log::info!(
        "pool: {} submitted, {} completed, {} dropped",
        pool.submitted,
        pool.completed,
        pool.dropped
    );
    let late = session.shutdown();
    report.replies += late;
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn view_is_a_disc_nearest_first() {
        let v = chunks_in_view(1);
        assert_eq!(v.len(), 5);
        assert_eq!(v[0], ChunkCoord::new(0, 0));
        assert_eq!(chunks_in_view(0), vec![ChunkCoord::new(0, 0)]);
    }

    #[test]
    fn terrain_is_deterministic() {
        let reg = load_assets(&ViewerConfig::default()).unwrap();
        let a = Terrain::new(9, &reg).chunk_sections(ChunkCoord::new(2, -1), &reg);
        let b = Terrain::new(9, &reg).chunk_sections(ChunkCoord::new(2, -1), &reg);
        assert_eq!(a, b);
        assert!(!a.is_empty());
    }

    #[test]
    fn small_demo_installs_meshes() {
        let cfg = ViewerConfig {
            workers: 2,
            view_distance: 1,
            updates: 40,
            ..ViewerConfig::default()
        };
        let report = run(&cfg).unwrap();
        assert_eq!(report.chunks, 5);
        assert!(report.sections > 0);
        assert!(report.installs >= report.sections);
        assert!(report.opaque_quads > 0);
        assert_eq!(report.rejected_messages, 0);
    }
}
