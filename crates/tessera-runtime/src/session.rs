//! The coordinating owner of the world: applies server messages, schedules builds for
//! dirty sections and installs the replies that pass the build guard.

use std::collections::BTreeSet;
use std::ops::AddAssign;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tessera_blocks::{BlockRegistry, TextureAtlas};
use tessera_chunk::{ChunkCoord, DecodeError, SectionKey, WORLD_HEIGHT, World};
use tessera_mesh_cpu::SectionMesh;
use thiserror::Error;

use crate::pool::{
    BuildOutcome, BuildReply, BuildRequest, DispatchError, PoolConfig, PoolError, PoolStats,
    WorkerPool,
};
use crate::protocol::ServerMessage;

/// Consumer of finished section geometry, e.g. a GPU upload queue.
pub trait RenderSink {
    fn install(&mut self, key: SectionKey, mesh: &SectionMesh);
    fn remove_chunk(&mut self, coord: ChunkCoord);
}

/// Sink that discards everything.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullSink;

impl RenderSink for NullSink {
    fn install(&mut self, _key: SectionKey, _mesh: &SectionMesh) {}
    fn remove_chunk(&mut self, _coord: ChunkCoord) {}
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("chunk ({x}, {z}) payload rejected: {source}")]
    Payload {
        x: i32,
        z: i32,
        #[source]
        source: DecodeError,
    },
    #[error("block update at ({x}, {y}, {z}) targets a chunk that is not loaded")]
    UnloadedTarget { x: i32, y: i32, z: i32 },
    #[error("block update at height {0} is outside the world")]
    OutsideWorld(i32),
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
    #[error(transparent)]
    Pool(#[from] PoolError),
}

/// Reply accounting for one or more `drain_replies` calls.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DrainStats {
    pub received: usize,
    pub installed: usize,
    /// Passed the epoch check but lost against a newer installed build.
    pub stale: usize,
    /// Chunk unloaded (or reloaded under a new epoch) since submission.
    pub orphaned: usize,
    pub dropped: usize,
}

impl AddAssign for DrainStats {
    fn add_assign(&mut self, rhs: Self) {
        self.received += rhs.received;
        self.installed += rhs.installed;
        self.stale += rhs.stale;
        self.orphaned += rhs.orphaned;
        self.dropped += rhs.dropped;
    }
}

pub struct Session<S: RenderSink> {
    world: World<SectionMesh>,
    registry: Arc<BlockRegistry>,
    pool: WorkerPool,
    sink: S,
    dirty: BTreeSet<SectionKey>,
    outstanding: usize,
}

impl<S: RenderSink> Session<S> {
    /// Starts the workers and broadcasts `registry` before anything can be scheduled.
    pub fn new(
        registry: Arc<BlockRegistry>,
        pool: PoolConfig,
        sink: S,
    ) -> Result<Self, SessionError> {
        let pool = WorkerPool::new(pool)?;
        pool.publish(Arc::clone(&registry))?;
        Ok(Self {
            world: World::new(),
            registry,
            pool,
            sink,
            dirty: BTreeSet::new(),
            outstanding: 0,
        })
    }

    #[inline]
    pub fn world(&self) -> &World<SectionMesh> {
        &self.world
    }

    #[inline]
    pub fn registry(&self) -> &Arc<BlockRegistry> {
        &self.registry
    }

    #[inline]
    pub fn sink(&self) -> &S {
        &self.sink
    }

    #[inline]
    pub fn pool_stats(&self) -> PoolStats {
        self.pool.stats()
    }

    #[inline]
    pub fn dirty_count(&self) -> usize {
        self.dirty.len()
    }

    /// Submitted builds whose reply has not been drained yet.
    #[inline]
    pub fn outstanding(&self) -> usize {
        self.outstanding
    }

    /// Nothing left to schedule and no reply outstanding.
    #[inline]
    pub fn is_idle(&self) -> bool {
        self.dirty.is_empty() && self.outstanding == 0
    }

    /// Applies one server message. A rejected message changes nothing.
    pub fn handle(&mut self, msg: ServerMessage) -> Result<(), SessionError> {
        match msg {
            ServerMessage::ChunkLoaded { x, z, sections } => {
                let coord = ChunkCoord::new(x, z);
                let payloads = sections.iter().map(|s| (s.y, s.data.as_slice()));
                match self.world.load_chunk(coord, payloads, &self.registry) {
                    Ok(load) => {
                        self.dirty.extend(load.replaced);
                        self.dirty.extend(load.invalidated);
                        Ok(())
                    }
                    Err(source) => {
                        log::warn!("dropping chunk:loaded for ({x}, {z}): {source}");
                        Err(SessionError::Payload { x, z, source })
                    }
                }
            }
            ServerMessage::BlockUpdate { x, y, z, id, data } => {
                if !(0..WORLD_HEIGHT).contains(&y) {
                    log::warn!("dropping block:update at ({x}, {y}, {z}): outside the world");
                    return Err(SessionError::OutsideWorld(y));
                }
                if !self.registry.is_known_legacy(id) {
                    log::warn!(
                        "block:update at ({x}, {y}, {z}) names unknown block {id}:{data}, using fallback"
                    );
                }
                let block = self.registry.resolve_legacy(id, data);
                match self.world.set_block(x, y, z, block) {
                    Some(update) => {
                        self.dirty.insert(update.key);
                        self.dirty.extend(update.invalidated);
                        Ok(())
                    }
                    None => {
                        log::warn!("dropping block:update at ({x}, {y}, {z}): chunk not loaded");
                        Err(SessionError::UnloadedTarget { x, y, z })
                    }
                }
            }
            ServerMessage::ChunkUnload { x, z } => {
                let coord = ChunkCoord::new(x, z);
                match self.world.unload(coord) {
                    Some(invalidated) => {
                        self.dirty.retain(|k| k.coord != coord);
                        self.dirty.extend(invalidated);
                        self.sink.remove_chunk(coord);
                    }
                    None => log::debug!("chunk:unload for ({x}, {z}) which is not loaded"),
                }
                Ok(())
            }
        }
    }

    /// Submits one build per dirty section, in key order. Returns how many were submitted.
    pub fn flush_builds(&mut self) -> usize {
        let dirty = std::mem::take(&mut self.dirty);
        let mut submitted = 0;
        let mut keys = dirty.into_iter();
        for key in keys.by_ref() {
            let Some(epoch) = self.world.get(key.coord).map(|c| c.epoch()) else {
                continue;
            };
            let Some((center, neighbors)) = self.world.neighborhood(key) else {
                continue;
            };
            let req = BuildRequest {
                key,
                epoch,
                build: center.build(),
                center,
                neighbors,
            };
            match self.pool.submit(req) {
                Ok(_) => {
                    submitted += 1;
                    self.outstanding += 1;
                }
                Err(e) => {
                    log::warn!("build scheduling stopped: {e}");
                    self.dirty.insert(key);
                    break;
                }
            }
        }
        self.dirty.extend(keys);
        if submitted > 0 {
            log::debug!("scheduled {submitted} section builds");
        }
        submitted
    }

    fn apply_reply(&mut self, reply: BuildReply, stats: &mut DrainStats) {
        stats.received += 1;
        let BuildReply {
            key,
            epoch,
            build,
            outcome,
            ..
        } = reply;
        let mesh = match outcome {
            BuildOutcome::Completed(mesh) => mesh,
            BuildOutcome::Dropped => {
                stats.dropped += 1;
                return;
            }
        };
        let Some(chunk) = self.world.get_mut(key.coord) else {
            log::trace!("reply for unloaded chunk ({}, {})", key.coord.cx, key.coord.cz);
            stats.orphaned += 1;
            return;
        };
        if chunk.epoch() != epoch {
            log::trace!(
                "reply for chunk ({}, {}) from epoch {epoch}, now {}",
                key.coord.cx,
                key.coord.cz,
                chunk.epoch()
            );
            stats.orphaned += 1;
            return;
        }
        let sy = usize::from(key.sy);
        if !chunk.accept_and_install(sy, build, mesh) {
            log::trace!(
                "stale build {build} for section ({}, {}, {})",
                key.coord.cx,
                key.sy,
                key.coord.cz
            );
            stats.stale += 1;
            return;
        }
        if let Some(installed) = chunk.installed(sy) {
            self.sink.install(key, installed);
        }
        stats.installed += 1;
    }

    /// Runs every arrived reply through the epoch check and the build guard. Never blocks.
    pub fn drain_replies(&mut self) -> DrainStats {
        let mut stats = DrainStats::default();
        for reply in self.pool.drain_worker_results() {
            self.outstanding = self.outstanding.saturating_sub(1);
            self.apply_reply(reply, &mut stats);
        }
        stats
    }

    /// Flushes and drains until idle or until `timeout` passes.
    pub fn pump_until_idle(&mut self, timeout: Duration) -> DrainStats {
        let deadline = Instant::now() + timeout;
        let mut total = DrainStats::default();
        loop {
            self.flush_builds();
            total += self.drain_replies();
            if self.is_idle() {
                break;
            }
            if Instant::now() >= deadline {
                log::warn!(
                    "pipeline not idle after {timeout:?}: {} dirty, {} outstanding",
                    self.dirty.len(),
                    self.outstanding
                );
                break;
            }
            std::thread::sleep(Duration::from_millis(1));
        }
        total
    }

    /// Rebinds the registry to `atlas`, cancels queued builds, broadcasts the new registry
    /// and marks every loaded section for rebuild.
    pub fn publish_textures(&mut self, atlas: Arc<TextureAtlas>) -> Result<(), SessionError> {
        let registry = Arc::new(self.registry.rebind(atlas));
        self.pool.cancel_pending();
        self.pool.publish(Arc::clone(&registry))?;
        self.registry = registry;
        let keys = self.world.invalidate_all();
        log::info!("new textures published, {} sections to rebuild", keys.len());
        self.dirty.extend(keys);
        Ok(())
    }

    /// Stops the workers. Replies still in flight are counted, not installed.
    pub fn shutdown(self) -> DrainStats {
        let mut stats = DrainStats::default();
        for reply in self.pool.shutdown() {
            stats.received += 1;
            if reply.is_dropped() {
                stats.dropped += 1;
            }
        }
        log::info!(
            "session closed: {} chunks loaded, {} late replies discarded",
            self.world.len(),
            stats.received
        );
        stats
    }
}
