//! Fixed pool of mesh workers fed through per-worker inboxes.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender, unbounded};
use rayon::{ThreadPool, ThreadPoolBuilder};
use serde::{Deserialize, Serialize};
use tessera_blocks::BlockRegistry;
use tessera_chunk::{Neighbor, SectionKey, SectionSnapshot};
use tessera_mesh_cpu::{SectionMesh, build_section_mesh};
use thiserror::Error;

const EXIT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum PoolError {
    #[error("worker pool needs at least one worker")]
    NoWorkers,
    #[error("failed to start worker threads: {0}")]
    Spawn(#[from] rayon::ThreadPoolBuildError),
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum DispatchError {
    #[error("no block registry has been published to the workers yet")]
    AssetsPending,
    #[error("worker pool is shut down")]
    ShutDown,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchPolicy {
    #[default]
    RoundRobin,
    LeastBusy,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PoolConfig {
    pub workers: usize,
    pub policy: DispatchPolicy,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            policy: DispatchPolicy::RoundRobin,
        }
    }
}

/// Identifies one accepted request; issued in submission order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Ticket(pub u64);

#[derive(Clone, Debug)]
pub struct BuildRequest {
    pub key: SectionKey,
    pub epoch: u64,
    pub build: u64,
    pub center: SectionSnapshot,
    pub neighbors: [Neighbor; 6],
}

#[derive(Debug)]
pub enum BuildOutcome {
    Completed(SectionMesh),
    /// Cancelled or discarded at shutdown before the mesher ran.
    Dropped,
}

#[derive(Debug)]
pub struct BuildReply {
    pub ticket: Ticket,
    pub key: SectionKey,
    pub epoch: u64,
    pub build: u64,
    pub worker: usize,
    pub outcome: BuildOutcome,
}

impl BuildReply {
    #[inline]
    pub fn is_dropped(&self) -> bool {
        matches!(self.outcome, BuildOutcome::Dropped)
    }
}

/// What travels through a worker inbox.
#[derive(Debug)]
pub enum WorkerMessage {
    /// Registry (bound to its texture atlas) used for every following build.
    Assets(Arc<BlockRegistry>),
    Build(Ticket, Box<BuildRequest>),
    Exit,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PoolStats {
    pub workers: usize,
    pub submitted: usize,
    /// Accepted but not yet picked up by a worker.
    pub queued: usize,
    /// Being meshed right now.
    pub dispatched: usize,
    pub completed: usize,
    pub dropped: usize,
}

#[derive(Default)]
struct Counters {
    submitted: AtomicUsize,
    queued: AtomicUsize,
    dispatched: AtomicUsize,
    completed: AtomicUsize,
    dropped: AtomicUsize,
    /// Tickets below this are dropped instead of built.
    cancel_floor: AtomicU64,
    closing: AtomicBool,
}

struct WorkerCtx {
    index: usize,
    inbox: Receiver<WorkerMessage>,
    replies: Sender<BuildReply>,
    done: Sender<usize>,
    counters: Arc<Counters>,
    load: Arc<[AtomicUsize]>,
}

fn run_worker(ctx: WorkerCtx) {
    let WorkerCtx {
        index,
        inbox,
        replies,
        done,
        counters,
        load,
    } = ctx;
    let mut registry: Option<Arc<BlockRegistry>> = None;
    log::debug!("mesh worker {index} started");
    while let Ok(msg) = inbox.recv() {
        match msg {
            WorkerMessage::Assets(reg) => {
                log::debug!("mesh worker {index} received {} block types", reg.len());
                registry = Some(reg);
            }
            WorkerMessage::Build(ticket, req) => {
                counters.queued.fetch_sub(1, Ordering::Relaxed);
                let skip = counters.closing.load(Ordering::Acquire)
                    || ticket.0 < counters.cancel_floor.load(Ordering::Acquire);
                let outcome = match (&registry, skip) {
                    (Some(reg), false) => {
                        counters.dispatched.fetch_add(1, Ordering::Relaxed);
                        let mesh = build_section_mesh(reg, &req.center, &req.neighbors);
                        counters.dispatched.fetch_sub(1, Ordering::Relaxed);
                        counters.completed.fetch_add(1, Ordering::Relaxed);
                        BuildOutcome::Completed(mesh)
                    }
                    _ => {
                        counters.dropped.fetch_add(1, Ordering::Relaxed);
                        BuildOutcome::Dropped
                    }
                };
                load[index].fetch_sub(1, Ordering::Relaxed);
                let _ = replies.send(BuildReply {
                    ticket,
                    key: req.key,
                    epoch: req.epoch,
                    build: req.build,
                    worker: index,
                    outcome,
                });
            }
            WorkerMessage::Exit => break,
        }
    }
    log::debug!("mesh worker {index} exiting");
    let _ = done.send(index);
}

pub struct WorkerPool {
    inboxes: Vec<Sender<WorkerMessage>>,
    replies: Receiver<BuildReply>,
    done: Receiver<usize>,
    counters: Arc<Counters>,
    load: Arc<[AtomicUsize]>,
    policy: DispatchPolicy,
    next_worker: AtomicUsize,
    next_ticket: AtomicU64,
    published: AtomicBool,
    shut_down: bool,
    _threads: ThreadPool,
}

impl WorkerPool {
    pub fn new(cfg: PoolConfig) -> Result<Self, PoolError> {
        if cfg.workers == 0 {
            return Err(PoolError::NoWorkers);
        }
        let threads = ThreadPoolBuilder::new()
            .num_threads(cfg.workers)
            .thread_name(|i| format!("tessera-mesh-{i}"))
            .build()?;
        let (reply_tx, reply_rx) = unbounded::<BuildReply>();
        let (done_tx, done_rx) = unbounded::<usize>();
        let counters = Arc::new(Counters::default());
        let load: Arc<[AtomicUsize]> = (0..cfg.workers).map(|_| AtomicUsize::new(0)).collect();

        let mut inboxes = Vec::with_capacity(cfg.workers);
        for index in 0..cfg.workers {
            let (tx, rx) = unbounded::<WorkerMessage>();
            inboxes.push(tx);
            let ctx = WorkerCtx {
                index,
                inbox: rx,
                replies: reply_tx.clone(),
                done: done_tx.clone(),
                counters: Arc::clone(&counters),
                load: Arc::clone(&load),
            };
            threads.spawn(move || run_worker(ctx));
        }
        log::info!(
            "started {} mesh workers ({:?} dispatch)",
            cfg.workers,
            cfg.policy
        );

        Ok(Self {
            inboxes,
            replies: reply_rx,
            done: done_rx,
            counters,
            load,
            policy: cfg.policy,
            next_worker: AtomicUsize::new(0),
            next_ticket: AtomicU64::new(1),
            published: AtomicBool::new(false),
            shut_down: false,
            _threads: threads,
        })
    }

    #[inline]
    pub fn workers(&self) -> usize {
        self.inboxes.len()
    }

    #[inline]
    pub fn policy(&self) -> DispatchPolicy {
        self.policy
    }

    /// Broadcasts `registry` to every worker. Builds submitted afterwards use it.
    pub fn publish(&self, registry: Arc<BlockRegistry>) -> Result<(), DispatchError> {
        if self.shut_down {
            return Err(DispatchError::ShutDown);
        }
        for inbox in &self.inboxes {
            inbox
                .send(WorkerMessage::Assets(Arc::clone(&registry)))
                .map_err(|_| DispatchError::ShutDown)?;
        }
        self.published.store(true, Ordering::Release);
        Ok(())
    }

    fn pick_worker(&self) -> usize {
        let n = self.inboxes.len();
        match self.policy {
            DispatchPolicy::RoundRobin => self.next_worker.fetch_add(1, Ordering::Relaxed) % n,
            DispatchPolicy::LeastBusy => self
                .load
                .iter()
                .enumerate()
                .min_by_key(|(i, l)| (l.load(Ordering::Relaxed), *i))
                .map(|(i, _)| i)
                .unwrap_or(0),
        }
    }

    /// Queues one build. Every accepted request produces exactly one [`BuildReply`].
    pub fn submit(&self, req: BuildRequest) -> Result<Ticket, DispatchError> {
        if self.shut_down {
            return Err(DispatchError::ShutDown);
        }
        if !self.published.load(Ordering::Acquire) {
            return Err(DispatchError::AssetsPending);
        }
        let worker = self.pick_worker();
        let ticket = Ticket(self.next_ticket.fetch_add(1, Ordering::Relaxed));
        self.counters.queued.fetch_add(1, Ordering::Relaxed);
        self.load[worker].fetch_add(1, Ordering::Relaxed);
        log::trace!(
            "ticket {} -> worker {worker}: section ({}, {}, {}) build {}",
            ticket.0,
            req.key.coord.cx,
            req.key.sy,
            req.key.coord.cz,
            req.build
        );
        if self.inboxes[worker]
            .send(WorkerMessage::Build(ticket, Box::new(req)))
            .is_err()
        {
            self.counters.queued.fetch_sub(1, Ordering::Relaxed);
            self.load[worker].fetch_sub(1, Ordering::Relaxed);
            return Err(DispatchError::ShutDown);
        }
        self.counters.submitted.fetch_add(1, Ordering::Relaxed);
        Ok(ticket)
    }

    /// Every request accepted so far that no worker has started yet resolves to
    /// [`BuildOutcome::Dropped`].
    pub fn cancel_pending(&self) {
        let floor = self.next_ticket.load(Ordering::Relaxed);
        self.counters.cancel_floor.fetch_max(floor, Ordering::AcqRel);
        log::debug!("cancelled pending builds below ticket {floor}");
    }

    /// Replies that have arrived so far; never blocks.
    pub fn drain_worker_results(&self) -> Vec<BuildReply> {
        self.replies.try_iter().collect()
    }

    pub fn stats(&self) -> PoolStats {
        let c = &self.counters;
        PoolStats {
            workers: self.inboxes.len(),
            submitted: c.submitted.load(Ordering::Relaxed),
            queued: c.queued.load(Ordering::Relaxed),
            dispatched: c.dispatched.load(Ordering::Relaxed),
            completed: c.completed.load(Ordering::Relaxed),
            dropped: c.dropped.load(Ordering::Relaxed),
        }
    }

    fn close(&mut self) -> Vec<BuildReply> {
        if self.shut_down {
            return Vec::new();
        }
        self.shut_down = true;
        self.counters.closing.store(true, Ordering::Release);
        let mut running = 0;
        for inbox in &self.inboxes {
            if inbox.send(WorkerMessage::Exit).is_ok() {
                running += 1;
            }
        }
        let deadline = Instant::now() + EXIT_TIMEOUT;
        let mut joined = 0;
        while joined < running {
            let left = deadline.saturating_duration_since(Instant::now());
            match self.done.recv_timeout(left) {
                Ok(_) => joined += 1,
                Err(_) => {
                    log::warn!("{} mesh workers did not exit in time", running - joined);
                    break;
                }
            }
        }
        let replies = self.drain_worker_results();
        log::info!(
            "mesh pool shut down: {joined} workers joined, {} unread replies",
            replies.len()
        );
        replies
    }

    /// Drops queued requests, joins every worker and returns all replies not yet drained.
    pub fn shutdown(mut self) -> Vec<BuildReply> {
        self.close()
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_blocks::TextureAtlas;
    use tessera_chunk::{ChunkCoord, Section};

    fn request(build: u64) -> BuildRequest {
        let mut s = Section::new();
        s.set_block(0, 0, 0, tessera_blocks::Block::new(1, 0));
        BuildRequest {
            key: SectionKey::new(ChunkCoord::new(0, 0), 0),
            epoch: 1,
            build,
            center: s.snapshot(),
            neighbors: Default::default(),
        }
    }

    fn registry() -> Arc<BlockRegistry> {
        let atlas = Arc::new(TextureAtlas::builtin().unwrap());
        Arc::new(BlockRegistry::builtin(atlas).unwrap())
    }

    #[test]
    fn zero_workers_is_an_error() {
        let err = WorkerPool::new(PoolConfig {
            workers: 0,
            policy: DispatchPolicy::RoundRobin,
        });
        assert!(matches!(err, Err(PoolError::NoWorkers)));
    }

    #[test]
    fn submit_before_publish_is_refused() {
        let pool = WorkerPool::new(PoolConfig::default()).unwrap();
        assert_eq!(
            pool.submit(request(1)).unwrap_err(),
            DispatchError::AssetsPending
        );
        let replies = pool.shutdown();
        assert!(replies.is_empty());
    }

    #[test]
    fn round_robin_spreads_tickets() {
        let pool = WorkerPool::new(PoolConfig {
            workers: 3,
            policy: DispatchPolicy::RoundRobin,
        })
        .unwrap();
        pool.publish(registry()).unwrap();
        for b in 1..=6 {
            pool.submit(request(b)).unwrap();
        }
        let deadline = Instant::now() + Duration::from_secs(10);
        let mut replies = Vec::new();
        while replies.len() < 6 && Instant::now() < deadline {
            replies.extend(pool.drain_worker_results());
            std::thread::sleep(Duration::from_millis(1));
        }
        assert_eq!(replies.len(), 6);
        for r in &replies {
            assert_eq!(r.worker as u64, (r.ticket.0 - 1) % 3);
            assert!(!r.is_dropped());
        }
        assert_eq!(pool.stats().completed, 6);
    }
}
