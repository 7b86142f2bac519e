mod config;
mod demo;

use std::path::PathBuf;

use clap::Parser;
use tessera_runtime::DispatchPolicy;

use crate::config::ViewerConfig;

#[derive(Parser, Debug)]
#[command(name = "tessera", version, about = "Streams a generated voxel world through the chunk meshing pipeline")]
struct Cli {
    /// Viewer config (TOML)
    #[arg(long)]
    config: Option<PathBuf>,
    /// Number of mesh workers
    #[arg(long)]
    workers: Option<usize>,
    /// Chunk radius streamed around the origin
    #[arg(long)]
    view_distance: Option<i32>,
    /// Terrain seed
    #[arg(long)]
    seed: Option<i32>,
    /// Block updates sent after the initial load
    #[arg(long)]
    updates: Option<usize>,
    /// Dispatch to the least busy worker instead of round-robin
    #[arg(long)]
    least_busy: bool,
}

impl Cli {
    fn apply(&self, cfg: &mut ViewerConfig) {
        if let Some(w) = self.workers {
            cfg.workers = w;
        }
        if let Some(v) = self.view_distance {
            cfg.view_distance = v;
        }
        if let Some(s) = self.seed {
            cfg.seed = s;
        }
        if let Some(u) = self.updates {
            cfg.updates = u;
        }
        if self.least_busy {
            cfg.dispatch = DispatchPolicy::LeastBusy;
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let mut cfg = match &cli.config {
        Some(path) => ViewerConfig::load(path)?,
        None => ViewerConfig::default(),
    };
    cli.apply(&mut cfg);
    cfg.validate()?;
    log::info!(
        "tessera: {} workers ({:?}), view distance {}, seed {}",
        cfg.workers,
        cfg.dispatch,
        cfg.view_distance,
        cfg.seed
    );

    let report = demo::run(&cfg)?;
    let r = report.replies;
    log::info!(
        "{} chunks, {} sections, {} installs: {} opaque + {} transparent quads",
        report.chunks,
        report.sections,
        report.installs,
        report.opaque_quads,
        report.transparent_quads
    );
    log::info!(
        "replies: {} received, {} installed, {} stale, {} orphaned, {} dropped; {} messages rejected",
        r.received,
        r.installed,
        r.stale,
        r.orphaned,
        r.dropped,
        report.rejected_messages
    );
    Ok(())
}
