use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tessera_runtime::{DispatchPolicy, PoolConfig};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ViewerConfigError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid viewer config: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("`workers` must be at least 1")]
    NoWorkers,
    #[error("`view_distance` must be between 0 and {max}, got {got}")]
    ViewDistance { got: i32, max: i32 },
}

const MAX_VIEW_DISTANCE: i32 = 32;

/// Settings for the viewer binary, loaded from TOML with every key optional.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    pub workers: usize,
    pub dispatch: DispatchPolicy,
    /// Chunk radius streamed around the origin.
    pub view_distance: i32,
    pub seed: i32,
    /// Block updates sent after the initial load.
    pub updates: usize,
    pub blocks: Option<PathBuf>,
    pub atlas: Option<PathBuf>,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            dispatch: DispatchPolicy::RoundRobin,
            view_distance: 4,
            seed: 1337,
            updates: 256,
            blocks: None,
            atlas: None,
        }
    }
}

impl ViewerConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, ViewerConfigError> {
        Ok(toml::from_str(s)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ViewerConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ViewerConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut cfg = Self::from_toml_str(&text)?;
        // asset paths are relative to the config file
        if let Some(dir) = path.parent() {
            cfg.blocks = cfg.blocks.map(|p| dir.join(p));
            cfg.atlas = cfg.atlas.map(|p| dir.join(p));
        }
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ViewerConfigError> {
        if self.workers == 0 {
            return Err(ViewerConfigError::NoWorkers);
        }
        if !(0..=MAX_VIEW_DISTANCE).contains(&self.view_distance) {
            return Err(ViewerConfigError::ViewDistance {
                got: self.view_distance,
                max: MAX_VIEW_DISTANCE,
            });
        }
        Ok(())
    }

    pub fn pool(&self) -> PoolConfig {
        PoolConfig {
            workers: self.workers,
            policy: self.dispatch,
        }
    }
}
