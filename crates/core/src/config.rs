use serde::Deserialize;
use std::path::PathBuf;

/// Tunables for the indexing engine. Everything has a usable default
/// so an embedding process can run with `EngineConfig::default()`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Worker threads draining the indexing queues.
    pub workers: usize,
    /// Bound on queued indexing tasks; producers block beyond it.
    pub queue_capacity: usize,
    /// Where per-file index snapshots are persisted. `None` picks the
    /// default location under the user's home directory.
    pub cache_dir: Option<PathBuf>,
    /// Disable to run parse-only, without the on-disk cache.
    pub enable_cache: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            queue_capacity: 512,
            cache_dir: None,
            enable_cache: true,
        }
    }
}

fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

impl EngineConfig {
    pub fn default_cache_dir() -> PathBuf {
        let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
        PathBuf::from(home).join(".symdex").join("index_cache")
    }

    pub fn resolved_cache_dir(&self) -> PathBuf {
        self.cache_dir
            .clone()
            .unwrap_or_else(Self::default_cache_dir)
    }
}
