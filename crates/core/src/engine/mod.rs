//! The engine facade: owns the database, tracker, cache and worker
//! pool, and exposes the operations request handlers drive.

pub mod executor;

pub use executor::{IndexExecutor, IndexTask, TaskReason};

use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use symdex_api::{BufferStore, FixedFlags, FlagsProvider, NoOverlays, SourceParser};
use symdex_pipeline::{Priority, TaskExecutor, WorkerPool};
use tracing::warn;

use crate::cache::IndexCache;
use crate::config::EngineConfig;
use crate::db::{Database, IndexSnapshot};
use crate::error::Result;
use crate::query::QueryEngine;
use crate::tracker::StalenessTracker;

pub struct IndexEngine {
    db: Arc<Database>,
    tracker: Arc<StalenessTracker>,
    cache: Option<Arc<IndexCache>>,
    pool: WorkerPool<IndexTask>,
}

impl IndexEngine {
    pub fn builder(parser: Arc<dyn SourceParser>) -> IndexEngineBuilder {
        IndexEngineBuilder::new(parser)
    }

    /// Explicit client request for one file (open, save, go-to-def in
    /// an unindexed file), served at interactive priority. Dependents
    /// are not queued here: only a merge that actually changes the
    /// file's contribution invalidates them, and the worker schedules
    /// that refresh when the merge lands.
    pub fn update_file(&self, path: &Path) -> Result<()> {
        self.tracker.mark_stale(path);
        self.pool.submit(
            IndexTask {
                path: path.to_path_buf(),
                reason: TaskReason::Explicit,
                epoch: self.tracker.stamp(path),
            },
            Priority::Interactive,
        )?;
        Ok(())
    }

    /// Filesystem-driven change notification: queue each reported file
    /// as background catch-up work. Dependent refreshes follow from
    /// whichever of these merges land with new content.
    pub fn files_changed(&self, paths: &[PathBuf]) -> Result<()> {
        for path in paths {
            self.tracker.mark_stale(path);
            self.pool.submit(
                IndexTask {
                    path: path.clone(),
                    reason: TaskReason::CatchUp,
                    epoch: self.tracker.stamp(path),
                },
                Priority::Background,
            )?;
        }
        Ok(())
    }

    /// The file left the project: retract its contribution and drop
    /// its cache entries.
    pub fn remove_file(&self, path: &Path) -> Result<()> {
        self.pool.submit(
            IndexTask {
                path: path.to_path_buf(),
                reason: TaskReason::Removal,
                epoch: self.tracker.stamp(path),
            },
            Priority::Interactive,
        )?;
        Ok(())
    }

    /// Freshness barrier: block until the queues are empty and no
    /// merge is in flight.
    pub fn wait_settled(&self) {
        self.pool.wait_settled();
    }

    /// A consistent read view of the index.
    pub fn snapshot(&self) -> IndexSnapshot {
        self.db.snapshot()
    }

    /// Query interface over the current snapshot.
    pub fn query(&self) -> QueryEngine {
        QueryEngine::new(self.db.snapshot())
    }

    pub fn tracker(&self) -> &StalenessTracker {
        &self.tracker
    }

    /// False when the engine is running in parse-only (no-cache)
    /// degraded mode.
    pub fn cache_enabled(&self) -> bool {
        self.cache.is_some()
    }

    /// Drain queued work and join the workers.
    pub fn shutdown(self) {
        self.pool.shutdown();
    }
}

pub struct IndexEngineBuilder {
    parser: Arc<dyn SourceParser>,
    buffers: Arc<dyn BufferStore>,
    flags: Arc<dyn FlagsProvider>,
    config: EngineConfig,
}

impl IndexEngineBuilder {
    pub fn new(parser: Arc<dyn SourceParser>) -> Self {
        Self {
            parser,
            buffers: Arc::new(NoOverlays),
            flags: Arc::new(FixedFlags::default()),
            config: EngineConfig::default(),
        }
    }

    pub fn with_buffer_store(mut self, buffers: Arc<dyn BufferStore>) -> Self {
        self.buffers = buffers;
        self
    }

    pub fn with_flags_provider(mut self, flags: Arc<dyn FlagsProvider>) -> Self {
        self.flags = flags;
        self
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> IndexEngine {
        let db = Arc::new(Database::new());
        let tracker = Arc::new(StalenessTracker::new());

        // Cache storage being unavailable degrades to parse-only
        // mode; it never prevents the engine from starting.
        let cache = if self.config.enable_cache {
            match IndexCache::open(self.config.resolved_cache_dir()) {
                Ok(cache) => Some(Arc::new(cache)),
                Err(err) => {
                    warn!(%err, "index cache unavailable, running parse-only");
                    None
                }
            }
        } else {
            None
        };

        let executor = Arc::new(IndexExecutor {
            db: Arc::clone(&db),
            tracker: Arc::clone(&tracker),
            cache: cache.clone(),
            parser: self.parser,
            buffers: self.buffers,
            flags: self.flags,
            follow_up: OnceLock::new(),
        });

        let pool = WorkerPool::spawn(
            self.config.workers,
            self.config.queue_capacity,
            Arc::clone(&executor) as Arc<dyn TaskExecutor<IndexTask>>,
        );
        // Workers queue dependent refreshes through this handle once a
        // merge lands.
        let _ = executor.follow_up.set(pool.submitter());

        IndexEngine {
            db,
            tracker,
            cache,
            pool,
        }
    }
}
