//! Per-task stages of the indexing pipeline.
//!
//! Each worker runs one task end to end: resolve current content and
//! flags, fingerprint, record the observation under the task's intake
//! epoch, consult the cache, parse and extract if needed, then hand
//! the result to the database with the supersede check applied under
//! the merge gate. A task whose observation was overtaken by a newer
//! epoch drops out immediately. When a merge lands, the transitive
//! dependents are queued for a forced background refresh. Everything
//! here treats failures as per-file conditions; nothing aborts the
//! pipeline.

use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use symdex_api::{
    BufferStore, ExtractFailure, ExtractSink, FileDigest, FileIndex, FlagsProvider, SourceParser,
    SourceSnapshot, SymbolDecl, Use,
};
use symdex_pipeline::{PipelineError, Priority, TaskExecutor, TaskSubmitter};
use tracing::{debug, info, warn};

use crate::cache::IndexCache;
use crate::db::{Database, MergeOutcome};
use crate::tracker::StalenessTracker;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskReason {
    /// Explicit client request for this file.
    Explicit,
    /// The file's own content or flags changed.
    CatchUp,
    /// A dependency changed. The file's own fingerprint is still
    /// valid, so freshness cannot be decided from the digest; the
    /// file must be re-parsed and re-merged regardless.
    Cascade,
    /// The file left the project.
    Removal,
}

#[derive(Debug, Clone)]
pub struct IndexTask {
    pub path: PathBuf,
    pub reason: TaskReason,
    /// Intake epoch from the tracker; orders observations of the same
    /// file across workers.
    pub epoch: u64,
}

enum SourceContent {
    Current(Arc<str>),
    /// Gone from both the overlay and the disk.
    Missing,
    /// Present but unreadable: permissions, invalid encoding, I/O.
    Unreadable,
}

/// Builds a `FileIndex` from the extraction callback stream.
#[derive(Default)]
struct IndexSink {
    symbols: Vec<SymbolDecl>,
    uses: Vec<Use>,
    deps: Vec<PathBuf>,
}

impl ExtractSink for IndexSink {
    fn on_symbol(&mut self, decl: SymbolDecl) {
        self.symbols.push(decl);
    }

    fn on_use(&mut self, usage: Use) {
        self.uses.push(usage);
    }

    fn on_dependency(&mut self, target: PathBuf) {
        self.deps.push(target);
    }
}

impl IndexSink {
    fn into_index(self, digest: FileDigest) -> FileIndex {
        FileIndex {
            digest,
            symbols: self.symbols,
            uses: self.uses,
            deps: self.deps,
        }
    }
}

pub struct IndexExecutor {
    pub db: Arc<Database>,
    pub tracker: Arc<StalenessTracker>,
    pub cache: Option<Arc<IndexCache>>,
    pub parser: Arc<dyn SourceParser>,
    pub buffers: Arc<dyn BufferStore>,
    pub flags: Arc<dyn FlagsProvider>,
    /// Set once the pool exists; used to queue dependent refreshes
    /// after a merge lands.
    pub follow_up: OnceLock<TaskSubmitter<IndexTask>>,
}

impl TaskExecutor<IndexTask> for IndexExecutor {
    fn run(&self, task: IndexTask) -> Result<(), PipelineError> {
        if task.reason == TaskReason::Removal {
            self.retract(&task.path);
            return Ok(());
        }
        self.index_file(&task.path, task.reason, task.epoch)
            .map_err(|e| PipelineError::Execution(e.to_string()))
    }
}

impl IndexExecutor {
    /// Open buffers override on-disk content; a file that exists in
    /// neither place has left the project. Any other read failure
    /// keeps the prior entry.
    fn resolve_content(&self, path: &Path) -> SourceContent {
        if let Some(overlay) = self.buffers.overlay(path) {
            return SourceContent::Current(overlay);
        }
        match std::fs::read_to_string(path) {
            Ok(content) => SourceContent::Current(Arc::from(content.as_str())),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no content on disk or in overlay");
                SourceContent::Missing
            }
            Err(err) => {
                warn!(path = %path.display(), %err, "unreadable source; keeping prior index data");
                SourceContent::Unreadable
            }
        }
    }

    fn index_file(&self, path: &Path, reason: TaskReason, epoch: u64) -> crate::error::Result<()> {
        let content = match self.resolve_content(path) {
            SourceContent::Current(content) => content,
            SourceContent::Missing => {
                self.retract(path);
                return Ok(());
            }
            SourceContent::Unreadable => {
                self.tracker.mark_failed(path);
                return Ok(());
            }
        };
        let flags = self.flags.flags_for(path);
        let digest = FileDigest::compute(&content, &flags);
        if !self.tracker.begin_indexing(path, digest, epoch) {
            debug!(path = %path.display(), "newer observation recorded; dropping task");
            return Ok(());
        }

        // A matching digest proves freshness only when the trigger was
        // the file itself. Cascade work exists precisely because a
        // dependency edit invalidates the extraction output without
        // moving this file's fingerprint, so neither the short-circuit
        // nor the cache may serve it.
        let cascade = reason == TaskReason::Cascade;

        if !cascade && self.db.snapshot().file_digest(path) == Some(digest) {
            self.tracker.mark_fresh(path, digest);
            return Ok(());
        }

        // Cache probe. A hit built from the current digest skips
        // parse and extraction entirely.
        if !cascade
            && let Some(cache) = &self.cache
            && let Some(cached) = cache.get(path, digest.flags)
            && cached.digest == digest
        {
            debug!(path = %path.display(), "cache hit, merging persisted index");
            self.merge(path, cached, false, false)?;
            return Ok(());
        }

        let snapshot = SourceSnapshot {
            path: path.to_path_buf(),
            content,
            flags,
        };
        let unit = match self.parser.parse(&snapshot) {
            Ok(unit) => unit,
            Err(err) => {
                warn!(path = %path.display(), %err, "parse failed; keeping prior index data");
                self.tracker.mark_failed(path);
                return Ok(());
            }
        };

        let mut sink = IndexSink::default();
        if let Err(err) = unit.extract(&mut sink) {
            let ExtractFailure { path: p, message } = &err;
            warn!(path = %p.display(), %message, "extraction failed; keeping prior index data");
            self.tracker.mark_failed(path);
            return Ok(());
        }

        let index = sink.into_index(digest);
        self.merge(path, index, true, cascade)
    }

    fn merge(
        &self,
        path: &Path,
        index: FileIndex,
        write_through: bool,
        force: bool,
    ) -> crate::error::Result<()> {
        let digest = index.digest;
        let admit = |built_from: &FileDigest| {
            // Immediately before merging, the task's digest must
            // still be the newest recorded; otherwise a newer task
            // owns this file and the stale result is dropped.
            self.tracker.latest_digest(path) == Some(*built_from)
        };
        let result = if force {
            self.db.remerge_if(path, index.clone(), admit)
        } else {
            self.db.merge_if(path, index.clone(), admit)
        };
        let outcome = match result {
            Ok(outcome) => outcome,
            Err(err) => {
                warn!(path = %path.display(), %err, "merge rejected");
                self.tracker.mark_failed(path);
                return Ok(());
            }
        };

        match outcome {
            MergeOutcome::Applied => {
                self.tracker.mark_fresh(path, digest);
                info!(path = %path.display(), "indexed");
                if write_through && let Some(cache) = &self.cache {
                    if let Err(err) = cache.put(path, &index) {
                        // Best effort: a cache miss next start is the
                        // only consequence.
                        warn!(path = %path.display(), %err, "cache write failed");
                    }
                }
                // Cascade tasks do not re-cascade: the closure that
                // queued them already covered the whole dependent set,
                // and a dependency cycle must not self-sustain.
                if !force {
                    self.queue_dependents(path);
                }
            }
            MergeOutcome::Unchanged => {
                self.tracker.mark_fresh(path, digest);
            }
            MergeOutcome::Superseded => {
                debug!(path = %path.display(), "discarded stale merge");
            }
        }
        Ok(())
    }

    /// Queue a forced background refresh for every transitive
    /// dependent of a file whose contribution just changed.
    fn queue_dependents(&self, path: &Path) {
        let Some(submitter) = self.follow_up.get() else {
            return;
        };
        let snapshot = self.db.snapshot();
        for member in self.tracker.dependents_to_refresh(path, &snapshot) {
            let epoch = self.tracker.stamp(&member);
            let task = IndexTask {
                path: member.clone(),
                reason: TaskReason::Cascade,
                epoch,
            };
            if let Err(err) = submitter.submit(task, Priority::Background) {
                debug!(path = %member.display(), %err, "pool closed; dropping refresh");
            }
        }
    }

    fn retract(&self, path: &Path) {
        let removed = self.db.remove(path);
        if let Some(cache) = &self.cache {
            cache.invalidate(path);
        }
        self.tracker.remove(path);
        if removed {
            info!(path = %path.display(), "removed from index");
        }
    }
}
