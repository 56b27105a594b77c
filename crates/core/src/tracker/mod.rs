//! Per-file staleness state machine and re-index scheduling state.
//!
//! `Unknown -> Indexing` on first sight, `Fresh -> Stale` on a change
//! notification or a dependency re-index, `Stale -> Indexing` when the
//! pipeline picks the file up, then `Fresh` or `Failed`.
//!
//! The tracker is also the supersede authority. Every intake for a
//! file is stamped with a per-file epoch; a worker records the digest
//! it observed under its task's epoch, and an observation from an
//! older epoch than the one already recorded is rejected — the worker
//! that carries it was overtaken while parked between reading the
//! content and recording it, and its result must be discarded. The
//! recorded `latest` digest is then checked again immediately before
//! each merge lands.
//!
//! Dependent invalidation is deliberately conservative: any applied
//! re-index of a file marks every transitive dependent stale, with no
//! per-symbol interface fingerprinting. That can cause redundant work,
//! but it never misses a transitive signature change.

use std::path::{Path, PathBuf};

use dashmap::DashMap;
use symdex_api::FileDigest;
use tracing::debug;

use crate::db::IndexSnapshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FileState {
    #[default]
    Unknown,
    Fresh,
    Stale,
    Indexing,
    Failed,
}

#[derive(Debug, Clone, Default)]
struct TrackedFile {
    state: FileState,
    /// Latest recorded digest for this file; the supersede authority.
    latest: Option<FileDigest>,
    /// Last epoch handed out for this file at intake.
    issued: u64,
    /// Epoch of the observation `latest` records.
    observed: u64,
}

#[derive(Default)]
pub struct StalenessTracker {
    files: DashMap<PathBuf, TrackedFile>,
}

impl StalenessTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self, path: &Path) -> FileState {
        self.files
            .get(path)
            .map(|f| f.state)
            .unwrap_or(FileState::Unknown)
    }

    pub fn latest_digest(&self, path: &Path) -> Option<FileDigest> {
        self.files.get(path).and_then(|f| f.latest)
    }

    /// Issue the next intake epoch for `path`. Tasks carry the epoch
    /// they were created under, which totally orders observations of
    /// the same file even when workers run out of order.
    pub fn stamp(&self, path: &Path) -> u64 {
        let mut entry = self.files.entry(path.to_path_buf()).or_default();
        entry.issued += 1;
        entry.issued
    }

    /// A change notification arrived for `path`.
    pub fn mark_stale(&self, path: &Path) {
        let mut entry = self.files.entry(path.to_path_buf()).or_default();
        if entry.state != FileState::Indexing {
            entry.state = FileState::Stale;
        }
    }

    /// Record the digest a worker observed for `path` under its task's
    /// `epoch` and move the file into `Indexing`. Returns false when a
    /// newer epoch has already recorded its observation: the caller
    /// was overtaken and must drop its task without touching anything.
    pub fn begin_indexing(&self, path: &Path, digest: FileDigest, epoch: u64) -> bool {
        let mut entry = self.files.entry(path.to_path_buf()).or_default();
        if epoch < entry.observed {
            return false;
        }
        entry.observed = epoch;
        entry.latest = Some(digest);
        entry.state = FileState::Indexing;
        true
    }

    /// Merge landed. Only transitions to `Fresh` if the merged digest
    /// is still the latest recorded; otherwise a newer task owns the
    /// file's fate.
    pub fn mark_fresh(&self, path: &Path, digest: FileDigest) {
        if let Some(mut entry) = self.files.get_mut(path)
            && entry.latest == Some(digest)
        {
            entry.state = FileState::Fresh;
        }
    }

    /// Parse/extract failed, or the merge rejected the index. The
    /// prior database entry stays; navigation degrades rather than
    /// disappears. Failed files never cascade staleness.
    pub fn mark_failed(&self, path: &Path) {
        let mut entry = self.files.entry(path.to_path_buf()).or_default();
        entry.state = FileState::Failed;
    }

    pub fn remove(&self, path: &Path) {
        self.files.remove(path);
    }

    /// A contribution for `path` just landed: mark every transitive
    /// dependent recorded in the database stale and return them for
    /// re-queueing. `path` itself is left alone. Failed files are
    /// retried on explicit request or their own content change, not by
    /// cascade; this keeps one broken header from re-failing its whole
    /// include closure over and over.
    pub fn dependents_to_refresh(&self, path: &Path, snapshot: &IndexSnapshot) -> Vec<PathBuf> {
        let mut out = Vec::new();
        for dependent in snapshot.transitive_dependents(path) {
            if self.state(&dependent) == FileState::Failed {
                debug!(path = %dependent.display(), "skipping failed file in staleness cascade");
                continue;
            }
            self.mark_stale(&dependent);
            out.push(dependent);
        }
        out
    }
}
