//! The query database: single logical owner of all symbol/reference
//! state. Readers take cheap snapshot clones; merges are serialized
//! behind a write gate and land as one atomic snapshot swap, so no
//! reader can ever observe a half-retracted, half-applied state.

pub mod builder;
pub mod snapshot;

pub use builder::SnapshotBuilder;
pub use snapshot::{FileEntry, IndexSnapshot, SymbolRecord};

use std::path::Path;
use std::sync::{Mutex, RwLock};

use symdex_api::{FileDigest, FileIndex};
use tracing::{debug, error};

use crate::error::{Result, SymdexError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    Applied,
    /// A newer fingerprint for the file was observed while this index
    /// was being built; the merge was discarded.
    Superseded,
    /// The file's recorded digest already matches; nothing to do.
    Unchanged,
}

#[derive(Default)]
pub struct Database {
    current: RwLock<IndexSnapshot>,
    write_gate: Mutex<()>,
}

impl Database {
    pub fn new() -> Self {
        Self::default()
    }

    /// A consistent read view; valid for as long as the caller holds
    /// it, regardless of concurrent merges.
    pub fn snapshot(&self) -> IndexSnapshot {
        self.current
            .read()
            .expect("database snapshot lock poisoned")
            .clone()
    }

    /// Merge unconditionally (the admission check always passes).
    pub fn merge(&self, path: &Path, index: FileIndex) -> Result<MergeOutcome> {
        self.merge_inner(path, index, |_| true, false)
    }

    /// Serialized merge with an admission check run under the write
    /// gate, immediately before the contribution lands. `admit`
    /// receives the digest the index was built from; returning false
    /// discards the merge (stale task superseded by newer content).
    pub fn merge_if(
        &self,
        path: &Path,
        index: FileIndex,
        admit: impl FnOnce(&FileDigest) -> bool,
    ) -> Result<MergeOutcome> {
        self.merge_inner(path, index, admit, false)
    }

    /// Like `merge_if`, but applies even when the recorded digest is
    /// unchanged. A dependency edit can change what this file
    /// extracts to without touching the file's own fingerprint.
    pub fn remerge_if(
        &self,
        path: &Path,
        index: FileIndex,
        admit: impl FnOnce(&FileDigest) -> bool,
    ) -> Result<MergeOutcome> {
        self.merge_inner(path, index, admit, true)
    }

    fn merge_inner(
        &self,
        path: &Path,
        index: FileIndex,
        admit: impl FnOnce(&FileDigest) -> bool,
        force: bool,
    ) -> Result<MergeOutcome> {
        if let Err(reason) = index.validate(path) {
            error!(path = %path.display(), %reason, "rejecting corrupt per-file index");
            return Err(SymdexError::CorruptIndex {
                path: path.to_path_buf(),
                reason,
            });
        }

        let _gate = self.write_gate.lock().expect("database write gate poisoned");

        if !admit(&index.digest) {
            debug!(path = %path.display(), "merge superseded by newer fingerprint");
            return Ok(MergeOutcome::Superseded);
        }

        let snapshot = self.snapshot();
        if !force && snapshot.file_digest(path) == Some(index.digest) {
            return Ok(MergeOutcome::Unchanged);
        }

        let mut builder = snapshot.to_builder();
        builder.merge_file(path, index);
        let next = builder.build();

        let mut guard = self.current.write().expect("database snapshot lock poisoned");
        *guard = next;
        Ok(MergeOutcome::Applied)
    }

    /// Retraction only: the file left the project.
    pub fn remove(&self, path: &Path) -> bool {
        let _gate = self.write_gate.lock().expect("database write gate poisoned");
        let snapshot = self.snapshot();
        if snapshot.file(path).is_none() {
            return false;
        }
        let mut builder = snapshot.to_builder();
        let existed = builder.remove_file(path);
        let next = builder.build();
        let mut guard = self.current.write().expect("database snapshot lock poisoned");
        *guard = next;
        existed
    }
}
