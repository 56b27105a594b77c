//! On-disk per-file index cache.
//!
//! One entry per (file identity, flags fingerprint), holding the
//! serialized `FileIndex` that was merged for that combination. Reads
//! are tolerant: a missing, truncated, version-skewed or otherwise
//! corrupt entry is a miss, never an error. Writes go through a
//! temp-file-then-rename so a crashed or concurrent write can never
//! destroy a previously valid entry.
//!
//! The cache records the digest an entry was built from but never
//! checks it against the live filesystem; callers compare digests
//! before trusting a hit.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use serde::{Deserialize, Serialize};
use symdex_api::{FileIndex, Fingerprint};
use tracing::{debug, warn};
use xxhash_rust::xxh3::xxh3_64;

use crate::error::{Result, SymdexError};

const FORMAT_VERSION: u32 = 1;

#[derive(Serialize, Deserialize)]
struct CacheEnvelope {
    version: u32,
    /// Original path, so a hash collision is detected as a miss.
    source_path: String,
    index: FileIndex,
}

pub struct IndexCache {
    base_dir: PathBuf,
    /// Entries decoded this session, keyed like the on-disk files.
    loaded: RwLock<HashMap<(u64, Fingerprint), FileIndex>>,
}

impl IndexCache {
    pub fn open(base_dir: PathBuf) -> Result<Self> {
        fs::create_dir_all(&base_dir)?;
        Ok(Self {
            base_dir,
            loaded: RwLock::new(HashMap::new()),
        })
    }

    fn path_hash(path: &Path) -> u64 {
        xxh3_64(path.to_string_lossy().as_bytes())
    }

    fn entry_path(&self, path_hash: u64, flags: Fingerprint) -> PathBuf {
        self.base_dir
            .join(format!("{path_hash:016x}-{flags}.idx"))
    }

    /// Fetch the entry for `(path, flags)`. A hit carries the digest
    /// it was built from; the caller still decides freshness.
    pub fn get(&self, path: &Path, flags: Fingerprint) -> Option<FileIndex> {
        let key = (Self::path_hash(path), flags);
        {
            let loaded = self.loaded.read().expect("cache map lock poisoned");
            if let Some(index) = loaded.get(&key) {
                return Some(index.clone());
            }
        }

        let entry_path = self.entry_path(key.0, flags);
        let index = match self.read_entry(&entry_path, path) {
            Ok(index) => index?,
            Err(err) => {
                debug!(path = %path.display(), %err, "treating unreadable cache entry as a miss");
                return None;
            }
        };

        let mut loaded = self.loaded.write().expect("cache map lock poisoned");
        loaded.insert(key, index.clone());
        Some(index)
    }

    fn read_entry(&self, entry_path: &Path, source: &Path) -> Result<Option<FileIndex>> {
        let bytes = match fs::read(entry_path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        let decompressed = zstd::decode_all(&bytes[..])
            .map_err(|e| SymdexError::CacheCorrupt(format!("zstd: {e}")))?;
        let envelope: CacheEnvelope = rmp_serde::from_slice(&decompressed)
            .map_err(|e| SymdexError::CacheCorrupt(format!("msgpack: {e}")))?;

        if envelope.version != FORMAT_VERSION {
            debug!(
                found = envelope.version,
                expected = FORMAT_VERSION,
                "discarding cache entry with incompatible format version"
            );
            return Ok(None);
        }
        if envelope.source_path != source.to_string_lossy() {
            return Ok(None);
        }
        Ok(Some(envelope.index))
    }

    /// Best-effort write-through. Failures are reported so the caller
    /// can log and move on; a failed write never corrupts the prior
    /// entry for this key.
    pub fn put(&self, path: &Path, index: &FileIndex) -> Result<()> {
        let envelope = CacheEnvelope {
            version: FORMAT_VERSION,
            source_path: path.to_string_lossy().into_owned(),
            index: index.clone(),
        };
        let bytes = rmp_serde::to_vec(&envelope)
            .map_err(|e| SymdexError::CacheWrite(format!("msgpack: {e}")))?;
        let compressed = zstd::encode_all(&bytes[..], 0)
            .map_err(|e| SymdexError::CacheWrite(format!("zstd: {e}")))?;

        let key = (Self::path_hash(path), index.digest.flags);
        let entry_path = self.entry_path(key.0, index.digest.flags);

        // Write-new-then-rename: concurrent writers to the same key
        // serialize to last-writer-wins, and readers only ever see a
        // complete file.
        let tmp = tempfile::NamedTempFile::new_in(&self.base_dir)
            .map_err(|e| SymdexError::CacheWrite(format!("temp file: {e}")))?;
        fs::write(tmp.path(), &compressed)
            .map_err(|e| SymdexError::CacheWrite(format!("write: {e}")))?;
        tmp.persist(&entry_path)
            .map_err(|e| SymdexError::CacheWrite(format!("rename: {e}")))?;

        let mut loaded = self.loaded.write().expect("cache map lock poisoned");
        loaded.insert(key, index.clone());
        Ok(())
    }

    /// Drop every entry for `path`, across all flags fingerprints.
    pub fn invalidate(&self, path: &Path) {
        let path_hash = Self::path_hash(path);
        let prefix = format!("{path_hash:016x}-");

        {
            let mut loaded = self.loaded.write().expect("cache map lock poisoned");
            loaded.retain(|(h, _), _| *h != path_hash);
        }

        let Ok(entries) = fs::read_dir(&self.base_dir) else {
            return;
        };
        for entry in entries.flatten() {
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if name.starts_with(&prefix) && name.ends_with(".idx") {
                if let Err(err) = fs::remove_file(entry.path()) {
                    warn!(path = %path.display(), %err, "failed to remove cache entry");
                }
            }
        }
    }

    pub fn entry_count(&self) -> usize {
        fs::read_dir(&self.base_dir)
            .map(|entries| {
                entries
                    .flatten()
                    .filter(|e| {
                        e.path().extension().map(|ext| ext == "idx").unwrap_or(false)
                    })
                    .count()
            })
            .unwrap_or(0)
    }
}
