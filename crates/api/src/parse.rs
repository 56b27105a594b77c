//! Interface to the external parser/extraction engine.
//!
//! The engine itself lives outside this workspace; the indexing core
//! only ever talks to it through these traits and treats any failure
//! as a per-file condition, never as process-fatal.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

use crate::models::{SymbolDecl, Use};

#[derive(Debug, Error)]
#[error("parse of {path} failed: {message}")]
pub struct ParseFailure {
    pub path: PathBuf,
    pub message: String,
}

#[derive(Debug, Error)]
#[error("extraction from {path} failed: {message}")]
pub struct ExtractFailure {
    pub path: PathBuf,
    pub message: String,
}

/// The exact input handed to the parser: content already resolved
/// through the open-buffer overlay, plus the compiler flags the file
/// is built with.
#[derive(Debug, Clone)]
pub struct SourceSnapshot {
    pub path: PathBuf,
    pub content: Arc<str>,
    pub flags: Vec<String>,
}

/// Receives the extraction callback stream for one file.
pub trait ExtractSink {
    fn on_symbol(&mut self, decl: SymbolDecl);
    fn on_use(&mut self, usage: Use);
    /// Structural dependency edge (inclusion/import) from the parsed
    /// file to `target`.
    fn on_dependency(&mut self, target: PathBuf);
}

/// An AST handle produced by a successful parse. Extraction streams
/// symbol/use/dependency events into the sink; it may be invoked at
/// most once per unit.
pub trait ParsedUnit: Send {
    fn path(&self) -> &Path;
    fn extract(self: Box<Self>, sink: &mut dyn ExtractSink) -> Result<(), ExtractFailure>;
}

/// The external parsing engine. Invocations are blocking and are
/// confined to pipeline worker threads.
pub trait SourceParser: Send + Sync {
    fn parse(&self, snapshot: &SourceSnapshot) -> Result<Box<dyn ParsedUnit>, ParseFailure>;
}

/// Supplies the compiler flags a file is built with; part of the
/// file's staleness fingerprint.
pub trait FlagsProvider: Send + Sync {
    fn flags_for(&self, path: &Path) -> Vec<String>;
}

/// The same flags for every file; also the no-flags default.
#[derive(Debug, Clone, Default)]
pub struct FixedFlags(pub Vec<String>);

impl FlagsProvider for FixedFlags {
    fn flags_for(&self, _path: &Path) -> Vec<String> {
        self.0.clone()
    }
}
