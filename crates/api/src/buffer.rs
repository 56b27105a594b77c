use std::path::Path;
use std::sync::Arc;

/// Supplies current content for files with unsaved edits. When a file
/// has an open buffer, its overlay content overrides what is on disk
/// as the fingerprint and parse source.
pub trait BufferStore: Send + Sync {
    fn overlay(&self, path: &Path) -> Option<Arc<str>>;
}

/// Overlay store that never has anything open; used when the engine
/// runs without an attached editor session.
#[derive(Debug, Default)]
pub struct NoOverlays;

impl BufferStore for NoOverlays {
    fn overlay(&self, _path: &Path) -> Option<Arc<str>> {
        None
    }
}
