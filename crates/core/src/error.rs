use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SymdexError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Parse(#[from] symdex_api::ParseFailure),
    #[error(transparent)]
    Extract(#[from] symdex_api::ExtractFailure),
    #[error("corrupt index for {path}: {reason}")]
    CorruptIndex { path: PathBuf, reason: String },
    #[error("cache entry corrupt: {0}")]
    CacheCorrupt(String),
    #[error("cache write failed: {0}")]
    CacheWrite(String),
    #[error(transparent)]
    Pipeline(#[from] symdex_pipeline::PipelineError),
    #[error("internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, SymdexError>;
