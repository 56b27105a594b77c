pub mod cache;
pub mod config;
pub mod db;
pub mod engine;
pub mod error;
pub mod logging;
pub mod query;
pub mod tracker;

pub use config::EngineConfig;
pub use engine::{IndexEngine, IndexEngineBuilder};
pub use error::{Result, SymdexError};
