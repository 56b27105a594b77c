pub mod engine;
pub mod fuzzy;

pub use engine::{QueryEngine, SearchHit};
pub use fuzzy::fuzzy_match;
