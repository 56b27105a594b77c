pub mod index;
pub mod location;
pub mod symbol;

pub use index::{FileDigest, FileIndex, Fingerprint};
pub use location::{Location, Range, RoleFlags, Use};
pub use symbol::{SymbolDecl, SymbolId, SymbolKind};
