pub mod buffer;
pub mod models;
pub mod parse;

pub use buffer::{BufferStore, NoOverlays};
pub use models::{
    FileDigest, FileIndex, Fingerprint, Location, Range, RoleFlags, SymbolDecl, SymbolId,
    SymbolKind, Use,
};
pub use parse::{
    ExtractFailure, ExtractSink, FixedFlags, FlagsProvider, ParseFailure, ParsedUnit, SourceParser,
    SourceSnapshot,
};
