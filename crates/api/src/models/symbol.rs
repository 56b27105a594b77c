use serde::{Deserialize, Serialize};
use std::fmt;
use xxhash_rust::xxh3::xxh3_64;

use super::location::Location;

/// Stable symbol identity, derived from the unified symbol reference
/// string rather than from a per-run counter, so identities survive
/// re-indexing and merges across files.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SymbolId(pub u64);

impl SymbolId {
    pub const NULL: SymbolId = SymbolId(0);

    /// Derive the identity from a unified symbol reference string.
    pub fn of(usr: &str) -> Self {
        // Reserve 0 as the null sentinel.
        let hash = xxh3_64(usr.as_bytes());
        SymbolId(if hash == 0 { u64::MAX } else { hash })
    }

    pub fn is_null(&self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for SymbolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SymbolKind {
    Namespace,
    Type,
    Function,
    Method,
    Field,
    Variable,
    EnumConstant,
    Macro,
    Unknown,
}

impl SymbolKind {
    /// Kind priority used as a tiebreak when ordering search results.
    /// Lower ranks sort first.
    pub fn rank(&self) -> u8 {
        match self {
            SymbolKind::Type => 0,
            SymbolKind::Function => 1,
            SymbolKind::Method => 2,
            SymbolKind::Macro => 3,
            SymbolKind::EnumConstant => 4,
            SymbolKind::Field => 5,
            SymbolKind::Variable => 6,
            SymbolKind::Namespace => 7,
            SymbolKind::Unknown => 8,
        }
    }
}

/// One file's declaration of a symbol, as produced by extraction.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SymbolDecl {
    pub id: SymbolId,
    pub kind: SymbolKind,
    /// Short display name, e.g. `render`.
    pub name: String,
    /// Fully-qualified, signature-disambiguated name.
    pub qualified_name: String,
    /// Enclosing symbol (member-of relation), if any.
    pub parent: Option<SymbolId>,
    /// Base types this symbol derives from, if any.
    pub bases: Vec<SymbolId>,
    pub declaration: Location,
    /// Present when this file also carries the definition.
    pub definition: Option<Location>,
    pub hover: Option<String>,
}

impl SymbolDecl {
    pub fn new(
        id: SymbolId,
        kind: SymbolKind,
        name: impl Into<String>,
        qualified_name: impl Into<String>,
        declaration: Location,
    ) -> Self {
        Self {
            id,
            kind,
            name: name.into(),
            qualified_name: qualified_name.into(),
            parent: None,
            bases: Vec::new(),
            declaration,
            definition: None,
            hover: None,
        }
    }
}
