use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use xxhash_rust::xxh3::xxh3_64;

use super::location::Use;
use super::symbol::SymbolDecl;

/// A content or configuration hash used to detect staleness without
/// full comparison.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Fingerprint(pub u64);

impl Fingerprint {
    pub fn of_bytes(bytes: &[u8]) -> Self {
        Fingerprint(xxh3_64(bytes))
    }

    pub fn of_str(s: &str) -> Self {
        Self::of_bytes(s.as_bytes())
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// The pair of fingerprints that determines whether a file's recorded
/// index is still valid: one over its content, one over the compiler
/// flags it was built with.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct FileDigest {
    pub content: Fingerprint,
    pub flags: Fingerprint,
}

impl FileDigest {
    pub fn compute(content: &str, flags: &[String]) -> Self {
        let joined = flags.join("\u{1f}");
        Self {
            content: Fingerprint::of_str(content),
            flags: Fingerprint::of_str(&joined),
        }
    }
}

/// One file's complete contribution to the index: the symbols it
/// declares or defines, the uses it contains, and the files it
/// structurally depends on (inclusion/import edges).
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct FileIndex {
    pub digest: FileDigest,
    pub symbols: Vec<SymbolDecl>,
    pub uses: Vec<Use>,
    pub deps: Vec<PathBuf>,
}

impl FileIndex {
    pub fn new(digest: FileDigest) -> Self {
        Self {
            digest,
            ..Default::default()
        }
    }

    /// Structural validation performed before a merge. A use may
    /// legitimately refer to a symbol declared in another file, so
    /// cross-file targets are fine; what gets rejected is a record
    /// that can never be right: a null symbol id, or a location
    /// claiming to live in a different file than the one indexed.
    pub fn validate(&self, file: &Path) -> Result<(), String> {
        for decl in &self.symbols {
            if decl.id.is_null() {
                return Err(format!("declaration of '{}' has a null id", decl.name));
            }
            if decl.declaration.path != file {
                return Err(format!(
                    "declaration of '{}' located in foreign file {}",
                    decl.name,
                    decl.declaration.path.display()
                ));
            }
            if let Some(def) = &decl.definition
                && def.path != file
            {
                return Err(format!(
                    "definition of '{}' located in foreign file {}",
                    decl.name,
                    def.path.display()
                ));
            }
        }
        for u in &self.uses {
            if u.symbol.is_null() {
                return Err("use with a null symbol id".to_string());
            }
            if u.roles.is_empty() {
                return Err(format!("use of {} carries no roles", u.symbol));
            }
            if u.location.path != file {
                return Err(format!(
                    "use of {} located in foreign file {}",
                    u.symbol,
                    u.location.path.display()
                ));
            }
        }
        Ok(())
    }
}
