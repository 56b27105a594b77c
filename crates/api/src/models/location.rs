use serde::{Deserialize, Serialize};
use std::ops::BitOr;
use std::path::PathBuf;

use super::symbol::SymbolId;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Range {
    pub start_line: usize,
    pub start_col: usize,
    pub end_line: usize,
    pub end_col: usize,
}

impl Range {
    pub fn new(start_line: usize, start_col: usize, end_line: usize, end_col: usize) -> Self {
        Self {
            start_line,
            start_col,
            end_line,
            end_col,
        }
    }

    pub fn contains(&self, line: usize, col: usize) -> bool {
        if line < self.start_line || line > self.end_line {
            return false;
        }
        if line == self.start_line && col < self.start_col {
            return false;
        }
        if line == self.end_line && col > self.end_col {
            return false;
        }
        true
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
pub struct Location {
    pub path: PathBuf,
    pub range: Range,
}

impl Location {
    pub fn new(path: impl Into<PathBuf>, range: Range) -> Self {
        Self {
            path: path.into(),
            range,
        }
    }
}

/// Role of an occurrence. Stored as a bitmask because a single
/// occurrence can carry several roles (a definition is also a
/// declaration; a compound assignment is both a read and a write).
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct RoleFlags(pub u8);

impl RoleFlags {
    pub const DECLARATION: RoleFlags = RoleFlags(1);
    pub const DEFINITION: RoleFlags = RoleFlags(1 << 1);
    pub const REFERENCE: RoleFlags = RoleFlags(1 << 2);
    pub const READ: RoleFlags = RoleFlags(1 << 3);
    pub const WRITE: RoleFlags = RoleFlags(1 << 4);
    pub const CALL: RoleFlags = RoleFlags(1 << 5);

    /// Matches any role.
    pub const ANY: RoleFlags = RoleFlags(u8::MAX);

    pub fn contains(&self, other: RoleFlags) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn intersects(&self, other: RoleFlags) -> bool {
        self.0 & other.0 != 0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }
}

impl BitOr for RoleFlags {
    type Output = RoleFlags;

    fn bitor(self, rhs: RoleFlags) -> RoleFlags {
        RoleFlags(self.0 | rhs.0)
    }
}

/// A located occurrence of a symbol with its roles.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Use {
    pub symbol: SymbolId,
    pub location: Location,
    pub roles: RoleFlags,
}

impl Use {
    pub fn new(symbol: SymbolId, location: Location, roles: RoleFlags) -> Self {
        Self {
            symbol,
            location,
            roles,
        }
    }
}
