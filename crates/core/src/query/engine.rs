//! Read side of the cross-reference database. A `QueryEngine` wraps
//! one snapshot; request handlers construct one per request and never
//! touch the indexing pipeline.

use std::path::{Path, PathBuf};

use regex::RegexBuilder;
use symdex_api::{Location, RoleFlags, SymbolId, Use};

use crate::db::{IndexSnapshot, SymbolRecord};
use crate::error::{Result, SymdexError};

use super::fuzzy::fuzzy_match;

/// One ranked workspace-search result.
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub id: SymbolId,
    pub score: i64,
}

pub struct QueryEngine {
    snapshot: IndexSnapshot,
}

impl QueryEngine {
    pub fn new(snapshot: IndexSnapshot) -> Self {
        Self { snapshot }
    }

    pub fn snapshot(&self) -> &IndexSnapshot {
        &self.snapshot
    }

    pub fn symbol(&self, id: SymbolId) -> Option<&SymbolRecord> {
        self.snapshot.symbol(id)
    }

    /// Absence is an empty result, never an error.
    pub fn definition(&self, id: SymbolId) -> Option<Location> {
        self.snapshot.definition_of(id)
    }

    pub fn declarations(&self, id: SymbolId) -> Vec<Location> {
        self.snapshot.declarations_of(id)
    }

    pub fn references(&self, id: SymbolId, roles: RoleFlags) -> Vec<Use> {
        self.snapshot.uses_of(id, roles)
    }

    /// Call sites only, for call-hierarchy views.
    pub fn callers(&self, id: SymbolId) -> Vec<Use> {
        self.snapshot.uses_of(id, RoleFlags::CALL)
    }

    pub fn parent(&self, id: SymbolId) -> Option<&SymbolRecord> {
        self.snapshot.parent_of(id).and_then(|p| self.snapshot.symbol(p))
    }

    pub fn children(&self, id: SymbolId) -> Vec<&SymbolRecord> {
        self.resolve_all(self.snapshot.children_of(id))
    }

    pub fn bases(&self, id: SymbolId) -> Vec<&SymbolRecord> {
        self.resolve_all(self.snapshot.bases_of(id))
    }

    pub fn derived(&self, id: SymbolId) -> Vec<&SymbolRecord> {
        self.resolve_all(self.snapshot.derived_of(id))
    }

    pub fn symbols_in_file(&self, path: &Path) -> Vec<&SymbolRecord> {
        self.snapshot.symbols_in_file(path)
    }

    pub fn dependents_of(&self, path: &Path) -> Vec<PathBuf> {
        self.snapshot.dependents_of(path)
    }

    pub fn transitive_dependents(&self, path: &Path) -> Vec<PathBuf> {
        self.snapshot.transitive_dependents(path)
    }

    /// Fuzzy workspace symbol search. Results ordered by descending
    /// score, then symbol-kind priority, then shorter name, then
    /// name; deterministic for a given snapshot.
    pub fn search(&self, query: &str, limit: usize) -> Vec<SearchHit> {
        let mut hits: Vec<(i64, &SymbolRecord)> = self
            .snapshot
            .all_symbols()
            .filter_map(|record| fuzzy_match(query, &record.name).map(|score| (score, record)))
            .collect();

        hits.sort_by(|(sa, ra), (sb, rb)| {
            sb.cmp(sa)
                .then_with(|| ra.kind.rank().cmp(&rb.kind.rank()))
                .then_with(|| ra.name.len().cmp(&rb.name.len()))
                .then_with(|| ra.name.cmp(&rb.name))
                .then_with(|| ra.id.cmp(&rb.id))
        });
        hits.truncate(limit);
        hits.into_iter()
            .map(|(score, record)| SearchHit {
                id: record.id,
                score,
            })
            .collect()
    }

    /// Case-insensitive regex search over short and qualified names.
    pub fn find(&self, pattern: &str, limit: usize) -> Result<Vec<&SymbolRecord>> {
        let regex = RegexBuilder::new(pattern)
            .case_insensitive(true)
            .build()
            .map_err(|e| SymdexError::Internal(format!("invalid pattern: {e}")))?;

        let mut out: Vec<&SymbolRecord> = self
            .snapshot
            .all_symbols()
            .filter(|r| regex.is_match(&r.name) || regex.is_match(&r.qualified_name))
            .collect();
        out.sort_by(|a, b| {
            a.kind
                .rank()
                .cmp(&b.kind.rank())
                .then_with(|| a.qualified_name.cmp(&b.qualified_name))
        });
        out.truncate(limit);
        Ok(out)
    }

    fn resolve_all(&self, ids: Vec<SymbolId>) -> Vec<&SymbolRecord> {
        ids.into_iter()
            .filter_map(|id| self.snapshot.symbol(id))
            .collect()
    }
}
