//! Immutable cross-reference snapshot.
//!
//! All query traffic reads an `IndexSnapshot`; cloning one only bumps
//! a reference counter, so readers hold on to a consistent view for
//! as long as they like while merges swap in successors.

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use petgraph::Direction;
use petgraph::stable_graph::{NodeIndex, StableDiGraph};
use symdex_api::{FileDigest, Location, RoleFlags, SymbolDecl, SymbolId, SymbolKind, Use};

/// A symbol record merged across every file that currently
/// contributes a declaration of it.
#[derive(Debug, Clone)]
pub struct SymbolRecord {
    pub id: SymbolId,
    pub kind: SymbolKind,
    pub name: String,
    pub qualified_name: String,
    pub parent: Option<SymbolId>,
    pub bases: Vec<SymbolId>,
    pub hover: Option<String>,
    /// Files currently declaring this symbol. Retraction of the last
    /// contributor prunes the record.
    pub contributors: BTreeSet<PathBuf>,
}

/// One file's recorded contribution.
#[derive(Debug, Clone, Default)]
pub struct FileEntry {
    pub digest: FileDigest,
    pub decls: HashMap<SymbolId, SymbolDecl>,
    pub uses: HashMap<SymbolId, Vec<Use>>,
    pub deps: Vec<PathBuf>,
}

#[derive(Clone, Default)]
pub(crate) struct SnapshotInner {
    pub generation: u64,
    pub symbols: HashMap<SymbolId, SymbolRecord>,
    /// Derived: symbol -> every occurrence across all files,
    /// including occurrences synthesized from declaration and
    /// definition locations.
    pub uses: HashMap<SymbolId, Vec<Use>>,
    /// Derived: parent -> members.
    pub children: HashMap<SymbolId, BTreeSet<SymbolId>>,
    /// Derived: base -> types deriving from it.
    pub derived: HashMap<SymbolId, BTreeSet<SymbolId>>,
    pub files: HashMap<PathBuf, FileEntry>,
    /// Structural dependency edges, file -> file it includes/imports.
    pub dep_graph: StableDiGraph<PathBuf, ()>,
    pub dep_nodes: HashMap<PathBuf, NodeIndex>,
}

#[derive(Clone, Default)]
pub struct IndexSnapshot {
    pub(crate) inner: Arc<SnapshotInner>,
}

impl IndexSnapshot {
    pub fn empty() -> Self {
        Self::default()
    }

    pub(crate) fn from_inner(inner: SnapshotInner) -> Self {
        Self {
            inner: Arc::new(inner),
        }
    }

    /// Deep-copies into a builder; only the merge path pays for this,
    /// never queries.
    pub fn to_builder(&self) -> super::builder::SnapshotBuilder {
        super::builder::SnapshotBuilder::from_inner((*self.inner).clone())
    }

    pub fn generation(&self) -> u64 {
        self.inner.generation
    }

    pub fn symbol(&self, id: SymbolId) -> Option<&SymbolRecord> {
        self.inner.symbols.get(&id)
    }

    pub fn symbol_count(&self) -> usize {
        self.inner.symbols.len()
    }

    pub fn all_symbols(&self) -> impl Iterator<Item = &SymbolRecord> {
        self.inner.symbols.values()
    }

    pub fn file(&self, path: &Path) -> Option<&FileEntry> {
        self.inner.files.get(path)
    }

    pub fn file_count(&self) -> usize {
        self.inner.files.len()
    }

    pub fn file_digest(&self, path: &Path) -> Option<FileDigest> {
        self.inner.files.get(path).map(|e| e.digest)
    }

    /// All occurrences of `id` whose roles intersect `roles`, ordered
    /// by path then position.
    pub fn uses_of(&self, id: SymbolId, roles: RoleFlags) -> Vec<Use> {
        let mut out: Vec<Use> = self
            .inner
            .uses
            .get(&id)
            .map(|list| {
                list.iter()
                    .filter(|u| u.roles.intersects(roles))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        out.sort_by(|a, b| {
            (&a.location.path, a.location.range.start_line, a.location.range.start_col).cmp(&(
                &b.location.path,
                b.location.range.start_line,
                b.location.range.start_col,
            ))
        });
        out
    }

    /// The definition location, preferring the lexicographically first
    /// contributing file when several claim one.
    pub fn definition_of(&self, id: SymbolId) -> Option<Location> {
        let record = self.inner.symbols.get(&id)?;
        for file in &record.contributors {
            if let Some(entry) = self.inner.files.get(file)
                && let Some(decl) = entry.decls.get(&id)
                && let Some(def) = &decl.definition
            {
                return Some(def.clone());
            }
        }
        None
    }

    pub fn declarations_of(&self, id: SymbolId) -> Vec<Location> {
        let Some(record) = self.inner.symbols.get(&id) else {
            return Vec::new();
        };
        let mut out = Vec::new();
        for file in &record.contributors {
            if let Some(entry) = self.inner.files.get(file)
                && let Some(decl) = entry.decls.get(&id)
            {
                out.push(decl.declaration.clone());
            }
        }
        out
    }

    pub fn parent_of(&self, id: SymbolId) -> Option<SymbolId> {
        self.inner.symbols.get(&id).and_then(|r| r.parent)
    }

    pub fn children_of(&self, id: SymbolId) -> Vec<SymbolId> {
        self.inner
            .children
            .get(&id)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn bases_of(&self, id: SymbolId) -> Vec<SymbolId> {
        self.inner
            .symbols
            .get(&id)
            .map(|r| r.bases.clone())
            .unwrap_or_default()
    }

    pub fn derived_of(&self, id: SymbolId) -> Vec<SymbolId> {
        self.inner
            .derived
            .get(&id)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Symbols declared in `path`, ordered by declaration position.
    pub fn symbols_in_file(&self, path: &Path) -> Vec<&SymbolRecord> {
        let Some(entry) = self.inner.files.get(path) else {
            return Vec::new();
        };
        let mut decls: Vec<&SymbolDecl> = entry.decls.values().collect();
        decls.sort_by_key(|d| {
            (
                d.declaration.range.start_line,
                d.declaration.range.start_col,
            )
        });
        decls
            .iter()
            .filter_map(|d| self.inner.symbols.get(&d.id))
            .collect()
    }

    pub fn dependencies_of(&self, path: &Path) -> Vec<PathBuf> {
        self.neighbors(path, Direction::Outgoing)
    }

    /// Files directly depending on `path`.
    pub fn dependents_of(&self, path: &Path) -> Vec<PathBuf> {
        self.neighbors(path, Direction::Incoming)
    }

    fn neighbors(&self, path: &Path, dir: Direction) -> Vec<PathBuf> {
        let Some(&idx) = self.inner.dep_nodes.get(path) else {
            return Vec::new();
        };
        let mut out: Vec<PathBuf> = self
            .inner
            .dep_graph
            .neighbors_directed(idx, dir)
            .filter_map(|n| self.inner.dep_graph.node_weight(n).cloned())
            .collect();
        out.sort();
        out.dedup();
        out
    }

    /// Every file reachable through reverse dependency edges from
    /// `path`, excluding `path` itself. Iterative fixed point over a
    /// worklist, so mutual-inclusion cycles terminate.
    pub fn transitive_dependents(&self, path: &Path) -> Vec<PathBuf> {
        let Some(&start) = self.inner.dep_nodes.get(path) else {
            return Vec::new();
        };
        let mut visited: BTreeSet<NodeIndex> = BTreeSet::new();
        let mut worklist = vec![start];
        while let Some(idx) = worklist.pop() {
            for dep in self
                .inner
                .dep_graph
                .neighbors_directed(idx, Direction::Incoming)
            {
                if dep != start && visited.insert(dep) {
                    worklist.push(dep);
                }
            }
        }
        let mut out: Vec<PathBuf> = visited
            .into_iter()
            .filter_map(|n| self.inner.dep_graph.node_weight(n).cloned())
            .collect();
        out.sort();
        out
    }
}
