//! Mutation side of the query database.
//!
//! A builder is a deep copy of one snapshot's state. A merge retracts
//! the file's entire prior contribution, applies the new one, updates
//! every derived index, and `build()` freezes the result; the owning
//! [`super::Database`] swaps it in atomically.

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};

use petgraph::Direction;
use symdex_api::{FileIndex, RoleFlags, SymbolDecl, SymbolId, Use};

use super::snapshot::{FileEntry, IndexSnapshot, SnapshotInner, SymbolRecord};

pub struct SnapshotBuilder {
    inner: SnapshotInner,
}

impl SnapshotBuilder {
    pub fn new() -> Self {
        Self {
            inner: SnapshotInner::default(),
        }
    }

    pub(crate) fn from_inner(inner: SnapshotInner) -> Self {
        Self { inner }
    }

    pub fn build(mut self) -> IndexSnapshot {
        self.inner.generation += 1;
        IndexSnapshot::from_inner(self.inner)
    }

    /// Replace `path`'s contribution wholesale: full retraction of the
    /// prior entry, then application of `index`. The caller has
    /// already validated `index` against `path`.
    pub fn merge_file(&mut self, path: &Path, index: FileIndex) {
        self.retract(path);
        self.apply(path, index);
    }

    /// Retraction only; used when a file leaves the project.
    pub fn remove_file(&mut self, path: &Path) -> bool {
        let existed = self.inner.files.contains_key(path);
        self.retract(path);
        self.prune_dep_node(path);
        existed
    }

    fn retract(&mut self, path: &Path) {
        let Some(entry) = self.inner.files.remove(path) else {
            // Never indexed; there may still be a dependency node if
            // another file includes it, which retraction leaves alone.
            return;
        };

        let mut touched: BTreeSet<SymbolId> = entry.decls.keys().copied().collect();
        touched.extend(entry.uses.keys().copied());

        // Strip this file's occurrences from the derived use index.
        for id in &touched {
            if let Some(list) = self.inner.uses.get_mut(id) {
                list.retain(|u| u.location.path != path);
                if list.is_empty() {
                    self.inner.uses.remove(id);
                }
            }
        }

        // Drop this file from each declared symbol's contributor set
        // and rebuild the merged record from what remains.
        for id in entry.decls.keys() {
            if let Some(record) = self.inner.symbols.get_mut(id) {
                record.contributors.remove(path);
            }
            self.refresh_record(*id);
        }

        self.drop_outgoing_deps(path);
    }

    fn apply(&mut self, path: &Path, index: FileIndex) {
        let mut entry = FileEntry {
            digest: index.digest,
            decls: HashMap::with_capacity(index.symbols.len()),
            uses: HashMap::new(),
            deps: Vec::new(),
        };

        for decl in index.symbols {
            let record = self
                .inner
                .symbols
                .entry(decl.id)
                .or_insert_with(|| placeholder_record(&decl));
            record.contributors.insert(path.to_path_buf());

            // Synthesized occurrences keep the use index the single
            // source for "all locations of this symbol".
            let mut derived_uses = vec![Use::new(
                decl.id,
                decl.declaration.clone(),
                RoleFlags::DECLARATION,
            )];
            if let Some(def) = &decl.definition {
                derived_uses.push(Use::new(
                    decl.id,
                    def.clone(),
                    RoleFlags::DEFINITION | RoleFlags::DECLARATION,
                ));
            }
            self.inner
                .uses
                .entry(decl.id)
                .or_default()
                .extend(derived_uses);

            entry.decls.insert(decl.id, decl);
        }

        for usage in index.uses {
            entry
                .uses
                .entry(usage.symbol)
                .or_default()
                .push(usage.clone());
            self.inner.uses.entry(usage.symbol).or_default().push(usage);
        }

        let mut deps: Vec<PathBuf> = index
            .deps
            .into_iter()
            .filter(|d| d.as_path() != path)
            .collect();
        deps.sort();
        deps.dedup();
        for dep in &deps {
            self.add_dep_edge(path, dep);
        }
        entry.deps = deps;

        let decl_ids: Vec<SymbolId> = entry.decls.keys().copied().collect();
        self.inner.files.insert(path.to_path_buf(), entry);

        for id in decl_ids {
            self.refresh_record(id);
        }
    }

    /// Rebuild the merged record for `id` from its remaining
    /// contributors, pruning it when none are left, and keep the
    /// parent/base derived indices in step.
    fn refresh_record(&mut self, id: SymbolId) {
        let Some(old) = self.inner.symbols.remove(&id) else {
            return;
        };

        if let Some(parent) = old.parent {
            detach(&mut self.inner.children, parent, id);
        }
        for base in &old.bases {
            detach(&mut self.inner.derived, *base, id);
        }

        if old.contributors.is_empty() {
            // Last contributor retracted; the record is garbage.
            return;
        }

        let mut merged: Option<SymbolRecord> = None;
        for file in &old.contributors {
            let Some(decl) = self
                .inner
                .files
                .get(file)
                .and_then(|entry| entry.decls.get(&id))
            else {
                continue;
            };
            let slot = merged.get_or_insert_with(|| record_from_decl(decl, &old.contributors));
            // A contributor carrying the definition wins the display
            // attributes; bases accumulate across all of them.
            if decl.definition.is_some() {
                slot.kind = decl.kind;
                slot.name = decl.name.clone();
                slot.qualified_name = decl.qualified_name.clone();
            }
            if slot.hover.is_none() {
                slot.hover = decl.hover.clone();
            }
            if slot.parent.is_none() {
                slot.parent = decl.parent;
            }
            for base in &decl.bases {
                if !slot.bases.contains(base) {
                    slot.bases.push(*base);
                }
            }
        }

        let Some(record) = merged else {
            return;
        };

        if let Some(parent) = record.parent {
            self.inner.children.entry(parent).or_default().insert(id);
        }
        for base in &record.bases {
            self.inner.derived.entry(*base).or_default().insert(id);
        }
        self.inner.symbols.insert(id, record);
    }

    fn dep_node(&mut self, path: &Path) -> petgraph::stable_graph::NodeIndex {
        if let Some(&idx) = self.inner.dep_nodes.get(path) {
            return idx;
        }
        let idx = self.inner.dep_graph.add_node(path.to_path_buf());
        self.inner.dep_nodes.insert(path.to_path_buf(), idx);
        idx
    }

    fn add_dep_edge(&mut self, from: &Path, to: &Path) {
        let a = self.dep_node(from);
        let b = self.dep_node(to);
        if !self.inner.dep_graph.contains_edge(a, b) {
            self.inner.dep_graph.add_edge(a, b, ());
        }
    }

    fn drop_outgoing_deps(&mut self, path: &Path) {
        let Some(&idx) = self.inner.dep_nodes.get(path) else {
            return;
        };
        let edges: Vec<_> = self
            .inner
            .dep_graph
            .edges_directed(idx, Direction::Outgoing)
            .map(|e| petgraph::visit::EdgeRef::id(&e))
            .collect();
        for edge in edges {
            self.inner.dep_graph.remove_edge(edge);
        }
    }

    /// Drop the dependency node entirely when nothing references it
    /// any more.
    fn prune_dep_node(&mut self, path: &Path) {
        let Some(&idx) = self.inner.dep_nodes.get(path) else {
            return;
        };
        let isolated = self
            .inner
            .dep_graph
            .neighbors_undirected(idx)
            .next()
            .is_none();
        if isolated && !self.inner.files.contains_key(path) {
            self.inner.dep_graph.remove_node(idx);
            self.inner.dep_nodes.remove(path);
        }
    }
}

impl Default for SnapshotBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn placeholder_record(decl: &SymbolDecl) -> SymbolRecord {
    SymbolRecord {
        id: decl.id,
        kind: decl.kind,
        name: decl.name.clone(),
        qualified_name: decl.qualified_name.clone(),
        parent: None,
        bases: Vec::new(),
        hover: None,
        contributors: BTreeSet::new(),
    }
}

fn record_from_decl(decl: &SymbolDecl, contributors: &BTreeSet<PathBuf>) -> SymbolRecord {
    SymbolRecord {
        id: decl.id,
        kind: decl.kind,
        name: decl.name.clone(),
        qualified_name: decl.qualified_name.clone(),
        parent: decl.parent,
        bases: Vec::new(),
        hover: decl.hover.clone(),
        contributors: contributors.clone(),
    }
}

fn detach(index: &mut HashMap<SymbolId, BTreeSet<SymbolId>>, key: SymbolId, member: SymbolId) {
    if let Some(set) = index.get_mut(&key) {
        set.remove(&member);
        if set.is_empty() {
            index.remove(&key);
        }
    }
}
