//! Workspace-wide symbol index.
//!
//! The state is an immutable [`IndexState`] behind `RwLock<Arc<_>>`. Writers
//! extract a file's entries without holding any lock, then swap them in under a
//! short write lock using `Arc::make_mut`, so a snapshot taken by a reader is
//! never observed half-updated.

mod extract;
mod loc;


use std::sync::Arc;

use parking_lot::RwLock;
use rayon::prelude::*;
use serde::Serialize;
use tracing::debug;

use crate::file::{FileId, FileKind};
use crate::scope::{ScopeTable, ScopeType, VariableKind, WalkOptions, walk};
use crate::token::Span;
use crate::tree::Tree;
use crate::util::fast_map::FxHashMap;

pub use extract::extract_symbols;
pub use loc::extract_localization;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Location {
    pub file: FileId,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum DefinitionKind {
    ScriptedEffect,
    ScriptedTrigger,
    ScriptValue,
    Event,
}

impl DefinitionKind {
    pub fn for_file(kind: FileKind) -> Option<DefinitionKind> {
        match kind {
            FileKind::ScriptedEffects => Some(DefinitionKind::ScriptedEffect),
            FileKind::ScriptedTriggers => Some(DefinitionKind::ScriptedTrigger),
            FileKind::ScriptValues => Some(DefinitionKind::ScriptValue),
            FileKind::Events => Some(DefinitionKind::Event),
            _ => None,
        }
    }

    /// Scripted effects and triggers take `$PARAM$` arguments when called.
    pub fn is_callable(self) -> bool {
        matches!(self, DefinitionKind::ScriptedEffect | DefinitionKind::ScriptedTrigger)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum SymbolEntry {
    Definition {
        kind: DefinitionKind,
        name: String,
        params: Vec<String>,
        location: Location,
    },
    Reference {
        name: String,
        location: Location,
    },
    SavedScope {
        name: String,
        scope: ScopeType,
        location: Location,
    },
    Variable {
        name: String,
        kind: VariableKind,
        location: Location,
    },
    LocalizationKey {
        name: String,
        location: Location,
    },
}

impl SymbolEntry {
    pub fn name(&self) -> &str {
        match self {
            SymbolEntry::Definition { name, .. }
            | SymbolEntry::Reference { name, .. }
            | SymbolEntry::SavedScope { name, .. }
            | SymbolEntry::Variable { name, .. }
            | SymbolEntry::LocalizationKey { name, .. } => name,
        }
    }

    pub fn location(&self) -> Location {
        match self {
            SymbolEntry::Definition { location, .. }
            | SymbolEntry::Reference { location, .. }
            | SymbolEntry::SavedScope { location, .. }
            | SymbolEntry::Variable { location, .. }
            | SymbolEntry::LocalizationKey { location, .. } => *location,
        }
    }

    pub fn is_definition(&self) -> bool {
        matches!(self, SymbolEntry::Definition { .. })
    }
}

#[derive(Debug, Clone)]
struct FileSymbols {
    kind: FileKind,
    entries: Arc<Vec<SymbolEntry>>,
}

/// One consistent view of the index.
#[derive(Debug, Clone, Default)]
pub struct IndexState {
    files: FxHashMap<FileId, FileSymbols>,
    // name -> files holding at least one entry with that name
    by_name: FxHashMap<String, Vec<FileId>>,
    generation: u64,
}

pub type IndexSnapshot = Arc<IndexState>;

impl IndexState {
    /// Bumped on every mutation; analyses cached against an older generation are stale.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    pub fn entries_for(&self, file: FileId) -> &[SymbolEntry] {
        self.files.get(&file).map(|f| f.entries.as_slice()).unwrap_or(&[])
    }

    /// Every entry named `name`, in file order.
    pub fn lookup(&self, name: &str) -> impl Iterator<Item = &SymbolEntry> {
        self.by_name
            .get(name)
            .into_iter()
            .flatten()
            .filter_map(|f| self.files.get(f))
            .flat_map(|f| f.entries.iter())
            .filter(move |e| e.name() == name)
    }

    pub fn definitions(&self, name: &str) -> impl Iterator<Item = &SymbolEntry> {
        self.lookup(name).filter(|e| e.is_definition())
    }

    pub fn definition(&self, name: &str) -> Option<(DefinitionKind, &[String])> {
        self.definitions(name).find_map(|e| match e {
            SymbolEntry::Definition { kind, params, .. } => Some((*kind, params.as_slice())),
            _ => None,
        })
    }

    /// Like [`IndexState::definition`], ignoring whatever `file` itself contributed.
    pub fn definition_from_other_files(&self, name: &str, file: FileId) -> Option<(DefinitionKind, &[String])> {
        self.definitions(name).find_map(|e| match e {
            SymbolEntry::Definition { kind, params, location, .. } if location.file != file => {
                Some((*kind, params.as_slice()))
            }
            _ => None,
        })
    }

    pub fn has_definition(&self, name: &str, kind: DefinitionKind) -> bool {
        self.definitions(name)
            .any(|e| matches!(e, SymbolEntry::Definition { kind: k, .. } if *k == kind))
    }

    pub fn references(&self, name: &str) -> impl Iterator<Item = &SymbolEntry> {
        self.lookup(name).filter(|e| matches!(e, SymbolEntry::Reference { .. }))
    }

    /// Scope of a saved scope declared in any file but `file`.
    pub fn saved_scope_from_other_files(&self, name: &str, file: FileId) -> Option<ScopeType> {
        self.lookup(name).find_map(|e| match e {
            SymbolEntry::SavedScope { scope, location, .. } if location.file != file => Some(*scope),
            _ => None,
        })
    }

    pub fn has_variable(&self, name: &str, kind: VariableKind) -> bool {
        self.lookup(name)
            .any(|e| matches!(e, SymbolEntry::Variable { kind: k, .. } if *k == kind))
    }

    pub fn has_loc_key(&self, name: &str) -> bool {
        self.lookup(name).any(|e| matches!(e, SymbolEntry::LocalizationKey { .. }))
    }

    /// Whether any localization file has been indexed.
    pub fn has_localization(&self) -> bool {
        self.files
            .values()
            .any(|f| f.kind == FileKind::Localization && !f.entries.is_empty())
    }

    fn replace(&mut self, file: FileId, symbols: Option<FileSymbols>) {
        if let Some(old) = self.files.remove(&file) {
            for entry in old.entries.iter() {
                if let Some(files) = self.by_name.get_mut(entry.name()) {
                    files.retain(|f| *f != file);
                    if files.is_empty() {
                        self.by_name.remove(entry.name());
                    }
                }
            }
        }
        if let Some(symbols) = symbols {
            for entry in symbols.entries.iter() {
                let files = self.by_name.entry(entry.name().to_string()).or_default();
                if !files.contains(&file) {
                    files.push(file);
                }
            }
            self.files.insert(file, symbols);
        }
        self.generation += 1;
    }
}

/// Shared, thread-safe symbol index.
#[derive(Debug, Default)]
pub struct SymbolIndex {
    state: RwLock<Arc<IndexState>>,
}

impl SymbolIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> IndexSnapshot {
        self.state.read().clone()
    }

    pub fn generation(&self) -> u64 {
        self.state.read().generation
    }

    /// Replace every entry attributed to `file`.
    pub fn update(&self, file: FileId, kind: FileKind, entries: Vec<SymbolEntry>) {
        let symbols = FileSymbols {
            kind,
            entries: Arc::new(entries),
        };
        let mut guard = self.state.write();
        Arc::make_mut(&mut guard).replace(file, Some(symbols));
    }

    pub fn update_tree(&self, file: FileId, kind: FileKind, tree: &Tree, table: &ScopeTable) {
        let entries = extract_symbols(file, kind, tree, table);
        debug!(%file, entries = entries.len(), "index update");
        self.update(file, kind, entries);
    }

    pub fn update_localization(&self, file: FileId, text: &str) {
        let entries = extract_localization(file, text);
        self.update(file, FileKind::Localization, entries);
    }

    pub fn remove(&self, file: FileId) {
        let mut guard = self.state.write();
        if guard.files.contains_key(&file) {
            Arc::make_mut(&mut guard).replace(file, None);
        }
    }

    pub fn lookup(&self, name: &str) -> Vec<SymbolEntry> {
        self.snapshot().lookup(name).cloned().collect()
    }

    pub fn references(&self, name: &str) -> Vec<SymbolEntry> {
        self.snapshot().references(name).cloned().collect()
    }

    /// Index many files at once: extraction runs in parallel, the results are
    /// applied under a single write lock.
    pub fn populate(&self, files: Vec<(FileId, FileKind, String)>, table: &ScopeTable) {
        let extracted: Vec<(FileId, FileKind, Vec<SymbolEntry>)> = files
            .par_iter()
            .filter_map(|(file, kind, text)| {
                if *kind == FileKind::Localization {
                    return Some((*file, *kind, extract_localization(*file, text)));
                }
                let parsed = crate::tree::parse(text);
                if !parsed.is_clean() {
                    debug!(%file, errors = parsed.errors.len(), "skipping malformed file");
                    return None;
                }
                let mut tree = parsed.tree;
                walk(&mut tree, table, *file, *kind, None, &WalkOptions::default());
                Some((*file, *kind, extract_symbols(*file, *kind, &tree, table)))
            })
            .collect();

        let count = extracted.len();
        let mut guard = self.state.write();
        let state = Arc::make_mut(&mut guard);
        for (file, kind, entries) in extracted {
            state.replace(
                file,
                Some(FileSymbols {
                    kind,
                    entries: Arc::new(entries),
                }),
            );
        }
        debug!(files = count, generation = state.generation, "index populated");
    }
}
