//! The per-document pipeline: parse, walk, index, diagnose.

use std::sync::Arc;

use tracing::debug;

use crate::diag::{Diagnostic, DiagnosticsEngine, ValidationContext};
use crate::file::{FileId, FileKind};
use crate::index::SymbolIndex;
use crate::scope::{ScopeTable, WalkOptions, walk};
use crate::tree::{Tree, TreeError, parse};
use crate::util::content_hash;

/// Everything one run produced for one version of a document.
#[derive(Debug, Clone)]
pub struct Analysis {
    pub file: FileId,
    pub kind: FileKind,
    pub version: u64,
    pub content_hash: u64,
    /// Annotated tree.
    pub tree: Tree,
    pub tree_errors: Vec<TreeError>,
    /// Wave 1 only.
    pub syntax: Vec<Diagnostic>,
    /// Both waves, sorted by position.
    pub diagnostics: Vec<Diagnostic>,
    /// Index generation the semantic wave read.
    pub index_generation: u64,
}

impl Analysis {
    pub fn is_clean(&self) -> bool {
        self.tree_errors.is_empty()
    }
}

/// Hooks into a running analysis.
pub trait AnalysisObserver {
    /// Wave 1 is ready; called before the walk starts.
    fn syntax_ready(&mut self, _diagnostics: &[Diagnostic]) {}

    /// Whether the result is still wanted. A stale run leaves the index alone.
    fn is_current(&self) -> bool {
        true
    }
}

impl AnalysisObserver for () {}

/// Shared, read-mostly state of the pipeline. Cheap to clone.
#[derive(Clone)]
pub struct Analyzer {
    table: Arc<ScopeTable>,
    index: Arc<SymbolIndex>,
    engine: Arc<DiagnosticsEngine>,
    opts: WalkOptions,
}

impl Analyzer {
    pub fn new(table: Arc<ScopeTable>, index: Arc<SymbolIndex>) -> Self {
        Self {
            table,
            index,
            engine: Arc::new(DiagnosticsEngine::new()),
            opts: WalkOptions::default(),
        }
    }

    /// Built-in vocabulary and a fresh index.
    pub fn with_defaults() -> Self {
        Self::new(ScopeTable::builtin(), Arc::new(SymbolIndex::new()))
    }

    pub fn with_engine(mut self, engine: DiagnosticsEngine) -> Self {
        self.engine = Arc::new(engine);
        self
    }

    pub fn with_walk_options(mut self, opts: WalkOptions) -> Self {
        self.opts = opts;
        self
    }

    pub fn table(&self) -> &Arc<ScopeTable> {
        &self.table
    }

    pub fn index(&self) -> &Arc<SymbolIndex> {
        &self.index
    }

    pub fn analyze(&self, file: FileId, kind: FileKind, version: u64, text: &str) -> Analysis {
        self.analyze_observed(file, kind, version, text, &mut ())
    }

    pub fn analyze_observed(
        &self,
        file: FileId,
        kind: FileKind,
        version: u64,
        text: &str,
        observer: &mut dyn AnalysisObserver,
    ) -> Analysis {
        let hash = content_hash(text);
        let parsed = parse(text);
        let mut tree = parsed.tree;
        let tree_errors = parsed.errors;

        if kind == FileKind::Localization {
            // Not script: only its keys matter.
            if observer.is_current() {
                self.index.update_localization(file, text);
            }
            return Analysis {
                file,
                kind,
                version,
                content_hash: hash,
                tree,
                tree_errors: Vec::new(),
                syntax: Vec::new(),
                diagnostics: Vec::new(),
                index_generation: self.index.generation(),
            };
        }

        let syntax = DiagnosticsEngine::syntax(&tree_errors);
        observer.syntax_ready(&syntax);

        let before = self.index.snapshot();
        walk(&mut tree, &self.table, file, kind, Some(before.as_ref()), &self.opts);
        drop(before);

        if tree_errors.is_empty() && observer.is_current() {
            self.index.update_tree(file, kind, &tree, &self.table);
        }

        let snapshot = self.index.snapshot();
        let cx = ValidationContext {
            tree: &tree,
            table: &self.table,
            index: &snapshot,
            file,
            kind,
        };
        let diagnostics = self.engine.run(&tree_errors, &cx);
        debug!(%file, version, errors = tree_errors.len(), diagnostics = diagnostics.len(), "analysis done");

        Analysis {
            file,
            kind,
            version,
            content_hash: hash,
            index_generation: snapshot.generation(),
            tree,
            tree_errors,
            syntax,
            diagnostics,
        }
    }
}
