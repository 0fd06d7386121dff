//! Workspace discovery and initial index population.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use rayon::prelude::*;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::file::{FileId, FileKind, FileRegistry};
use crate::index::SymbolIndex;
use crate::scope::ScopeTable;

/// A file read from disk, BOM stripped.
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub id: FileId,
    pub path: PathBuf,
    pub kind: FileKind,
    pub text: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkspaceSummary {
    pub scripts: usize,
    pub localization: usize,
}

/// Script `.txt` files, plus `.yml` files under a localization directory.
pub fn is_workspace_file(path: &Path) -> bool {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    if ext.eq_ignore_ascii_case("txt") {
        return true;
    }
    FileKind::from_path(path) == FileKind::Localization
}

/// Every workspace file under `root`, sorted. Hidden directories are skipped.
pub fn discover(root: &Path) -> Vec<PathBuf> {
    let mut out: Vec<PathBuf> = WalkDir::new(root)
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !e.file_name().to_string_lossy().starts_with('.'))
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(err) => {
                warn!("skipping unreadable entry: {err}");
                None
            }
        })
        .filter(|e| e.file_type().is_file() && is_workspace_file(e.path()))
        .map(|e| e.into_path())
        .collect();
    out.sort();
    out
}

/// Read one file. Non-UTF-8 bytes are replaced rather than rejected.
pub fn read_source(path: &Path) -> Result<String> {
    let bytes = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    let text = String::from_utf8_lossy(&bytes);
    Ok(text.strip_prefix('\u{feff}').unwrap_or(&*text).to_string())
}

/// Read `paths` in parallel and intern them. Unreadable files are logged and skipped.
pub fn load(registry: &FileRegistry, paths: &[PathBuf]) -> Vec<SourceFile> {
    paths
        .par_iter()
        .filter_map(|path| match read_source(path) {
            Ok(text) => Some(SourceFile {
                id: registry.intern(path),
                kind: FileKind::from_path(path),
                path: path.clone(),
                text,
            }),
            Err(err) => {
                warn!("{err:#}");
                None
            }
        })
        .collect()
}

/// Discover, read and index everything under `root`.
pub fn index_workspace(
    root: &Path,
    registry: &FileRegistry,
    index: &SymbolIndex,
    table: &ScopeTable,
) -> Result<(Vec<SourceFile>, WorkspaceSummary)> {
    if !root.is_dir() {
        anyhow::bail!("workspace root {} is not a directory", root.display());
    }
    let paths = discover(root);
    debug!(root = %root.display(), files = paths.len(), "workspace discovered");
    let files = load(registry, &paths);

    let summary = WorkspaceSummary {
        scripts: files.iter().filter(|f| f.kind.is_script()).count(),
        localization: files.iter().filter(|f| f.kind == FileKind::Localization).count(),
    };
    index.populate(
        files.iter().map(|f| (f.id, f.kind, f.text.clone())).collect(),
        table,
    );
    info!(
        scripts = summary.scripts,
        localization = summary.localization,
        generation = index.generation(),
        "workspace indexed"
    );
    Ok((files, summary))
}
