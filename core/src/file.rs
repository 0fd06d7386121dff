//! File identity and classification.

use std::fmt;
use std::path::{Path, PathBuf};

use dashmap::DashMap;
use parking_lot::RwLock;
use serde::Serialize;

use crate::scope::Timing;

/// Interned handle for a workspace file; the path lives in [`FileRegistry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct FileId(pub u32);

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "file#{}", self.0)
    }
}

/// What a file contains, inferred from where it sits in the mod tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum FileKind {
    ScriptedEffects,
    ScriptedTriggers,
    ScriptValues,
    Events,
    Decisions,
    Localization,
    Other,
}

impl FileKind {
    pub fn from_path(path: &Path) -> FileKind {
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        let dirs: Vec<String> = path
            .components()
            .filter_map(|c| c.as_os_str().to_str())
            .map(str::to_ascii_lowercase)
            .collect();
        let has = |name: &str| dirs.iter().any(|d| d == name);

        if ext.eq_ignore_ascii_case("yml") || ext.eq_ignore_ascii_case("yaml") {
            return if has("localization") || has("localisation") {
                FileKind::Localization
            } else {
                FileKind::Other
            };
        }
        if has("scripted_effects") {
            FileKind::ScriptedEffects
        } else if has("scripted_triggers") {
            FileKind::ScriptedTriggers
        } else if has("script_values") {
            FileKind::ScriptValues
        } else if has("decisions") {
            FileKind::Decisions
        } else if has("events") {
            FileKind::Events
        } else {
            FileKind::Other
        }
    }

    pub fn is_script(self) -> bool {
        self != FileKind::Localization
    }

    /// Timing of top-level definitions in a file of this kind.
    pub fn root_timing(self) -> Timing {
        match self {
            FileKind::ScriptedEffects => Timing::Effect,
            FileKind::ScriptedTriggers | FileKind::ScriptValues => Timing::Trigger,
            _ => Timing::Neutral,
        }
    }
}

/// Path <-> [`FileId`] interning, shared between the editor front and the index.
#[derive(Debug, Default)]
pub struct FileRegistry {
    ids: DashMap<PathBuf, FileId>,
    paths: RwLock<Vec<PathBuf>>,
}

impl FileRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn intern(&self, path: &Path) -> FileId {
        if let Some(id) = self.ids.get(path) {
            return *id;
        }
        // Allocation happens under the entry lock so racing callers agree on one id.
        *self.ids.entry(path.to_path_buf()).or_insert_with(|| {
            let mut paths = self.paths.write();
            paths.push(path.to_path_buf());
            FileId((paths.len() - 1) as u32)
        })
    }

    pub fn lookup(&self, path: &Path) -> Option<FileId> {
        self.ids.get(path).map(|id| *id)
    }

    pub fn path(&self, id: FileId) -> Option<PathBuf> {
        self.paths.read().get(id.0 as usize).cloned()
    }

    pub fn kind(&self, id: FileId) -> FileKind {
        self.path(id).map(|p| FileKind::from_path(&p)).unwrap_or(FileKind::Other)
    }

    pub fn len(&self) -> usize {
        self.paths.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
