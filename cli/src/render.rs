use std::fmt::Write as _;

use serde::Serialize;

use pdx_core::scope::{Role, Timing};
use pdx_core::tree::{NodeKind, Value};
use pdx_core::{Analysis, Diagnostic, ScopeTable, Severity};

#[derive(Debug, Clone, Serialize)]
pub(crate) struct FileReport {
    pub(crate) path: String,
    pub(crate) diagnostics: Vec<Diagnostic>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct Summary {
    pub(crate) files: usize,
    pub(crate) errors: usize,
    pub(crate) warnings: usize,
}

impl Summary {
    pub(crate) fn of(reports: &[FileReport]) -> Self {
        let all = || reports.iter().flat_map(|r| r.diagnostics.iter());
        Self {
            files: reports.len(),
            errors: all().filter(|d| d.severity == Severity::Error).count(),
            warnings: all().filter(|d| d.severity == Severity::Warning).count(),
        }
    }
}

/// `path:line:col: severity [CODE] message` per diagnostic, then a summary line.
pub(crate) fn text_report(reports: &[FileReport], summary: &Summary) -> String {
    let mut out = String::new();
    for report in reports {
        for d in &report.diagnostics {
            let _ = writeln!(out, "{}:{}", report.path, d);
        }
    }
    let _ = writeln!(
        out,
        "checked {} files: {} errors, {} warnings",
        summary.files, summary.errors, summary.warnings
    );
    out
}

/// One line per node, indented by depth, with the walker's annotation.
pub(crate) fn tree(analysis: &Analysis, table: &ScopeTable) -> String {
    let tree = &analysis.tree;
    let mut out = String::new();
    for (id, node) in tree.iter().skip(1) {
        let indent = "  ".repeat(tree.depth(id).saturating_sub(1));
        let mut line = match node.kind {
            NodeKind::Comment => "#".to_string(),
            NodeKind::ListItem => node.value.as_atom().map(|a| a.full_text().into_owned()).unwrap_or_default(),
            NodeKind::Block | NodeKind::Assignment => {
                let key = node.key.as_ref().map(|k| k.full_text().into_owned()).unwrap_or_default();
                let op = node.op.map(|op| op.as_str()).unwrap_or("");
                match &node.value {
                    Value::Scalar(atom) => format!("{key} {op} {}", atom.full_text()),
                    Value::Nil => format!("{key} {op} <missing>"),
                    Value::None => format!("{key} {op} {{}}").trim().to_string(),
                }
            }
        };
        if node.kind != NodeKind::Comment {
            let a = &node.annotation;
            let _ = write!(line, "  [{}", table.describe(a.scope));
            if a.timing != Timing::Neutral {
                let _ = write!(line, " {}", a.timing);
            }
            if a.role == Role::Argument {
                line.push_str(" arg");
            }
            line.push(']');
        }
        let _ = writeln!(out, "{indent}{line}");
    }
    for d in &analysis.syntax {
        let _ = writeln!(out, "{d}");
    }
    out
}
