use std::path::{Component, Path};

use anyhow::Context;

use pdx_core::{Analyzer, FileId, FileKind, Severity};

const USAGE: &str = "Usage: pdx-lsp --analyze [--errors-only] <relative-file-path>
  --analyze <file>     : Full analysis with JSON output
  --errors-only        : Show only errors in simple format";

/// `pdx-lsp --analyze <file>` runs one analysis and prints it instead of serving.
pub(crate) fn try_cli_analyze() -> anyhow::Result<Option<String>> {
    let args: Vec<String> = std::env::args().collect();
    let Some(i) = args.iter().position(|a| a == "--analyze") else {
        return Ok(None);
    };
    let path = args[i + 1..]
        .iter()
        .find(|a| !a.starts_with("--"))
        .cloned()
        .ok_or_else(|| anyhow::anyhow!(USAGE))?;
    let errors_only = args.iter().any(|a| a == "--errors-only");
    let content = read_file_content(&path)?;
    render_analysis(Path::new(&path), &content, errors_only).map(Some)
}

/// Analyze `content` as if it lived at `path` and render the result.
pub fn render_analysis(path: &Path, content: &str, errors_only: bool) -> anyhow::Result<String> {
    let kind = FileKind::from_path(path);
    let analysis = Analyzer::with_defaults().analyze(FileId(0), kind, 1, content);

    if errors_only {
        let errors: Vec<String> = analysis
            .diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Error)
            .map(|d| format!("Line {}:{}: [{}] {}", d.span.start.line, d.span.start.column, d.code, d.message))
            .collect();
        return Ok(if errors.is_empty() {
            "No errors found".to_string()
        } else {
            errors.join("\n")
        });
    }

    let output = serde_json::json!({
        "path": path.display().to_string(),
        "kind": kind,
        "clean": analysis.is_clean(),
        "diagnostics": analysis.diagnostics,
    });
    Ok(serde_json::to_string_pretty(&output)?)
}

pub(crate) fn is_safe_path(path: &str) -> bool {
    let path = Path::new(path);

    if path.as_os_str().is_empty() || path.is_absolute() {
        return false;
    }
    if path.components().any(|c| c == Component::ParentDir) {
        return false;
    }

    let s = path.to_string_lossy();
    if s.chars().any(|c| matches!(c, '\0' | '\n' | '\r' | '\t')) {
        return false;
    }
    // Windows drive letters.
    !(s.len() >= 2 && s.as_bytes()[1] == b':')
}

pub(crate) fn read_file_content(path: &str) -> anyhow::Result<String> {
    if !is_safe_path(path) {
        return Err(anyhow::anyhow!("Unsafe file path: {}", path));
    }
    let bytes = std::fs::read(path).with_context(|| format!("Failed to read file '{}'", path))?;
    let text = String::from_utf8_lossy(&bytes);
    Ok(text.strip_prefix('\u{feff}').unwrap_or(&*text).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_safe_path() {
        assert!(is_safe_path("mod/events/a.txt"));
        assert!(!is_safe_path(""));
        assert!(!is_safe_path("/etc/passwd"));
        assert!(!is_safe_path("../outside.txt"));
        assert!(!is_safe_path("a\nb.txt"));
        assert!(!is_safe_path("C:evil.txt"));
    }
}
