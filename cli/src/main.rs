use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use pdx_core::workspace::{self, SourceFile};
use pdx_core::{Analyzer, FileId, FileKind, FileRegistry, ScopeTable, Severity, SymbolIndex};

mod render;

use render::{FileReport, Summary};

const DEFAULT_TRACE_FILTER: &str = "warn";

#[derive(Debug, Parser)]
#[command(name = "pdx", author, version, about = "Checker for Paradox-style game scripts", long_about = None)]
struct CliArgs {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Check a mod directory or a single script file.
    Check {
        #[arg(value_name = "PATH", value_parser = parse_sanitized_path)]
        path: PathBuf,
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
        /// Report errors only.
        #[arg(long)]
        errors_only: bool,
        /// Vocabulary YAML replacing the built-in one.
        #[arg(long, value_name = "FILE", value_parser = parse_sanitized_path)]
        vocab: Option<PathBuf>,
    },
    /// Print the annotated tree of one script file.
    Tree {
        #[arg(value_name = "FILE", value_parser = parse_sanitized_path)]
        file: PathBuf,
        #[arg(long, value_name = "FILE", value_parser = parse_sanitized_path)]
        vocab: Option<PathBuf>,
    },
}

fn sanitize_path(raw: &str) -> anyhow::Result<PathBuf> {
    let p = Path::new(raw);
    if p.components().any(|c| matches!(c, Component::ParentDir)) {
        return Err(anyhow::anyhow!(
            "Parent directory components ('..') are not allowed in file paths."
        ));
    }
    Ok(p.to_path_buf())
}

fn parse_sanitized_path(raw: &str) -> Result<PathBuf, String> {
    sanitize_path(raw).map_err(|e| e.to_string())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("PDX_LOG").unwrap_or_else(|_| EnvFilter::new(DEFAULT_TRACE_FILTER));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn load_table(vocab: Option<&Path>) -> anyhow::Result<Arc<ScopeTable>> {
    let Some(path) = vocab else {
        return Ok(ScopeTable::builtin());
    };
    let table =
        ScopeTable::from_yaml_file(path).with_context(|| format!("failed to load vocabulary {}", path.display()))?;
    Ok(Arc::new(table))
}

/// Index everything first so cross-file references resolve, then analyze each script.
fn check(path: &Path, vocab: Option<&Path>, errors_only: bool) -> anyhow::Result<Vec<FileReport>> {
    let table = load_table(vocab)?;
    let index = Arc::new(SymbolIndex::new());
    let registry = FileRegistry::new();

    let (files, root) = if path.is_dir() {
        let (files, _) = workspace::index_workspace(path, &registry, &index, &table)?;
        (files, path.to_path_buf())
    } else {
        let file = SourceFile {
            id: registry.intern(path),
            kind: FileKind::from_path(path),
            path: path.to_path_buf(),
            text: workspace::read_source(path)?,
        };
        let root = path.parent().map(Path::to_path_buf).unwrap_or_default();
        (vec![file], root)
    };

    let analyzer = Analyzer::new(table, index);
    let mut reports = Vec::new();
    for file in files.iter().filter(|f| f.kind.is_script()) {
        let analysis = analyzer.analyze(file.id, file.kind, 1, &file.text);
        let diagnostics: Vec<_> = analysis
            .diagnostics
            .into_iter()
            .filter(|d| !errors_only || d.severity == Severity::Error)
            .collect();
        debug!(path = %file.path.display(), count = diagnostics.len(), "checked");
        let shown = file.path.strip_prefix(&root).unwrap_or(&file.path);
        reports.push(FileReport {
            path: shown.to_string_lossy().replace('\\', "/"),
            diagnostics,
        });
    }
    Ok(reports)
}

fn main() -> anyhow::Result<()> {
    init_tracing();

    let CliArgs { command } = CliArgs::parse();
    match command {
        Commands::Check {
            path,
            format,
            errors_only,
            vocab,
        } => {
            let reports = check(&path, vocab.as_deref(), errors_only)?;
            let summary = Summary::of(&reports);
            match format {
                OutputFormat::Text => print!("{}", render::text_report(&reports, &summary)),
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&reports)?),
            }
            if summary.errors > 0 {
                std::process::exit(1);
            }
        }
        Commands::Tree { file, vocab } => {
            let table = load_table(vocab.as_deref())?;
            let text = workspace::read_source(&file)?;
            let analyzer = Analyzer::new(table, Arc::new(SymbolIndex::new()));
            let analysis = analyzer.analyze(FileId(0), FileKind::from_path(&file), 1, &text);
            print!("{}", render::tree(&analysis, analyzer.table()));
        }
    }
    Ok(())
}
