use std::panic::AssertUnwindSafe;

use rayon::prelude::*;
use tracing::{debug, warn};

use crate::diag::validators;
use crate::diag::{Code, Diagnostic};
use crate::file::{FileId, FileKind};
use crate::index::IndexState;
use crate::scope::ScopeTable;
use crate::tree::{Tree, TreeError, TreeErrorKind};

/// Read-only inputs shared by every validator of one run.
#[derive(Clone, Copy)]
pub struct ValidationContext<'a> {
    pub tree: &'a Tree,
    pub table: &'a ScopeTable,
    pub index: &'a IndexState,
    pub file: FileId,
    pub kind: FileKind,
}

/// A semantic check over an annotated tree.
///
/// Validators never mutate shared state. An `Err` (or a panic) only discards
/// that validator's output for the current run.
pub trait Validator: Send + Sync {
    fn name(&self) -> &'static str;

    fn validate(&self, cx: &ValidationContext<'_>) -> anyhow::Result<Vec<Diagnostic>>;
}

pub struct DiagnosticsEngine {
    validators: Vec<Box<dyn Validator>>,
}

impl Default for DiagnosticsEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl DiagnosticsEngine {
    /// Engine with the built-in validators in their fixed order.
    pub fn new() -> Self {
        Self {
            validators: validators::builtin(),
        }
    }

    pub fn with_validators(validators: Vec<Box<dyn Validator>>) -> Self {
        Self { validators }
    }

    pub fn validator_names(&self) -> Vec<&'static str> {
        self.validators.iter().map(|v| v.name()).collect()
    }

    /// Wave 1: tree errors as diagnostics.
    pub fn syntax(errors: &[TreeError]) -> Vec<Diagnostic> {
        let mut out: Vec<Diagnostic> = errors
            .iter()
            .map(|e| match e.kind {
                TreeErrorKind::UnmatchedClose => Diagnostic::new(Code::UnmatchedClose, e.span, &[]),
                TreeErrorKind::UnclosedOpen => Diagnostic::new(Code::UnclosedOpen, e.span, &[]),
                TreeErrorKind::StrayOperator => {
                    Diagnostic::new(Code::StrayOperator, e.span, &[("op", e.text.as_deref().unwrap_or(""))])
                }
                TreeErrorKind::UnexpectedChar => {
                    Diagnostic::new(Code::UnexpectedChar, e.span, &[("text", e.text.as_deref().unwrap_or(""))])
                }
            })
            .collect();
        sort(&mut out);
        out
    }

    /// Wave 2: every validator, in parallel, concatenated in registration order.
    pub fn semantic(&self, cx: &ValidationContext<'_>) -> Vec<Diagnostic> {
        let per_validator: Vec<Vec<Diagnostic>> = self
            .validators
            .par_iter()
            .map(|v| {
                match std::panic::catch_unwind(AssertUnwindSafe(|| v.validate(cx))) {
                    Ok(Ok(diags)) => diags,
                    Ok(Err(err)) => {
                        warn!(validator = v.name(), file = %cx.file, "validator failed: {err:#}");
                        Vec::new()
                    }
                    Err(_) => {
                        warn!(validator = v.name(), file = %cx.file, "validator panicked");
                        Vec::new()
                    }
                }
            })
            .collect();
        let mut out: Vec<Diagnostic> = per_validator.into_iter().flatten().collect();
        sort(&mut out);
        debug!(file = %cx.file, count = out.len(), "semantic wave done");
        out
    }

    /// Both waves, merged and ordered by position.
    pub fn run(&self, errors: &[TreeError], cx: &ValidationContext<'_>) -> Vec<Diagnostic> {
        let mut out = Self::syntax(errors);
        out.extend(self.semantic(cx));
        sort(&mut out);
        out
    }
}

fn sort(diags: &mut [Diagnostic]) {
    diags.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
}
