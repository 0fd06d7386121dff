use crate::diag::{Code, Diagnostic, ValidationContext, Validator};
use crate::scope::MarkKind;

/// Reports invalid scope transitions recorded by the walker.
pub struct ScopeChainValidator;

impl Validator for ScopeChainValidator {
    fn name(&self) -> &'static str {
        "scope_chain"
    }

    fn validate(&self, cx: &ValidationContext<'_>) -> anyhow::Result<Vec<Diagnostic>> {
        let mut out = Vec::new();
        for (_, node) in cx.tree.iter() {
            let Some(mark) = &node.annotation.mark else { continue };
            match &mark.kind {
                MarkKind::InvalidLink { link, from } => {
                    let from = format!("`{from}` scope");
                    out.push(Diagnostic::new(
                        Code::InvalidTransition,
                        mark.span,
                        &[("link", link.as_str()), ("from", from.as_str())],
                    ));
                }
                MarkKind::InvalidChain { segment } => {
                    out.push(Diagnostic::new(
                        Code::InvalidTransition,
                        mark.span,
                        &[("link", segment.as_str()), ("from", "here")],
                    ));
                }
                MarkKind::UnresolvedSavedScope { .. } => {}
            }
        }
        Ok(out)
    }
}
