use crate::diag::{Code, Diagnostic, ValidationContext, Validator};
use crate::diag::validators::scalar_or_field;
use crate::scope::{MarkKind, VariableKind};
use crate::tree::{Atom, Tree};
use crate::util::fast_map::FxHashSet;

/// Undefined saved scopes and variables.
///
/// Saved scopes were already resolved by the walker; unresolved ones carry a
/// mark. Variables are declared by `set_variable` and friends, either in this
/// file or anywhere in the index.
pub struct VariablesValidator;

impl Validator for VariablesValidator {
    fn name(&self) -> &'static str {
        "variables"
    }

    fn validate(&self, cx: &ValidationContext<'_>) -> anyhow::Result<Vec<Diagnostic>> {
        let tree = cx.tree;
        let mut out = Vec::new();

        for (_, node) in tree.iter() {
            if let Some(mark) = &node.annotation.mark {
                if let MarkKind::UnresolvedSavedScope { name } = &mark.kind {
                    out.push(Diagnostic::new(Code::UndefinedSavedScope, mark.span, &[("name", name)]));
                }
            }
        }

        let declared = local_declarations(cx, tree);
        for (_, node) in tree.iter() {
            for atom in node.key.iter().chain(node.value.as_atom()) {
                let Some(kind) = atom.prefix.and_then(VariableKind::from_prefix) else { continue };
                let name = atom.text.split('.').next().unwrap_or("");
                if name.is_empty() || name.contains('$') {
                    continue;
                }
                if declared.contains(&(kind, name)) || cx.index.has_variable(name, kind) {
                    continue;
                }
                out.push(undefined(atom, kind, name));
            }
        }
        Ok(out)
    }
}

fn local_declarations<'t>(cx: &ValidationContext<'t>, tree: &'t Tree) -> FxHashSet<(VariableKind, &'t str)> {
    tree.iter()
        .filter_map(|(id, node)| {
            let kind = cx.table.variable_effect(node.plain_key()?)?;
            let atom = scalar_or_field(tree, id, "name")?;
            Some((kind, atom.text.as_str()))
        })
        .collect()
}

fn undefined(atom: &Atom, kind: VariableKind, name: &str) -> Diagnostic {
    let prefix = format!("{}:", kind.as_str());
    Diagnostic::new(
        Code::UndefinedVariable,
        atom.span,
        &[("prefix", prefix.as_str()), ("name", name)],
    )
}
