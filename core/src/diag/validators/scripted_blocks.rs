use crate::diag::{Code, Diagnostic, ValidationContext, Validator};
use crate::index::{DefinitionKind, SymbolEntry};
use crate::scope::Role;
use crate::tree::{NodeId, Tree};
use crate::util::fast_map::FxHashSet;

/// Calls to scripted effects and triggers against their `$PARAM$` lists, and
/// definitions shadowed by another of the same name.
pub struct ScriptedBlocksValidator;

impl Validator for ScriptedBlocksValidator {
    fn name(&self) -> &'static str {
        "scripted_blocks"
    }

    fn validate(&self, cx: &ValidationContext<'_>) -> anyhow::Result<Vec<Diagnostic>> {
        let mut out = Vec::new();
        check_calls(cx, &mut out);
        check_duplicates(cx, &mut out);
        Ok(out)
    }
}

fn check_calls(cx: &ValidationContext<'_>, out: &mut Vec<Diagnostic>) {
    let tree = cx.tree;
    for (id, node) in tree.iter() {
        if id == NodeId::ROOT || tree.is_top_level(id) || node.annotation.role != Role::Statement {
            continue;
        }
        let Some(name) = node.plain_key() else { continue };
        let Some((kind, params)) = cx.index.definition(name) else { continue };
        if !kind.is_callable() {
            continue;
        }
        let span = node.key.as_ref().map_or(node.span, |k| k.span);

        if !node.is_block() {
            // `my_effect = yes` passes nothing.
            for param in params {
                out.push(Diagnostic::new(Code::MissingArgument, span, &[("name", name), ("param", param)]));
            }
            continue;
        }

        let given = arguments(tree, id);
        for param in params {
            if !given.iter().any(|(arg, _)| arg == param) {
                out.push(Diagnostic::new(Code::MissingArgument, span, &[("name", name), ("param", param)]));
            }
        }
        for (arg, arg_id) in &given {
            if !params.iter().any(|p| p == arg) {
                let child = tree.node(*arg_id);
                let arg_span = child.key.as_ref().map_or(child.span, |k| k.span);
                out.push(Diagnostic::new(Code::UnknownArgument, arg_span, &[("name", name), ("param", arg)]));
            }
        }
    }
}

fn arguments(tree: &Tree, call: NodeId) -> Vec<(&str, NodeId)> {
    tree.statements(call)
        .filter_map(|(id, n)| n.key_text().map(|k| (k, id)))
        .collect()
}

fn check_duplicates(cx: &ValidationContext<'_>, out: &mut Vec<Diagnostic>) {
    let Some(kind) = DefinitionKind::for_file(cx.kind) else { return };
    if kind == DefinitionKind::Event {
        return;
    }
    let tree = cx.tree;
    let mut seen = FxHashSet::default();
    for (_, node) in tree.statements(tree.root()) {
        let Some(key) = node.key.as_ref() else { continue };
        if key.prefix.is_some() || key.text.starts_with('@') {
            continue;
        }
        if !node.is_block() && kind != DefinitionKind::ScriptValue {
            continue;
        }
        let name = key.text.as_str();
        let elsewhere = cx.index.definitions(name).any(|entry| match entry {
            SymbolEntry::Definition { kind: k, location, .. } => *k == kind && location.file != cx.file,
            _ => false,
        });
        if !seen.insert(name) || elsewhere {
            out.push(Diagnostic::new(Code::DuplicateDefinition, key.span, &[("name", name)]));
        }
    }
}
