use crate::diag::{Code, Diagnostic, ValidationContext, Validator};
use crate::index::DefinitionKind;
use crate::file::FileKind;
use crate::scope::{Role, ScopeType, Timing};
use crate::tree::NodeId;

/// Unknown keys, vocabulary used outside its scopes, and the golden rule:
/// no effects in trigger context, no triggers in effect context.
///
/// Keys are judged in their parent's evaluation context. Statements under an
/// unknown scope or in a neutral context are skipped, as are names that are
/// scope links: a link used from the wrong scope is a transition problem and
/// is reported once, by `scope_chain`.
pub struct VocabularyValidator;

// Arithmetic statements of script values.
const VALUE_OPERATORS: &[&str] = &[
    "value", "add", "subtract", "multiply", "divide", "modulo", "min", "max", "round", "floor", "ceiling", "abs",
];

impl Validator for VocabularyValidator {
    fn name(&self) -> &'static str {
        "vocabulary"
    }

    fn validate(&self, cx: &ValidationContext<'_>) -> anyhow::Result<Vec<Diagnostic>> {
        let (tree, table) = (cx.tree, cx.table);
        let mut out = Vec::new();

        for (id, node) in tree.iter() {
            if id == NodeId::ROOT || tree.is_top_level(id) || node.annotation.role != Role::Statement {
                continue;
            }
            let Some(key) = node.plain_key() else { continue };
            if key.contains(['$', '.', ':']) || key.starts_with('@') {
                continue;
            }
            let Some(parent) = tree.parent(id) else { continue };
            let context = &tree.node(parent).annotation;
            let ScopeType::Known(scope) = context.scope else { continue };
            if context.timing == Timing::Neutral {
                continue;
            }
            if cx.kind == FileKind::ScriptValues && VALUE_OPERATORS.contains(&key) {
                continue;
            }
            if table.block(key).is_some()
                || table.is_navigation(key)
                || table.is_link(key)
                || table.iterator(key).is_some()
            {
                continue;
            }
            let span = node.key.as_ref().map(|k| k.span).unwrap_or(node.span);

            let effect = table.effect(key);
            let trigger = table.trigger(key);
            if effect.is_none() && trigger.is_none() {
                match cx.index.definition(key) {
                    Some((DefinitionKind::ScriptedEffect, _)) if context.timing == Timing::Trigger => {
                        out.push(Diagnostic::new(Code::EffectInTrigger, span, &[("key", key)]));
                    }
                    Some((DefinitionKind::ScriptedTrigger, _)) if context.timing == Timing::Effect => {
                        out.push(Diagnostic::new(Code::TriggerInEffect, span, &[("key", key)]));
                    }
                    Some(_) => {}
                    None => {
                        let hint = table
                            .suggest(key)
                            .map(|s| format!("; did you mean `{s}`?"))
                            .unwrap_or_default();
                        out.push(Diagnostic::new(Code::UnknownKey, span, &[("key", key), ("hint", &hint)]));
                    }
                }
                continue;
            }

            let entry = match context.timing {
                Timing::Trigger => match trigger {
                    Some(entry) => entry,
                    None => {
                        out.push(Diagnostic::new(Code::EffectInTrigger, span, &[("key", key)]));
                        continue;
                    }
                },
                _ => match effect {
                    Some(entry) => entry,
                    None => {
                        out.push(Diagnostic::new(Code::TriggerInEffect, span, &[("key", key)]));
                        continue;
                    }
                },
            };
            if !entry.valid_in(scope) {
                out.push(Diagnostic::new(
                    Code::WrongScope,
                    span,
                    &[("key", key), ("scope", table.scope_name(scope))],
                ));
            }
        }
        Ok(out)
    }
}
