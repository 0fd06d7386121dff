use crate::diag::validators::{has_yes, scalar_or_field};
use crate::diag::{Code, Diagnostic, ValidationContext, Validator};
use crate::file::FileKind;
use crate::index::DefinitionKind;
use crate::token::Span;
use crate::tree::{NodeId, Tree};

const REQUIRED_FIELDS: &[&str] = &["title", "desc"];

/// Event structure and `trigger_event` targets.
pub struct EventsValidator;

impl Validator for EventsValidator {
    fn name(&self) -> &'static str {
        "events"
    }

    fn validate(&self, cx: &ValidationContext<'_>) -> anyhow::Result<Vec<Diagnostic>> {
        let mut out = Vec::new();
        if cx.kind == FileKind::Events {
            check_events(cx.tree, &mut out);
        }
        check_targets(cx, &mut out);
        Ok(out)
    }
}

fn check_events(tree: &Tree, out: &mut Vec<Diagnostic>) {
    let root = tree.root();
    let namespaces: Vec<&str> = tree
        .statements(root)
        .filter(|(_, n)| n.plain_key() == Some("namespace"))
        .filter_map(|(_, n)| n.value.as_atom().map(|a| a.text.as_str()))
        .collect();

    let events: Vec<(NodeId, &str, Span)> = tree
        .statements(root)
        .filter(|(_, n)| n.is_block())
        .filter_map(|(id, n)| {
            let key = n.key.as_ref()?;
            (key.prefix.is_none() && key.text != "namespace").then_some((id, key.text.as_str(), key.span))
        })
        .collect();

    if namespaces.is_empty() {
        if let Some(&(_, _, span)) = events.first() {
            out.push(Diagnostic::new(Code::MissingNamespace, span, &[]));
        }
    }

    for &(id, name, span) in &events {
        if !namespaces.is_empty() && !namespaces.iter().any(|ns| in_namespace(name, ns)) {
            out.push(Diagnostic::new(
                Code::EventNamespaceMismatch,
                span,
                &[("event", name), ("namespace", namespaces[0])],
            ));
        }

        let hidden = has_yes(tree, id, "hidden");
        if !hidden {
            for field in REQUIRED_FIELDS {
                if tree.child_by_key(id, field).is_none() {
                    out.push(Diagnostic::new(Code::MissingEventField, span, &[("event", name), ("field", field)]));
                }
            }
        }

        let options: Vec<NodeId> = tree
            .statements(id)
            .filter(|(_, n)| n.is_block() && n.plain_key() == Some("option"))
            .map(|(c, _)| c)
            .collect();
        if hidden && !options.is_empty() {
            out.push(Diagnostic::new(Code::HiddenEventOptions, span, &[("event", name)]));
        }
        for option in options {
            if tree.child_by_key(option, "name").is_none() {
                let node = tree.node(option);
                let span = node.key.as_ref().map_or(node.span, |k| k.span);
                out.push(Diagnostic::new(Code::OptionWithoutName, span, &[]));
            }
        }
    }
}

fn in_namespace(event: &str, namespace: &str) -> bool {
    event
        .strip_prefix(namespace)
        .is_some_and(|rest| rest.starts_with('.'))
}

fn check_targets(cx: &ValidationContext<'_>, out: &mut Vec<Diagnostic>) {
    let tree = cx.tree;
    for (id, node) in tree.iter() {
        if node.plain_key() != Some("trigger_event") {
            continue;
        }
        let Some(target) = scalar_or_field(tree, id, "id") else { continue };
        let name = target.text.as_str();
        if name.is_empty() || name.contains('$') || target.prefix.is_some() {
            continue;
        }
        if cx.index.has_definition(name, DefinitionKind::Event) || defined_here(cx, name) {
            continue;
        }
        out.push(Diagnostic::new(Code::UndefinedEvent, target.span, &[("name", name)]));
    }
}

fn defined_here(cx: &ValidationContext<'_>, name: &str) -> bool {
    cx.kind == FileKind::Events
        && cx
            .tree
            .statements(cx.tree.root())
            .any(|(_, n)| n.is_block() && n.key_text() == Some(name))
}
