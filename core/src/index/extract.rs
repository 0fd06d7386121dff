use once_cell::sync::Lazy;
use regex::Regex;

use crate::file::{FileId, FileKind};
use crate::index::{DefinitionKind, Location, SymbolEntry};
use crate::scope::{Role, ScopeTable};
use crate::tree::{NodeId, Tree};

static PARAM_RE: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"\$([A-Za-z0-9_]+)\$").ok());

/// Collect the symbols one annotated tree contributes to the index.
pub fn extract_symbols(file: FileId, kind: FileKind, tree: &Tree, table: &ScopeTable) -> Vec<SymbolEntry> {
    let mut out = Vec::new();
    let at = |span| Location { file, span };

    if let Some(def_kind) = DefinitionKind::for_file(kind) {
        for (id, node) in tree.children(tree.root()) {
            let Some(key) = node.key.as_ref() else { continue };
            if key.prefix.is_some() || key.text.starts_with('@') {
                continue;
            }
            if def_kind == DefinitionKind::Event && key.text == "namespace" {
                continue;
            }
            if !node.is_block() && def_kind != DefinitionKind::ScriptValue {
                continue;
            }
            let params = if def_kind.is_callable() {
                collect_params(tree, id)
            } else {
                Vec::new()
            };
            out.push(SymbolEntry::Definition {
                kind: def_kind,
                name: key.text.clone(),
                params,
                location: at(key.span),
            });
        }
    }

    for (id, node) in tree.iter().skip(1) {
        if tree.is_top_level(id) {
            continue;
        }
        let Some(key) = node.plain_key() else { continue };

        if table.is_saved_scope_effect(key) {
            if let Some(value) = node.value.as_atom() {
                out.push(SymbolEntry::SavedScope {
                    name: value.text.clone(),
                    scope: node.annotation.scope,
                    location: at(value.span),
                });
            }
        } else if let Some(var_kind) = table.variable_effect(key) {
            if let Some((name, span)) = scalar_or_field(tree, id, "name") {
                out.push(SymbolEntry::Variable {
                    name,
                    kind: var_kind,
                    location: at(span),
                });
            }
        } else if key == "trigger_event" {
            if let Some((name, span)) = scalar_or_field(tree, id, "id") {
                out.push(SymbolEntry::Reference { name, location: at(span) });
            }
        } else if node.annotation.role == Role::Statement && !table.is_known_key(key) {
            // Possibly a scripted effect or trigger call.
            if let Some(k) = node.key.as_ref() {
                out.push(SymbolEntry::Reference {
                    name: key.to_string(),
                    location: at(k.span),
                });
            }
        }
    }
    out
}

/// `key = value`, or the `field` child of `key = { field = value }`.
fn scalar_or_field(tree: &Tree, id: NodeId, field: &str) -> Option<(String, crate::token::Span)> {
    let node = tree.node(id);
    if let Some(atom) = node.value.as_atom() {
        return Some((atom.text.clone(), atom.span));
    }
    let child = tree.child_by_key(id, field)?;
    let atom = tree.node(child).value.as_atom()?;
    Some((atom.text.clone(), atom.span))
}

/// `$PARAM$` placeholders used anywhere inside a definition, sorted and unique.
pub(crate) fn collect_params(tree: &Tree, id: NodeId) -> Vec<String> {
    let Some(re) = PARAM_RE.as_ref() else {
        return Vec::new();
    };
    let mut params: Vec<String> = tree
        .subtree(id)
        .into_iter()
        .skip(1)
        .flat_map(|n| {
            let node = tree.node(n);
            [node.key.as_ref(), node.value.as_atom()]
        })
        .flatten()
        .flat_map(|atom| {
            re.captures_iter(&atom.text)
                .map(|c| c[1].to_string())
                .collect::<Vec<_>>()
        })
        .collect();
    params.sort();
    params.dedup();
    params
}
