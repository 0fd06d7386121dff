use crate::diag::validators::scalar_or_field;
use crate::diag::{Code, Diagnostic, ValidationContext, Validator};
use crate::file::FileKind;
use crate::tree::{Atom, NodeId, Tree};

/// Event `title`/`desc` and option `name` keys missing from localization.
///
/// Silent until at least one localization file is indexed, so a lone script
/// file is not flooded with misses.
pub struct LocalizationValidator;

impl Validator for LocalizationValidator {
    fn name(&self) -> &'static str {
        "localization"
    }

    fn validate(&self, cx: &ValidationContext<'_>) -> anyhow::Result<Vec<Diagnostic>> {
        if cx.kind != FileKind::Events || !cx.index.has_localization() {
            return Ok(Vec::new());
        }
        let tree = cx.tree;
        let mut out = Vec::new();
        for (event, node) in tree.statements(tree.root()) {
            if !node.is_block() || node.plain_key() == Some("namespace") {
                continue;
            }
            let keys = ["title", "desc"]
                .into_iter()
                .filter_map(|field| field_key(tree, event, field))
                .chain(option_names(tree, event));
            for atom in keys {
                if !is_loc_key(atom) || cx.index.has_loc_key(&atom.text) {
                    continue;
                }
                out.push(Diagnostic::new(Code::MissingLocalization, atom.span, &[("key", &atom.text)]));
            }
        }
        Ok(out)
    }
}

fn field_key<'t>(tree: &'t Tree, event: NodeId, field: &str) -> Option<&'t Atom> {
    tree.node(tree.child_by_key(event, field)?).value.as_atom()
}

fn option_names(tree: &Tree, event: NodeId) -> impl Iterator<Item = &Atom> {
    tree.statements(event)
        .filter(|(_, n)| n.is_block() && n.plain_key() == Some("option"))
        .filter_map(move |(id, _)| {
            let name = tree.child_by_key(id, "name")?;
            scalar_or_field(tree, name, "text")
        })
}

// Inline text and parameters are not keys.
fn is_loc_key(atom: &Atom) -> bool {
    atom.prefix.is_none() && !atom.text.is_empty() && !atom.text.contains(['$', ' ', '[', '\t'])
}
