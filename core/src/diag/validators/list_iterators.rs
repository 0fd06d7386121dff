use crate::diag::{Code, Diagnostic, ValidationContext, Validator};
use crate::scope::IteratorKind;
use crate::tree::NodeKind;

/// Iterator parameters: `count` only under `any_`, `weight` only under
/// `random_`, and `ordered_` needs an `order_by`.
pub struct ListIteratorsValidator;

impl Validator for ListIteratorsValidator {
    fn name(&self) -> &'static str {
        "list_iterators"
    }

    fn validate(&self, cx: &ValidationContext<'_>) -> anyhow::Result<Vec<Diagnostic>> {
        let tree = cx.tree;
        let mut out = Vec::new();

        for (id, node) in tree.iter() {
            if node.kind != NodeKind::Block || tree.is_top_level(id) {
                continue;
            }
            let Some(key) = node.plain_key() else { continue };
            let Some((kind, _)) = cx.table.iterator(key) else { continue };

            for (_, child) in tree.statements(id) {
                let Some(param) = child.plain_key() else { continue };
                match IteratorKind::owner_of(param) {
                    Some(owner) if owner != kind => {
                        let span = child.key.as_ref().map_or(child.span, |k| k.span);
                        out.push(Diagnostic::new(
                            Code::InvalidIteratorParam,
                            span,
                            &[("param", param), ("iterator", key)],
                        ));
                    }
                    _ => {}
                }
            }

            if kind == IteratorKind::Ordered && tree.child_by_key(id, "order_by").is_none() {
                let span = node.key.as_ref().map_or(node.span, |k| k.span);
                out.push(Diagnostic::new(Code::MissingOrderBy, span, &[("iterator", key)]));
            }
        }
        Ok(out)
    }
}
