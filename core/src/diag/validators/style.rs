use crate::diag::{Code, Diagnostic, ValidationContext, Validator};
use crate::scope::Timing;
use crate::tree::{Node, NodeId};

// Blocks where a nested AND changes meaning.
const LOGIC_BLOCKS: &[&str] = &["OR", "NOT", "NOR", "NAND"];

pub struct StyleValidator;

impl Validator for StyleValidator {
    fn name(&self) -> &'static str {
        "style"
    }

    fn validate(&self, cx: &ValidationContext<'_>) -> anyhow::Result<Vec<Diagnostic>> {
        let tree = cx.tree;
        let mut out = Vec::new();

        for (id, node) in tree.iter() {
            if id == NodeId::ROOT || !node.is_block() {
                continue;
            }
            let Some(key) = node.key_text() else { continue };
            let span = key_span(node);

            if tree.statements(id).next().is_none() {
                out.push(Diagnostic::new(Code::EmptyBlock, span, &[("key", key)]));
                continue;
            }

            match node.plain_key() {
                Some("AND") => {
                    let parent = tree.parent(id).map(|p| tree.node(p));
                    let redundant = parent.and_then(Node::plain_key).is_some_and(|pk| {
                        !LOGIC_BLOCKS.contains(&pk)
                            && cx.table.block(pk).is_some_and(|def| def.timing(Timing::Neutral) == Timing::Trigger)
                    });
                    if redundant {
                        out.push(Diagnostic::new(Code::RedundantAnd, span, &[]));
                    }
                }
                Some("NOT") => {
                    let mut inner = tree.statements(id);
                    if let (Some((_, only)), None) = (inner.next(), inner.next()) {
                        if only.is_block() && only.plain_key() == Some("NOT") {
                            out.push(Diagnostic::new(Code::DoubleNegation, span, &[]));
                        }
                    }
                }
                Some(k @ ("if" | "else_if")) => {
                    if tree.child_by_key(id, "limit").is_none() {
                        out.push(Diagnostic::new(Code::IfWithoutLimit, span, &[("key", k)]));
                    }
                }
                _ => {}
            }
        }
        Ok(out)
    }
}

fn key_span(node: &Node) -> crate::token::Span {
    node.key.as_ref().map_or(node.span, |k| k.span)
}
