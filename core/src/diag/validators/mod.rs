//! Built-in validators, registered in the order their output is concatenated.

mod events;
mod list_iterators;
mod localization;
mod scope_chain;
mod scripted_blocks;
mod style;
mod variables;
mod vocabulary;

pub use events::EventsValidator;
pub use list_iterators::ListIteratorsValidator;
pub use localization::LocalizationValidator;
pub use scope_chain::ScopeChainValidator;
pub use scripted_blocks::ScriptedBlocksValidator;
pub use style::StyleValidator;
pub use variables::VariablesValidator;
pub use vocabulary::VocabularyValidator;

use crate::diag::Validator;
use crate::tree::{Atom, NodeId, Tree};

pub fn builtin() -> Vec<Box<dyn Validator>> {
    vec![
        Box::new(ScopeChainValidator),
        Box::new(VocabularyValidator),
        Box::new(VariablesValidator),
        Box::new(ListIteratorsValidator),
        Box::new(EventsValidator),
        Box::new(ScriptedBlocksValidator),
        Box::new(LocalizationValidator),
        Box::new(StyleValidator),
    ]
}

/// Scalar value of `id`, or of its `field` child when `id` is a block.
pub(crate) fn scalar_or_field<'t>(tree: &'t Tree, id: NodeId, field: &str) -> Option<&'t Atom> {
    if let Some(atom) = tree.node(id).value.as_atom() {
        return Some(atom);
    }
    let child = tree.child_by_key(id, field)?;
    tree.node(child).value.as_atom()
}

/// Whether `id` is a `key = yes` child of `parent`.
pub(crate) fn has_yes(tree: &Tree, parent: NodeId, key: &str) -> bool {
    tree.child_by_key(parent, key)
        .and_then(|c| tree.node(c).value.as_atom())
        .is_some_and(Atom::is_yes)
}
