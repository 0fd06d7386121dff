//! Symbol lookup under the cursor, backed by the annotated tree and the index.

use pdx_core::index::{IndexState, Location};
use pdx_core::tree::{Atom, Tree};
use pdx_core::SymbolEntry;

/// The key or scalar under `offset`, prefix stripped.
pub fn symbol_at(tree: &Tree, offset: usize) -> Option<String> {
    let id = tree.node_at_offset(offset)?;
    let node = tree.node(id);
    let hit = |atom: &&Atom| atom.span.contains_offset(offset);
    let atom = node.key.as_ref().filter(hit).or_else(|| node.value.as_atom().filter(hit))?;
    let name = atom.text.split(':').next_back().unwrap_or(&atom.text);
    (!name.is_empty()).then(|| name.to_string())
}

/// Where `name` is defined: scripted blocks and events first, then saved scopes and variables.
pub fn definition_locations(index: &IndexState, name: &str) -> Vec<Location> {
    let mut out: Vec<Location> = index.definitions(name).map(SymbolEntry::location).collect();
    if out.is_empty() {
        out = index
            .lookup(name)
            .filter(|e| matches!(e, SymbolEntry::SavedScope { .. } | SymbolEntry::Variable { .. }))
            .map(SymbolEntry::location)
            .collect();
    }
    out
}

pub fn reference_locations(index: &IndexState, name: &str, include_declaration: bool) -> Vec<Location> {
    index
        .lookup(name)
        .filter(|e| match e {
            SymbolEntry::Reference { .. } => true,
            SymbolEntry::Definition { .. } => include_declaration,
            _ => false,
        })
        .map(SymbolEntry::location)
        .collect()
}
