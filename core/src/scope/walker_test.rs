#[cfg(test)]
mod tests {
    use crate::file::{FileId, FileKind};
    use crate::index::{Location, SymbolEntry, SymbolIndex};
    use crate::scope::{MarkKind, Role, ScopeTable, ScopeType, Timing, WalkOptions, walk};
    use crate::token::Span;
    use crate::tree::{NodeId, Tree, parse};

    const FILE: FileId = FileId(1);

    fn walked(src: &str, kind: FileKind) -> (Tree, std::sync::Arc<ScopeTable>) {
        let table = ScopeTable::builtin();
        let mut tree = parse(src).tree;
        walk(&mut tree, &table, FILE, kind, None, &WalkOptions::default());
        (tree, table)
    }

    /// First node (pre-order) whose full key text is `key`.
    fn find(tree: &Tree, key: &str) -> NodeId {
        tree.iter()
            .find(|(_, n)| n.key.as_ref().is_some_and(|k| k.full_text() == key))
            .map(|(id, _)| id)
            .unwrap_or_else(|| panic!("no node keyed {key}"))
    }

    fn scope_name(tree: &Tree, table: &ScopeTable, key: &str) -> String {
        table.describe(tree.node(find(tree, key)).annotation.scope).to_string()
    }

    #[test]
    fn test_link_scenario_with_custom_table() {
        let table = ScopeTable::from_yaml_str("default_root: start\nscopes:\n  start:\n    links: { b: x }\n  x: {}\n").unwrap();
        let mut tree = parse("a = { b = { c = 1 } }").tree;
        walk(&mut tree, &table, FILE, FileKind::Other, None, &WalkOptions::default());
        let c = find(&tree, "c");
        assert_eq!(tree.node(c).annotation.scope, ScopeType::Known(table.scope_id("x").unwrap()));
    }

    #[test]
    fn test_walk_is_total() {
        let src = "a = { b = { c = 1 } d e = \n} } }\nf = { scope:nowhere = { g = h } every_vassal = { # c\n add_gold = 1 } \"q\" = 4";
        let table = ScopeTable::builtin();
        let mut tree = parse(src).tree;
        let summary = walk(&mut tree, &table, FILE, FileKind::ScriptedEffects, None, &WalkOptions::default());
        assert_eq!(summary.visited, tree.len());
        for (id, node) in tree.iter() {
            assert!(node.annotation.scope.is_assigned(), "{id} left unassigned");
        }
    }

    #[test]
    fn test_saved_scope_resolves_to_declaring_scope() {
        let (tree, table) = walked(
            "my_effect = {\n  primary_title = {\n    save_scope_as = realm\n    scope:realm = { holder = { add_gold = 1 } }\n  }\n}",
            FileKind::ScriptedEffects,
        );
        assert_eq!(scope_name(&tree, &table, "scope:realm"), "landed_title");
        assert_eq!(scope_name(&tree, &table, "holder"), "character");
        assert!(tree.iter().all(|(_, n)| n.annotation.mark.is_none()));
    }

    #[test]
    fn test_saved_scope_visible_to_later_siblings_only() {
        let (tree, _) = walked(
            "e = { scope:hero = { add_gold = 1 } save_scope_as = hero scope:hero = { add_gold = 2 } }",
            FileKind::ScriptedEffects,
        );
        let refs: Vec<_> = tree
            .iter()
            .filter(|(_, n)| n.key.as_ref().is_some_and(|k| k.full_text() == "scope:hero"))
            .map(|(_, n)| n.annotation.mark.clone())
            .collect();
        assert_eq!(refs.len(), 2);
        assert!(matches!(
            refs[0].as_ref().map(|m| &m.kind),
            Some(MarkKind::UnresolvedSavedScope { name }) if name == "hero"
        ));
        assert!(refs[1].is_none());
    }

    #[test]
    fn test_saved_scope_ends_with_its_enclosing_block() {
        let (tree, _) = walked(
            "e = { if = { limit = { is_adult = yes } save_scope_as = hero } scope:hero = { add_gold = 1 } }",
            FileKind::ScriptedEffects,
        );
        let mark = tree.node(find(&tree, "scope:hero")).annotation.mark.clone();
        assert!(matches!(
            mark.map(|m| m.kind),
            Some(MarkKind::UnresolvedSavedScope { name }) if name == "hero"
        ));
        assert_eq!(tree.node(find(&tree, "scope:hero")).annotation.scope, ScopeType::Unknown);
    }

    #[test]
    fn test_saved_scope_ignores_own_file_in_index() {
        let index = SymbolIndex::new();
        let table = ScopeTable::builtin();
        let mut tree = parse("e = { save_scope_as = hero }").tree;
        walk(&mut tree, &table, FILE, FileKind::ScriptedEffects, None, &WalkOptions::default());
        index.update_tree(FILE, FileKind::ScriptedEffects, &tree, &table);

        let snapshot = index.snapshot();
        let mut tree = parse("e = { scope:hero = { add_gold = 1 } }").tree;
        walk(&mut tree, &table, FILE, FileKind::ScriptedEffects, Some(snapshot.as_ref()), &WalkOptions::default());
        assert!(tree.node(find(&tree, "scope:hero")).annotation.mark.is_some());

        // the same entry seen from another file resolves
        let mut tree = parse("e = { scope:hero = { add_gold = 1 } }").tree;
        walk(&mut tree, &table, FileId(2), FileKind::ScriptedEffects, Some(snapshot.as_ref()), &WalkOptions::default());
        assert!(tree.node(find(&tree, "scope:hero")).annotation.mark.is_none());
    }

    #[test]
    fn test_saved_scope_falls_back_to_index() {
        let index = SymbolIndex::new();
        index.update(
            FileId(9),
            FileKind::ScriptedEffects,
            vec![SymbolEntry::SavedScope {
                name: "chosen".into(),
                scope: ScopeType::Known(ScopeTable::builtin().scope_id("faith").unwrap()),
                location: Location {
                    file: FileId(9),
                    span: Span::default(),
                },
            }],
        );
        let table = ScopeTable::builtin();
        let mut tree = parse("e = { scope:chosen = { religion = { } } }").tree;
        let snapshot = index.snapshot();
        walk(&mut tree, &table, FILE, FileKind::ScriptedEffects, Some(snapshot.as_ref()), &WalkOptions::default());
        assert_eq!(scope_name(&tree, &table, "religion"), "religion");
    }

    #[test]
    fn test_invalid_link_marks_and_poisons_subtree() {
        let (tree, table) = walked(
            "e = { primary_title = { liege = { father = { add_gold = 1 } } } }",
            FileKind::ScriptedEffects,
        );
        let liege = tree.node(find(&tree, "liege"));
        assert_eq!(liege.annotation.scope, ScopeType::Unknown);
        assert!(matches!(
            &liege.annotation.mark.as_ref().unwrap().kind,
            MarkKind::InvalidLink { link, from } if link == "liege" && from == "landed_title"
        ));
        // below an unknown scope, a link with a single target is still followed
        assert_eq!(scope_name(&tree, &table, "father"), "character");
    }

    #[test]
    fn test_iterators_set_scope_and_timing() {
        let (tree, table) = walked(
            "e = { every_held_title = { limit = { any_county_province = { is_coastal = yes } } } }",
            FileKind::ScriptedEffects,
        );
        let every = tree.node(find(&tree, "every_held_title"));
        assert_eq!(table.describe(every.annotation.scope), "landed_title");
        assert_eq!(every.annotation.timing, Timing::Effect);
        let any = tree.node(find(&tree, "any_county_province"));
        assert_eq!(table.describe(any.annotation.scope), "province");
        assert_eq!(any.annotation.timing, Timing::Trigger);
        let leaf = tree.node(find(&tree, "is_coastal"));
        assert_eq!(table.describe(leaf.annotation.scope), "province");
        assert_eq!(leaf.annotation.timing, Timing::Trigger);
    }

    #[test]
    fn test_iterator_from_wrong_scope_is_marked() {
        let (tree, _) = walked("e = { primary_title = { every_vassal = { } } }", FileKind::ScriptedEffects);
        let node = tree.node(find(&tree, "every_vassal"));
        assert_eq!(node.annotation.scope, ScopeType::Unknown);
        assert!(node.annotation.mark.is_some());
    }

    #[test]
    fn test_chains_and_navigation() {
        let (tree, table) = walked(
            "e = { primary_title = { root.primary_title.holder = { prev = { } } root.nothing = { } } }",
            FileKind::ScriptedEffects,
        );
        assert_eq!(scope_name(&tree, &table, "root.primary_title.holder"), "character");
        assert_eq!(scope_name(&tree, &table, "prev"), "landed_title");
        let bad = tree.node(find(&tree, "root.nothing"));
        assert!(matches!(
            &bad.annotation.mark.as_ref().unwrap().kind,
            MarkKind::InvalidChain { segment } if segment == "nothing"
        ));
    }

    #[test]
    fn test_event_fields_are_arguments() {
        let (tree, table) = walked(
            "namespace = t\nt.1 = { type = letter_event title = t.1.t option = { name = t.1.a add_gold = 5 } immediate = { add_opinion = { target = root modifier = m } } }",
            FileKind::Events,
        );
        let title = tree.node(find(&tree, "title"));
        assert_eq!(title.annotation.role, Role::Argument);
        let name = tree.node(find(&tree, "name"));
        assert_eq!(name.annotation.role, Role::Argument);
        let gold = tree.node(find(&tree, "add_gold"));
        assert_eq!(gold.annotation.role, Role::Statement);
        assert_eq!(gold.annotation.timing, Timing::Effect);
        assert_eq!(table.describe(gold.annotation.scope), "character");
        let target = tree.node(find(&tree, "target"));
        assert_eq!(target.annotation.role, Role::Argument);
        assert!(target.annotation.mark.is_none());
    }

    #[test]
    fn test_value_references_are_checked() {
        let (tree, _) = walked(
            "e = { add_opinion = { target = scope:missing modifier = m } set_employer = root.bogus }",
            FileKind::ScriptedEffects,
        );
        let target = tree.node(find(&tree, "target"));
        assert!(matches!(
            &target.annotation.mark.as_ref().unwrap().kind,
            MarkKind::UnresolvedSavedScope { name } if name == "missing"
        ));
        let employer = tree.node(find(&tree, "set_employer"));
        assert!(employer.annotation.mark.is_some());
    }

    #[test]
    fn test_root_scope_override() {
        let table = ScopeTable::builtin();
        let province = table.scope_id("province").unwrap();
        let mut tree = parse("e = { county = { } }").tree;
        let opts = WalkOptions {
            root_scope: Some(province),
        };
        walk(&mut tree, &table, FILE, FileKind::ScriptedTriggers, None, &opts);
        assert_eq!(scope_name(&tree, &table, "county"), "landed_title");
        assert_eq!(tree.node(find(&tree, "e")).annotation.timing, Timing::Trigger);
    }
}
