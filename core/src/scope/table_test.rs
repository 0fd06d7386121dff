#[cfg(test)]
mod tests {
    use crate::scope::{IteratorKind, ScopeTable, Timing, VariableKind, VocabKind};

    #[test]
    fn test_builtin_table_loads() {
        let table = ScopeTable::builtin();
        let character = table.scope_id("character").unwrap();
        assert_eq!(table.default_root(), character);
        assert_eq!(table.scope_name(character), "character");
        assert!(table.scopes().count() > 5);
        // the fallback table has a single scope, so this also proves the yaml parsed
        assert!(table.scope_id("landed_title").is_some());
    }

    #[test]
    fn test_links_and_targets() {
        let table = ScopeTable::builtin();
        let character = table.scope_id("character").unwrap();
        let title = table.scope_id("landed_title").unwrap();
        assert_eq!(table.link(character, "primary_title"), Some(title));
        assert_eq!(table.link(title, "holder"), Some(character));
        assert_eq!(table.link(title, "liege"), None);
        assert!(table.is_link("liege"));
        assert_eq!(table.link_targets("holder"), &[character]);
        assert_eq!(table.typed_target("title:k_france"), Some(title));
        assert_eq!(table.typed_target("title:"), None);
        assert!(table.is_navigation("root"));
    }

    #[test]
    fn test_vocab_lookup_by_timing() {
        let table = ScopeTable::builtin();
        let character = table.scope_id("character").unwrap();
        let province = table.scope_id("province").unwrap();

        let gold = table.vocab("add_gold", Timing::Effect).unwrap();
        assert_eq!(gold.kind, VocabKind::Effect);
        assert!(gold.valid_in(character));
        assert!(!gold.valid_in(province));
        assert!(table.scope(character).valid_effects.contains("add_gold"));
        assert!(!table.scope(province).valid_effects.contains("add_gold"));

        // save_temporary_scope_as is both; the context picks the kind
        assert_eq!(
            table.vocab("save_temporary_scope_as", Timing::Trigger).unwrap().kind,
            VocabKind::Trigger
        );
        assert_eq!(
            table.vocab("save_temporary_scope_as", Timing::Effect).unwrap().kind,
            VocabKind::Effect
        );
        assert!(table.trigger("exists").unwrap().valid_in(province));
    }

    #[test]
    fn test_blocks_and_iterators() {
        let table = ScopeTable::builtin();
        assert_eq!(table.block("limit").unwrap().timing(Timing::Effect), Timing::Trigger);
        assert_eq!(table.block("if").unwrap().timing(Timing::Effect), Timing::Effect);
        assert_eq!(table.block("if").unwrap().timing(Timing::Trigger), Timing::Trigger);
        assert!(table.block("option").unwrap().has_field("name"));

        let (kind, list) = table.iterator("every_vassal").unwrap();
        assert_eq!(kind, IteratorKind::Every);
        assert_eq!(list.name, "vassal");
        assert_eq!(kind.timing(), Timing::Effect);
        assert_eq!(table.iterator("any_child").unwrap().0.timing(), Timing::Trigger);
        assert!(table.iterator("any_nothing").is_none());
        assert_eq!(IteratorKind::owner_of("order_by"), Some(IteratorKind::Ordered));
        assert_eq!(IteratorKind::owner_of("limit"), None);
    }

    #[test]
    fn test_declaration_effects() {
        let table = ScopeTable::builtin();
        assert!(table.is_saved_scope_effect("save_scope_as"));
        assert_eq!(table.variable_effect("set_local_variable"), Some(VariableKind::LocalVar));
        assert_eq!(table.event_root("letter_event"), table.scope_id("character"));
        assert!(table.is_event_field("title"));
    }

    #[test]
    fn test_suggestions() {
        let table = ScopeTable::builtin();
        assert_eq!(table.suggest("add_glod").as_deref(), Some("add_gold"));
        assert_eq!(table.suggest("every_vasal").as_deref(), Some("every_vassal"));
        assert_eq!(table.suggest("qqqqqqqqqq"), None);
    }

    #[test]
    fn test_custom_table_from_yaml() {
        let table = ScopeTable::from_yaml_str(
            r#"
default_root: a
scopes:
  a:
    links: { b: x }
  x: {}
effects:
  do_thing: { scopes: [x] }
"#,
        )
        .unwrap();
        let a = table.scope_id("a").unwrap();
        let x = table.scope_id("x").unwrap();
        assert_eq!(table.link(a, "b"), Some(x));
        assert!(table.effect("do_thing").unwrap().valid_in(x));
    }

    #[test]
    fn test_bad_yaml_reports_context() {
        let err = ScopeTable::from_yaml_str("default_root: a\nscopes:\n  a:\n    links: { b: nowhere }\n").unwrap_err();
        assert!(format!("{err:#}").contains("unknown scope `nowhere`"));

        let err = ScopeTable::from_yaml_str("scopes: [").unwrap_err();
        assert!(format!("{err:#}").contains("invalid vocabulary yaml"));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vocab.yml");
        std::fs::write(&path, "default_root: c\nscopes:\n  c: {}\n").unwrap();
        let table = ScopeTable::from_yaml_file(&path).unwrap();
        assert_eq!(table.scope_name(table.default_root()), "c");
        assert!(ScopeTable::from_yaml_file(&dir.path().join("missing.yml")).is_err());
    }
}
