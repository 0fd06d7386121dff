#[cfg(test)]
mod tests {
    use crate::diag::{Code, Diagnostic, DiagnosticsEngine, Severity, ValidationContext, Validator};
    use crate::file::{FileId, FileKind};
    use crate::index::SymbolIndex;
    use crate::scope::{ScopeTable, WalkOptions, walk};
    use crate::token::Span;
    use crate::tree::parse;

    const CHECKED: FileId = FileId(100);

    fn check_with(index: &SymbolIndex, engine: &DiagnosticsEngine, src: &str, kind: FileKind) -> Vec<Diagnostic> {
        let table = ScopeTable::builtin();
        let snapshot = index.snapshot();
        let parsed = parse(src);
        let mut tree = parsed.tree;
        walk(&mut tree, &table, CHECKED, kind, Some(snapshot.as_ref()), &WalkOptions::default());
        let cx = ValidationContext {
            tree: &tree,
            table: &table,
            index: &snapshot,
            file: CHECKED,
            kind,
        };
        engine.run(&parsed.errors, &cx)
    }

    fn check(src: &str, kind: FileKind) -> Vec<Diagnostic> {
        check_with(&SymbolIndex::new(), &DiagnosticsEngine::new(), src, kind)
    }

    fn index_script(index: &SymbolIndex, file: FileId, kind: FileKind, src: &str) {
        let table = ScopeTable::builtin();
        let mut tree = parse(src).tree;
        walk(&mut tree, &table, file, kind, None, &WalkOptions::default());
        index.update_tree(file, kind, &tree, &table);
    }

    fn with_code(diags: &[Diagnostic], code: Code) -> Vec<&Diagnostic> {
        diags.iter().filter(|d| d.code == code).collect()
    }

    #[test]
    fn test_declared_saved_scope_has_no_reference_errors() {
        let diags = check(
            "my_effect = {\n\tsave_scope_as = hero\n\tscope:hero = { add_gold = 1 }\n}\n",
            FileKind::ScriptedEffects,
        );
        assert!(
            diags.iter().all(|d| !d.code.as_str().starts_with("REF")),
            "{diags:?}"
        );
    }

    #[test]
    fn test_unknown_saved_scope_reported_once_at_reference() {
        let diags = check(
            "my_effect = {\n\tscope:unknownname = { add_gold = 1 }\n}\n",
            FileKind::ScriptedEffects,
        );
        let refs = with_code(&diags, Code::UndefinedSavedScope);
        assert_eq!(refs.len(), 1, "{diags:?}");
        assert_eq!(refs[0].span.start.line, 2);
        assert_eq!(refs[0].span.start.offset, 15);
        assert_eq!(refs[0].span.end.offset, 32);
        assert_eq!(refs[0].severity, Severity::Error);
        assert_eq!(refs[0].message, "undefined saved scope `scope:unknownname`");
    }

    #[test]
    fn test_syntax_errors_come_first_wave() {
        let parsed = parse("a = { b = 1 }}");
        let diags = DiagnosticsEngine::syntax(&parsed.errors);
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].code, Code::UnmatchedClose);
        assert_eq!(diags[0].span.start.offset, 13);
    }

    #[test]
    fn test_invalid_link_reported_once() {
        let diags = check(
            "e = { primary_title = { father = { add_gold = 1 } } }",
            FileKind::ScriptedEffects,
        );
        let scp = with_code(&diags, Code::InvalidTransition);
        assert_eq!(scp.len(), 1, "{diags:?}");
        assert!(scp[0].message.contains("`father`"));
        assert!(scp[0].message.contains("landed_title"));
        assert!(diags.iter().all(|d| !d.code.as_str().starts_with("VOC")), "{diags:?}");
    }

    #[test]
    fn test_unknown_key_suggests_closest() {
        let diags = check("e = { add_glod = 100 }", FileKind::ScriptedEffects);
        let voc = with_code(&diags, Code::UnknownKey);
        assert_eq!(voc.len(), 1, "{diags:?}");
        assert_eq!(voc[0].message, "unknown key `add_glod`; did you mean `add_gold`?");
        assert_eq!(voc[0].severity, Severity::Warning);
    }

    #[test]
    fn test_golden_rule() {
        let diags = check("t = { add_gold = 5 }", FileKind::ScriptedTriggers);
        assert_eq!(with_code(&diags, Code::EffectInTrigger).len(), 1, "{diags:?}");

        let diags = check("e = { is_alive = yes }", FileKind::ScriptedEffects);
        assert_eq!(with_code(&diags, Code::TriggerInEffect).len(), 1, "{diags:?}");

        let diags = check(
            "e = { if = { limit = { is_alive = yes } add_gold = 1 } }",
            FileKind::ScriptedEffects,
        );
        assert!(diags.is_empty(), "{diags:?}");
    }

    #[test]
    fn test_vocabulary_in_wrong_scope() {
        let diags = check("e = { primary_title = { add_gold = 1 } }", FileKind::ScriptedEffects);
        let wrong = with_code(&diags, Code::WrongScope);
        assert_eq!(wrong.len(), 1, "{diags:?}");
        assert_eq!(wrong[0].message, "`add_gold` is not valid in `landed_title` scope");
    }

    #[test]
    fn test_variables() {
        let diags = check(
            "e = {\n set_variable = { name = stash value = 5 }\n if = { limit = { var:stash > 1 } add_gold = var:missing }\n}",
            FileKind::ScriptedEffects,
        );
        let vars = with_code(&diags, Code::UndefinedVariable);
        assert_eq!(vars.len(), 1, "{diags:?}");
        assert_eq!(vars[0].message, "undefined variable `var:missing`");

        let index = SymbolIndex::new();
        index_script(&index, FileId(1), FileKind::ScriptedEffects, "mark = { set_global_variable = flagged }");
        let diags = check_with(
            &index,
            &DiagnosticsEngine::new(),
            "t = { global_var:flagged = yes }",
            FileKind::ScriptedTriggers,
        );
        assert!(with_code(&diags, Code::UndefinedVariable).is_empty(), "{diags:?}");
    }

    #[test]
    fn test_iterator_parameters() {
        let diags = check(
            "e = {\n every_vassal = { count = 2 add_gold = 1 }\n ordered_vassal = { add_gold = 1 }\n}",
            FileKind::ScriptedEffects,
        );
        let params = with_code(&diags, Code::InvalidIteratorParam);
        assert_eq!(params.len(), 1, "{diags:?}");
        assert_eq!(params[0].message, "`count` is not valid for `every_vassal`");
        let order = with_code(&diags, Code::MissingOrderBy);
        assert_eq!(order.len(), 1);
        assert_eq!(order[0].span.start.line, 3);
    }

    #[test]
    fn test_event_structure() {
        let src = "namespace = test\n\
                   test.1 = {\n type = character_event\n hidden = yes\n option = { name = test.1.a }\n}\n\
                   other.2 = {\n type = character_event\n title = other.2.t\n option = { add_gold = 1 }\n}\n";
        let diags = check(src, FileKind::Events);
        assert_eq!(with_code(&diags, Code::HiddenEventOptions).len(), 1, "{diags:?}");
        let mismatch = with_code(&diags, Code::EventNamespaceMismatch);
        assert_eq!(mismatch.len(), 1);
        assert!(mismatch[0].message.contains("other.2"));
        let missing = with_code(&diags, Code::MissingEventField);
        assert_eq!(missing.len(), 1);
        assert!(missing[0].message.contains("`desc`"));
        assert_eq!(with_code(&diags, Code::OptionWithoutName).len(), 1);
        assert!(with_code(&diags, Code::MissingNamespace).is_empty());
    }

    #[test]
    fn test_events_file_without_namespace() {
        let diags = check(
            "a.1 = { type = character_event title = t desc = d }",
            FileKind::Events,
        );
        let missing = with_code(&diags, Code::MissingNamespace);
        assert_eq!(missing.len(), 1, "{diags:?}");
        assert_eq!(missing[0].span.start.offset, 0);
    }

    #[test]
    fn test_trigger_event_targets() {
        let src = "namespace = ns\n\
                   ns.1 = {\n type = character_event\n title = t\n desc = d\n immediate = {\n  trigger_event = ns.2\n  trigger_event = { id = ns.1 days = 3 }\n }\n}\n";
        let diags = check(src, FileKind::Events);
        let undefined = with_code(&diags, Code::UndefinedEvent);
        assert_eq!(undefined.len(), 1, "{diags:?}");
        assert_eq!(undefined[0].message, "undefined event `ns.2`");

        let index = SymbolIndex::new();
        index_script(
            &index,
            FileId(1),
            FileKind::Events,
            "namespace = ns\nns.2 = { type = character_event title = t desc = d }",
        );
        let diags = check_with(&index, &DiagnosticsEngine::new(), src, FileKind::Events);
        assert!(with_code(&diags, Code::UndefinedEvent).is_empty(), "{diags:?}");
    }

    #[test]
    fn test_scripted_call_arguments() {
        let index = SymbolIndex::new();
        index_script(&index, FileId(1), FileKind::ScriptedEffects, "give = { add_gold = $AMOUNT$ }");
        let diags = check_with(
            &index,
            &DiagnosticsEngine::new(),
            "e = {\n give = { AMOUNT = 5 EXTRA = 1 }\n give = yes\n}",
            FileKind::ScriptedEffects,
        );
        let unknown = with_code(&diags, Code::UnknownArgument);
        assert_eq!(unknown.len(), 1, "{diags:?}");
        assert_eq!(unknown[0].message, "`give` has no parameter `EXTRA`");
        let missing = with_code(&diags, Code::MissingArgument);
        assert_eq!(missing.len(), 1);
        assert_eq!(missing[0].span.start.line, 3);
        assert!(with_code(&diags, Code::UnknownKey).is_empty());
    }

    #[test]
    fn test_duplicate_definitions() {
        let index = SymbolIndex::new();
        index_script(&index, FileId(1), FileKind::ScriptedTriggers, "dup = { is_alive = yes }");
        let diags = check_with(
            &index,
            &DiagnosticsEngine::new(),
            "dup = { is_adult = yes }\nsolo = { is_ai = yes }\nsolo = { is_ai = no }",
            FileKind::ScriptedTriggers,
        );
        let dups = with_code(&diags, Code::DuplicateDefinition);
        assert_eq!(dups.len(), 2, "{diags:?}");
        assert_eq!(dups[0].message, "`dup` is defined more than once");
        assert_eq!(dups[1].span.start.line, 3);
    }

    #[test]
    fn test_localization_only_when_indexed() {
        let src = "namespace = ev\nev.1 = { type = character_event title = ev.1.t desc = ev.1.d option = { name = ev.1.a } }";
        let diags = check(src, FileKind::Events);
        assert!(with_code(&diags, Code::MissingLocalization).is_empty());

        let index = SymbolIndex::new();
        index.update_localization(FileId(9), "l_english:\n ev.1.t:0 \"Title\"\n");
        let diags = check_with(&index, &DiagnosticsEngine::new(), src, FileKind::Events);
        let missing: Vec<&str> = with_code(&diags, Code::MissingLocalization)
            .iter()
            .map(|d| d.message.as_str())
            .collect();
        assert_eq!(
            missing,
            vec!["missing localization key `ev.1.d`", "missing localization key `ev.1.a`"]
        );
    }

    #[test]
    fn test_style_hints() {
        let src = "e = {\n\
                   if = { limit = { AND = { is_alive = yes } NOT = { NOT = { is_adult = yes } } } add_gold = 1 }\n\
                   else_if = { add_gold = 2 }\n\
                   random = { }\n}";
        let diags = check(src, FileKind::ScriptedEffects);
        assert_eq!(with_code(&diags, Code::RedundantAnd).len(), 1, "{diags:?}");
        assert_eq!(with_code(&diags, Code::DoubleNegation).len(), 1);
        let no_limit = with_code(&diags, Code::IfWithoutLimit);
        assert_eq!(no_limit.len(), 1);
        assert_eq!(no_limit[0].message, "`else_if` without `limit`");
        let empty = with_code(&diags, Code::EmptyBlock);
        assert_eq!(empty.len(), 1);
        assert_eq!(empty[0].severity, Severity::Hint);
    }

    #[test]
    fn test_output_is_sorted_and_deterministic() {
        let src = "e = { add_glod = 1 scope:nope = { } is_alive = yes primary_title = { father = { } } }}";
        let first = check(src, FileKind::ScriptedEffects);
        let second = check(src, FileKind::ScriptedEffects);
        assert_eq!(first, second);
        assert!(first.len() >= 4);
        assert!(first.windows(2).all(|w| w[0].sort_key() <= w[1].sort_key()));
    }

    struct Failing;
    struct Panicking;
    struct Fixed;

    impl Validator for Failing {
        fn name(&self) -> &'static str {
            "failing"
        }
        fn validate(&self, _: &ValidationContext<'_>) -> anyhow::Result<Vec<Diagnostic>> {
            anyhow::bail!("broken rule data")
        }
    }

    impl Validator for Panicking {
        fn name(&self) -> &'static str {
            "panicking"
        }
        fn validate(&self, _: &ValidationContext<'_>) -> anyhow::Result<Vec<Diagnostic>> {
            panic!("validator bug")
        }
    }

    impl Validator for Fixed {
        fn name(&self) -> &'static str {
            "fixed"
        }
        fn validate(&self, cx: &ValidationContext<'_>) -> anyhow::Result<Vec<Diagnostic>> {
            Ok(vec![Diagnostic::new(Code::EmptyBlock, cx.tree.node(cx.tree.root()).span, &[("key", "x")])])
        }
    }

    #[test]
    fn test_failing_validators_are_isolated() {
        let engine = DiagnosticsEngine::with_validators(vec![Box::new(Failing), Box::new(Panicking), Box::new(Fixed)]);
        assert_eq!(engine.validator_names(), vec!["failing", "panicking", "fixed"]);
        let diags = check_with(&SymbolIndex::new(), &engine, "a = { }", FileKind::Other);
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].code, Code::EmptyBlock);
    }

    #[test]
    fn test_builtin_order() {
        assert_eq!(
            DiagnosticsEngine::new().validator_names(),
            vec![
                "scope_chain",
                "vocabulary",
                "variables",
                "list_iterators",
                "events",
                "scripted_blocks",
                "localization",
                "style"
            ]
        );
    }

    #[test]
    fn test_codes_are_stable() {
        for code in Code::ALL {
            assert_eq!(Code::parse(code.as_str()), Some(*code));
        }
        assert_eq!(Code::ALL.len(), 27);
        assert_eq!(Code::UnmatchedClose.as_str(), "SYN001");
        assert_eq!(Code::IfWithoutLimit.severity(), Severity::Warning);
        assert_eq!(Code::parse("XYZ999"), None);

        let d = Diagnostic::new(Code::InvalidTransition, Span::default(), &[("link", "father"), ("from", "here")]);
        assert_eq!(d.message, "`father` is not a valid scope transition from here");
        let json = serde_json::to_value(&d).unwrap();
        assert_eq!(json["code"], "SCP001");
        assert_eq!(json["severity"], "error");
    }
}
