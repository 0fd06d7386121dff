#[cfg(test)]
mod tests {
    use crate::token::{Op, Prefix};
    use crate::tree::{Literal, NodeId, NodeKind, TreeErrorKind, Value, parse};

    fn top_keys(src: &str) -> Vec<String> {
        let res = parse(src);
        res.tree
            .children(res.tree.root())
            .filter_map(|(_, n)| n.key_text().map(str::to_string))
            .collect()
    }

    #[test]
    fn test_basic_structure() {
        let res = parse("namespace = test\ntest.1 = { type = character_event option = { name = test.1.a } }\n");
        assert!(res.is_clean(), "{:?}", res.errors);
        let tree = &res.tree;
        let root: Vec<_> = tree.children(tree.root()).collect();
        assert_eq!(root.len(), 2);
        assert_eq!(root[0].1.kind, NodeKind::Assignment);
        assert_eq!(root[1].1.kind, NodeKind::Block);
        assert_eq!(root[1].1.key_text(), Some("test.1"));

        let option = tree.child_by_key(root[1].0, "option").unwrap();
        let name = tree.child_by_key(option, "name").unwrap();
        let value = tree.node(name).value.as_atom().unwrap();
        assert_eq!(value.text, "test.1.a");
        assert_eq!(tree.parent(name), Some(option));
    }

    #[test]
    fn test_root_span_covers_input() {
        for src in ["", "   ", "a = b", "a = { b = c", "}}}", "a = { # trailing\n", "\u{feff}x = 1\n\n"] {
            let res = parse(src);
            let root = res.tree.node(res.tree.root());
            assert_eq!(root.span.start.offset, 0, "input {src:?}");
            assert_eq!(root.span.end.offset, src.len(), "input {src:?}");
        }
    }

    #[test]
    fn test_parse_is_idempotent() {
        let src = "a = { b = yes c = { d } # x\n} e >= 3 f = \n} g = { h";
        assert_eq!(parse(src), parse(src));
    }

    #[test]
    fn test_spans_nest_and_do_not_overlap() {
        let res = parse("a = { b = 1 c = { d e } } f = g\nh = { i = j");
        let tree = &res.tree;
        for (id, node) in tree.iter() {
            let mut prev_end = node.span.start.offset;
            for (_, child) in tree.children(id) {
                assert!(node.span.contains(&child.span), "{id} does not contain child");
                assert!(child.span.start.offset >= prev_end, "siblings overlap under {id}");
                prev_end = child.span.end.offset;
            }
        }
    }

    #[test]
    fn test_extra_closing_brace() {
        let src = "foo = { bar }}";
        let res = parse(src);
        assert_eq!(res.errors.len(), 1);
        let err = &res.errors[0];
        assert_eq!(err.kind, TreeErrorKind::UnmatchedClose);
        assert_eq!(err.span.start.offset, src.rfind('}').unwrap());

        let tree = &res.tree;
        let foo = tree.child_by_key(tree.root(), "foo").unwrap();
        assert_eq!(tree.node(foo).span.end.offset, 13);
        let children: Vec<_> = tree.children(foo).collect();
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].1.kind, NodeKind::ListItem);
        assert_eq!(children[0].1.value.as_atom().unwrap().text, "bar");
    }

    #[test]
    fn test_single_unclosed_brace_is_repaired() {
        let src = "a = {\n  b = { c = 1 }\n  d = 2\n";
        let res = parse(src);
        assert_eq!(res.errors.len(), 1);
        assert_eq!(res.errors[0].kind, TreeErrorKind::UnclosedOpen);
        assert_eq!(res.errors[0].span.start.offset, 4);

        let tree = &res.tree;
        let a = tree.child_by_key(tree.root(), "a").unwrap();
        assert_eq!(tree.node(a).span.end.offset, src.len());
        assert!(tree.child_by_key(a, "d").is_some());
        for (_, node) in tree.iter() {
            assert!(node.span.start.offset <= node.span.end.offset);
        }
    }

    #[test]
    fn test_nested_unclosed_each_reported() {
        let res = parse("a = { b = { c = {");
        let unclosed: Vec<_> = res.errors.iter().filter(|e| e.kind == TreeErrorKind::UnclosedOpen).collect();
        assert_eq!(unclosed.len(), 3);
        assert!(unclosed.windows(2).all(|w| w[0].span.start.offset < w[1].span.start.offset));
    }

    #[test]
    fn test_missing_value_is_nil() {
        let res = parse("a = { b = }\nc =");
        let tree = &res.tree;
        let a = tree.child_by_key(tree.root(), "a").unwrap();
        let b = tree.child_by_key(a, "b").unwrap();
        assert_eq!(tree.node(b).value, Value::Nil);
        let c = tree.child_by_key(tree.root(), "c").unwrap();
        assert_eq!(tree.node(c).value, Value::Nil);
        assert!(res.is_clean());
    }

    #[test]
    fn test_stray_operator_and_unknown_char() {
        let res = parse("= 5\na = ;");
        let kinds: Vec<_> = res.errors.iter().map(|e| e.kind).collect();
        assert_eq!(kinds, vec![TreeErrorKind::StrayOperator, TreeErrorKind::UnexpectedChar]);
        // the `5` after the stray `=` survives as a list item
        let items: Vec<_> = res.tree.children(NodeId::ROOT).map(|(_, n)| n.kind).collect();
        assert_eq!(items, vec![NodeKind::ListItem, NodeKind::Assignment]);
    }

    #[test]
    fn test_prefix_forms_single_atom() {
        let res = parse("scope:target = { var:gold > 10 }");
        let tree = &res.tree;
        let (block_id, block) = tree.children(tree.root()).next().unwrap();
        let key = block.key.as_ref().unwrap();
        assert_eq!(key.prefix, Some(Prefix::Scope));
        assert_eq!(key.text, "target");
        assert_eq!(key.full_text(), "scope:target");
        assert_eq!(key.span.start.offset, 0);
        assert_eq!(key.span.end.offset, 12);

        let (_, cmp) = tree.children(block_id).next().unwrap();
        assert_eq!(cmp.op, Some(Op::Gt));
        assert_eq!(cmp.key.as_ref().unwrap().prefix, Some(Prefix::Var));
        assert_eq!(cmp.value.as_atom().unwrap().literal, Literal::Number);
    }

    #[test]
    fn test_comments_and_anonymous_blocks() {
        let res = parse("# header\nlist = { { a = 1 } { a = 2 } }");
        let tree = &res.tree;
        let first = tree.children(tree.root()).next().unwrap().1;
        assert_eq!(first.kind, NodeKind::Comment);
        assert_eq!(first.value.as_atom().unwrap().text, " header");
        let list = tree.child_by_key(tree.root(), "list").unwrap();
        let anon: Vec<_> = tree.children(list).filter(|(_, n)| n.key.is_none()).collect();
        assert_eq!(anon.len(), 2);
        assert!(anon.iter().all(|(_, n)| n.kind == NodeKind::Block));
    }

    #[test]
    fn test_node_at_offset() {
        let src = "a = { b = { c = 1 } }";
        let res = parse(src);
        let id = res.tree.node_at_offset(src.find('c').unwrap()).unwrap();
        assert_eq!(res.tree.node(id).key_text(), Some("c"));
        assert_eq!(res.tree.depth(id), 3);
    }

    #[test]
    fn test_many_unbalanced_braces_terminate() {
        let src = "{".repeat(5_000) + &"}".repeat(7_000);
        let res = parse(&src);
        let unmatched = res.errors.iter().filter(|e| e.kind == TreeErrorKind::UnmatchedClose).count();
        assert_eq!(unmatched, 2_000);
        assert_eq!(top_keys("x = 1 y = { }"), vec!["x", "y"]);
    }
}
