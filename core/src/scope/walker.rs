//! Single-pass scope inference over a parsed tree.
//!
//! The walk is an explicit-stack depth-first traversal in document order, so
//! every node is annotated exactly once and a subtree is finished before its
//! next sibling starts. Saved scopes declared by `save_scope_as` become visible
//! to later siblings of the declaration and their subtrees, for the rest of the
//! enclosing block. The index fallback only consults other files: this file's
//! own entries in the index describe an older version of the text.

use tracing::trace;

use crate::file::{FileId, FileKind};
use crate::index::{DefinitionKind, IndexState};
use crate::scope::{
    Annotation, IteratorKind, MarkKind, Role, ScopeId, ScopeMark, ScopeTable, ScopeType, Timing,
};
use crate::token::Prefix;
use crate::tree::{Atom, Literal, Node, NodeId, NodeKind, Tree};
use crate::util::fast_map::{FxHashMap, FxHashSet};

#[derive(Debug, Clone, Default)]
pub struct WalkOptions {
    /// Root scope for top-level definitions; the table's default when unset.
    pub root_scope: Option<ScopeId>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WalkSummary {
    pub visited: usize,
    pub marks: usize,
}

/// Annotate every node of `tree`, the text of `file`, in place.
pub fn walk(
    tree: &mut Tree,
    table: &ScopeTable,
    file: FileId,
    kind: FileKind,
    index: Option<&IndexState>,
    opts: &WalkOptions,
) -> WalkSummary {
    Walker::new(table, file, kind, index, opts).walk(tree)
}

/// Evaluation context handed from a block to its children.
#[derive(Debug, Clone, Copy)]
struct Ctx<'a> {
    scope: ScopeType,
    prev: ScopeType,
    root: ScopeType,
    timing: Timing,
    role: Role,
    // keys that are parameters of the enclosing construct
    fields: &'a [String],
    iterator: Option<IteratorKind>,
    event_body: bool,
    top_level: bool,
}

impl<'a> Ctx<'a> {
    /// Context for the children of a block evaluated in `scope`.
    fn enter(self, scope: ScopeType, timing: Timing) -> Ctx<'a> {
        Ctx {
            scope,
            prev: if scope != self.scope { self.scope } else { self.prev },
            root: self.root,
            timing,
            role: Role::Statement,
            fields: &[],
            iterator: None,
            event_body: false,
            top_level: false,
        }
    }

    fn arguments(self) -> Ctx<'a> {
        Ctx {
            role: Role::Argument,
            fields: &[],
            iterator: None,
            event_body: false,
            top_level: false,
            ..self
        }
    }

    fn annotation(&self, scope: ScopeType, timing: Timing, role: Role) -> Annotation {
        Annotation {
            scope,
            timing,
            role,
            mark: None,
        }
    }
}

struct Step<'a> {
    ann: Annotation,
    child: Ctx<'a>,
    // (name, scope) to register as a saved scope
    save: Option<(String, ScopeType)>,
}

pub struct Walker<'a> {
    table: &'a ScopeTable,
    file: FileId,
    kind: FileKind,
    index: Option<&'a IndexState>,
    root_scope: ScopeId,
    // saved scopes visible inside each block
    frames: FxHashMap<NodeId, FxHashMap<String, ScopeType>>,
    // callable definitions made by this file's own text
    local_defs: FxHashSet<String>,
}

impl<'a> Walker<'a> {
    pub fn new(
        table: &'a ScopeTable,
        file: FileId,
        kind: FileKind,
        index: Option<&'a IndexState>,
        opts: &WalkOptions,
    ) -> Self {
        Self {
            table,
            file,
            kind,
            index,
            root_scope: opts.root_scope.unwrap_or_else(|| table.default_root()),
            frames: FxHashMap::default(),
            local_defs: FxHashSet::default(),
        }
    }

    pub fn walk(mut self, tree: &mut Tree) -> WalkSummary {
        if DefinitionKind::for_file(self.kind).is_some_and(|k| k != DefinitionKind::Event) {
            self.local_defs = tree
                .node(NodeId::ROOT)
                .children
                .iter()
                .filter_map(|&c| tree.node(c).plain_key())
                .filter(|k| !k.starts_with('@'))
                .map(str::to_string)
                .collect();
        }

        let root = ScopeType::Known(self.root_scope);
        let ctx = Ctx {
            scope: root,
            prev: root,
            root,
            timing: self.kind.root_timing(),
            role: Role::Statement,
            fields: &[],
            iterator: None,
            event_body: false,
            top_level: true,
        };
        tree.node_mut(NodeId::ROOT).annotation = ctx.annotation(root, ctx.timing, Role::Statement);

        let mut summary = WalkSummary {
            visited: 1,
            marks: 0,
        };
        let mut stack: Vec<(NodeId, Ctx<'a>)> = tree.node(NodeId::ROOT).children.iter().rev().map(|&c| (c, ctx)).collect();

        while let Some((id, ctx)) = stack.pop() {
            let step = if ctx.top_level {
                self.top_level(tree, id, ctx)
            } else {
                self.classify(tree, id, ctx)
            };
            if let Some((name, scope)) = step.save {
                self.register(tree, id, name, scope);
            }
            if step.ann.mark.is_some() {
                summary.marks += 1;
            }
            let node = tree.node_mut(id);
            node.annotation = step.ann;
            summary.visited += 1;
            if node.kind == NodeKind::Block {
                stack.extend(node.children.iter().rev().map(|&c| (c, step.child)));
            }
        }

        trace!(visited = summary.visited, marks = summary.marks, "scope walk done");
        summary
    }

    fn top_level(&self, tree: &Tree, id: NodeId, ctx: Ctx<'a>) -> Step<'a> {
        let node = tree.node(id);
        if node.kind != NodeKind::Block {
            let mut ann = ctx.annotation(ctx.scope, Timing::Neutral, Role::Argument);
            ann.mark = self.value_mark(tree, id, node, ctx);
            return Step {
                ann,
                child: ctx.enter(ctx.scope, Timing::Neutral),
                save: None,
            };
        }

        let (scope, timing, event_body) = match self.kind {
            FileKind::Events => {
                let scope = tree
                    .child_by_key(id, "type")
                    .and_then(|t| tree.node(t).value.as_atom())
                    .and_then(|a| self.table.event_root(&a.text))
                    .unwrap_or(self.root_scope);
                (ScopeType::Known(scope), Timing::Neutral, true)
            }
            kind => (ScopeType::Known(self.root_scope), kind.root_timing(), false),
        };
        let mut child = Ctx {
            root: scope,
            ..ctx.enter(scope, timing)
        };
        child.prev = scope;
        child.event_body = event_body;
        Step {
            ann: ctx.annotation(scope, timing, Role::Statement),
            child,
            save: None,
        }
    }

    fn classify(&self, tree: &Tree, id: NodeId, ctx: Ctx<'a>) -> Step<'a> {
        let node = tree.node(id);
        let mut step = match node.key.as_ref() {
            None => Step {
                ann: ctx.annotation(ctx.scope, ctx.timing, ctx.role),
                child: Ctx { fields: &[], ..ctx },
                save: None,
            },
            Some(key) => self.classify_key(tree, id, node, key, ctx),
        };
        if step.ann.mark.is_none() {
            step.ann.mark = self.value_mark(tree, id, node, ctx);
        }
        step
    }

    fn classify_key(&self, tree: &Tree, id: NodeId, node: &Node, key: &Atom, ctx: Ctx<'a>) -> Step<'a> {
        let text = key.text.as_str();
        let table = self.table;
        let plain = key.prefix.is_none() && key.literal == Literal::Identifier;
        let keep = |ann: Annotation, child: Ctx<'a>| Step { ann, child, save: None };

        if plain && self.is_parameter(text, ctx) {
            return keep(ctx.annotation(ctx.scope, ctx.timing, Role::Argument), ctx.arguments());
        }
        if plain {
            if let Some(def) = table.block(text) {
                let timing = def.timing(ctx.timing);
                let child = Ctx {
                    fields: &def.fields,
                    ..ctx.enter(ctx.scope, timing)
                };
                return keep(ctx.annotation(ctx.scope, timing, Role::Statement), child);
            }
        }
        if ctx.role == Role::Argument {
            return keep(ctx.annotation(ctx.scope, ctx.timing, Role::Argument), ctx.arguments());
        }

        match key.prefix {
            Some(Prefix::Scope) => {
                let (scope, mark) = match self.resolve_saved(tree, id, text, ctx) {
                    Ok(scope) => (scope, None),
                    Err(kind) => (ScopeType::Unknown, Some(kind)),
                };
                let mut ann = ctx.annotation(scope, ctx.timing, Role::Statement);
                ann.mark = mark.map(|kind| ScopeMark { kind, span: key.span });
                return keep(ann, ctx.enter(scope, ctx.timing));
            }
            Some(_) => {
                return keep(
                    ctx.annotation(ctx.scope, ctx.timing, Role::Statement),
                    ctx.enter(ctx.scope, ctx.timing),
                );
            }
            None => {}
        }
        if !plain {
            // Numeric or quoted keys, e.g. `random_list` weights.
            return keep(ctx.annotation(ctx.scope, ctx.timing, ctx.role), Ctx { fields: &[], ..ctx });
        }

        if self.is_chain(text) {
            let segments: Vec<&str> = text.split('.').collect();
            let (scope, mark) = match self.resolve_chain(&segments, ctx.scope, ctx) {
                Ok(scope) => (scope, None),
                Err(kind) => (ScopeType::Unknown, Some(kind)),
            };
            let mut ann = ctx.annotation(scope, ctx.timing, Role::Statement);
            ann.mark = mark.map(|kind| ScopeMark { kind, span: key.span });
            return keep(ann, ctx.enter(scope, ctx.timing));
        }

        if let Some(target) = ctx.scope.known().and_then(|s| table.link(s, text)) {
            let scope = ScopeType::Known(target);
            return keep(ctx.annotation(scope, ctx.timing, Role::Statement), ctx.enter(scope, ctx.timing));
        }

        if let Some((iter_kind, list)) = table.iterator(text) {
            let timing = iter_kind.timing();
            let (scope, mark) = match ctx.scope.known() {
                Some(from) if !list.iterable_from(from) => (
                    ScopeType::Unknown,
                    Some(MarkKind::InvalidLink {
                        link: text.to_string(),
                        from: table.scope_name(from).to_string(),
                    }),
                ),
                _ => (ScopeType::Known(list.to), None),
            };
            let mut ann = ctx.annotation(scope, timing, Role::Statement);
            ann.mark = mark.map(|kind| ScopeMark { kind, span: key.span });
            let child = Ctx {
                iterator: Some(iter_kind),
                ..ctx.enter(scope, timing)
            };
            return keep(ann, child);
        }

        if table.is_link(text) {
            let (scope, mark) = match ctx.scope.known() {
                Some(from) => (
                    ScopeType::Unknown,
                    Some(MarkKind::InvalidLink {
                        link: text.to_string(),
                        from: table.scope_name(from).to_string(),
                    }),
                ),
                None => (self.unique_link_target(text), None),
            };
            let mut ann = ctx.annotation(scope, ctx.timing, Role::Statement);
            ann.mark = mark.map(|kind| ScopeMark { kind, span: key.span });
            return keep(ann, ctx.enter(scope, ctx.timing));
        }

        if let Some(entry) = table.vocab(text, ctx.timing) {
            let save = if table.is_saved_scope_effect(text) {
                node.value.as_atom().map(|v| (v.text.clone(), ctx.scope))
            } else if table.is_saved_value_effect(text) {
                tree.child_by_key(id, "name")
                    .and_then(|n| tree.node(n).value.as_atom())
                    .map(|v| (v.text.clone(), ScopeType::Unknown))
            } else {
                None
            };
            let child = Ctx {
                fields: &entry.args,
                ..ctx.arguments()
            };
            return Step {
                ann: ctx.annotation(ctx.scope, ctx.timing, Role::Statement),
                child,
                save,
            };
        }

        let defined = self.local_defs.contains(text)
            || self
                .index
                .and_then(|ix| ix.definition_from_other_files(text, self.file))
                .is_some_and(|(def_kind, _)| def_kind != DefinitionKind::Event);
        if defined {
            return keep(ctx.annotation(ctx.scope, ctx.timing, Role::Statement), ctx.arguments());
        }

        // Unrecognized: blocks lose their scope, leaves keep the current one.
        let scope = if node.kind == NodeKind::Block {
            ScopeType::Unknown
        } else {
            ctx.scope
        };
        keep(ctx.annotation(scope, ctx.timing, Role::Statement), ctx.enter(scope, ctx.timing))
    }

    fn is_parameter(&self, key: &str, ctx: Ctx<'a>) -> bool {
        ctx.fields.iter().any(|f| f == key)
            || (ctx.event_body && self.table.is_event_field(key))
            || (ctx.iterator.is_some() && IteratorKind::owner_of(key).is_some())
    }

    /// Keys that are navigation chains: `root`, `root.liege`, `title:k_x.holder`, `liege.father`.
    fn is_chain(&self, text: &str) -> bool {
        let first = text.split('.').next().unwrap_or(text);
        self.table.is_navigation(first)
            || self.table.typed_target(first).is_some()
            || (text.contains('.') && self.table.is_link(first))
    }

    fn unique_link_target(&self, token: &str) -> ScopeType {
        match self.table.link_targets(token) {
            [only] => ScopeType::Known(*only),
            _ => ScopeType::Unknown,
        }
    }

    fn resolve_chain(&self, segments: &[&str], start: ScopeType, ctx: Ctx<'a>) -> Result<ScopeType, MarkKind> {
        let table = self.table;
        let mut cur = start;
        let mut prev = if start == ctx.scope { ctx.prev } else { ctx.scope };
        for &seg in segments {
            let next = match seg {
                "this" => cur,
                "root" => ctx.root,
                "prev" => prev,
                "from" | "fromfrom" => ScopeType::Unknown,
                _ => {
                    if let Some(target) = table.typed_target(seg) {
                        ScopeType::Known(target)
                    } else if let Some(from) = cur.known() {
                        match table.link(from, seg) {
                            Some(target) => ScopeType::Known(target),
                            None if table.is_link(seg) => {
                                return Err(MarkKind::InvalidLink {
                                    link: seg.to_string(),
                                    from: table.scope_name(from).to_string(),
                                });
                            }
                            None => return Err(MarkKind::InvalidChain { segment: seg.to_string() }),
                        }
                    } else if table.is_link(seg) {
                        self.unique_link_target(seg)
                    } else {
                        return Err(MarkKind::InvalidChain { segment: seg.to_string() });
                    }
                }
            };
            prev = cur;
            cur = next;
        }
        Ok(cur)
    }

    /// `scope:name` or `scope:name.link...`.
    fn resolve_saved(&self, tree: &Tree, id: NodeId, text: &str, ctx: Ctx<'a>) -> Result<ScopeType, MarkKind> {
        let mut segments = text.split('.');
        let name = segments.next().unwrap_or("");
        let rest: Vec<&str> = segments.collect();
        let base = self.lookup_saved(tree, id, name).ok_or_else(|| MarkKind::UnresolvedSavedScope {
            name: name.to_string(),
        })?;
        if rest.is_empty() {
            return Ok(base);
        }
        self.resolve_chain(&rest, base, ctx)
    }

    fn lookup_saved(&self, tree: &Tree, id: NodeId, name: &str) -> Option<ScopeType> {
        if name.is_empty() || name.contains('$') {
            // Bare `scope:` mid-edit, or a parameter filled in at call time.
            return Some(ScopeType::Unknown);
        }
        tree.ancestors(id)
            .find_map(|a| self.frames.get(&a).and_then(|f| f.get(name)).copied())
            .or_else(|| self.index.and_then(|ix| ix.saved_scope_from_other_files(name, self.file)))
    }

    /// Record a saved scope in the frame of the block holding the declaration.
    fn register(&mut self, tree: &Tree, id: NodeId, name: String, scope: ScopeType) {
        if let Some(block) = tree.parent(id).filter(|&p| p != NodeId::ROOT) {
            self.frames.entry(block).or_default().insert(name, scope);
        }
    }

    /// Mark for a scalar value that refers to a scope: `scope:x` or `root.liege`.
    fn value_mark(&self, tree: &Tree, id: NodeId, node: &Node, ctx: Ctx<'a>) -> Option<ScopeMark> {
        let value = node.value.as_atom()?;
        let result = match value.prefix {
            Some(Prefix::Scope) => self.resolve_saved(tree, id, &value.text, ctx),
            None if value.literal == Literal::Identifier => {
                let first = value.text.split('.').next().unwrap_or("");
                if !(self.table.is_navigation(first) || self.table.typed_target(first).is_some()) {
                    return None;
                }
                let segments: Vec<&str> = value.text.split('.').collect();
                self.resolve_chain(&segments, ctx.scope, ctx)
            }
            _ => return None,
        };
        result.err().map(|kind| ScopeMark {
            kind,
            span: value.span,
        })
    }
}
