//! Arena-backed syntax tree.
//!
//! Nodes live in a flat `Vec` and refer to each other by [`NodeId`]. A node owns
//! its children list; the `parent` field is a plain index used for upward
//! lookups only. Arena order is pre-order: a parent is always allocated before
//! its children, and earlier siblings before later ones.

mod parser;

#[cfg(test)]
mod parser_test;

use std::borrow::Cow;
use std::fmt;

use serde::Serialize;

use crate::scope::Annotation;
use crate::token::{Op, Prefix, Span};

pub use parser::{Parser, parse};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct NodeId(pub u32);

impl NodeId {
    pub const ROOT: NodeId = NodeId(0);

    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum NodeKind {
    Block,
    Assignment,
    ListItem,
    Comment,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Literal {
    Identifier,
    Number,
    Str,
}

/// A key or scalar value. `text` excludes the prefix, if any.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Atom {
    pub text: String,
    pub prefix: Option<Prefix>,
    pub literal: Literal,
    pub span: Span,
}

impl Atom {
    pub fn full_text(&self) -> Cow<'_, str> {
        match self.prefix {
            Some(p) => Cow::Owned(format!("{}{}", p.as_str(), self.text)),
            None => Cow::Borrowed(&self.text),
        }
    }

    /// Plain identifier with no prefix, the shape vocabulary keys take.
    pub fn as_plain_ident(&self) -> Option<&str> {
        match (self.prefix, self.literal) {
            (None, Literal::Identifier) => Some(&self.text),
            _ => None,
        }
    }

    pub fn is_yes(&self) -> bool {
        self.prefix.is_none() && self.text == "yes"
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Value {
    /// Blocks and comments carry no scalar value.
    None,
    Scalar(Atom),
    /// An operator with nothing after it, e.g. `key =` mid-edit.
    Nil,
}

impl Value {
    pub fn as_atom(&self) -> Option<&Atom> {
        match self {
            Value::Scalar(atom) => Some(atom),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Node {
    pub kind: NodeKind,
    pub key: Option<Atom>,
    pub op: Option<Op>,
    pub value: Value,
    pub span: Span,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    pub annotation: Annotation,
}

impl Node {
    pub fn key_text(&self) -> Option<&str> {
        self.key.as_ref().map(|k| k.text.as_str())
    }

    /// Key as a plain identifier (no prefix, not a number or string).
    pub fn plain_key(&self) -> Option<&str> {
        self.key.as_ref().and_then(Atom::as_plain_ident)
    }

    pub fn is_block(&self) -> bool {
        self.kind == NodeKind::Block
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum TreeErrorKind {
    UnmatchedClose,
    UnclosedOpen,
    StrayOperator,
    UnexpectedChar,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TreeError {
    pub kind: TreeErrorKind,
    pub span: Span,
    /// Offending text, when there is one worth reporting.
    pub text: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParseResult {
    pub tree: Tree,
    pub errors: Vec<TreeError>,
}

impl ParseResult {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Tree {
    nodes: Vec<Node>,
}

impl Tree {
    pub(crate) fn with_root(span: Span) -> Self {
        Self {
            nodes: vec![Node {
                kind: NodeKind::Block,
                key: None,
                op: None,
                value: Value::None,
                span,
                parent: None,
                children: Vec::new(),
                annotation: Annotation::default(),
            }],
        }
    }

    pub fn root(&self) -> NodeId {
        NodeId::ROOT
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 1
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.index()]
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.index())
    }

    /// All nodes in pre-order, root first.
    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.nodes.iter().enumerate().map(|(i, n)| (NodeId(i as u32), n))
    }

    pub fn children(&self, id: NodeId) -> impl Iterator<Item = (NodeId, &Node)> {
        self.node(id).children.iter().map(move |&c| (c, self.node(c)))
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).parent
    }

    /// Strict ancestors, nearest first.
    pub fn ancestors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(self.parent(id), move |&p| self.parent(p))
    }

    /// Number of blocks between `id` and the root (top-level nodes have depth 1).
    pub fn depth(&self, id: NodeId) -> usize {
        self.ancestors(id).count()
    }

    pub fn is_top_level(&self, id: NodeId) -> bool {
        self.parent(id) == Some(NodeId::ROOT)
    }

    /// First child whose plain key equals `key`.
    pub fn child_by_key(&self, id: NodeId, key: &str) -> Option<NodeId> {
        self.children(id)
            .find(|(_, n)| n.key_text() == Some(key) && n.key.as_ref().is_some_and(|k| k.prefix.is_none()))
            .map(|(c, _)| c)
    }

    /// Children that are not comments.
    pub fn statements(&self, id: NodeId) -> impl Iterator<Item = (NodeId, &Node)> {
        self.children(id).filter(|(_, n)| n.kind != NodeKind::Comment)
    }

    /// Pre-order ids of `id`'s subtree, `id` included.
    pub fn subtree(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(cur) = stack.pop() {
            out.push(cur);
            stack.extend(self.node(cur).children.iter().rev().copied());
        }
        out
    }

    /// Innermost node whose span contains `offset`.
    pub fn node_at_offset(&self, offset: usize) -> Option<NodeId> {
        let mut cur = self.root();
        if !self.node(cur).span.contains_offset(offset) {
            return None;
        }
        loop {
            let next = self
                .node(cur)
                .children
                .iter()
                .copied()
                .find(|&c| self.node(c).span.contains_offset(offset));
            match next {
                Some(c) => cur = c,
                None => return Some(cur),
            }
        }
    }

    pub(crate) fn push(&mut self, parent: NodeId, mut node: Node) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        node.parent = Some(parent);
        self.nodes.push(node);
        self.nodes[parent.index()].children.push(id);
        id
    }
}
