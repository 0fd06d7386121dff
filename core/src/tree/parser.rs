use tracing::trace;

use crate::scope::Annotation;
use crate::token::{Op, Position, Span, Token, TokenKind, Tokenizer};
use crate::tree::{Atom, Literal, Node, NodeId, NodeKind, ParseResult, Tree, TreeError, TreeErrorKind, Value};

/// Parse script text into a tree. Never fails; malformations are reported as
/// [`TreeError`]s next to a repaired tree.
pub fn parse(input: &str) -> ParseResult {
    Parser::new(input).parse()
}

struct OpenBlock {
    id: NodeId,
    brace: Span,
}

/// Tolerant parser over the significant tokens of one document.
///
/// Works with an explicit stack of open blocks instead of recursion, so deeply
/// nested or unbalanced input can neither overflow the stack nor abort.
pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    eof: Position,
    tree: Tree,
    stack: Vec<OpenBlock>,
    errors: Vec<TreeError>,
}

impl Parser {
    pub fn new(input: &str) -> Self {
        let mut lexer = Tokenizer::new(input);
        let mut tokens = Vec::new();
        for tok in lexer.by_ref() {
            if !tok.is_trivia() {
                tokens.push(tok);
            }
        }
        let eof = lexer.current_position();
        Self {
            tokens,
            pos: 0,
            eof,
            tree: Tree::with_root(Span::new(Position::start(), eof)),
            stack: Vec::new(),
            errors: Vec::new(),
        }
    }

    pub fn parse(mut self) -> ParseResult {
        while let Some(tok) = self.peek() {
            match tok.kind {
                TokenKind::Comment => {
                    let tok = self.bump_owned();
                    let atom = Atom {
                        text: tok.text,
                        prefix: None,
                        literal: Literal::Str,
                        span: tok.span,
                    };
                    self.push_node(NodeKind::Comment, None, None, Value::Scalar(atom), tok.span);
                }
                TokenKind::Operator(Op::LBrace) => {
                    let brace = self.bump_owned().span;
                    self.open_block(None, None, brace.start, brace);
                }
                TokenKind::Operator(Op::RBrace) => {
                    let close = self.bump_owned().span;
                    match self.stack.pop() {
                        Some(open) => self.tree.node_mut(open.id).span.end = close.end,
                        None => self.error(TreeErrorKind::UnmatchedClose, close, Some("}")),
                    }
                }
                TokenKind::Operator(_) => {
                    let tok = self.bump_owned();
                    self.error(TreeErrorKind::StrayOperator, tok.span, Some(&tok.text));
                }
                TokenKind::Unknown => {
                    let tok = self.bump_owned();
                    self.error(TreeErrorKind::UnexpectedChar, tok.span, Some(&tok.text));
                }
                TokenKind::Identifier | TokenKind::Number | TokenKind::Str | TokenKind::SpecialPrefix(_) => {
                    self.statement();
                }
                TokenKind::Whitespace => {
                    self.pos += 1;
                }
            }
        }

        // Close whatever is still open at end of input, reporting each `{`.
        while let Some(open) = self.stack.pop() {
            self.tree.node_mut(open.id).span.end = self.eof;
            self.error(TreeErrorKind::UnclosedOpen, open.brace, Some("{"));
        }
        self.errors.sort_by_key(|e| (e.span.start.offset, e.span.end.offset));

        trace!(nodes = self.tree.len(), errors = self.errors.len(), "parsed");
        ParseResult {
            tree: self.tree,
            errors: self.errors,
        }
    }

    /// A statement starting with an atom: keyed block, assignment or list item.
    fn statement(&mut self) {
        let Some(key) = self.atom() else { return };
        let op = match self.peek().map(|t| t.kind) {
            Some(TokenKind::Operator(op)) if !op.is_brace() => op,
            _ => {
                let span = key.span;
                self.push_node(NodeKind::ListItem, None, None, Value::Scalar(key), span);
                return;
            }
        };
        let op_span = self.bump_owned().span;

        match self.peek().map(|t| t.kind) {
            Some(TokenKind::Operator(Op::LBrace)) => {
                let brace = self.bump_owned().span;
                let start = key.span.start;
                self.open_block(Some(key), Some(op), start, brace);
            }
            Some(TokenKind::Identifier | TokenKind::Number | TokenKind::Str | TokenKind::SpecialPrefix(_)) => {
                if let Some(value) = self.atom() {
                    let span = key.span.cover(value.span);
                    self.push_node(NodeKind::Assignment, Some(key), Some(op), Value::Scalar(value), span);
                }
            }
            _ => {
                let span = key.span.cover(op_span);
                self.push_node(NodeKind::Assignment, Some(key), Some(op), Value::Nil, span);
            }
        }
    }

    /// One atom. A prefix token directly followed by a word forms a single atom.
    fn atom(&mut self) -> Option<Atom> {
        let tok = self.bump_owned_if(|t| {
            matches!(
                t.kind,
                TokenKind::Identifier | TokenKind::Number | TokenKind::Str | TokenKind::SpecialPrefix(_)
            )
        })?;
        let TokenKind::SpecialPrefix(prefix) = tok.kind else {
            return Some(Atom {
                literal: literal_of(tok.kind),
                text: tok.text,
                prefix: None,
                span: tok.span,
            });
        };
        let adjacent = self.peek().is_some_and(|next| {
            next.span.start.offset == tok.span.end.offset
                && matches!(next.kind, TokenKind::Identifier | TokenKind::Number | TokenKind::Str)
        });
        if adjacent {
            let rest = self.bump_owned();
            return Some(Atom {
                literal: literal_of(rest.kind),
                span: tok.span.cover(rest.span),
                text: rest.text,
                prefix: Some(prefix),
            });
        }
        Some(Atom {
            text: String::new(),
            prefix: Some(prefix),
            literal: Literal::Identifier,
            span: tok.span,
        })
    }

    fn open_block(&mut self, key: Option<Atom>, op: Option<Op>, start: Position, brace: Span) {
        let id = self.push_node(NodeKind::Block, key, op, Value::None, Span::new(start, brace.end));
        self.stack.push(OpenBlock { id, brace });
    }

    fn push_node(&mut self, kind: NodeKind, key: Option<Atom>, op: Option<Op>, value: Value, span: Span) -> NodeId {
        let parent = self.stack.last().map(|b| b.id).unwrap_or(NodeId::ROOT);
        self.tree.push(
            parent,
            Node {
                kind,
                key,
                op,
                value,
                span,
                parent: None,
                children: Vec::new(),
                annotation: Annotation::default(),
            },
        )
    }

    fn error(&mut self, kind: TreeErrorKind, span: Span, text: Option<&str>) {
        self.errors.push(TreeError {
            kind,
            span,
            text: text.map(str::to_string),
        });
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    // Callers only bump after a successful peek.
    fn bump_owned(&mut self) -> Token {
        let tok = std::mem::replace(
            &mut self.tokens[self.pos],
            Token {
                kind: TokenKind::Whitespace,
                text: String::new(),
                span: Span::default(),
            },
        );
        self.pos += 1;
        tok
    }

    fn bump_owned_if(&mut self, pred: impl Fn(&Token) -> bool) -> Option<Token> {
        if self.peek().is_some_and(pred) { Some(self.bump_owned()) } else { None }
    }
}

fn literal_of(kind: TokenKind) -> Literal {
    match kind {
        TokenKind::Number => Literal::Number,
        TokenKind::Str => Literal::Str,
        _ => Literal::Identifier,
    }
}
