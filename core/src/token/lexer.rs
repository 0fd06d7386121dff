use std::fmt::Debug;

use serde::Serialize;

use crate::token::{Position, Span};

/// Reference prefixes that bind the identifier that follows them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Prefix {
    Var,       // var:
    Scope,     // scope:
    Flag,      // flag:
    GlobalVar, // global_var:
    LocalVar,  // local_var:
}

impl Prefix {
    pub const ALL: [Prefix; 5] = [
        Prefix::GlobalVar,
        Prefix::LocalVar,
        Prefix::Scope,
        Prefix::Flag,
        Prefix::Var,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Prefix::Var => "var:",
            Prefix::Scope => "scope:",
            Prefix::Flag => "flag:",
            Prefix::GlobalVar => "global_var:",
            Prefix::LocalVar => "local_var:",
        }
    }

    /// Split a leading prefix off `text`.
    pub fn strip(text: &str) -> Option<(Prefix, &str)> {
        Prefix::ALL
            .iter()
            .find_map(|p| text.strip_prefix(p.as_str()).map(|rest| (*p, rest)))
    }

    pub fn is_variable(self) -> bool {
        matches!(self, Prefix::Var | Prefix::GlobalVar | Prefix::LocalVar)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Op {
    Assign,         // =
    QuestionAssign, // ?=
    Eq,             // ==
    Ne,             // !=
    Lt,             // <
    Le,             // <=
    Gt,             // >
    Ge,             // >=
    LBrace,         // {
    RBrace,         // }
}

impl Op {
    pub fn as_str(self) -> &'static str {
        match self {
            Op::Assign => "=",
            Op::QuestionAssign => "?=",
            Op::Eq => "==",
            Op::Ne => "!=",
            Op::Lt => "<",
            Op::Le => "<=",
            Op::Gt => ">",
            Op::Ge => ">=",
            Op::LBrace => "{",
            Op::RBrace => "}",
        }
    }

    pub fn is_brace(self) -> bool {
        matches!(self, Op::LBrace | Op::RBrace)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum TokenKind {
    Identifier,
    Number,
    Str,
    Operator(Op),
    Comment,
    Whitespace,
    SpecialPrefix(Prefix),
    Unknown,
}

/// `text` is the token's source text, except for strings where it is the
/// unquoted content and comments where the leading `#` is dropped.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub span: Span,
}

impl Token {
    pub fn is_trivia(&self) -> bool {
        matches!(self.kind, TokenKind::Whitespace)
    }

    pub fn line(&self) -> u32 {
        self.span.start.line
    }

    pub fn column(&self) -> u32 {
        self.span.start.column
    }
}

const ASCII_WHITESPACE: u8 = 1 << 0;
const ASCII_DIGIT: u8 = 1 << 1;
const ASCII_ALPHA: u8 = 1 << 2;
const ASCII_IDENT_START: u8 = 1 << 3;
const ASCII_IDENT_CONT: u8 = 1 << 4;

const fn build_ascii_class() -> [u8; 256] {
    let mut table = [0u8; 256];
    let mut i = 0;
    while i < 256 {
        let c = i as u8;
        if matches!(c, b' ' | b'\t' | b'\n' | b'\r' | 0x0B | 0x0C) {
            table[i] |= ASCII_WHITESPACE;
        }
        if c >= b'0' && c <= b'9' {
            table[i] |= ASCII_DIGIT | ASCII_IDENT_CONT;
        }
        if (c >= b'a' && c <= b'z') || (c >= b'A' && c <= b'Z') {
            table[i] |= ASCII_ALPHA | ASCII_IDENT_START | ASCII_IDENT_CONT;
        }
        if matches!(c, b'_' | b'@' | b'$') {
            table[i] |= ASCII_IDENT_START | ASCII_IDENT_CONT;
        }
        if matches!(c, b'.' | b':' | b'-' | b'\'' | b'|') {
            table[i] |= ASCII_IDENT_CONT;
        }
        i += 1;
    }
    table
}

const ASCII_CLASS: [u8; 256] = build_ascii_class();

#[inline]
fn ascii_flags(c: char) -> u8 {
    if c.is_ascii() { ASCII_CLASS[c as usize] } else { 0 }
}

#[inline]
fn is_space_char(c: char) -> bool {
    if c.is_ascii() {
        ascii_flags(c) & ASCII_WHITESPACE != 0
    } else {
        c.is_whitespace() || c == '\u{feff}'
    }
}

#[inline]
fn is_ident_start(c: char) -> bool {
    if c.is_ascii() {
        ascii_flags(c) & ASCII_IDENT_START != 0
    } else {
        c.is_alphabetic()
    }
}

#[inline]
fn is_ident_continue(c: char) -> bool {
    if c.is_ascii() {
        ascii_flags(c) & ASCII_IDENT_CONT != 0
    } else {
        c.is_alphanumeric()
    }
}

#[inline]
fn is_digit(c: char) -> bool {
    ascii_flags(c) & ASCII_DIGIT != 0
}

/// Integer part must fit the engine's 32-bit range.
const MAX_INT_MAGNITUDE: i64 = i32::MAX as i64;
/// Fixed-point values carry at most this many fractional digits.
const MAX_FRACTION_DIGITS: usize = 5;

/// Classify a digit-led word: a well-formed, in-range numeric literal stays a
/// number, anything else (dates, `10abc`, overflow) is downgraded to a string.
pub fn classify_number(text: &str) -> TokenKind {
    let body = text.strip_prefix('-').unwrap_or(text);
    let (int_part, frac_part) = match body.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (body, None),
    };
    if int_part.is_empty() || !int_part.chars().all(|c| c.is_ascii_digit()) {
        return TokenKind::Str;
    }
    if let Some(frac) = frac_part {
        if frac.is_empty() || frac.len() > MAX_FRACTION_DIGITS || !frac.chars().all(|c| c.is_ascii_digit()) {
            return TokenKind::Str;
        }
    }
    match int_part.parse::<i64>() {
        Ok(v) if v <= MAX_INT_MAGNITUDE => TokenKind::Number,
        _ => TokenKind::Str,
    }
}

/// Lazy tokenizer over script text. Never fails: characters it cannot place
/// become single-character `Unknown` tokens.
pub struct Tokenizer<'a> {
    input: &'a str,
    pos: usize,
    line: u32,
    column: u32,
    // Identifier remainder queued behind a split special prefix.
    pending: Option<Token>,
}

impl<'a> Tokenizer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            input,
            pos: 0,
            line: 1,
            column: 1,
            pending: None,
        }
    }

    /// Get current position
    pub fn current_position(&self) -> Position {
        Position::new(self.line, self.column, self.pos)
    }

    fn eof(&self) -> bool {
        self.pos >= self.input.len()
    }

    fn peek(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn peek_second(&self) -> Option<char> {
        let mut it = self.input[self.pos..].chars();
        it.next();
        it.next()
    }

    fn advance_char(&mut self) -> Option<char> {
        let c = self.peek()?;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        self.pos += c.len_utf8();
        Some(c)
    }

    fn advance_while(&mut self, pred: impl Fn(char) -> bool) {
        while let Some(c) = self.peek() {
            if !pred(c) {
                break;
            }
            self.advance_char();
        }
    }

    fn make(&self, kind: TokenKind, text: String, start: Position) -> Token {
        Token {
            kind,
            text,
            span: Span::new(start, self.current_position()),
        }
    }

    fn slice_from(&self, start: Position) -> &'a str {
        &self.input[start.offset..self.pos]
    }

    fn operator(&mut self, op: Op, start: Position) -> Token {
        for _ in 0..op.as_str().len() {
            self.advance_char();
        }
        self.make(TokenKind::Operator(op), op.as_str().to_string(), start)
    }

    fn next_token(&mut self) -> Option<Token> {
        if let Some(tok) = self.pending.take() {
            return Some(tok);
        }
        if self.eof() {
            return None;
        }
        let start = self.current_position();
        let c = self.peek()?;

        if is_space_char(c) {
            self.advance_while(is_space_char);
            let text = self.slice_from(start).to_string();
            return Some(self.make(TokenKind::Whitespace, text, start));
        }

        let next = self.peek_second();
        let tok = match c {
            '#' => self.lex_comment(start),
            '"' => self.lex_string(start),
            '{' => self.operator(Op::LBrace, start),
            '}' => self.operator(Op::RBrace, start),
            '=' if next == Some('=') => self.operator(Op::Eq, start),
            '=' => self.operator(Op::Assign, start),
            '?' if next == Some('=') => self.operator(Op::QuestionAssign, start),
            '!' if next == Some('=') => self.operator(Op::Ne, start),
            '<' if next == Some('=') => self.operator(Op::Le, start),
            '<' => self.operator(Op::Lt, start),
            '>' if next == Some('=') => self.operator(Op::Ge, start),
            '>' => self.operator(Op::Gt, start),
            c if is_digit(c) => self.lex_numeric_word(start),
            '-' if next.is_some_and(is_digit) => self.lex_numeric_word(start),
            c if is_ident_start(c) => self.lex_word(start),
            _ => {
                self.advance_char();
                let text = self.slice_from(start).to_string();
                self.make(TokenKind::Unknown, text, start)
            }
        };
        Some(tok)
    }

    fn lex_comment(&mut self, start: Position) -> Token {
        self.advance_char(); // '#'
        self.advance_while(|c| c != '\n');
        let text = self.input[start.offset + 1..self.pos].trim_end_matches('\r').to_string();
        self.make(TokenKind::Comment, text, start)
    }

    /// Quoted string. An unterminated string stops at the end of its line.
    fn lex_string(&mut self, start: Position) -> Token {
        self.advance_char(); // opening quote
        let mut content = String::new();
        while let Some(c) = self.peek() {
            match c {
                '"' => {
                    self.advance_char();
                    break;
                }
                '\n' => break,
                '\\' if self.peek_second() == Some('"') => {
                    self.advance_char();
                    self.advance_char();
                    content.push('"');
                }
                _ => {
                    content.push(c);
                    self.advance_char();
                }
            }
        }
        self.make(TokenKind::Str, content, start)
    }

    fn lex_numeric_word(&mut self, start: Position) -> Token {
        self.advance_char(); // digit or sign
        self.advance_while(is_ident_continue);
        let text = self.slice_from(start).to_string();
        let kind = classify_number(&text);
        self.make(kind, text, start)
    }

    fn lex_word(&mut self, start: Position) -> Token {
        self.advance_while(is_ident_continue);
        let text = self.slice_from(start);
        if let Some((prefix, rest)) = Prefix::strip(text) {
            let split = start.advanced_ascii(prefix.as_str().len());
            if !rest.is_empty() {
                self.pending = Some(Token {
                    kind: TokenKind::Identifier,
                    text: rest.to_string(),
                    span: Span::new(split, self.current_position()),
                });
            }
            return Token {
                kind: TokenKind::SpecialPrefix(prefix),
                text: prefix.as_str().to_string(),
                span: Span::new(start, split),
            };
        }
        let text = text.to_string();
        self.make(TokenKind::Identifier, text, start)
    }
}

impl Iterator for Tokenizer<'_> {
    type Item = Token;

    fn next(&mut self) -> Option<Token> {
        self.next_token()
    }
}

impl Debug for Tokenizer<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tokenizer")
            .field("pos", &self.pos)
            .field("line", &self.line)
            .field("column", &self.column)
            .finish()
    }
}
