//! Tokenizer for Paradox script text.
//!
//! The tokenizer is lazy (an `Iterator<Item = Token>`), keeps comments and
//! whitespace, and never fails on malformed input.

mod lexer;
mod span;


pub use lexer::{Op, Prefix, Token, TokenKind, Tokenizer, classify_number};
pub use span::{Position, Span};
