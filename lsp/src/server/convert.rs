//! Position and diagnostic conversion between core spans and LSP types.
//!
//! Core positions are 1-based with columns counted in chars; LSP positions are
//! 0-based with columns counted in UTF-16 code units.

use ropey::Rope;
use tower_lsp::lsp_types::{
    self as lsp, DiagnosticSeverity, NumberOrString, Position, Range, TextDocumentContentChangeEvent,
};

use pdx_core::token::{Position as CorePosition, Span};
use pdx_core::{Diagnostic, Severity};

pub const SOURCE: &str = "pdx";

/// LSP UTF-16 position to a rope char index, clamped to the end of the line.
pub fn position_to_char_idx(text: &Rope, pos: Position) -> usize {
    let line_idx = pos.line as usize;
    if line_idx >= text.len_lines() {
        return text.len_chars();
    }
    let line_start_char = text.line_to_char(line_idx);
    let line_slice = text.line(line_idx);
    let target_utf16 = pos.character as usize;

    if let Some(s) = line_slice.as_str() {
        if s.is_ascii() {
            return line_start_char + target_utf16.min(s.len());
        }
    }

    let mut seen_utf16 = 0usize;
    let mut chars_in_line = 0usize;
    for ch in line_slice.chars() {
        let u16_len = ch.len_utf16();
        if seen_utf16 + u16_len > target_utf16 {
            break;
        }
        seen_utf16 += u16_len;
        chars_in_line += 1;
        if seen_utf16 == target_utf16 {
            break;
        }
    }
    line_start_char + chars_in_line
}

/// Byte offset into the document for an LSP position.
pub fn position_to_offset(text: &Rope, pos: Position) -> usize {
    text.char_to_byte(position_to_char_idx(text, pos))
}

/// Apply one incremental change; a change without a range replaces everything.
pub fn apply_change(text: &mut Rope, change: &TextDocumentContentChangeEvent) {
    let Some(range) = &change.range else {
        *text = Rope::from_str(&change.text);
        return;
    };
    let start = position_to_char_idx(text, range.start);
    let end = position_to_char_idx(text, range.end);
    let (s, e) = if start <= end { (start, end) } else { (end, start) };
    if s != e {
        text.remove(s..e);
    }
    if !change.text.is_empty() {
        text.insert(s, &change.text);
    }
}

/// Core position to LSP. Without the document text, chars are taken as UTF-16 units.
pub fn to_lsp_position(text: Option<&Rope>, pos: CorePosition) -> Position {
    let line = pos.line.saturating_sub(1);
    let column = pos.column.saturating_sub(1) as usize;
    let character = match text {
        Some(rope) if (line as usize) < rope.len_lines() => {
            let slice = rope.line(line as usize);
            slice.chars().take(column).map(char::len_utf16).sum::<usize>()
        }
        _ => column,
    };
    Position::new(line, character as u32)
}

pub fn to_lsp_range(text: Option<&Rope>, span: Span) -> Range {
    Range::new(to_lsp_position(text, span.start), to_lsp_position(text, span.end))
}

pub fn to_lsp_severity(severity: Severity) -> DiagnosticSeverity {
    match severity {
        Severity::Error => DiagnosticSeverity::ERROR,
        Severity::Warning => DiagnosticSeverity::WARNING,
        Severity::Info => DiagnosticSeverity::INFORMATION,
        Severity::Hint => DiagnosticSeverity::HINT,
    }
}

pub fn to_lsp_diagnostic(text: Option<&Rope>, diagnostic: &Diagnostic) -> lsp::Diagnostic {
    lsp::Diagnostic {
        range: to_lsp_range(text, diagnostic.span),
        severity: Some(to_lsp_severity(diagnostic.severity)),
        code: Some(NumberOrString::String(diagnostic.code.as_str().to_string())),
        source: Some(SOURCE.to_string()),
        message: diagnostic.message.clone(),
        ..Default::default()
    }
}
