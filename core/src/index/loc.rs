use once_cell::sync::Lazy;
use regex::Regex;

use crate::file::FileId;
use crate::index::{Location, SymbolEntry};
use crate::token::{Position, Span};

// ` my_key:0 "Text"` or ` my_key: "Text"`
static LOC_LINE_RE: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r#"^(\s*)([A-Za-z0-9_.\-']+):[0-9]*\s*""#).ok());

/// Keys of a localization `.yml` file. The `l_<language>:` header is skipped.
pub fn extract_localization(file: FileId, text: &str) -> Vec<SymbolEntry> {
    let Some(re) = LOC_LINE_RE.as_ref() else {
        return Vec::new();
    };
    let body = text.strip_prefix('\u{feff}').unwrap_or(text);

    let mut out = Vec::new();
    let mut offset = text.len() - body.len();
    for (i, line) in body.split_inclusive('\n').enumerate() {
        if let Some(caps) = re.captures(line) {
            if let (Some(indent), Some(key)) = (caps.get(1), caps.get(2)) {
                let col = indent.as_str().chars().count() as u32 + 1;
                let start = Position::new(i as u32 + 1, col, offset + key.start());
                let end = Position::new(
                    i as u32 + 1,
                    col + key.as_str().chars().count() as u32,
                    offset + key.end(),
                );
                out.push(SymbolEntry::LocalizationKey {
                    name: key.as_str().to_string(),
                    location: Location {
                        file,
                        span: Span::new(start, end),
                    },
                });
            }
        }
        offset += line.len();
    }
    out
}
