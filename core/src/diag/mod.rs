//! Diagnostics: the fixed code taxonomy, the validator pipeline and the
//! built-in validators.

mod engine;
pub mod validators;

#[cfg(test)]
mod diag_test;

use std::fmt;

use serde::{Serialize, Serializer};

use crate::token::Span;

pub use engine::{DiagnosticsEngine, ValidationContext, Validator};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Info,
    Hint,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Info => "info",
            Severity::Hint => "hint",
        })
    }
}

macro_rules! codes {
    ($($variant:ident => $code:literal, $severity:ident, $template:literal;)*) => {
        /// Stable diagnostic codes. Each has a fixed severity and message template.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum Code {
            $($variant,)*
        }

        impl Code {
            pub const ALL: &'static [Code] = &[$(Code::$variant,)*];

            pub fn as_str(self) -> &'static str {
                match self {
                    $(Code::$variant => $code,)*
                }
            }

            pub fn severity(self) -> Severity {
                match self {
                    $(Code::$variant => Severity::$severity,)*
                }
            }

            /// Message with `{name}` placeholders.
            pub fn template(self) -> &'static str {
                match self {
                    $(Code::$variant => $template,)*
                }
            }

            pub fn parse(code: &str) -> Option<Code> {
                match code {
                    $($code => Some(Code::$variant),)*
                    _ => None,
                }
            }
        }
    };
}

codes! {
    UnmatchedClose => "SYN001", Error, "unmatched closing brace";
    UnclosedOpen => "SYN002", Error, "unclosed opening brace";
    StrayOperator => "SYN003", Error, "operator `{op}` without a key";
    UnexpectedChar => "SYN004", Error, "unexpected character `{text}`";
    InvalidTransition => "SCP001", Error, "`{link}` is not a valid scope transition from {from}";
    WrongScope => "SCP002", Error, "`{key}` is not valid in `{scope}` scope";
    UnknownKey => "VOC001", Warning, "unknown key `{key}`{hint}";
    EffectInTrigger => "VOC002", Error, "effect `{key}` used in a trigger context";
    TriggerInEffect => "VOC003", Error, "trigger `{key}` used in an effect context";
    UndefinedSavedScope => "REF001", Error, "undefined saved scope `scope:{name}`";
    UndefinedVariable => "REF002", Warning, "undefined variable `{prefix}{name}`";
    UndefinedEvent => "REF003", Warning, "undefined event `{name}`";
    InvalidIteratorParam => "ITR001", Error, "`{param}` is not valid for `{iterator}`";
    MissingOrderBy => "ITR002", Error, "`{iterator}` requires `order_by`";
    MissingEventField => "EVT001", Error, "event `{event}` is missing `{field}`";
    EventNamespaceMismatch => "EVT002", Warning, "event id `{event}` does not match namespace `{namespace}`";
    HiddenEventOptions => "EVT003", Warning, "hidden event `{event}` has options";
    OptionWithoutName => "EVT004", Warning, "option without `name`";
    MissingNamespace => "EVT005", Error, "events file has no `namespace`";
    MissingArgument => "SCR001", Error, "call to `{name}` is missing argument `{param}`";
    UnknownArgument => "SCR002", Warning, "`{name}` has no parameter `{param}`";
    DuplicateDefinition => "SCR003", Warning, "`{name}` is defined more than once";
    MissingLocalization => "LOC001", Warning, "missing localization key `{key}`";
    EmptyBlock => "STY001", Hint, "empty `{key}` block";
    RedundantAnd => "STY002", Hint, "redundant `AND` inside a trigger block";
    DoubleNegation => "STY003", Hint, "double negation";
    IfWithoutLimit => "STY004", Warning, "`{key}` without `limit`";
}

impl fmt::Display for Code {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Code {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub span: Span,
    pub severity: Severity,
    pub code: Code,
    pub message: String,
}

impl Diagnostic {
    /// Render `code`'s template with `args`.
    pub fn new(code: Code, span: Span, args: &[(&str, &str)]) -> Self {
        let mut message = code.template().to_string();
        for (name, value) in args {
            message = message.replace(&format!("{{{name}}}"), value);
        }
        Self {
            span,
            severity: code.severity(),
            code,
            message,
        }
    }

    pub fn sort_key(&self) -> (usize, usize, &'static str) {
        (self.span.start.offset, self.span.end.offset, self.code.as_str())
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}: {} [{}] {}",
            self.span.start.line, self.span.start.column, self.severity, self.code, self.message
        )
    }
}
