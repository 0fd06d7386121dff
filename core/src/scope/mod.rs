//! Scope types and the per-node annotations the walker writes.

mod table;
mod walker;

#[cfg(test)]
mod table_test;
#[cfg(test)]
mod walker_test;

use std::fmt;

use serde::Serialize;

use crate::token::Span;

pub use table::{
    BlockDef, IteratorKind, Link, ListDef, ScopeDef, ScopeTable, VariableKind, VocabEntry, VocabKind,
};
pub use walker::{WalkOptions, WalkSummary, Walker, walk};

/// Index into the scope table's definitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ScopeId(pub u16);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub enum ScopeType {
    /// Not visited by a walk yet.
    #[default]
    Unassigned,
    Unknown,
    Known(ScopeId),
}

impl ScopeType {
    pub fn known(self) -> Option<ScopeId> {
        match self {
            ScopeType::Known(id) => Some(id),
            _ => None,
        }
    }

    pub fn is_assigned(self) -> bool {
        !matches!(self, ScopeType::Unassigned)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub enum Timing {
    Effect,
    Trigger,
    #[default]
    Neutral,
}

impl fmt::Display for Timing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Timing::Effect => "effect",
            Timing::Trigger => "trigger",
            Timing::Neutral => "neutral",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub enum Role {
    #[default]
    Statement,
    /// Parameter of an enclosing effect, trigger, iterator or block field.
    Argument,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum MarkKind {
    /// `link` exists, but not from scope `from`.
    InvalidLink { link: String, from: String },
    /// A dotted chain segment that resolves to nothing.
    InvalidChain { segment: String },
    UnresolvedSavedScope { name: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScopeMark {
    pub kind: MarkKind,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Annotation {
    pub scope: ScopeType,
    pub timing: Timing,
    pub role: Role,
    pub mark: Option<ScopeMark>,
}
