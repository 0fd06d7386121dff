pub mod analysis;
pub mod diag;
pub mod file;
pub mod index;
pub mod scope;
pub mod sched;
pub mod token;
pub mod tree;
pub mod util;
pub mod workspace;

pub use analysis::{Analysis, AnalysisObserver, Analyzer};
pub use diag::{Code, Diagnostic, Severity};
pub use file::{FileId, FileKind, FileRegistry};
pub use index::{SymbolIndex, SymbolEntry};
pub use scope::ScopeTable;
