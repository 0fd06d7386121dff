//! Language server front for Paradox script analysis.
//!
//! The server owns no analysis logic: editor notifications are forwarded to
//! the core scheduler and its publications are converted to LSP diagnostics.

mod server;

pub use server::{config, convert, navigation, render_analysis, run};
