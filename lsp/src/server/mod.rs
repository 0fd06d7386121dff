mod cli;
pub mod config;
pub mod convert;
mod entry;
mod handlers;
pub mod navigation;
mod state;

pub use cli::render_analysis;
pub use entry::run;
