pub mod fast_map;
pub mod hash;

pub use hash::content_hash;
