//! Data models for llmshim

mod attribute;
mod span;
mod usage;

pub use attribute::*;
pub use span::*;
pub use usage::*;
