//! HTTP request handlers organized by domain
//!
//! Each submodule contains handlers for a specific API area.

pub mod ask;
pub mod audit;
pub mod categorize;
pub mod status;

// Re-export all handlers for use in router
pub use ask::*;
pub use audit::*;
pub use categorize::*;
pub use status::*;
