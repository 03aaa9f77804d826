//! CLI command implementations
//!
//! Commands are organized by domain:
//! - `core` - Init and shared utilities (open_db, engine wiring, date parsing)
//! - `expenses` - Expense and budget records (add, list, budget)
//! - `categorize` - Categorization commands (classify, override)
//! - `ask` - Natural-language questions
//! - `status` - Audit log, categories and effective config
//! - `prompts` - Prompt library management commands
//! - `serve` - Web server command

pub mod ask;
pub mod categorize;
pub mod core;
pub mod expenses;
pub mod prompts;
pub mod serve;
pub mod status;

// Re-export command functions for main.rs
pub use ask::*;
pub use categorize::*;
pub use core::*;
pub use expenses::*;
pub use prompts::*;
pub use serve::*;
pub use status::*;

/// Truncate a string to a maximum number of characters, adding "..." if truncated
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
