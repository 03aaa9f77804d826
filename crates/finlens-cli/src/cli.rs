//! CLI argument definitions using clap
//!
//! This module contains all the clap structs and enums for parsing CLI arguments.
//! The actual command implementations are in the `commands` module.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// FinLens - Categorize expenses and ask questions about your spending
#[derive(Parser)]
#[command(name = "finlens")]
#[command(about = "Local expense categorization and natural-language spending queries", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Database path
    #[arg(long, default_value = "finlens.db", global = true)]
    pub db: PathBuf,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable database encryption (not recommended for production)
    ///
    /// By default, the database is encrypted using SQLCipher.
    /// Set FINLENS_DB_KEY environment variable with your passphrase.
    /// Use --no-encrypt only for development or testing.
    #[arg(long, global = true)]
    pub no_encrypt: bool,

    /// Engine configuration file (TOML)
    ///
    /// Defaults to the override file in the data directory if present,
    /// otherwise the built-in thresholds.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize the database
    Init,

    /// Record an expense
    Add {
        /// Expense description (e.g. "Uber ride to work")
        description: String,

        /// Amount spent
        #[arg(short, long)]
        amount: f64,

        /// Category name; categorized automatically when omitted
        #[arg(short, long)]
        category: Option<String>,

        /// Date (YYYY-MM-DD, defaults to today)
        #[arg(long)]
        date: Option<String>,
    },

    /// List recorded expenses
    Expenses {
        /// Number of expenses to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },

    /// Show or set monthly budgets
    Budget {
        #[command(subcommand)]
        action: Option<BudgetAction>,
    },

    /// Categorize one or more expense descriptions
    Classify {
        /// Descriptions to categorize
        #[arg(required = true)]
        descriptions: Vec<String>,

        /// Print the decisions as JSON
        #[arg(long)]
        json: bool,
    },

    /// Replace the category chosen for a description
    Override {
        /// Description as it was classified
        description: String,

        /// Category to apply
        category: String,
    },

    /// Ask a question about your spending
    Ask {
        /// The question (e.g. "How much did I spend on food in the last 30 days?")
        question: String,

        /// Answer as of this date instead of today (YYYY-MM-DD)
        #[arg(long)]
        today: Option<String>,

        /// Print the full answer as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the decision audit log
    Audit {
        /// Number of entries to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },

    /// List expense categories
    Categories,

    /// Show the effective engine configuration
    Config,

    /// Manage AI prompts (list available prompts, view override status)
    Prompts {
        #[command(subcommand)]
        action: Option<PromptsAction>,
    },

    /// Start the web server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "3000")]
        port: u16,

        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Additional CORS origin to allow (repeatable)
        #[arg(long = "allow-origin")]
        allowed_origins: Vec<String>,
    },
}

#[derive(Subcommand)]
pub enum BudgetAction {
    /// List budgets
    List,

    /// Set the monthly limit for a category
    Set {
        /// Category name
        category: String,

        /// Monthly limit
        limit: f64,
    },
}

#[derive(Subcommand)]
pub enum PromptsAction {
    /// List all prompts and their override status
    List,

    /// Show the content of a specific prompt
    Show {
        /// Prompt ID (classify_expense, classify_intent, explain_result)
        prompt_id: String,
    },

    /// Show the prompts override directory path
    Path,
}
