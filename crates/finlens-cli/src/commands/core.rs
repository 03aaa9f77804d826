//! Core command implementations and shared utilities
//!
//! This module contains:
//! - `open_db` - Shared utility to open the database
//! - `Engines` - Categorizer and query engine wired to the database
//! - `cmd_init` - Initialize the database

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use finlens_core::ai::{AIBackend, AIClient};
use finlens_core::audit::AuditLedger;
use finlens_core::db::Database;
use finlens_core::query::RecordStore;
use finlens_core::{Categorizer, EngineConfig, QueryEngine};
use tracing::debug;

/// Open database with encryption by default, or unencrypted if --no-encrypt
pub fn open_db(db_path: &Path, no_encrypt: bool) -> Result<Database> {
    let path_str = db_path
        .to_str()
        .context("Database path must be valid UTF-8")?;
    if no_encrypt {
        Database::new_unencrypted(path_str).context("Failed to open database (unencrypted)")
    } else {
        Database::new(path_str).context("Failed to open database")
    }
}

/// Parse a YYYY-MM-DD argument
pub fn parse_date(value: &str, flag: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .with_context(|| format!("Invalid {} date '{}' (use YYYY-MM-DD)", flag, value))
}

/// Both decision engines, sharing the database as record store and ledger
pub struct Engines {
    pub categorizer: Categorizer,
    pub query: QueryEngine,
    pub ai: Option<AIClient>,
}

impl Engines {
    /// Load config and pick the AI backend from the environment
    pub fn new(db: &Database, config_path: Option<&Path>) -> Result<Self> {
        let config = EngineConfig::load(config_path).context("Failed to load engine config")?;
        let ai = AIClient::from_env();
        match ai {
            Some(ref client) => debug!(backend = client.kind(), model = client.model(), "AI backend enabled"),
            None => debug!("AI backend not configured, running rules-only"),
        }
        Self::with_ai(db, &config, ai)
    }

    pub fn with_ai(db: &Database, config: &EngineConfig, ai: Option<AIClient>) -> Result<Self> {
        let ledger: Arc<dyn AuditLedger> = Arc::new(db.clone());
        let store: Arc<dyn RecordStore> = Arc::new(db.clone());

        Ok(Self {
            categorizer: Categorizer::from_config(config, ai.clone(), ledger.clone())?,
            query: QueryEngine::from_config(config, ai.clone(), store, ledger)?,
            ai,
        })
    }
}

pub fn cmd_init(db_path: &Path, no_encrypt: bool) -> Result<()> {
    println!("🔧 Initializing database at {}...", db_path.display());

    let db = open_db(db_path, no_encrypt)?;
    let expenses = db.count_expenses()?;
    let decisions = db.count_audit_entries(None)?;
    println!("   {} expenses, {} recorded decisions", expenses, decisions);

    if no_encrypt {
        println!("   ⚠️  Encryption: DISABLED (--no-encrypt)");
    } else {
        println!("   🔒 Encryption: ENABLED");
    }

    if AIClient::from_env().is_none() {
        println!("   💡 Tip: Set OLLAMA_HOST to enable the language-model fallback");
    }

    println!("✅ Database initialized successfully!");
    println!();
    println!("Next steps:");
    println!("  1. Record expenses: finlens add \"Uber ride to work\" --amount 18.50");
    println!("  2. Ask a question: finlens ask \"How much did I spend on food this month?\"");
    println!("  3. Start web API: finlens serve");

    Ok(())
}
