//! Server command implementation

use std::path::Path;

use anyhow::{Context, Result};
use finlens_core::EngineConfig;

use super::open_db;

pub async fn cmd_serve(
    db_path: &Path,
    host: &str,
    port: u16,
    allowed_origins: Vec<String>,
    config_path: Option<&Path>,
    no_encrypt: bool,
) -> Result<()> {
    println!("🚀 Starting FinLens web server...");
    println!("   Database: {}", db_path.display());
    println!("   Listening: http://{}:{}", host, port);
    if !allowed_origins.is_empty() {
        println!("   CORS origins: {}", allowed_origins.join(", "));
    }
    if no_encrypt {
        println!("   ⚠️  Encryption DISABLED (--no-encrypt)");
    }
    println!();
    println!("   Press Ctrl+C to stop");

    let engine = EngineConfig::load(config_path).context("Failed to load engine config")?;
    let db = open_db(db_path, no_encrypt)?;

    let config = finlens_server::ServerConfig {
        allowed_origins,
        engine,
    };

    finlens_server::serve_with_config(db, host, port, config).await?;

    Ok(())
}
