//! Audit log, category and configuration commands

use std::path::Path;

use anyhow::{Context, Result};
use finlens_core::audit::AuditLedger;
use finlens_core::config::default_config_path;
use finlens_core::db::Database;
use finlens_core::{CategoryLabel, EngineConfig};

use super::truncate;

pub fn cmd_audit(db: &Database, limit: usize) -> Result<()> {
    let entries = db.list(limit)?;

    if entries.is_empty() {
        println!("No decisions recorded yet.");
        return Ok(());
    }

    println!(
        "{:>5}  {:<19}  {:<14}  {:<26}  {:>5}  {:<30}  {}",
        "ID", "TIMESTAMP", "KIND", "METHOD", "CONF", "INPUT", "OUTPUT"
    );
    println!("{}", "-".repeat(130));

    for entry in &entries {
        let confidence = entry
            .confidence
            .map(|c| format!("{:.2}", c))
            .unwrap_or_else(|| "-".to_string());
        let output = match entry.supersedes {
            Some(prior) => format!("{} (replaces #{})", entry.output_summary, prior),
            None => entry.output_summary.clone(),
        };
        println!(
            "{:>5}  {:<19}  {:<14}  {:<26}  {:>5}  {:<30}  {}",
            entry.id,
            entry.timestamp.format("%Y-%m-%d %H:%M:%S"),
            entry.kind.as_str(),
            truncate(&entry.method, 26),
            confidence,
            truncate(&entry.input_summary, 30),
            output
        );
    }

    Ok(())
}

pub fn cmd_categories() -> Result<()> {
    for category in CategoryLabel::ALL {
        println!(
            "{} {:<24} {:<22} {}",
            category.icon(),
            category.as_str(),
            category.id(),
            category.description()
        );
    }
    Ok(())
}

pub fn cmd_config(config_path: Option<&Path>) -> Result<()> {
    let config = EngineConfig::load(config_path).context("Failed to load engine config")?;

    let source = match config_path {
        Some(p) => p.display().to_string(),
        None => match default_config_path() {
            Some(p) if p.exists() => p.display().to_string(),
            _ => "built-in defaults".to_string(),
        },
    };
    println!("Engine configuration ({})", source);
    println!();

    let c = &config.categorization;
    println!("[categorization]");
    println!("  rule_confidence          = {}", c.rule_confidence);
    println!("  fallback_timeout_secs    = {}", c.fallback_timeout.as_secs());
    println!("  invalid_label_confidence = {}", c.invalid_label_confidence);

    let p = &config.policy;
    println!("[policy]");
    println!("  auto_apply_above         = {}", p.auto_apply_above);
    println!("  flag_at_or_above         = {}", p.flag_at_or_above);

    let cache = &config.cache;
    println!("[cache]");
    println!("  enabled                  = {}", cache.enabled);
    println!("  ttl_secs                 = {}", cache.ttl.as_secs());
    println!("  max_entries              = {}", cache.max_entries);

    let q = &config.query;
    println!("[query]");
    println!("  intent_timeout_secs      = {}", q.intent_timeout.as_secs());
    println!("  min_intent_confidence    = {}", q.min_intent_confidence);
    println!("  category_match_floor     = {}", q.category_match_floor);
    println!("  polish_explanations      = {}", q.polish_explanations);
    println!("  explanation_timeout_secs = {}", q.explanation_timeout.as_secs());

    if config_path.is_none() {
        if let Some(path) = default_config_path() {
            println!();
            println!("Override file: {}", path.display());
        }
    }

    Ok(())
}
