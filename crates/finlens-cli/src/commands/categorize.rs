//! Categorization commands

use anyhow::Result;
use finlens_core::models::ActionTier;
use finlens_core::CategorizationOutcome;

use super::{truncate, Engines};

fn tier_marker(tier: ActionTier) -> &'static str {
    match tier {
        ActionTier::AutoApply => "✅",
        ActionTier::ApplyWithFlag => "⚠️ ",
        ActionTier::RequireConfirmation => "❓",
    }
}

fn print_outcome(outcome: &CategorizationOutcome) {
    println!(
        "{} {:<40}  {:<20}  {:>4.0}%  {:<8}  #{}",
        tier_marker(outcome.tier),
        truncate(&outcome.description, 40),
        outcome.category.as_str(),
        outcome.confidence * 100.0,
        outcome.method,
        outcome.audit_id
    );
}

pub async fn cmd_classify(engines: &Engines, descriptions: &[String], json: bool) -> Result<()> {
    let outcomes = if descriptions.len() == 1 {
        vec![engines.categorizer.classify(&descriptions[0]).await?]
    } else {
        engines.categorizer.classify_batch(descriptions).await?
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&outcomes)?);
        return Ok(());
    }

    for outcome in &outcomes {
        print_outcome(outcome);
    }

    let unsure = outcomes
        .iter()
        .filter(|o| o.tier == ActionTier::RequireConfirmation)
        .count();
    if unsure > 0 {
        println!();
        println!(
            "{} decision(s) need confirmation. Fix with: finlens override \"<description>\" <category>",
            unsure
        );
        if engines.ai.is_none() {
            println!("💡 Tip: Set OLLAMA_HOST so descriptions without a rule get a model guess");
        }
    }

    Ok(())
}

pub fn cmd_override(engines: &Engines, description: &str, category: &str) -> Result<()> {
    let outcome = engines.categorizer.override_category(description, category)?;

    match outcome.supersedes {
        Some(prior) => println!(
            "✅ {} is now {} (supersedes decision #{})",
            outcome.description, outcome.category, prior
        ),
        None => println!("✅ {} is now {}", outcome.description, outcome.category),
    }
    Ok(())
}
