//! Expense and budget commands

use anyhow::{Context, Result};
use chrono::Local;
use finlens_core::db::Database;
use finlens_core::models::{ActionTier, CategoryLabel, NewExpense};

use super::{parse_date, truncate, Engines};

/// Record an expense, categorizing it when no category is given
pub async fn cmd_add(
    db: &Database,
    engines: &Engines,
    description: &str,
    amount: f64,
    category: Option<&str>,
    date: Option<&str>,
) -> Result<()> {
    let date = match date {
        Some(d) => parse_date(d, "--date")?,
        None => Local::now().date_naive(),
    };

    let category = match category {
        Some(name) => name.parse::<CategoryLabel>()?,
        None => {
            let outcome = engines.categorizer.classify(description).await?;
            println!(
                "   Categorized as {} ({:.0}% via {})",
                outcome.category,
                outcome.confidence * 100.0,
                outcome.method
            );
            match outcome.tier {
                ActionTier::AutoApply => {}
                ActionTier::ApplyWithFlag => {
                    println!("   ⚠️  Low confidence - review this category later")
                }
                ActionTier::RequireConfirmation => println!(
                    "   ⚠️  Unsure - fix with: finlens override \"{}\" <category>",
                    outcome.description
                ),
            }
            outcome.category
        }
    };

    let id = db
        .insert_expense(&NewExpense {
            date,
            description: description.to_string(),
            amount,
            category,
        })
        .context("Failed to record expense")?;

    println!(
        "✅ Recorded expense #{}: {} ${:.2} on {} ({})",
        id,
        description.trim(),
        amount,
        date,
        category
    );
    Ok(())
}

pub fn cmd_expenses_list(db: &Database, limit: usize) -> Result<()> {
    let expenses = db.list_expenses(limit)?;

    if expenses.is_empty() {
        println!("No expenses recorded. Add one with: finlens add \"description\" --amount 12.50");
        return Ok(());
    }

    println!(
        "{:>5}  {:<10}  {:<40}  {:<20}  {:>10}",
        "ID", "DATE", "DESCRIPTION", "CATEGORY", "AMOUNT"
    );
    println!("{}", "-".repeat(93));

    for e in &expenses {
        println!(
            "{:>5}  {:<10}  {:<40}  {:<20}  {:>10.2}",
            e.id,
            e.date,
            truncate(&e.description, 40),
            e.category.as_str(),
            e.amount
        );
    }

    let total = db.count_expenses()?;
    if total as usize > expenses.len() {
        println!();
        println!("Showing {} of {} (use --limit to see more)", expenses.len(), total);
    }

    Ok(())
}

pub fn cmd_budget_list(db: &Database) -> Result<()> {
    let budgets = db.list_budgets()?;

    if budgets.is_empty() {
        println!("No budgets set. Set one with: finlens budget set \"Food & Dining\" 400");
        return Ok(());
    }

    println!("{:<25}  {:>12}", "CATEGORY", "MONTHLY");
    println!("{}", "-".repeat(39));
    for b in &budgets {
        println!("{:<25}  {:>12.2}", b.category.as_str(), b.monthly_limit);
    }

    Ok(())
}

pub fn cmd_budget_set(db: &Database, category: &str, limit: f64) -> Result<()> {
    let category: CategoryLabel = category.parse()?;
    db.upsert_budget(category, limit)?;
    println!("✅ Budget for {} set to ${:.2}/month", category, limit);
    Ok(())
}
