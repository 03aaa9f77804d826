//! FinLens CLI - Expense categorization and spending questions
//!
//! Usage:
//!   finlens init                         Initialize database
//!   finlens classify "Uber ride"         Categorize a description
//!   finlens ask "Am I over budget?"      Ask a question about spending
//!   finlens serve --port 3000            Start web server

mod cli;
mod commands;


use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::*;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).compact())
        .init();

    let config_path = cli.config.as_deref();

    match cli.command {
        Commands::Init => commands::cmd_init(&cli.db, cli.no_encrypt),
        Commands::Add {
            description,
            amount,
            category,
            date,
        } => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            let engines = commands::Engines::new(&db, config_path)?;
            commands::cmd_add(
                &db,
                &engines,
                &description,
                amount,
                category.as_deref(),
                date.as_deref(),
            )
            .await
        }
        Commands::Expenses { limit } => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            commands::cmd_expenses_list(&db, limit)
        }
        Commands::Budget { action } => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            match action {
                None | Some(BudgetAction::List) => commands::cmd_budget_list(&db),
                Some(BudgetAction::Set { category, limit }) => {
                    commands::cmd_budget_set(&db, &category, limit)
                }
            }
        }
        Commands::Classify { descriptions, json } => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            let engines = commands::Engines::new(&db, config_path)?;
            commands::cmd_classify(&engines, &descriptions, json).await
        }
        Commands::Override {
            description,
            category,
        } => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            let engines = commands::Engines::new(&db, config_path)?;
            commands::cmd_override(&engines, &description, &category)
        }
        Commands::Ask {
            question,
            today,
            json,
        } => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            let engines = commands::Engines::new(&db, config_path)?;
            commands::cmd_ask(&engines, &question, today.as_deref(), json).await
        }
        Commands::Audit { limit } => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            commands::cmd_audit(&db, limit)
        }
        Commands::Categories => commands::cmd_categories(),
        Commands::Config => commands::cmd_config(config_path),
        Commands::Prompts { action } => match action {
            None | Some(PromptsAction::List) => commands::cmd_prompts_list(),
            Some(PromptsAction::Show { prompt_id }) => commands::cmd_prompts_show(&prompt_id),
            Some(PromptsAction::Path) => commands::cmd_prompts_path(),
        },
        Commands::Serve {
            port,
            host,
            allowed_origins,
        } => {
            commands::cmd_serve(
                &cli.db,
                &host,
                port,
                allowed_origins,
                config_path,
                cli.no_encrypt,
            )
            .await
        }
    }
}
