//! Natural-language question command

use anyhow::Result;
use chrono::Local;
use finlens_core::{ClarifyingResponse, QueryAnswer};

use super::{parse_date, Engines};

pub async fn cmd_ask(
    engines: &Engines,
    question: &str,
    today: Option<&str>,
    json: bool,
) -> Result<()> {
    let today = match today {
        Some(d) => parse_date(d, "--today")?,
        None => Local::now().date_naive(),
    };

    let answer = match engines.query.ask_on(question, today).await {
        Ok(answer) => answer,
        Err(e) => match ClarifyingResponse::from_error(&e) {
            Some(clarification) => {
                if json {
                    println!("{}", serde_json::to_string_pretty(&clarification)?);
                } else {
                    print_clarification(&clarification);
                }
                return Ok(());
            }
            None => return Err(e.into()),
        },
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&answer)?);
    } else {
        print_answer(&answer);
    }
    Ok(())
}

fn print_answer(answer: &QueryAnswer) {
    println!("{}", answer.explanation);
    println!();
    println!(
        "   {} ({}), confidence {:.0}%, {} row(s)",
        answer.intent.as_str(),
        answer.template_id,
        answer.confidence * 100.0,
        answer.result_count
    );
    if !answer.parameters.is_empty() {
        println!("   Parameters: {}", answer.parameters.summary());
    }
}

fn print_clarification(clarification: &ClarifyingResponse) {
    println!("🤔 {}", clarification.message);
    for failure in &clarification.parameters {
        println!("   - {}: {}", failure.name, failure.reason);
    }
    println!();
    println!("Try asking:");
    for example in &clarification.examples {
        println!("  • {}", example);
    }
}
