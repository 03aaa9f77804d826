//! Natural-language explanations grounded in query rows
//!
//! The deterministic rendering is always produced first. It prints only row
//! values (rounded for display), parameter values and list positions; derived
//! figures such as budget overruns, shares and period differences come from
//! template columns, never from arithmetic here. A model may rephrase the
//! draft, but the rephrasing is only used when every number in it can be
//! traced back to the draft or the rows.

use std::time::Duration;

use serde_json::Value;
use tracing::{debug, warn};

use crate::ai::{call_with_retry, AIBackend, AIClient};
use crate::models::Intent;

use super::executor::ResultRow;
use super::params::ParameterSet;

/// Finished explanation text
#[derive(Debug, Clone, PartialEq)]
pub struct Explanation {
    pub text: String,
    /// True when a model rephrasing passed the number check
    pub polished: bool,
}

pub struct ExplanationGenerator {
    ai: Option<AIClient>,
    polish: bool,
    timeout: Duration,
}

impl ExplanationGenerator {
    /// Deterministic explanations only
    pub fn deterministic() -> Self {
        Self {
            ai: None,
            polish: false,
            timeout: Duration::from_secs(15),
        }
    }

    pub fn new(ai: Option<AIClient>, polish: bool, timeout: Duration) -> Self {
        Self { ai, polish, timeout }
    }

    pub async fn explain(
        &self,
        question: &str,
        params: &ParameterSet,
        rows: &[ResultRow],
    ) -> Explanation {
        let (draft, has_data) = render(params, rows);

        let ai = match self.ai {
            Some(ref ai) if self.polish && has_data => ai,
            _ => {
                return Explanation {
                    text: draft,
                    polished: false,
                }
            }
        };

        let facts = serde_json::to_string(rows).unwrap_or_default();
        let response = call_with_retry(self.timeout, || ai.explain_result(question, &draft, &facts)).await;

        match response {
            Ok(text) if !text.trim().is_empty() && grounded(text.trim(), &draft, rows) => {
                debug!(intent = %params.intent, "Using polished explanation");
                Explanation {
                    text: text.trim().to_string(),
                    polished: true,
                }
            }
            Ok(_) => {
                warn!(intent = %params.intent, "Polished explanation cited unknown figures, using draft");
                Explanation {
                    text: draft,
                    polished: false,
                }
            }
            Err(e) => {
                warn!(error = %e, "Explanation polishing failed, using draft");
                Explanation {
                    text: draft,
                    polished: false,
                }
            }
        }
    }
}

/// Deterministic explanation, plus whether any matching data was found
pub fn render(params: &ParameterSet, rows: &[ResultRow]) -> (String, bool) {
    let days = params.integer("days").unwrap_or(30);
    let window = window(days);

    match params.intent {
        Intent::TotalByCategoryTimeframe => {
            let category = params
                .category()
                .map(|c| c.as_str())
                .unwrap_or("the selected category");
            match rows.first().filter(|r| r.i64("expense_count").unwrap_or(0) > 0) {
                Some(row) => {
                    let count = row.i64("expense_count").unwrap_or(0);
                    (
                        format!(
                            "You spent {} on {} {} across {}.",
                            money(row.f64("total").unwrap_or(0.0)),
                            category,
                            window,
                            plural(count, "expense")
                        ),
                        true,
                    )
                }
                None => (
                    format!("No matching data found: no {} expenses {}.", category, window),
                    false,
                ),
            }
        }
        Intent::TotalSpendingTimeframe => {
            match rows.first().filter(|r| r.i64("expense_count").unwrap_or(0) > 0) {
                Some(row) => (
                    format!(
                        "You spent {} in total {} across {}.",
                        money(row.f64("total").unwrap_or(0.0)),
                        window,
                        plural(row.i64("expense_count").unwrap_or(0), "expense")
                    ),
                    true,
                ),
                None => (format!("No matching data found: no expenses {}.", window), false),
            }
        }
        Intent::TopNExpenses => {
            if rows.is_empty() {
                return (format!("No matching data found: no expenses {}.", window), false);
            }
            let items = rows
                .iter()
                .enumerate()
                .map(|(i, row)| {
                    format!(
                        "{}. {} ({}, {}) {}",
                        i + 1,
                        row.str("description").unwrap_or("?"),
                        row.str("category").unwrap_or("?"),
                        row.str("date").unwrap_or("?"),
                        money(row.f64("amount").unwrap_or(0.0))
                    )
                })
                .collect::<Vec<_>>()
                .join("; ");
            let heading = if rows.len() == 1 {
                "Your largest expense".to_string()
            } else {
                format!("Your {} largest expenses", rows.len())
            };
            (format!("{} {}: {}.", heading, window, items), true)
        }
        Intent::BudgetStatus => render_budget(params, rows),
        Intent::PeriodComparison => render_comparison(days, rows),
        Intent::CategoryBreakdown => {
            if rows.is_empty() {
                return (format!("No matching data found: no expenses {}.", window), false);
            }
            let grand = rows[0].f64("grand_total").unwrap_or(0.0);
            let parts = rows
                .iter()
                .map(|row| {
                    format!(
                        "{} {} ({:.1}%)",
                        row.str("category").unwrap_or("?"),
                        money(row.f64("total").unwrap_or(0.0)),
                        row.f64("share_pct").unwrap_or(0.0)
                    )
                })
                .collect::<Vec<_>>()
                .join(", ");
            (
                format!("Spending by category {}: {}. Total: {}.", window, parts, money(grand)),
                true,
            )
        }
        Intent::Unknown => ("No matching data found.".to_string(), false),
    }
}

fn render_budget(params: &ParameterSet, rows: &[ResultRow]) -> (String, bool) {
    if rows.is_empty() {
        let scope = params
            .category()
            .map(|c| format!(" for {}", c))
            .unwrap_or_default();
        return (format!("No matching data found: no budget is set{}.", scope), false);
    }

    let over: Vec<&ResultRow> = rows
        .iter()
        .filter(|r| r.i64("over_budget").unwrap_or(0) == 1)
        .collect();
    let category = |r: &ResultRow| r.str("category").unwrap_or("?").to_string();
    let spent = |r: &ResultRow| r.f64("spent").unwrap_or(0.0);
    let limit = |r: &ResultRow| r.f64("monthly_limit").unwrap_or(0.0);
    let remaining = |r: &ResultRow| r.f64("remaining").unwrap_or(0.0);

    if !over.is_empty() {
        let details = over
            .iter()
            .map(|r| {
                format!(
                    "{} ({} spent of {}, {} over)",
                    category(r),
                    money(spent(r)),
                    money(limit(r)),
                    money(r.f64("over_by").unwrap_or(0.0))
                )
            })
            .collect::<Vec<_>>()
            .join("; ");
        let of = if rows.len() == 1 {
            String::new()
        } else {
            format!(" in {} of {} budgets", over.len(), rows.len())
        };
        return (format!("You are over budget{} this month: {}.", of, details), true);
    }

    let top = &rows[0];
    let text = if rows.len() == 1 {
        format!(
            "You are within budget for {} this month: {} spent of {}, {} remaining.",
            category(top),
            money(spent(top)),
            money(limit(top)),
            money(remaining(top))
        )
    } else {
        format!(
            "You are within budget in all {} categories this month. Highest: {} at {} of {}.",
            rows.len(),
            category(top),
            money(spent(top)),
            money(limit(top))
        )
    };
    (text, true)
}

fn render_comparison(days: i64, rows: &[ResultRow]) -> (String, bool) {
    let Some(row) = rows.first() else {
        return ("No matching data found: no expenses in either period.".to_string(), false);
    };
    let current_count = row.i64("current_count").unwrap_or(0);
    let previous_count = row.i64("previous_count").unwrap_or(0);
    if current_count == 0 && previous_count == 0 {
        return ("No matching data found: no expenses in either period.".to_string(), false);
    }

    let current = row.f64("current_total").unwrap_or(0.0);
    let previous = row.f64("previous_total").unwrap_or(0.0);
    let diff = row.f64("difference").unwrap_or(0.0);
    let direction = if diff > 0.0 { "more" } else { "less" };
    // change_pct is NULL when there is nothing to compare against
    let change = match row.f64("change_pct") {
        _ if diff.abs() < 0.005 => "the same amount".to_string(),
        Some(pct) => format!("{} {} ({:.1}%)", money(diff.abs()), direction, pct.abs()),
        None => format!("{} {}", money(diff.abs()), direction),
    };

    (
        format!(
            "You spent {} in the last {} compared with {} in the {} before, {}.",
            money(current),
            plural(days, "day"),
            money(previous),
            plural(days, "day"),
            change
        ),
        true,
    )
}

fn window(days: i64) -> String {
    if days == 1 {
        "today".to_string()
    } else {
        format!("in the last {} days", days)
    }
}

fn money(value: f64) -> String {
    format!("${:.2}", value)
}

fn plural(n: i64, noun: &str) -> String {
    if n == 1 {
        format!("1 {}", noun)
    } else {
        format!("{} {}s", n, noun)
    }
}

/// Every number in `text` appears in the draft or the rows
fn grounded(text: &str, draft: &str, rows: &[ResultRow]) -> bool {
    let mut known = numbers_in(draft);
    for row in rows {
        for (_, value) in row.columns() {
            match value {
                Value::Number(n) => known.extend(n.as_f64()),
                Value::String(s) => known.extend(numbers_in(s)),
                _ => {}
            }
        }
    }

    numbers_in(text)
        .iter()
        .all(|n| known.iter().any(|k| (k - n).abs() < 0.005))
}

/// Numeric literals in text; "1,234.50" reads as 1234.5, malformed runs as NaN
fn numbers_in(text: &str) -> Vec<f64> {
    let chars: Vec<char> = text.chars().collect();
    let mut numbers = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        if !chars[i].is_ascii_digit() {
            i += 1;
            continue;
        }
        let mut raw = String::new();
        while i < chars.len() {
            let c = chars[i];
            let digit_follows = chars.get(i + 1).map_or(false, |n| n.is_ascii_digit());
            if c.is_ascii_digit() {
                raw.push(c);
            } else if c == '.' && digit_follows {
                raw.push('.');
            } else if c != ',' || !digit_follows {
                break;
            }
            i += 1;
        }
        numbers.push(raw.parse().unwrap_or(f64::NAN));
    }
    numbers
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::{MockBackend, MockFailure};
    use crate::models::CategoryLabel;
    use crate::query::params::ParamValue;
    use chrono::NaiveDate;

    fn params(intent: Intent, values: &[(&'static str, ParamValue)]) -> ParameterSet {
        let mut set = ParameterSet::new(intent, NaiveDate::from_ymd_opt(2024, 6, 15).unwrap());
        for (name, value) in values {
            set.insert(name, *value);
        }
        set
    }

    fn food_30() -> ParameterSet {
        params(
            Intent::TotalByCategoryTimeframe,
            &[
                ("category", ParamValue::Category(CategoryLabel::FoodDining)),
                ("days", ParamValue::Integer(30)),
            ],
        )
    }

    fn food_rows() -> Vec<ResultRow> {
        vec![ResultRow::new()
            .with("category", "Food & Dining")
            .with("total", 87.3)
            .with("expense_count", 3)]
    }

    fn polisher(mock: MockBackend) -> ExplanationGenerator {
        ExplanationGenerator::new(Some(AIClient::Mock(mock)), true, Duration::from_millis(50))
    }

    #[test]
    fn test_total_by_category_cites_exact_total() {
        let (text, has_data) = render(&food_30(), &food_rows());
        assert!(has_data);
        assert_eq!(
            text,
            "You spent $87.30 on Food & Dining in the last 30 days across 3 expenses."
        );
    }

    #[test]
    fn test_zero_count_aggregate_is_no_data() {
        let rows = vec![ResultRow::new()
            .with("category", "Food & Dining")
            .with("total", 0)
            .with("expense_count", 0)];
        let (text, has_data) = render(&food_30(), &rows);
        assert!(!has_data);
        assert!(text.starts_with("No matching data found"));
    }

    #[test]
    fn test_top_expenses_listing() {
        let p = params(
            Intent::TopNExpenses,
            &[("limit", ParamValue::Integer(2)), ("days", ParamValue::Integer(7))],
        );
        let rows = vec![
            ResultRow::new()
                .with("description", "Flight to Lisbon")
                .with("category", "Travel")
                .with("date", "2024-06-10")
                .with("amount", 420.0),
            ResultRow::new()
                .with("description", "Groceries")
                .with("category", "Food & Dining")
                .with("date", "2024-06-12")
                .with("amount", 64.25),
        ];
        let (text, _) = render(&p, &rows);
        assert_eq!(
            text,
            "Your 2 largest expenses in the last 7 days: 1. Flight to Lisbon (Travel, 2024-06-10) $420.00; 2. Groceries (Food & Dining, 2024-06-12) $64.25."
        );
        let (empty, has_data) = render(&p, &[]);
        assert!(!has_data);
        assert!(empty.contains("No matching data"));
    }

    #[test]
    fn test_budget_over_and_within() {
        let p = params(Intent::BudgetStatus, &[]);
        let rows = vec![
            ResultRow::new()
                .with("category", "Food & Dining")
                .with("monthly_limit", 300.0)
                .with("spent", 350.5)
                .with("remaining", -50.5)
                .with("over_budget", 1)
                .with("over_by", 50.5),
            ResultRow::new()
                .with("category", "Travel")
                .with("monthly_limit", 500.0)
                .with("spent", 120.0)
                .with("remaining", 380.0)
                .with("over_budget", 0)
                .with("over_by", 0.0),
        ];
        let (text, _) = render(&p, &rows);
        assert_eq!(
            text,
            "You are over budget in 1 of 2 budgets this month: Food & Dining ($350.50 spent of $300.00, $50.50 over)."
        );

        let (text, _) = render(&p, &rows[1..]);
        assert_eq!(
            text,
            "You are within budget for Travel this month: $120.00 spent of $500.00, $380.00 remaining."
        );
    }

    #[test]
    fn test_comparison() {
        let p = params(Intent::PeriodComparison, &[("days", ParamValue::Integer(30))]);
        let rows = vec![ResultRow::new()
            .with("current_total", 150.0)
            .with("previous_total", 100.0)
            .with("difference", 50.0)
            .with("change_pct", 50.0)
            .with("current_count", 4)
            .with("previous_count", 2)];
        let (text, _) = render(&p, &rows);
        assert_eq!(
            text,
            "You spent $150.00 in the last 30 days compared with $100.00 in the 30 days before, $50.00 more (50.0%)."
        );
    }

    #[test]
    fn test_comparison_without_previous_spending() {
        let p = params(Intent::PeriodComparison, &[("days", ParamValue::Integer(7))]);
        let rows = vec![ResultRow::new()
            .with("current_total", 40.0)
            .with("previous_total", 0.0)
            .with("difference", 40.0)
            .with("change_pct", Value::Null)
            .with("current_count", 1)
            .with("previous_count", 0)];
        let (text, _) = render(&p, &rows);
        assert!(text.ends_with("$40.00 more."), "{}", text);
    }

    #[test]
    fn test_breakdown_percentages() {
        let p = params(Intent::CategoryBreakdown, &[("days", ParamValue::Integer(30))]);
        let rows = vec![
            ResultRow::new()
                .with("category", "Travel")
                .with("total", 75.0)
                .with("expense_count", 1)
                .with("share_pct", 75.0)
                .with("grand_total", 100.0),
            ResultRow::new()
                .with("category", "Shopping")
                .with("total", 25.0)
                .with("expense_count", 2)
                .with("share_pct", 25.0)
                .with("grand_total", 100.0),
        ];
        let (text, _) = render(&p, &rows);
        assert_eq!(
            text,
            "Spending by category in the last 30 days: Travel $75.00 (75.0%), Shopping $25.00 (25.0%). Total: $100.00."
        );
    }

    #[test]
    fn test_numbers_in() {
        assert_eq!(numbers_in("spent $1,234.50 on 3 things."), vec![1234.5, 3.0]);
        assert_eq!(numbers_in("2024-06-15"), vec![2024.0, 6.0, 15.0]);
        assert!(numbers_in("no digits").is_empty());
    }

    #[tokio::test]
    async fn test_polish_accepted_when_grounded() {
        let mock = MockBackend::new()
            .with_explanation("Over the past 30 days, food cost you $87.30 over 3 purchases.");
        let explanation = polisher(mock).explain("food?", &food_30(), &food_rows()).await;
        assert!(explanation.polished);
        assert!(explanation.text.contains("$87.30"));
    }

    #[tokio::test]
    async fn test_polish_rejected_when_inventing_numbers() {
        let mock = MockBackend::new().with_explanation("You spent $95.00 on food, 12% more.");
        let explanation = polisher(mock).explain("food?", &food_30(), &food_rows()).await;
        assert!(!explanation.polished);
        assert!(explanation.text.contains("$87.30"));
    }

    #[tokio::test]
    async fn test_polish_may_cite_template_derived_figures() {
        let p = params(Intent::BudgetStatus, &[]);
        let rows = vec![ResultRow::new()
            .with("category", "Food & Dining")
            .with("monthly_limit", 300.0)
            .with("spent", 350.5)
            .with("remaining", -50.5)
            .with("over_budget", 1)
            .with("over_by", 50.5)];
        let mock = MockBackend::new()
            .with_explanation("Food & Dining is $50.50 past its $300.00 limit this month.");
        let explanation = polisher(mock).explain("over budget?", &p, &rows).await;
        assert!(explanation.polished);
    }

    #[tokio::test]
    async fn test_polish_failure_falls_back_to_draft() {
        let mock = MockBackend::new().failing(MockFailure::Provider("boom".into()));
        let explanation = polisher(mock.clone()).explain("food?", &food_30(), &food_rows()).await;
        assert!(!explanation.polished);
        assert_eq!(mock.explain_calls(), 1);
    }

    #[tokio::test]
    async fn test_no_data_is_never_polished() {
        let mock = MockBackend::new();
        let explanation = polisher(mock.clone()).explain("food?", &food_30(), &[]).await;
        assert!(!explanation.polished);
        assert_eq!(mock.explain_calls(), 0);
    }
}
