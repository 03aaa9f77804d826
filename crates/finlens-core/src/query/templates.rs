//! Pre-vetted query templates
//!
//! This module is the only place that holds SQL for the query engine. Every
//! value reaches the store through a named placeholder (`:category`,
//! `:days`, `:limit`, `:today`); question text never becomes query text.

use crate::error::{Error, Result};
use crate::models::Intent;

/// Parameter types a template can declare
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
    /// A label from the closed category set
    Category,
    /// Window length in days, 1..=366
    Days,
    /// Row limit, 1..=50
    Limit,
}

impl ParamType {
    /// Inclusive bounds for integer parameters
    pub fn bounds(&self) -> Option<(i64, i64)> {
        match self {
            Self::Category => None,
            Self::Days => Some((1, 366)),
            Self::Limit => Some((1, 50)),
        }
    }
}

/// One declared template parameter
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamSpec {
    pub name: &'static str,
    pub kind: ParamType,
    pub required: bool,
    /// Used only when the parameter is absent from the question
    pub default: Option<i64>,
}

const fn required(name: &'static str, kind: ParamType) -> ParamSpec {
    ParamSpec {
        name,
        kind,
        required: true,
        default: None,
    }
}

const fn optional(name: &'static str, kind: ParamType, default: Option<i64>) -> ParamSpec {
    ParamSpec {
        name,
        kind,
        required: false,
        default,
    }
}

/// A parameterized, read-only query
#[derive(Debug, PartialEq)]
pub struct QueryTemplate {
    pub id: &'static str,
    pub intent: Intent,
    pub description: &'static str,
    pub params: &'static [ParamSpec],
    pub sql: &'static str,
}

impl QueryTemplate {
    pub fn param(&self, name: &str) -> Option<&ParamSpec> {
        self.params.iter().find(|p| p.name == name)
    }
}

const TOTAL_BY_CATEGORY: QueryTemplate = QueryTemplate {
    id: "total_by_category_v1",
    intent: Intent::TotalByCategoryTimeframe,
    description: "Total spent in one category over the last N days",
    params: &[
        required("category", ParamType::Category),
        required("days", ParamType::Days),
    ],
    sql: "SELECT :category AS category,
                 COALESCE(SUM(amount), 0) AS total,
                 COUNT(*) AS expense_count
          FROM expenses
          WHERE category = :category
            AND date > date(:today, '-' || :days || ' days')
            AND date <= :today",
};

const TOTAL_SPENDING: QueryTemplate = QueryTemplate {
    id: "total_spending_v1",
    intent: Intent::TotalSpendingTimeframe,
    description: "Total spent across all categories over the last N days",
    params: &[required("days", ParamType::Days)],
    sql: "SELECT COALESCE(SUM(amount), 0) AS total,
                 COUNT(*) AS expense_count
          FROM expenses
          WHERE date > date(:today, '-' || :days || ' days')
            AND date <= :today",
};

const TOP_EXPENSES: QueryTemplate = QueryTemplate {
    id: "top_expenses_v1",
    intent: Intent::TopNExpenses,
    description: "Largest individual expenses over the last N days",
    params: &[
        optional("limit", ParamType::Limit, Some(5)),
        optional("days", ParamType::Days, Some(30)),
    ],
    sql: "SELECT id, date, description, category, amount
          FROM expenses
          WHERE date > date(:today, '-' || :days || ' days')
            AND date <= :today
          ORDER BY amount DESC, date DESC, id ASC
          LIMIT :limit",
};

const BUDGET_STATUS: QueryTemplate = QueryTemplate {
    id: "budget_status_v1",
    intent: Intent::BudgetStatus,
    description: "Month-to-date spending against each monthly budget",
    params: &[optional("category", ParamType::Category, None)],
    sql: "SELECT b.category AS category,
                 b.monthly_limit AS monthly_limit,
                 COALESCE(SUM(e.amount), 0) AS spent,
                 b.monthly_limit - COALESCE(SUM(e.amount), 0) AS remaining,
                 CASE WHEN COALESCE(SUM(e.amount), 0) > b.monthly_limit THEN 1 ELSE 0 END AS over_budget,
                 MAX(COALESCE(SUM(e.amount), 0) - b.monthly_limit, 0) AS over_by
          FROM budgets b
          LEFT JOIN expenses e
            ON e.category = b.category
           AND e.date >= date(:today, 'start of month')
           AND e.date <= :today
          WHERE :category IS NULL OR b.category = :category
          GROUP BY b.category, b.monthly_limit
          ORDER BY over_budget DESC, spent DESC, b.category ASC",
};

const PERIOD_COMPARISON: QueryTemplate = QueryTemplate {
    id: "period_comparison_v1",
    intent: Intent::PeriodComparison,
    description: "Spending in the last N days versus the N days before",
    params: &[optional("days", ParamType::Days, Some(30))],
    sql: "SELECT current_total,
                 previous_total,
                 current_total - previous_total AS difference,
                 CASE WHEN previous_total > 0
                      THEN (current_total - previous_total) * 100.0 / previous_total END AS change_pct,
                 current_count,
                 previous_count
          FROM (
              SELECT COALESCE(SUM(CASE WHEN date > date(:today, '-' || :days || ' days')
                                       THEN amount END), 0) AS current_total,
                     COALESCE(SUM(CASE WHEN date <= date(:today, '-' || :days || ' days')
                                       THEN amount END), 0) AS previous_total,
                     COUNT(CASE WHEN date > date(:today, '-' || :days || ' days')
                                THEN 1 END) AS current_count,
                     COUNT(CASE WHEN date <= date(:today, '-' || :days || ' days')
                                THEN 1 END) AS previous_count
              FROM expenses
              WHERE date > date(:today, '-' || (:days * 2) || ' days')
                AND date <= :today
          )",
};

const CATEGORY_BREAKDOWN: QueryTemplate = QueryTemplate {
    id: "category_breakdown_v1",
    intent: Intent::CategoryBreakdown,
    description: "Spending per category over the last N days",
    params: &[required("days", ParamType::Days)],
    sql: "SELECT category,
                 SUM(amount) AS total,
                 COUNT(*) AS expense_count,
                 SUM(amount) * 100.0 / SUM(SUM(amount)) OVER () AS share_pct,
                 SUM(SUM(amount)) OVER () AS grand_total
          FROM expenses
          WHERE date > date(:today, '-' || :days || ' days')
            AND date <= :today
          GROUP BY category
          ORDER BY total DESC, category ASC",
};

static BUILTIN: [QueryTemplate; 6] = [
    TOTAL_BY_CATEGORY,
    TOTAL_SPENDING,
    TOP_EXPENSES,
    BUDGET_STATUS,
    PERIOD_COMPARISON,
    CATEGORY_BREAKDOWN,
];

/// Read-only intent → template lookup
#[derive(Debug, Clone, Copy)]
pub struct TemplateRegistry {
    templates: &'static [QueryTemplate],
}

impl Default for TemplateRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl TemplateRegistry {
    pub fn builtin() -> Self {
        Self {
            templates: &BUILTIN,
        }
    }

    /// Template for an intent; `unknown` and unregistered intents are terminal
    pub fn get(&self, intent: Intent) -> Result<&'static QueryTemplate> {
        self.templates
            .iter()
            .find(|t| t.intent == intent)
            .ok_or_else(|| Error::NoTemplate(intent.as_str().to_string()))
    }

    pub fn all(&self) -> &'static [QueryTemplate] {
        self.templates
    }
}
