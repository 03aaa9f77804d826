//! Reference data and shared records for the decision engines

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Longest description or question accepted, in characters
pub const MAX_INPUT_CHARS: usize = 500;

/// Trim free text and enforce the 1..=500 character bound
pub fn normalize_input<'a>(text: &'a str, field: &str) -> Result<&'a str, Error> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(Error::Validation(format!("{} must not be empty", field)));
    }
    let chars = trimmed.chars().count();
    if chars > MAX_INPUT_CHARS {
        return Err(Error::Validation(format!(
            "{} must be at most {} characters (got {})",
            field, MAX_INPUT_CHARS, chars
        )));
    }
    Ok(trimmed)
}

/// Closed expense category taxonomy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CategoryLabel {
    #[serde(rename = "Food & Dining")]
    FoodDining,
    #[serde(rename = "Transportation")]
    Transportation,
    #[serde(rename = "Shopping")]
    Shopping,
    #[serde(rename = "Entertainment")]
    Entertainment,
    #[serde(rename = "Bills & Utilities")]
    BillsUtilities,
    #[serde(rename = "Healthcare")]
    Healthcare,
    #[serde(rename = "Education")]
    Education,
    #[serde(rename = "Personal Care")]
    PersonalCare,
    #[serde(rename = "Travel")]
    Travel,
    #[serde(rename = "Savings & Investments")]
    SavingsInvestments,
    #[serde(rename = "Other")]
    Other,
}

impl CategoryLabel {
    pub const ALL: [CategoryLabel; 11] = [
        Self::FoodDining,
        Self::Transportation,
        Self::Shopping,
        Self::Entertainment,
        Self::BillsUtilities,
        Self::Healthcare,
        Self::Education,
        Self::PersonalCare,
        Self::Travel,
        Self::SavingsInvestments,
        Self::Other,
    ];

    /// Display name, also the value stored in the expenses table
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FoodDining => "Food & Dining",
            Self::Transportation => "Transportation",
            Self::Shopping => "Shopping",
            Self::Entertainment => "Entertainment",
            Self::BillsUtilities => "Bills & Utilities",
            Self::Healthcare => "Healthcare",
            Self::Education => "Education",
            Self::PersonalCare => "Personal Care",
            Self::Travel => "Travel",
            Self::SavingsInvestments => "Savings & Investments",
            Self::Other => "Other",
        }
    }

    /// Stable snake_case identifier
    pub fn id(&self) -> &'static str {
        match self {
            Self::FoodDining => "food_dining",
            Self::Transportation => "transportation",
            Self::Shopping => "shopping",
            Self::Entertainment => "entertainment",
            Self::BillsUtilities => "bills_utilities",
            Self::Healthcare => "healthcare",
            Self::Education => "education",
            Self::PersonalCare => "personal_care",
            Self::Travel => "travel",
            Self::SavingsInvestments => "savings_investments",
            Self::Other => "other",
        }
    }

    pub fn icon(&self) -> &'static str {
        match self {
            Self::FoodDining => "🍔",
            Self::Transportation => "🚗",
            Self::Shopping => "🛍️",
            Self::Entertainment => "🎬",
            Self::BillsUtilities => "💡",
            Self::Healthcare => "🏥",
            Self::Education => "📚",
            Self::PersonalCare => "💇",
            Self::Travel => "✈️",
            Self::SavingsInvestments => "💰",
            Self::Other => "📌",
        }
    }

    pub fn color(&self) -> &'static str {
        match self {
            Self::FoodDining => "#ef4444",
            Self::Transportation => "#f59e0b",
            Self::Shopping => "#8b5cf6",
            Self::Entertainment => "#ec4899",
            Self::BillsUtilities => "#3b82f6",
            Self::Healthcare => "#10b981",
            Self::Education => "#6366f1",
            Self::PersonalCare => "#f97316",
            Self::Travel => "#14b8a6",
            Self::SavingsInvestments => "#22c55e",
            Self::Other => "#6b7280",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::FoodDining => "Restaurants, groceries, and food delivery",
            Self::Transportation => "Ride-sharing, public transit, and fuel",
            Self::Shopping => "Retail purchases and online shopping",
            Self::Entertainment => "Movies, streaming, games, and events",
            Self::BillsUtilities => "Recurring bills and utilities",
            Self::Healthcare => "Medical expenses and healthcare",
            Self::Education => "Educational expenses and courses",
            Self::PersonalCare => "Personal grooming and fitness",
            Self::Travel => "Travel and accommodation",
            Self::SavingsInvestments => "Savings and investment transfers",
            Self::Other => "Miscellaneous expenses",
        }
    }

    /// Words people use for the category in questions ("food", "groceries")
    pub fn aliases(&self) -> &'static [&'static str] {
        match self {
            Self::FoodDining => &[
                "food",
                "dining",
                "food and dining",
                "groceries",
                "restaurants",
                "eating out",
                "meals",
            ],
            Self::Transportation => &["transportation", "transport", "rides", "fuel", "commute"],
            Self::Shopping => &["shopping", "retail", "clothes", "clothing"],
            Self::Entertainment => &["entertainment", "movies", "streaming", "games"],
            Self::BillsUtilities => &["bills", "utilities", "bills and utilities", "rent"],
            Self::Healthcare => &["healthcare", "health", "medical", "medicine"],
            Self::Education => &["education", "school", "tuition", "courses"],
            Self::PersonalCare => &["personal care", "beauty", "grooming", "fitness"],
            Self::Travel => &["travel", "trips", "hotels", "flights", "vacation"],
            Self::SavingsInvestments => &[
                "savings",
                "investments",
                "investing",
                "savings and investments",
            ],
            Self::Other => &["other", "miscellaneous"],
        }
    }

    /// Exact, case-insensitive lookup by display name or identifier
    pub fn parse(s: &str) -> Option<Self> {
        let needle = s.trim();
        Self::ALL.iter().copied().find(|label| {
            label.as_str().eq_ignore_ascii_case(needle) || label.id().eq_ignore_ascii_case(needle)
        })
    }

    /// Display names of the whole taxonomy, for prompts
    pub fn taxonomy() -> Vec<&'static str> {
        Self::ALL.iter().map(|c| c.as_str()).collect()
    }
}

impl fmt::Display for CategoryLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CategoryLabel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| Error::Validation(format!("Unknown category: {}", s)))
    }
}

/// Provenance of a categorization decision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CategorizationMethod {
    Rule,
    Fallback,
    Manual,
}

impl CategorizationMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Rule => "rule",
            Self::Fallback => "fallback",
            Self::Manual => "manual",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "rule" => Some(Self::Rule),
            "fallback" => Some(Self::Fallback),
            "manual" => Some(Self::Manual),
            _ => None,
        }
    }
}

impl fmt::Display for CategorizationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the caller should do with a decision, derived from its confidence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionTier {
    AutoApply,
    ApplyWithFlag,
    RequireConfirmation,
}

impl ActionTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AutoApply => "auto_apply",
            Self::ApplyWithFlag => "apply_with_flag",
            Self::RequireConfirmation => "require_confirmation",
        }
    }
}

impl fmt::Display for ActionTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Closed set of question shapes the query engine can answer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    TotalByCategoryTimeframe,
    TotalSpendingTimeframe,
    TopNExpenses,
    BudgetStatus,
    PeriodComparison,
    CategoryBreakdown,
    Unknown,
}

impl Intent {
    /// Every intent that has a query shape (excludes `Unknown`)
    pub const KNOWN: [Intent; 6] = [
        Self::TotalByCategoryTimeframe,
        Self::TotalSpendingTimeframe,
        Self::TopNExpenses,
        Self::BudgetStatus,
        Self::PeriodComparison,
        Self::CategoryBreakdown,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TotalByCategoryTimeframe => "total_by_category_timeframe",
            Self::TotalSpendingTimeframe => "total_spending_timeframe",
            Self::TopNExpenses => "top_n_expenses",
            Self::BudgetStatus => "budget_status",
            Self::PeriodComparison => "period_comparison",
            Self::CategoryBreakdown => "category_breakdown",
            Self::Unknown => "unknown",
        }
    }

    /// One-line description used in the intent classification prompt
    pub fn describe(&self) -> &'static str {
        match self {
            Self::TotalByCategoryTimeframe => {
                "total spent in one category over a time window (e.g. food last 30 days)"
            }
            Self::TotalSpendingTimeframe => "total spent across all categories over a time window",
            Self::TopNExpenses => "the largest individual expenses",
            Self::BudgetStatus => "whether spending is within monthly budgets",
            Self::PeriodComparison => "spending in the current period versus the previous one",
            Self::CategoryBreakdown => "spending split by category over a time window",
            Self::Unknown => "anything else",
        }
    }

    /// Strict lookup: only exact identifiers are accepted
    pub fn parse(s: &str) -> Option<Self> {
        let needle = s.trim().to_ascii_lowercase();
        Self::KNOWN
            .iter()
            .copied()
            .chain(std::iter::once(Self::Unknown))
            .find(|i| i.as_str() == needle)
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which engine produced an audit entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditKind {
    Categorization,
    Query,
}

impl AuditKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Categorization => "categorization",
            Self::Query => "query",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "categorization" => Some(Self::Categorization),
            "query" => Some(Self::Query),
            _ => None,
        }
    }
}

/// A recorded expense (the rows query templates read)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Expense {
    pub id: i64,
    pub date: NaiveDate,
    pub description: String,
    pub amount: f64,
    pub category: CategoryLabel,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NewExpense {
    pub date: NaiveDate,
    pub description: String,
    pub amount: f64,
    pub category: CategoryLabel,
}

/// Monthly spending limit for one category
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Budget {
    pub category: CategoryLabel,
    pub monthly_limit: f64,
}

/// Audit entry to append (id and timestamp are assigned by the ledger)
#[derive(Debug, Clone, PartialEq)]
pub struct NewAuditEntry {
    pub kind: AuditKind,
    /// Categorization method (rule/fallback/manual) or query intent
    pub method: String,
    pub confidence: Option<f64>,
    pub input_summary: String,
    pub output_summary: String,
    /// Model that produced the decision ("rules" for deterministic paths)
    pub model: Option<String>,
    pub latency_ms: Option<i64>,
    /// Audit id of the decision this one replaces (manual overrides)
    pub supersedes: Option<i64>,
}

/// Stored audit ledger entry
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditEntry {
    pub id: i64,
    pub kind: AuditKind,
    pub method: String,
    pub confidence: Option<f64>,
    pub input_summary: String,
    pub output_summary: String,
    pub model: Option<String>,
    pub latency_ms: Option<i64>,
    pub supersedes: Option<i64>,
    pub timestamp: DateTime<Utc>,
}
