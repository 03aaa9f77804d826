//! Parameter extraction and validation for query templates
//!
//! Values are pulled out of the question with fixed patterns and checked
//! against the template's declared schema. Nothing here produces query text.

use chrono::NaiveDate;
use regex::Regex;
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

use crate::error::{Error, ParameterFailure, Result};
use crate::models::{CategoryLabel, Intent};

use super::templates::{ParamSpec, ParamType, QueryTemplate};

/// Default similarity floor for category matching
pub const DEFAULT_CATEGORY_FLOOR: f64 = 0.8;

pub(crate) const NUMBER: &str = r"(\d+|one|two|three|four|five|six|seven|eight|nine|ten|twelve|twenty)";

/// Words that never name a category
const STOP_WORDS: &[&str] = &[
    "a", "about", "all", "am", "an", "and", "any", "are", "budget", "budgets", "by", "categories",
    "category", "compare", "day", "days", "did", "do", "each", "expense", "expenses", "for", "from", "have", "how", "i",
    "in", "is", "it", "last", "me", "month", "months", "much", "my", "of", "on", "over", "past",
    "per", "previous", "quarter", "show", "since", "so", "spend", "spending", "spent", "tell",
    "the", "this", "to", "today", "top", "total", "under", "versus", "vs", "was", "week", "weeks",
    "what", "whats", "within", "year", "years", "yesterday",
];

/// A validated parameter value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ParamValue {
    Category(CategoryLabel),
    Integer(i64),
}

impl std::fmt::Display for ParamValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Category(c) => write!(f, "{}", c),
            Self::Integer(n) => write!(f, "{}", n),
        }
    }
}

/// Validated parameters for one template, in schema order
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterSet {
    pub intent: Intent,
    pub reference_date: NaiveDate,
    values: Vec<(&'static str, ParamValue)>,
}

impl ParameterSet {
    pub fn new(intent: Intent, reference_date: NaiveDate) -> Self {
        Self {
            intent,
            reference_date,
            values: Vec::new(),
        }
    }

    /// Set a value, replacing any earlier one with the same name
    pub fn insert(&mut self, name: &'static str, value: ParamValue) {
        match self.values.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = value,
            None => self.values.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<ParamValue> {
        self.values
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, v)| *v)
    }

    pub fn category(&self) -> Option<CategoryLabel> {
        match self.get("category") {
            Some(ParamValue::Category(c)) => Some(c),
            _ => None,
        }
    }

    pub fn integer(&self, name: &str) -> Option<i64> {
        match self.get(name) {
            Some(ParamValue::Integer(n)) => Some(n),
            _ => None,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, ParamValue)> + '_ {
        self.values.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// "category=Food & Dining, days=30"
    pub fn summary(&self) -> String {
        self.values
            .iter()
            .map(|(n, v)| format!("{}={}", n, v))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl Serialize for ParameterSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.values.len()))?;
        for (name, value) in &self.values {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

/// Result of looking for one parameter in the question
#[derive(Debug, Clone, PartialEq)]
enum Found<T> {
    Absent,
    Valid(T),
    Invalid(String),
}

/// Extracts and validates template parameters from question text
pub struct ParameterExtractor {
    relative_window: Regex,
    named_windows: Vec<(Regex, i64)>,
    limit_patterns: Vec<Regex>,
    category_phrase: Regex,
    category_floor: f64,
}

impl ParameterExtractor {
    pub fn new(category_floor: f64) -> Result<Self> {
        let named_windows = [
            (r"\btoday\b", 1),
            (r"\byesterday\b", 2),
            (r"\b(?:this|last|past|previous)\s+week\b", 7),
            (r"\b(?:this|last|past|previous)\s+month\b", 30),
            (r"\b(?:this|last|past|previous)\s+quarter\b", 90),
            (r"\b(?:this|last|past|previous)\s+year\b", 365),
        ]
        .into_iter()
        .map(|(pattern, days)| Ok::<_, Error>((Regex::new(pattern)?, days)))
        .collect::<Result<Vec<_>>>()?;

        let limit_patterns = [
            format!(r"\btop\s+{}\b", NUMBER),
            format!(r"\b{}\s+(?:highest|largest|biggest|most\s+expensive)\b", NUMBER),
        ]
        .iter()
        .map(|p| Regex::new(p).map_err(Error::from))
        .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            relative_window: Regex::new(&format!(
                r"\b(?:last|past|previous)\s+{}\s+(day|week|month|year)s?\b",
                NUMBER
            ))?,
            named_windows,
            limit_patterns,
            category_phrase: Regex::new(
                r"\b(?:on|for|at|in)\s+([a-z][a-z &'-]*?)(?:\s+(?:in|during|over|for|from|since|this|last|past|previous|today|yesterday|so)\b|[?.!,]|$)",
            )?,
            category_floor,
        })
    }

    pub fn category_floor(&self) -> f64 {
        self.category_floor
    }

    /// Extract every parameter the template declares
    ///
    /// Fails with `ParameterValidation` listing each parameter that is missing
    /// (required, no default) or present but invalid.
    pub fn extract(
        &self,
        question: &str,
        template: &QueryTemplate,
        reference_date: NaiveDate,
    ) -> Result<ParameterSet> {
        let text = question.to_lowercase();
        let mut set = ParameterSet::new(template.intent, reference_date);
        let mut failures = Vec::new();

        for spec in template.params {
            let found = match spec.kind {
                ParamType::Days => self.days(&text),
                ParamType::Limit => self.limit(&text),
                ParamType::Category => self.category(&text),
            };

            match found.and_then_bounds(spec) {
                Found::Valid(value) => set.insert(spec.name, value),
                Found::Invalid(reason) => failures.push(ParameterFailure::new(spec.name, reason)),
                Found::Absent => match spec.default {
                    Some(default) => set.insert(spec.name, ParamValue::Integer(default)),
                    None if spec.required => {
                        failures.push(ParameterFailure::new(spec.name, missing_reason(spec.kind)))
                    }
                    None => {}
                },
            }
        }

        if failures.is_empty() {
            Ok(set)
        } else {
            Err(Error::ParameterValidation(failures))
        }
    }

    fn days(&self, text: &str) -> Found<ParamValue> {
        if let Some(caps) = self.relative_window.captures(text) {
            let Some(n) = parse_number(&caps[1]) else {
                return Found::Invalid(format!("'{}' is not a usable number", &caps[1]));
            };
            let unit = match &caps[2] {
                "week" => 7,
                "month" => 30,
                "year" => 365,
                _ => 1,
            };
            return match n.checked_mul(unit) {
                Some(days) => Found::Valid(ParamValue::Integer(days)),
                None => Found::Invalid("time window is too large".to_string()),
            };
        }

        self.named_windows
            .iter()
            .find(|(re, _)| re.is_match(text))
            .map(|(_, days)| Found::Valid(ParamValue::Integer(*days)))
            .unwrap_or(Found::Absent)
    }

    fn limit(&self, text: &str) -> Found<ParamValue> {
        for pattern in &self.limit_patterns {
            if let Some(caps) = pattern.captures(text) {
                return match parse_number(&caps[1]) {
                    Some(n) => Found::Valid(ParamValue::Integer(n)),
                    None => Found::Invalid(format!("'{}' is not a usable number", &caps[1])),
                };
            }
        }
        Found::Absent
    }

    fn category(&self, text: &str) -> Found<ParamValue> {
        // An explicit "on/for/at/in <phrase>" must name a category; a miss is
        // an error. Phrases made only of window words ("in the") are skipped.
        let named = self
            .category_phrase
            .captures_iter(text)
            .filter_map(|caps| caps.get(1))
            .map(|m| m.as_str().trim())
            .find(|phrase| !tokenize(phrase).is_empty());
        if let Some(phrase) = named {
            if let Some(explicit) = explicit_other(phrase) {
                return Found::Valid(ParamValue::Category(explicit));
            }
            return match best_category(phrase, self.category_floor) {
                Some(label) => Found::Valid(ParamValue::Category(label)),
                None => Found::Invalid(format!("'{}' is not a known category", phrase)),
            };
        }

        match best_category(text, self.category_floor) {
            Some(label) => Found::Valid(ParamValue::Category(label)),
            None => Found::Absent,
        }
    }
}

impl Found<ParamValue> {
    fn and_then_bounds(self, spec: &ParamSpec) -> Self {
        match (self, spec.kind.bounds()) {
            (Found::Valid(ParamValue::Integer(n)), Some((lo, hi))) if n < lo || n > hi => {
                Found::Invalid(format!("must be between {} and {} (got {})", lo, hi, n))
            }
            (other, _) => other,
        }
    }
}

fn missing_reason(kind: ParamType) -> &'static str {
    match kind {
        ParamType::Category => "no category recognized; mention one such as food or travel",
        ParamType::Days => "no time window found; try 'last 30 days' or 'this month'",
        ParamType::Limit => "no count found; try 'top 5'",
    }
}

fn parse_number(raw: &str) -> Option<i64> {
    let word = match raw {
        "one" => 1,
        "two" => 2,
        "three" => 3,
        "four" => 4,
        "five" => 5,
        "six" => 6,
        "seven" => 7,
        "eight" => 8,
        "nine" => 9,
        "ten" => 10,
        "twelve" => 12,
        "twenty" => 20,
        digits => return digits.parse().ok(),
    };
    Some(word)
}

/// "Other" only matches when the question names it outright
fn explicit_other(phrase: &str) -> Option<CategoryLabel> {
    let normalized = tokenize(phrase).join(" ");
    CategoryLabel::Other
        .aliases()
        .iter()
        .any(|alias| *alias == normalized)
        .then_some(CategoryLabel::Other)
}

/// Lowercased alphabetic tokens with stop-words removed
fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphabetic())
        .filter(|t| !t.is_empty() && !STOP_WORDS.contains(t))
        .map(str::to_string)
        .collect()
}

/// Unigrams and bigrams of the question tokens
fn ngrams(tokens: &[String]) -> Vec<String> {
    let mut grams: Vec<String> = tokens.to_vec();
    grams.extend(tokens.windows(2).map(|pair| pair.join(" ")));
    grams
}

/// Best label whose name or alias reaches the floor ("Other" excluded)
///
/// Besides the similarity floor, a gram must stay within a length-scaled
/// edit budget of the candidate (see `edit_budget`), so short everyday words
/// one letter away from a label ("deals", "wealth") are not taken for it.
pub(crate) fn best_category(text: &str, floor: f64) -> Option<CategoryLabel> {
    let grams = ngrams(&tokenize(text));
    if grams.is_empty() {
        return None;
    }

    let mut best: Option<(CategoryLabel, f64)> = None;
    for label in CategoryLabel::ALL {
        if label == CategoryLabel::Other {
            continue;
        }
        let candidates = std::iter::once(label.as_str()).chain(label.aliases().iter().copied());
        for candidate in candidates {
            let candidate = singular(&tokenize(candidate).join(" "));
            for gram in &grams {
                let gram = singular(gram);
                if levenshtein(&gram, &candidate) > edit_budget(&gram, &candidate) {
                    continue;
                }
                let score = similarity(&gram, &candidate);
                if score >= floor && best.map(|(_, s)| score > s).unwrap_or(true) {
                    best = Some((label, score));
                }
            }
        }
    }
    best.map(|(label, _)| label)
}

/// Edits tolerated between a gram and a candidate: none below 7 chars, one
/// up to 11, two beyond
fn edit_budget(a: &str, b: &str) -> usize {
    match a.chars().count().max(b.chars().count()) {
        0..=6 => 0,
        7..=11 => 1,
        _ => 2,
    }
}

/// Drops a plural "s" from each word longer than three letters
fn singular(phrase: &str) -> String {
    phrase
        .split(' ')
        .map(|word| match word.strip_suffix('s') {
            Some(stem) if word.chars().count() > 3 => stem,
            _ => word,
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Normalized Levenshtein similarity in [0, 1]
pub(crate) fn similarity(a: &str, b: &str) -> f64 {
    let longest = a.chars().count().max(b.chars().count());
    if longest == 0 {
        return 1.0;
    }
    1.0 - levenshtein(a, b) as f64 / longest as f64
}

/// Edit distance over chars (insert, delete, substitute)
fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];
    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::templates::TemplateRegistry;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 15).unwrap()
    }

    fn extractor() -> ParameterExtractor {
        ParameterExtractor::new(DEFAULT_CATEGORY_FLOOR).unwrap()
    }

    fn extract(question: &str, intent: Intent) -> Result<ParameterSet> {
        let template = TemplateRegistry::builtin().get(intent).unwrap();
        extractor().extract(question, template, today())
    }

    fn failures(err: Error) -> Vec<ParameterFailure> {
        match err {
            Error::ParameterValidation(f) => f,
            other => panic!("expected ParameterValidation, got {:?}", other),
        }
    }

    #[test]
    fn test_levenshtein() {
        assert_eq!(levenshtein("kitten", "sitting"), 3);
        assert_eq!(levenshtein("", "abc"), 3);
        assert_eq!(levenshtein("food", "food"), 0);
        assert!((similarity("groceris", "groceries") - (1.0 - 1.0 / 9.0)).abs() < 1e-9);
        assert_eq!(similarity("", ""), 1.0);
    }

    #[test]
    fn test_food_last_30_days() {
        let set = extract(
            "How much did I spend on food in the last 30 days?",
            Intent::TotalByCategoryTimeframe,
        )
        .unwrap();
        assert_eq!(set.category(), Some(CategoryLabel::FoodDining));
        assert_eq!(set.integer("days"), Some(30));
        assert_eq!(set.summary(), "category=Food & Dining, days=30");
    }

    #[test]
    fn test_typo_within_floor() {
        let set = extract(
            "How much did I spend on groceris this week?",
            Intent::TotalByCategoryTimeframe,
        )
        .unwrap();
        assert_eq!(set.category(), Some(CategoryLabel::FoodDining));
        assert_eq!(set.integer("days"), Some(7));
    }

    #[test]
    fn test_multiword_label() {
        let set = extract(
            "how much on bills and utilities last month",
            Intent::TotalByCategoryTimeframe,
        )
        .unwrap();
        assert_eq!(set.category(), Some(CategoryLabel::BillsUtilities));
        assert_eq!(set.integer("days"), Some(30));
    }

    #[test]
    fn test_near_miss_words_are_not_categories() {
        assert_eq!(best_category("wealth management", DEFAULT_CATEGORY_FLOOR), None);
        assert_eq!(best_category("deals", DEFAULT_CATEGORY_FLOOR), None);
        assert_eq!(best_category("meal", DEFAULT_CATEGORY_FLOOR), Some(CategoryLabel::FoodDining));
        assert_eq!(
            best_category("restaurant", DEFAULT_CATEGORY_FLOOR),
            Some(CategoryLabel::FoodDining)
        );

        let err = extract(
            "How much did I spend on wealth management last month?",
            Intent::TotalByCategoryTimeframe,
        )
        .unwrap_err();
        let failures = failures(err);
        assert_eq!(failures[0].name, "category");
        assert!(failures[0].reason.contains("wealth management"));

        let err = extract("How much did I spend on deals this week?", Intent::TotalByCategoryTimeframe)
            .unwrap_err();
        assert_eq!(self::failures(err)[0].name, "category");
    }

    #[test]
    fn test_category_after_at_in_for() {
        let cases = [
            ("How much did I spend at restaurants last month?", CategoryLabel::FoodDining, 30),
            ("How much did I spend in groceries this week?", CategoryLabel::FoodDining, 7),
            ("How much did I spend for rent this month?", CategoryLabel::BillsUtilities, 30),
            (
                "How much did I spend in the last 30 days on transport?",
                CategoryLabel::Transportation,
                30,
            ),
        ];
        for (question, category, days) in cases {
            let set = extract(question, Intent::TotalByCategoryTimeframe).unwrap();
            assert_eq!(set.category(), Some(category), "{}", question);
            assert_eq!(set.integer("days"), Some(days), "{}", question);
        }

        let err = extract("How much did I spend at the mall last week?", Intent::TotalByCategoryTimeframe)
            .unwrap_err();
        assert!(failures(err)[0].reason.contains("the mall"));
    }

    #[test]
    fn test_unrecognized_category_phrase_is_invalid() {
        let err = extract(
            "How much did I spend on unicorns last month?",
            Intent::TotalByCategoryTimeframe,
        )
        .unwrap_err();
        let failures = failures(err);
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].name, "category");
        assert!(failures[0].reason.contains("unicorns"));
    }

    #[test]
    fn test_missing_required_parameters_all_listed() {
        let err = extract("how much did i spend", Intent::TotalByCategoryTimeframe).unwrap_err();
        let names: Vec<_> = failures(err).into_iter().map(|f| f.name).collect();
        assert_eq!(names, vec!["category", "days"]);
    }

    #[test]
    fn test_other_never_matched_implicitly() {
        assert_eq!(best_category("other stuff", DEFAULT_CATEGORY_FLOOR), None);
        let set = extract("spend on other last week", Intent::TotalByCategoryTimeframe).unwrap();
        assert_eq!(set.category(), Some(CategoryLabel::Other));
    }

    #[test]
    fn test_relative_windows() {
        let cases = [
            ("total spending over the past 2 weeks", 14),
            ("total spending over the last 3 months", 90),
            ("total spending in the last year", 365),
            ("total spending today", 1),
            ("total spending since yesterday", 2),
            ("total spending this quarter", 90),
            ("total spending over the last ten days", 10),
        ];
        for (question, days) in cases {
            let set = extract(question, Intent::TotalSpendingTimeframe).unwrap();
            assert_eq!(set.integer("days"), Some(days), "{}", question);
        }
    }

    #[test]
    fn test_days_out_of_range() {
        for question in ["spending in the last 0 days", "spending over the past 2 years"] {
            let err = extract(question, Intent::TotalSpendingTimeframe).unwrap_err();
            assert!(failures(err)[0].reason.contains("between 1 and 366"), "{}", question);
        }
    }

    #[test]
    fn test_limit_defaults_only_when_absent() {
        let set = extract("show my top expenses", Intent::TopNExpenses).unwrap();
        assert_eq!(set.integer("limit"), Some(5));
        assert_eq!(set.integer("days"), Some(30));

        let set = extract("Show me my top 5 highest expenses this month", Intent::TopNExpenses)
            .unwrap();
        assert_eq!(set.integer("limit"), Some(5));
        assert_eq!(set.integer("days"), Some(30));

        let set = extract("my 3 most expensive purchases this week", Intent::TopNExpenses).unwrap();
        assert_eq!(set.integer("limit"), Some(3));
        assert_eq!(set.integer("days"), Some(7));

        let err = extract("show my top 80 expenses", Intent::TopNExpenses).unwrap_err();
        let failures = failures(err);
        assert_eq!(failures[0].name, "limit");
        assert!(failures[0].reason.contains("got 80"));
    }

    #[test]
    fn test_optional_category_absent() {
        let set = extract("Am I over budget in any category?", Intent::BudgetStatus).unwrap();
        assert!(set.is_empty());

        let set = extract("Am I over budget on travel?", Intent::BudgetStatus).unwrap();
        assert_eq!(set.category(), Some(CategoryLabel::Travel));
    }

    #[test]
    fn test_injection_text_never_matches() {
        let err = extract(
            "how much on food'; DROP TABLE expenses; -- last 30 days",
            Intent::TotalByCategoryTimeframe,
        );
        // Either a clean category or a validation failure, never raw text
        if let Ok(set) = err {
            assert_eq!(set.category(), Some(CategoryLabel::FoodDining));
        }
    }

    #[test]
    fn test_serializes_in_schema_order() {
        let set = extract("top 3 expenses in the last 7 days", Intent::TopNExpenses).unwrap();
        assert_eq!(
            serde_json::to_string(&set).unwrap(),
            r#"{"limit":3,"days":7}"#
        );
    }
}
