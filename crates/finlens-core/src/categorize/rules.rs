//! Deterministic keyword rules
//!
//! Rules are evaluated in registration order and the first match wins, so
//! a description mentioning both "coffee" and "ticket" is Food & Dining.

use regex::Regex;

use crate::error::Result;
use crate::models::CategoryLabel;

/// Keyword groups per category, in evaluation order
const DEFAULT_PATTERNS: &[(CategoryLabel, &[&str])] = &[
    (
        CategoryLabel::FoodDining,
        &[
            r"restaurant|food|lunch|dinner|breakfast|brunch|cafe|coffee|tea|pizza|burger|chicken|rice|meal|eat|dining|snack|takeout|takeaway|delivery|order",
            r"grocery|supermarket|shoprite|melcom|maxmart|market|provisions|foodstuff",
            r"waakye|jollof|kenkey|banku|fufu|kelewele|gari|shito|tilapia|kontomire|red red|fried rice|indomie|bread|egg",
            r"mcdonald|kfc|subway|starbucks|dominos|papaye|marwako|nandos|chicken inn",
            r"drinks|juice|soda|beer|wine|alcohol|bar tab|snacks|biscuits|cookies|ice cream|fruit",
        ],
    ),
    (
        CategoryLabel::Transportation,
        &[
            r"uber|bolt|yango|taxi|cab|ride|driver|trotro|bus|train|metro|okada|aboboyaa|lyft",
            r"fuel|gas|petrol|diesel|filling station|shell|goil|total|oando|oryx",
            r"parking|toll|car wash|mechanic|repair|tyre|tire|oil change|service|maintenance",
            r"flight|airline|ticket|transport|commute|travel fare",
        ],
    ),
    (
        CategoryLabel::Shopping,
        &[
            r"shop|shopping|store|mall|boutique|market|purchase|buy|bought",
            r"clothing|clothes|shirt|trouser|dress|jeans|shoes|sneakers|sandals|bag|handbag",
            r"electronics|phone|laptop|computer|tablet|charger|headphones|earbuds|accessory|gadget",
            r"amazon|melcom|palace|junction|accra mall|achimota mall|marina mall|west hills",
            r"furniture|home|kitchen|appliance|decor|bedding|mattress|chair|table",
        ],
    ),
    (
        CategoryLabel::Entertainment,
        &[
            r"movie|cinema|film|netflix|showmax|dstv|gotv|subscription|streaming",
            r"game|gaming|ps5|playstation|xbox|steam|bet|betting|lotto|lottery",
            r"concert|show|event|club|lounge|bar|nightclub|party|birthday|celebration",
            r"spotify|apple music|youtube|tiktok|premium|membership",
            r"fun|outing|hangout|leisure|recreation|picnic",
        ],
    ),
    (
        CategoryLabel::BillsUtilities,
        &[
            r"bill|utility|electricity|electric|power|ecg|prepaid|postpaid|light",
            // "at" (AirtelTigo) is left out: it matches ordinary English
            r"water|gwc|internet|wifi|data|bundle|mtn|vodafone|airtel|glo",
            r"phone|mobile|airtime|credit|rent|lease|apartment|house",
            r"insurance|premium|subscription|mortgage|property tax|waste|sanitation",
            r"cable|tv|dstv|gotv|startimes|decoder",
        ],
    ),
    (
        CategoryLabel::Healthcare,
        &[
            r"doctor|hospital|clinic|pharmacy|medicine|drug|prescription|health|medical",
            r"dental|dentist|teeth|eye|glasses|optician|checkup|test|lab|laboratory|scan",
            r"nhis|insurance|consultation|treatment|surgery|procedure|therapy|physio",
            r"vitamin|supplement|painkiller|paracetamol|ibuprofen|first aid",
        ],
    ),
    (
        CategoryLabel::Education,
        &[
            r"school|tuition|fees|course|class|lesson|training|workshop|seminar|conference",
            r"book|textbook|stationery|notebook|pen|pencil|supplies|materials",
            r"university|college|polytechnic|diploma|degree|certificate|exam|test|quiz",
            r"online course|udemy|coursera|skillshare|masterclass|tutorial|learning",
        ],
    ),
    (
        CategoryLabel::PersonalCare,
        &[
            r"salon|barber|hair|haircut|braids|weave|wig|nails|manicure|pedicure|makeup|cosmetics",
            r"spa|massage|facial|skincare|cream|lotion|perfume|cologne|fragrance|deodorant",
            r"gym|fitness|workout|exercise|yoga|pilates|sports|swimming|membership",
            r"toiletries|soap|shampoo|toothpaste|brush|razor|shaving|grooming",
        ],
    ),
    (
        CategoryLabel::Travel,
        &[
            r"hotel|motel|airbnb|lodge|resort|accommodation|booking|reservation|stay",
            r"flight|airline|airport|ticket|boarding|passport|visa|travel|trip|vacation|holiday",
            r"africa world|passion air|emirates|kenya airways|ethiopian|british airways",
            r"tourism|tour|sightseeing|excursion|adventure|road trip|getaway",
        ],
    ),
    (
        CategoryLabel::SavingsInvestments,
        &[
            r"savings|save|investment|invest|stock|shares|trading|crypto|bitcoin|forex",
            r"deposit|transfer|momo|mobile money|wallet|susu|contribution|pension",
            r"bank|banking|interest|dividend|mutual fund|fixed deposit|treasury bill|bond",
        ],
    ),
];

/// A single compiled rule
#[derive(Debug, Clone)]
pub struct Rule {
    /// Stable name, e.g. `transportation_1`
    pub name: String,
    pub category: CategoryLabel,
    pattern: Regex,
}

impl Rule {
    /// Compile a keyword alternation into a case-insensitive whole-word rule
    pub fn keywords(name: &str, category: CategoryLabel, alternation: &str) -> Result<Self> {
        let pattern = Regex::new(&format!(r"(?i)\b({})\b", alternation))?;
        Ok(Self {
            name: name.to_string(),
            category,
            pattern,
        })
    }

    pub fn is_match(&self, description: &str) -> bool {
        self.pattern.is_match(description)
    }
}

/// A rule hit
#[derive(Debug, Clone, PartialEq)]
pub struct RuleMatch {
    pub category: CategoryLabel,
    pub confidence: f64,
    pub rule: String,
}

/// Ordered rule table with a fixed match confidence
#[derive(Debug, Clone)]
pub struct RuleMatcher {
    rules: Vec<Rule>,
    confidence: f64,
}

impl RuleMatcher {
    pub fn new(rules: Vec<Rule>, confidence: f64) -> Self {
        Self { rules, confidence }
    }

    /// The built-in keyword table
    pub fn with_default_rules(confidence: f64) -> Result<Self> {
        let mut rules = Vec::new();
        for (category, patterns) in DEFAULT_PATTERNS {
            for (i, alternation) in patterns.iter().enumerate() {
                let name = format!("{}_{}", category.id(), i + 1);
                rules.push(Rule::keywords(&name, *category, alternation)?);
            }
        }
        Ok(Self::new(rules, confidence))
    }

    /// Append a rule after every existing one
    pub fn push(&mut self, rule: Rule) {
        self.rules.push(rule);
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    /// First matching rule, if any
    pub fn evaluate(&self, description: &str) -> Option<RuleMatch> {
        self.rules
            .iter()
            .find(|rule| rule.is_match(description))
            .map(|rule| RuleMatch {
                category: rule.category,
                confidence: self.confidence,
                rule: rule.name.clone(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matcher() -> RuleMatcher {
        RuleMatcher::with_default_rules(0.95).unwrap()
    }

    #[test]
    fn test_default_table_compiles() {
        let m = matcher();
        assert_eq!(m.len(), 43);
        assert_eq!(m.confidence(), 0.95);
    }

    #[test]
    fn test_known_descriptions() {
        let m = matcher();
        let cases = [
            ("Uber ride to work", CategoryLabel::Transportation),
            ("Starbucks coffee", CategoryLabel::FoodDining),
            ("McDonald's lunch", CategoryLabel::FoodDining),
            ("Netflix subscription", CategoryLabel::Entertainment),
            ("ECG prepaid top-up", CategoryLabel::BillsUtilities),
            ("Pharmacy run for paracetamol", CategoryLabel::Healthcare),
            ("Udemy course", CategoryLabel::Education),
            ("Haircut at the barber", CategoryLabel::PersonalCare),
            ("Airbnb for the weekend", CategoryLabel::Travel),
            ("Monthly susu contribution", CategoryLabel::SavingsInvestments),
        ];
        for (desc, expected) in cases {
            let hit = m.evaluate(desc).unwrap_or_else(|| panic!("no rule for {desc}"));
            assert_eq!(hit.category, expected, "{desc}");
            assert_eq!(hit.confidence, 0.95);
        }
    }

    #[test]
    fn test_earliest_rule_wins() {
        // "ticket" is both Transportation and Travel; Transportation is registered first
        let hit = matcher().evaluate("bus ticket").unwrap();
        assert_eq!(hit.category, CategoryLabel::Transportation);

        // Food keywords precede everything
        let hit = matcher().evaluate("coffee at the airport").unwrap();
        assert_eq!(hit.category, CategoryLabel::FoodDining);
        assert_eq!(hit.rule, "food_dining_1");
    }

    #[test]
    fn test_whole_words_only() {
        let m = matcher();
        // "diner" must not match "dinner", and "at" is not a keyword
        assert!(m.evaluate("quick bite at an obscure diner").is_none());
        // "cabinet" contains "cab"
        assert!(m.evaluate("cabinet").is_none());
    }

    #[test]
    fn test_case_insensitive() {
        let hit = matcher().evaluate("UBER TRIP").unwrap();
        assert_eq!(hit.category, CategoryLabel::Transportation);
    }

    #[test]
    fn test_custom_rule_appended_last() {
        let mut m = RuleMatcher::new(Vec::new(), 0.9);
        assert!(m.is_empty());
        m.push(Rule::keywords("diner", CategoryLabel::FoodDining, "diner").unwrap());
        let hit = m.evaluate("obscure diner").unwrap();
        assert_eq!(hit.rule, "diner");
        assert_eq!(hit.confidence, 0.9);
    }

    #[test]
    fn test_invalid_pattern_is_error() {
        assert!(Rule::keywords("bad", CategoryLabel::Other, "(unclosed").is_err());
    }
}
