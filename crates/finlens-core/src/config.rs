//! Engine configuration
//!
//! Config is loaded with a two-layer resolution:
//! 1. An explicit path, or the override in the data dir
//!    (~/.local/share/finlens/config/engine.toml)
//! 2. Fall back to embedded defaults (compiled into binary)
//!
//! Keys missing from an override keep their default values.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::{Error, Result};

/// Embedded default config (compiled into binary)
const DEFAULT_CONFIG: &str = include_str!("../../../config/engine.toml");

/// Categorization engine settings
#[derive(Debug, Clone, PartialEq)]
pub struct CategorizationConfig {
    /// Confidence reported for every rule match
    pub rule_confidence: f64,
    /// Timeout for a single fallback classification call
    pub fallback_timeout: Duration,
    /// Confidence cap when the model returns a label outside the taxonomy
    pub invalid_label_confidence: f64,
}

/// Confidence → action tier thresholds
#[derive(Debug, Clone, PartialEq)]
pub struct PolicyConfig {
    pub auto_apply_above: f64,
    pub flag_at_or_above: f64,
}

/// Classification cache settings
#[derive(Debug, Clone, PartialEq)]
pub struct CacheConfig {
    pub enabled: bool,
    pub ttl: Duration,
    pub max_entries: usize,
}

/// Query engine settings
#[derive(Debug, Clone, PartialEq)]
pub struct QueryConfig {
    pub intent_timeout: Duration,
    pub min_intent_confidence: f64,
    pub category_match_floor: f64,
    pub polish_explanations: bool,
    pub explanation_timeout: Duration,
}

/// Full engine configuration
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub categorization: CategorizationConfig,
    pub policy: PolicyConfig,
    pub cache: CacheConfig,
    pub query: QueryConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            categorization: CategorizationConfig {
                rule_confidence: 0.95,
                fallback_timeout: Duration::from_secs(10),
                invalid_label_confidence: 0.3,
            },
            policy: PolicyConfig {
                auto_apply_above: 0.8,
                flag_at_or_above: 0.5,
            },
            cache: CacheConfig {
                enabled: true,
                ttl: Duration::from_secs(3600),
                max_entries: 1000,
            },
            query: QueryConfig {
                intent_timeout: Duration::from_secs(10),
                min_intent_confidence: 0.5,
                category_match_floor: 0.8,
                polish_explanations: false,
                explanation_timeout: Duration::from_secs(15),
            },
        }
    }
}

impl EngineConfig {
    /// Load configuration (explicit path, then data-dir override, then embedded default)
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let content = match path {
            Some(p) => fs::read_to_string(p)
                .map_err(|e| Error::Config(format!("Failed to read {}: {}", p.display(), e)))?,
            None => match default_config_path() {
                Some(p) if p.exists() => fs::read_to_string(&p)
                    .map_err(|e| Error::Config(format!("Failed to read {}: {}", p.display(), e)))?,
                _ => DEFAULT_CONFIG.to_string(),
            },
        };

        Self::from_toml_str(&content)
    }

    /// The embedded defaults
    pub fn embedded() -> Result<Self> {
        Self::from_toml_str(DEFAULT_CONFIG)
    }

    /// Parse config from TOML content
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let raw: RawConfig = toml::from_str(content)
            .map_err(|e| Error::Config(format!("Invalid config TOML: {}", e)))?;

        let mut config = Self::default();

        if let Some(c) = raw.categorization {
            if let Some(v) = c.rule_confidence {
                config.categorization.rule_confidence = v;
            }
            if let Some(v) = c.fallback_timeout_secs {
                config.categorization.fallback_timeout = Duration::from_secs(v);
            }
            if let Some(v) = c.invalid_label_confidence {
                config.categorization.invalid_label_confidence = v;
            }
        }

        if let Some(p) = raw.policy {
            if let Some(v) = p.auto_apply_above {
                config.policy.auto_apply_above = v;
            }
            if let Some(v) = p.flag_at_or_above {
                config.policy.flag_at_or_above = v;
            }
        }

        if let Some(c) = raw.cache {
            if let Some(v) = c.enabled {
                config.cache.enabled = v;
            }
            if let Some(v) = c.ttl_secs {
                config.cache.ttl = Duration::from_secs(v);
            }
            if let Some(v) = c.max_entries {
                config.cache.max_entries = v;
            }
        }

        if let Some(q) = raw.query {
            if let Some(v) = q.intent_timeout_secs {
                config.query.intent_timeout = Duration::from_secs(v);
            }
            if let Some(v) = q.min_intent_confidence {
                config.query.min_intent_confidence = v;
            }
            if let Some(v) = q.category_match_floor {
                config.query.category_match_floor = v;
            }
            if let Some(v) = q.polish_explanations {
                config.query.polish_explanations = v;
            }
            if let Some(v) = q.explanation_timeout_secs {
                config.query.explanation_timeout = Duration::from_secs(v);
            }
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject threshold combinations that would make the tiers overlap or invert
    pub fn validate(&self) -> Result<()> {
        let unit = |name: &str, v: f64| -> Result<()> {
            if (0.0..=1.0).contains(&v) {
                Ok(())
            } else {
                Err(Error::Config(format!("{} must be within 0..=1, got {}", name, v)))
            }
        };

        unit("rule_confidence", self.categorization.rule_confidence)?;
        unit(
            "invalid_label_confidence",
            self.categorization.invalid_label_confidence,
        )?;
        unit("auto_apply_above", self.policy.auto_apply_above)?;
        unit("flag_at_or_above", self.policy.flag_at_or_above)?;
        unit("min_intent_confidence", self.query.min_intent_confidence)?;
        unit("category_match_floor", self.query.category_match_floor)?;

        if self.policy.flag_at_or_above > self.policy.auto_apply_above {
            return Err(Error::Config(format!(
                "flag_at_or_above ({}) must not exceed auto_apply_above ({})",
                self.policy.flag_at_or_above, self.policy.auto_apply_above
            )));
        }
        if self.cache.enabled && self.cache.max_entries == 0 {
            return Err(Error::Config(
                "cache.max_entries must be positive when the cache is enabled".into(),
            ));
        }
        if self.categorization.fallback_timeout.is_zero() || self.query.intent_timeout.is_zero() {
            return Err(Error::Config("timeouts must be at least one second".into()));
        }

        Ok(())
    }
}

/// Default config override path
pub fn default_config_path() -> Option<PathBuf> {
    dirs::data_local_dir().map(|d| d.join("finlens").join("config").join("engine.toml"))
}

/// Raw config structure for TOML parsing
#[derive(Debug, Deserialize)]
struct RawConfig {
    categorization: Option<RawCategorization>,
    policy: Option<RawPolicy>,
    cache: Option<RawCache>,
    query: Option<RawQuery>,
}

#[derive(Debug, Deserialize)]
struct RawCategorization {
    rule_confidence: Option<f64>,
    fallback_timeout_secs: Option<u64>,
    invalid_label_confidence: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct RawPolicy {
    auto_apply_above: Option<f64>,
    flag_at_or_above: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct RawCache {
    enabled: Option<bool>,
    ttl_secs: Option<u64>,
    max_entries: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct RawQuery {
    intent_timeout_secs: Option<u64>,
    min_intent_confidence: Option<f64>,
    category_match_floor: Option<f64>,
    polish_explanations: Option<bool>,
    explanation_timeout_secs: Option<u64>,
}
