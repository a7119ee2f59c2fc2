//! Memory Configuration
//!
//! Configuration is resolved with precedence:
//! 1. Environment variables (RDV_MEMORY_*)
//! 2. Config file (TOML)
//! 3. Default values

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::MemoryResult;
use crate::memory::{MemoryTier, RelevanceWeights};

/// Environment variable toggling the background cleanup task
pub const ENV_CLEANUP_ENABLED: &str = "RDV_MEMORY_CLEANUP_ENABLED";

/// Environment variable overriding the cleanup interval (seconds)
pub const ENV_CLEANUP_INTERVAL_SECS: &str = "RDV_MEMORY_CLEANUP_INTERVAL_SECS";

/// Memory store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    /// Maximum live nodes per tier (default: unbounded)
    pub capacity: TierCapacities,

    /// Default time-to-live per tier, applied by `MemoryManager::store_content`
    pub ttl: TierTtls,

    /// Background expiry sweep
    pub cleanup: CleanupConfig,

    /// Search ranking and limits
    pub search: SearchConfig,

    /// Statistics reporting
    pub stats: StatsConfig,

    /// Default consolidation policy
    pub consolidation: ConsolidationConfig,

    /// Importance given to content stored without one (default: 0.5)
    pub default_importance: f64,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            capacity: TierCapacities::default(),
            ttl: TierTtls::default(),
            cleanup: CleanupConfig::default(),
            search: SearchConfig::default(),
            stats: StatsConfig::default(),
            consolidation: ConsolidationConfig::default(),
            default_importance: 0.5,
        }
    }
}

/// Per-tier capacity limits; `None` means unbounded
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TierCapacities {
    pub short_term: Option<usize>,
    pub long_term: Option<usize>,
    pub episodic: Option<usize>,
    pub semantic: Option<usize>,
}

impl TierCapacities {
    pub fn get(&self, tier: MemoryTier) -> Option<usize> {
        match tier {
            MemoryTier::ShortTerm => self.short_term,
            MemoryTier::LongTerm => self.long_term,
            MemoryTier::Episodic => self.episodic,
            MemoryTier::Semantic => self.semantic,
        }
    }

    pub fn set(&mut self, tier: MemoryTier, capacity: Option<usize>) {
        match tier {
            MemoryTier::ShortTerm => self.short_term = capacity,
            MemoryTier::LongTerm => self.long_term = capacity,
            MemoryTier::Episodic => self.episodic = capacity,
            MemoryTier::Semantic => self.semantic = capacity,
        }
    }
}

/// Per-tier default TTL in seconds; `None` means no expiry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TierTtls {
    pub short_term: Option<u64>,
    pub long_term: Option<u64>,
    pub episodic: Option<u64>,
    pub semantic: Option<u64>,
}

impl Default for TierTtls {
    fn default() -> Self {
        Self {
            short_term: Some(3600), // 1 hour
            long_term: None,
            episodic: None,
            semantic: None,
        }
    }
}

impl TierTtls {
    pub fn get(&self, tier: MemoryTier) -> Option<u64> {
        match tier {
            MemoryTier::ShortTerm => self.short_term,
            MemoryTier::LongTerm => self.long_term,
            MemoryTier::Episodic => self.episodic,
            MemoryTier::Semantic => self.semantic,
        }
    }

    /// Default TTL for `tier`; `None` if unset or not representable
    pub fn duration(&self, tier: MemoryTier) -> Option<chrono::Duration> {
        self.get(tier).and_then(ttl_from_secs)
    }

    pub fn set(&mut self, tier: MemoryTier, ttl_secs: Option<u64>) {
        match tier {
            MemoryTier::ShortTerm => self.short_term = ttl_secs,
            MemoryTier::LongTerm => self.long_term = ttl_secs,
            MemoryTier::Episodic => self.episodic = ttl_secs,
            MemoryTier::Semantic => self.semantic = ttl_secs,
        }
    }
}

/// Background cleanup configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CleanupConfig {
    /// Run the expiry sweep in the background (default: true)
    pub enabled: bool,

    /// Seconds between sweeps (default: 60)
    pub interval_secs: u64,
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 60,
        }
    }
}

/// Search configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Relevance weights (default: 0.5 importance, 0.3 recency, 0.2 access)
    pub weights: RelevanceWeights,

    /// Limit applied when a query sets none (default: unlimited)
    pub default_limit: Option<usize>,
}

/// Statistics configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StatsConfig {
    /// Length of the most-accessed and most-recent lists (default: 10)
    pub top_n: usize,
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self { top_n: 10 }
    }
}

/// Default consolidation policy: promote important nodes between tiers
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsolidationConfig {
    pub from: MemoryTier,
    pub to: MemoryTier,
    /// Minimum importance for promotion (default: 0.7)
    pub min_importance: f64,
}

impl Default for ConsolidationConfig {
    fn default() -> Self {
        Self {
            from: MemoryTier::ShortTerm,
            to: MemoryTier::LongTerm,
            min_importance: 0.7,
        }
    }
}

impl MemoryConfig {
    /// Parse and validate a TOML document
    pub fn from_toml_str(s: &str) -> MemoryResult<Self> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a TOML file, apply environment overrides, then validate
    pub fn load(path: impl AsRef<Path>) -> MemoryResult<Self> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        let mut config: Self = toml::from_str(&contents)?;
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `RDV_MEMORY_*` overrides from the process environment
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigValidationError> {
        self.apply_overrides_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides using `lookup` to resolve variable names
    pub fn apply_overrides_from<F>(&mut self, lookup: F) -> Result<(), ConfigValidationError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup(ENV_CLEANUP_ENABLED) {
            self.cleanup.enabled = parse_bool(&value).ok_or_else(|| {
                ConfigValidationError::InvalidValue {
                    field: ENV_CLEANUP_ENABLED.into(),
                    message: format!("expected a boolean, got '{}'", value),
                }
            })?;
        }

        if let Some(value) = lookup(ENV_CLEANUP_INTERVAL_SECS) {
            self.cleanup.interval_secs = value.trim().parse().map_err(|_| {
                ConfigValidationError::InvalidValue {
                    field: ENV_CLEANUP_INTERVAL_SECS.into(),
                    message: format!("expected a whole number of seconds, got '{}'", value),
                }
            })?;
        }

        Ok(())
    }

    /// Set one tier's capacity
    pub fn with_capacity(mut self, tier: MemoryTier, capacity: usize) -> Self {
        self.capacity.set(tier, Some(capacity));
        self
    }

    /// Set one tier's default TTL
    pub fn with_ttl(mut self, tier: MemoryTier, ttl_secs: Option<u64>) -> Self {
        self.ttl.set(tier, ttl_secs);
        self
    }

    /// Enable or disable the background sweep and set its interval
    pub fn with_cleanup(mut self, enabled: bool, interval_secs: u64) -> Self {
        self.cleanup = CleanupConfig {
            enabled,
            interval_secs,
        };
        self
    }

    /// Set the relevance weights
    pub fn with_weights(mut self, weights: RelevanceWeights) -> Self {
        self.search.weights = weights;
        self
    }

    /// Set the statistics list length
    pub fn with_top_n(mut self, top_n: usize) -> Self {
        self.stats.top_n = top_n;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        for tier in MemoryTier::ALL {
            if self.capacity.get(tier) == Some(0) {
                return Err(ConfigValidationError::InvalidValue {
                    field: format!("capacity.{}", tier),
                    message: "must be greater than 0".into(),
                });
            }

            if let Some(secs) = self.ttl.get(tier) {
                if secs == 0 {
                    return Err(ConfigValidationError::InvalidValue {
                        field: format!("ttl.{}", tier),
                        message: "must be greater than 0".into(),
                    });
                }

                let reachable = ttl_from_secs(secs)
                    .is_some_and(|ttl| Utc::now().checked_add_signed(ttl).is_some());
                if !reachable {
                    return Err(ConfigValidationError::InvalidValue {
                        field: format!("ttl.{}", tier),
                        message: format!("{} seconds is out of range", secs),
                    });
                }
            }
        }

        if self.cleanup.enabled && self.cleanup.interval_secs == 0 {
            return Err(ConfigValidationError::InvalidValue {
                field: "cleanup.interval_secs".into(),
                message: "must be greater than 0 when cleanup is enabled".into(),
            });
        }

        if let Some(name) = self.search.weights.first_invalid() {
            return Err(ConfigValidationError::InvalidValue {
                field: format!("search.weights.{}", name),
                message: "must be a positive number".into(),
            });
        }

        if self.search.default_limit == Some(0) {
            return Err(ConfigValidationError::InvalidValue {
                field: "search.default_limit".into(),
                message: "must be greater than 0".into(),
            });
        }

        if !(0.0..=1.0).contains(&self.default_importance) {
            return Err(ConfigValidationError::InvalidValue {
                field: "default_importance".into(),
                message: "must be between 0 and 1".into(),
            });
        }

        if !(0.0..=1.0).contains(&self.consolidation.min_importance) {
            return Err(ConfigValidationError::InvalidValue {
                field: "consolidation.min_importance".into(),
                message: "must be between 0 and 1".into(),
            });
        }

        if self.consolidation.from == self.consolidation.to {
            return Err(ConfigValidationError::InvalidValue {
                field: "consolidation.to".into(),
                message: "must differ from consolidation.from".into(),
            });
        }

        Ok(())
    }
}

fn ttl_from_secs(secs: u64) -> Option<chrono::Duration> {
    i64::try_from(secs).ok().and_then(chrono::Duration::try_seconds)
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Configuration validation errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = MemoryConfig::default();
        assert_eq!(config.capacity.get(MemoryTier::ShortTerm), None);
        assert_eq!(config.ttl.get(MemoryTier::ShortTerm), Some(3600));
        assert_eq!(config.ttl.get(MemoryTier::Semantic), None);
        assert!(config.cleanup.enabled);
        assert_eq!(config.cleanup.interval_secs, 60);
        assert_eq!(config.stats.top_n, 10);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_builder() {
        let config = MemoryConfig::default()
            .with_capacity(MemoryTier::Episodic, 5)
            .with_ttl(MemoryTier::ShortTerm, None)
            .with_cleanup(false, 0)
            .with_top_n(3);

        assert_eq!(config.capacity.get(MemoryTier::Episodic), Some(5));
        assert_eq!(config.ttl.get(MemoryTier::ShortTerm), None);
        assert!(!config.cleanup.enabled);
        assert_eq!(config.stats.top_n, 3);
        // Interval is irrelevant while cleanup is disabled
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let config = MemoryConfig::default().with_capacity(MemoryTier::ShortTerm, 0);
        assert!(config.validate().is_err());

        let config = MemoryConfig::default().with_cleanup(true, 0);
        assert!(config.validate().is_err());

        let config = MemoryConfig::default().with_weights(RelevanceWeights {
            importance: -1.0,
            ..Default::default()
        });
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("search.weights.importance"));

        let mut config = MemoryConfig::default();
        config.default_importance = 1.5;
        assert!(config.validate().is_err());

        let mut config = MemoryConfig::default();
        config.consolidation.to = MemoryTier::ShortTerm;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_toml() {
        let config = MemoryConfig::from_toml_str(
            r#"
            default_importance = 0.4

            [capacity]
            short_term = 2
            semantic = 500

            [ttl]
            episodic = 86400

            [cleanup]
            interval_secs = 5
            "#,
        )
        .unwrap();

        assert_eq!(config.capacity.get(MemoryTier::ShortTerm), Some(2));
        assert_eq!(config.capacity.get(MemoryTier::LongTerm), None);
        assert_eq!(config.capacity.get(MemoryTier::Semantic), Some(500));
        // Unlisted tiers keep their defaults
        assert_eq!(config.ttl.get(MemoryTier::ShortTerm), Some(3600));
        assert_eq!(config.ttl.get(MemoryTier::Episodic), Some(86400));
        assert!(config.cleanup.enabled);
        assert_eq!(config.cleanup.interval_secs, 5);
        assert_eq!(config.default_importance, 0.4);
    }

    #[test]
    fn test_from_toml_rejects_negative_capacity() {
        let err = MemoryConfig::from_toml_str("[capacity]\nshort_term = -1\n").unwrap_err();
        assert!(err.is_config());

        let err = MemoryConfig::from_toml_str("[capacity]\nlong_term = 0\n").unwrap_err();
        assert!(err.is_config());
    }

    #[test]
    fn test_ttl_out_of_range_rejected() {
        let err = MemoryConfig::from_toml_str("[ttl]\nepisodic = 10000000000000\n").unwrap_err();
        assert!(err.is_config());
        assert!(err.to_string().contains("ttl.episodic"));

        let config = MemoryConfig::default().with_ttl(MemoryTier::LongTerm, Some(u64::MAX));
        assert!(config.validate().is_err());

        // Ten years is fine
        let config = MemoryConfig::default().with_ttl(MemoryTier::Semantic, Some(315_360_000));
        assert!(config.validate().is_ok());
        assert_eq!(
            config.ttl.duration(MemoryTier::Semantic),
            Some(chrono::Duration::seconds(315_360_000))
        );
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[capacity]\nepisodic = 10\n\n[stats]\ntop_n = 4").unwrap();

        let config = MemoryConfig::load(file.path()).unwrap();
        assert_eq!(config.capacity.get(MemoryTier::Episodic), Some(10));
        assert_eq!(config.stats.top_n, 4);
    }

    #[test]
    fn test_load_missing_file() {
        let err = MemoryConfig::load("/nonexistent/rdv-memory.toml").unwrap_err();
        assert!(matches!(err, crate::MemoryError::Io(_)));
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = HashMap::from([
            (ENV_CLEANUP_ENABLED, "false"),
            (ENV_CLEANUP_INTERVAL_SECS, "15"),
        ]);

        let mut config = MemoryConfig::default();
        config
            .apply_overrides_from(|key| vars.get(key).map(|v| v.to_string()))
            .unwrap();

        assert!(!config.cleanup.enabled);
        assert_eq!(config.cleanup.interval_secs, 15);
    }

    #[test]
    fn test_env_overrides_reject_garbage() {
        let mut config = MemoryConfig::default();
        let result = config.apply_overrides_from(|key| {
            (key == ENV_CLEANUP_INTERVAL_SECS).then(|| "soon".to_string())
        });
        assert!(result.is_err());
        assert_eq!(config.cleanup.interval_secs, 60);
    }
}
