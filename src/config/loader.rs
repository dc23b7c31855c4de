//! Configuration Loader
//!
//! Loads and validates configuration from TOML files matching config/ledger.toml.

use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::domain::drift::{DriftThresholds, DEFAULT_CRITICAL_DRIFT_BPS, DEFAULT_HIGH_DRIFT_BPS, DEFAULT_MEDIUM_DRIFT_BPS};
use crate::domain::ledger::{
    LedgerError, LedgerPolicy, RebalanceTrigger, WeightPolicy, WeightedTokenLedger,
};
use crate::domain::persistence::DEFAULT_LEDGER_FILE;
use crate::domain::token::{AccountId, TokenId};
use crate::domain::weights::MAX_BPS;

/// Main configuration structure matching config/ledger.toml
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub ledger: LedgerSection,
    #[serde(default)]
    pub strategy: Option<StrategySection>,
    #[serde(default)]
    pub storage: StorageSection,
    #[serde(default)]
    pub drift: DriftSection,
    #[serde(default)]
    pub logging: LoggingSection,
    /// Tokens seeded by `init`
    #[serde(default)]
    pub tokens: Vec<TokenSeed>,
}

/// Ledger configuration section
#[derive(Debug, Clone, Deserialize)]
pub struct LedgerSection {
    /// Account allowed to administer the ledger
    pub owner: String,
    /// "deferred" or "strict"
    #[serde(default)]
    pub weight_policy: WeightPolicy,
    /// "owner_only" or "public"
    #[serde(default)]
    pub rebalance_trigger: RebalanceTrigger,
}

impl LedgerSection {
    pub fn owner_id(&self) -> AccountId {
        AccountId::new(self.owner.clone())
    }

    pub fn policy(&self) -> LedgerPolicy {
        LedgerPolicy {
            weights: self.weight_policy,
            rebalance_trigger: self.rebalance_trigger,
        }
    }
}

/// Strategy collaborator section (optional)
#[derive(Debug, Clone, Deserialize)]
pub struct StrategySection {
    /// Strategy identity registered on the ledger
    pub id: String,
    /// Account allowed to publish weights to the strategy
    pub oracle: String,
    /// Register the strategy as active on `init`
    #[serde(default = "default_true")]
    pub active: bool,
}

impl StrategySection {
    pub fn strategy_id(&self) -> AccountId {
        AccountId::new(self.id.clone())
    }

    pub fn oracle_id(&self) -> AccountId {
        AccountId::new(self.oracle.clone())
    }
}

/// Storage section
#[derive(Debug, Clone, Deserialize)]
pub struct StorageSection {
    /// Directory for ledger and strategy state
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    #[serde(default = "default_ledger_file")]
    pub ledger_file: String,
    #[serde(default = "default_strategy_file")]
    pub strategy_file: String,
}

impl Default for StorageSection {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            ledger_file: default_ledger_file(),
            strategy_file: default_strategy_file(),
        }
    }
}

impl StorageSection {
    /// Data directory with environment override and `~` expansion
    /// Checks SIGNALSTACK_DATA_DIR env var first, falls back to config value
    pub fn get_data_dir(&self) -> PathBuf {
        let raw = std::env::var("SIGNALSTACK_DATA_DIR").unwrap_or_else(|_| self.data_dir.clone());
        PathBuf::from(shellexpand::tilde(&raw).to_string())
    }

    pub fn ledger_path(&self) -> PathBuf {
        self.get_data_dir().join(&self.ledger_file)
    }

    pub fn strategy_path(&self) -> PathBuf {
        self.get_data_dir().join(&self.strategy_file)
    }
}

/// Drift thresholds section, all in basis points
#[derive(Debug, Clone, Deserialize)]
pub struct DriftSection {
    #[serde(default = "default_medium_bps")]
    pub medium_bps: u32,
    #[serde(default = "default_high_bps")]
    pub high_bps: u32,
    #[serde(default = "default_critical_bps")]
    pub critical_bps: u32,
}

impl Default for DriftSection {
    fn default() -> Self {
        Self {
            medium_bps: DEFAULT_MEDIUM_DRIFT_BPS,
            high_bps: DEFAULT_HIGH_DRIFT_BPS,
            critical_bps: DEFAULT_CRITICAL_DRIFT_BPS,
        }
    }
}

/// Logging configuration section
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingSection {
    /// Log level: "trace", "debug", "info", "warn", "error"
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Bootstrap token
#[derive(Debug, Clone, Deserialize)]
pub struct TokenSeed {
    pub id: String,
    pub weight_bps: u32,
}

impl TokenSeed {
    pub fn token_id(&self) -> TokenId {
        TokenId::new(self.id.clone())
    }
}

fn default_true() -> bool {
    true
}

fn default_data_dir() -> String {
    "data".to_string()
}

fn default_ledger_file() -> String {
    DEFAULT_LEDGER_FILE.to_string()
}

fn default_strategy_file() -> String {
    "strategy.json".to_string()
}

fn default_medium_bps() -> u32 {
    DEFAULT_MEDIUM_DRIFT_BPS
}

fn default_high_bps() -> u32 {
    DEFAULT_HIGH_DRIFT_BPS
}

fn default_critical_bps() -> u32 {
    DEFAULT_CRITICAL_DRIFT_BPS
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("Validation failed: {0}")]
    ValidationError(String),
}

/// Load configuration from a TOML file
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let config: Config = toml::from_str(&content)?;
    config.validate()?;
    Ok(config)
}

impl Config {
    /// Validate all configuration parameters
    pub fn validate(&self) -> Result<(), ConfigError> {
        // Validate ledger section
        if self.ledger.owner.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "ledger.owner cannot be empty".to_string(),
            ));
        }

        // Validate strategy section
        if let Some(strategy) = &self.strategy {
            if strategy.id.trim().is_empty() {
                return Err(ConfigError::ValidationError(
                    "strategy.id cannot be empty".to_string(),
                ));
            }
            if strategy.oracle.trim().is_empty() {
                return Err(ConfigError::ValidationError(
                    "strategy.oracle cannot be empty".to_string(),
                ));
            }
        }

        // Validate storage
        if self.storage.ledger_file.is_empty() || self.storage.strategy_file.is_empty() {
            return Err(ConfigError::ValidationError(
                "storage file names cannot be empty".to_string(),
            ));
        }
        if self.storage.ledger_file == self.storage.strategy_file {
            return Err(ConfigError::ValidationError(format!(
                "ledger_file and strategy_file must differ, both are {}",
                self.storage.ledger_file
            )));
        }

        // Validate drift thresholds
        self.drift_thresholds()?;

        // Validate logging
        let level = self.logging.level.to_lowercase();
        if !["trace", "debug", "info", "warn", "error"].contains(&level.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "logging.level must be trace/debug/info/warn/error, got {}",
                self.logging.level
            )));
        }

        // Validate bootstrap tokens
        let mut seen = HashSet::new();
        for seed in &self.tokens {
            if seed.id.trim().is_empty() {
                return Err(ConfigError::ValidationError(
                    "token id cannot be empty".to_string(),
                ));
            }
            if !seen.insert(seed.id.as_str()) {
                return Err(ConfigError::ValidationError(format!(
                    "token {} listed twice",
                    seed.id
                )));
            }
            if seed.weight_bps > MAX_BPS {
                return Err(ConfigError::ValidationError(format!(
                    "token {} weight must be 0-{}, got {}",
                    seed.id, MAX_BPS, seed.weight_bps
                )));
            }
        }
        if !self.tokens.is_empty() {
            let total: u64 = self.tokens.iter().map(|s| u64::from(s.weight_bps)).sum();
            if total != u64::from(MAX_BPS) {
                return Err(ConfigError::ValidationError(format!(
                    "token weights must sum to {}, got {}",
                    MAX_BPS, total
                )));
            }
        }

        Ok(())
    }

    pub fn drift_thresholds(&self) -> Result<DriftThresholds, ConfigError> {
        DriftThresholds::new(
            self.drift.medium_bps,
            self.drift.high_bps,
            self.drift.critical_bps,
        )
        .map_err(|e| ConfigError::ValidationError(e.to_string()))
    }

    /// Build a fresh ledger from the `[[tokens]]` seeds and `[strategy]`.
    ///
    /// Seeds are added one at a time, so the interim sums only reach 10000
    /// with the last seed. They go in under the deferred policy and the
    /// configured policy is applied once the full allocation is in place.
    pub fn seed_ledger(&self) -> Result<WeightedTokenLedger, LedgerError> {
        let owner = self.ledger.owner_id();
        let seeding = LedgerPolicy {
            weights: WeightPolicy::Deferred,
            ..self.ledger.policy()
        };
        let mut ledger = WeightedTokenLedger::with_policy(owner.clone(), seeding);

        for seed in &self.tokens {
            ledger.add_supported_token(&owner, seed.token_id(), seed.weight_bps)?;
        }
        if let Some(strategy) = &self.strategy {
            ledger.set_strategy(&owner, strategy.strategy_id(), strategy.active)?;
        }

        ledger.set_policy(self.ledger.policy());
        Ok(ledger)
    }
}
