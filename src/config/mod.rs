//! Configuration Module
//!
//! Loads and validates configuration from TOML files.

pub mod loader;

pub use loader::{
    Config, ConfigError, DriftSection, LedgerSection, LoggingSection, StorageSection,
    StrategySection, TokenSeed, load_config,
};
