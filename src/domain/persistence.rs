//! Ledger Persistence
//!
//! Saves the ledger state to a JSON file so it survives restarts. Writes go
//! to a sibling temp file first and are renamed into place, so a reader
//! never observes a half-written ledger.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use super::ledger::WeightedTokenLedger;

/// Default ledger file name inside the data directory
pub const DEFAULT_LEDGER_FILE: &str = "ledger.json";

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PersistError {
    #[error("Failed to serialize state: {0}")]
    SerializationError(String),

    #[error("Failed to deserialize state: {0}")]
    DeserializationError(String),

    #[error("Failed to write state file: {0}")]
    WriteError(String),

    #[error("Failed to read state file: {0}")]
    ReadError(String),

    #[error("Failed to create directory: {0}")]
    DirectoryError(String),

    #[error("Stored ledger is invalid: {0}")]
    InvalidState(String),
}

/// Write `value` as pretty JSON to `path` via temp file + rename
pub fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<(), PersistError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|e| PersistError::DirectoryError(e.to_string()))?;
        }
    }

    let content = serde_json::to_string_pretty(value)
        .map_err(|e| PersistError::SerializationError(e.to_string()))?;

    let tmp = tmp_path(path);
    fs::write(&tmp, content).map_err(|e| PersistError::WriteError(e.to_string()))?;
    fs::rename(&tmp, path).map_err(|e| PersistError::WriteError(e.to_string()))?;
    Ok(())
}

/// Read JSON from `path`; a missing or blank file is `None`
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, PersistError> {
    if !path.exists() {
        return Ok(None);
    }

    let content = fs::read_to_string(path).map_err(|e| PersistError::ReadError(e.to_string()))?;
    if content.trim().is_empty() {
        return Ok(None);
    }

    serde_json::from_str(&content)
        .map(Some)
        .map_err(|e| PersistError::DeserializationError(e.to_string()))
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// File-backed store for one ledger
#[derive(Debug, Clone)]
pub struct LedgerStore {
    path: PathBuf,
}

impl LedgerStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at the default file name inside `data_dir`
    pub fn in_dir(data_dir: &Path) -> Self {
        Self::new(data_dir.join(DEFAULT_LEDGER_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    pub fn save(&self, ledger: &WeightedTokenLedger) -> Result<(), PersistError> {
        write_json_atomic(&self.path, ledger)?;
        tracing::debug!(
            path = %self.path.display(),
            tokens = ledger.portfolio_summary().len(),
            "Ledger saved"
        );
        Ok(())
    }

    pub fn load(&self) -> Result<Option<WeightedTokenLedger>, PersistError> {
        let ledger: Option<WeightedTokenLedger> = read_json(&self.path)?;
        if let Some(ledger) = &ledger {
            ledger
                .validate()
                .map_err(|e| PersistError::InvalidState(e.to_string()))?;
            tracing::info!(
                path = %self.path.display(),
                owner = %ledger.owner(),
                total_bps = ledger.total_weight_bps(),
                "Ledger loaded"
            );
        }
        Ok(ledger)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ledger::{LedgerPolicy, WeightPolicy};
    use crate::domain::token::{AccountId, TokenId};
    use tempfile::tempdir;

    #[test]
    fn test_save_and_load_preserves_state() {
        let dir = tempdir().unwrap();
        let store = LedgerStore::in_dir(&dir.path().join("nested"));

        let owner = AccountId::from("owner");
        let policy = LedgerPolicy { weights: WeightPolicy::Strict, ..LedgerPolicy::default() };
        let mut ledger = WeightedTokenLedger::with_policy(owner.clone(), policy);
        ledger.add_supported_token(&owner, TokenId::from("WETH"), 10_000).unwrap();
        ledger.set_strategy(&owner, AccountId::from("signalstack"), true).unwrap();

        store.save(&ledger).unwrap();
        assert!(store.exists());
        assert!(!tmp_path(store.path()).exists());

        let loaded = store.load().unwrap().unwrap();
        assert_eq!(loaded.portfolio_summary(), ledger.portfolio_summary());
        assert_eq!(loaded.policy(), policy);
        assert_eq!(loaded.events(), ledger.events());
    }

    #[test]
    fn test_load_missing_or_blank_is_none() {
        let dir = tempdir().unwrap();
        let store = LedgerStore::new(dir.path().join("ledger.json"));
        assert!(store.load().unwrap().is_none());

        fs::write(store.path(), "  \n").unwrap();
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn test_load_corrupted_file() {
        let dir = tempdir().unwrap();
        let store = LedgerStore::new(dir.path().join("ledger.json"));
        fs::write(store.path(), "{ not json").unwrap();

        assert!(matches!(
            store.load(),
            Err(PersistError::DeserializationError(_))
        ));
    }

    #[test]
    fn test_load_rejects_invalid_registry() {
        let dir = tempdir().unwrap();
        let store = LedgerStore::new(dir.path().join("ledger.json"));

        // Well-formed JSON, but a duplicated id and an out-of-range weight
        fs::write(
            store.path(),
            r#"{"owner":"0xOwner","tokens":[
                {"id":"WETH","target_weight_bps":5000},
                {"id":"WETH","target_weight_bps":5000},
                {"id":"TK1","target_weight_bps":99999}
            ],"strategy":null}"#,
        )
        .unwrap();
        assert!(matches!(store.load(), Err(PersistError::InvalidState(_))));

        fs::write(
            store.path(),
            r#"{"owner":"0xOwner","tokens":[{"id":"TK1","target_weight_bps":99999}],"strategy":null}"#,
        )
        .unwrap();
        assert!(matches!(store.load(), Err(PersistError::InvalidState(_))));
    }
}
