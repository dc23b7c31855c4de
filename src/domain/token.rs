//! Token and account identifiers
//!
//! Newtypes for the keys the ledger is indexed by. Both are opaque strings
//! (contract addresses, mint addresses or plain symbols) compared verbatim.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique key of a supported asset
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TokenId(String);

impl TokenId {
    pub fn new(id: impl Into<String>) -> Self {
        TokenId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TokenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TokenId {
    fn from(id: &str) -> Self {
        TokenId::new(id)
    }
}

impl From<String> for TokenId {
    fn from(id: String) -> Self {
        TokenId(id)
    }
}

/// Identity of a caller (owner, strategy, oracle or anyone else)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(String);

impl AccountId {
    pub fn new(id: impl Into<String>) -> Self {
        AccountId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AccountId {
    fn from(id: &str) -> Self {
        AccountId::new(id)
    }
}

impl From<String> for AccountId {
    fn from(id: String) -> Self {
        AccountId(id)
    }
}

/// A supported token and its target allocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenEntry {
    pub id: TokenId,
    /// Target weight in basis points (0-10000)
    pub target_weight_bps: u32,
}

impl TokenEntry {
    pub fn new(id: TokenId, target_weight_bps: u32) -> Self {
        TokenEntry {
            id,
            target_weight_bps,
        }
    }
}
