//! Domain Layer - Core ledger logic
//!
//! Pure types and rules with no I/O beyond the JSON store:
//! - `token`: identifiers and token entries
//! - `weights`: the centralized bps validation and slider normalization
//! - `ledger`: the weighted token registry and its invariants
//! - `drift`: actual-vs-target allocation drift
//! - `persistence`: JSON save/load for restarts

pub mod token;
pub mod weights;
pub mod ledger;
pub mod drift;
pub mod persistence;

pub use token::{AccountId, TokenEntry, TokenId};
pub use weights::{normalize_to_bps, NormalizeError, MAX_BPS};
pub use ledger::{
    ErrorCategory, LedgerError, LedgerEvent, LedgerEventKind, LedgerPolicy, PortfolioSummary,
    RebalanceTrigger, StrategyRegistration, UpdateSource, WeightPolicy, WeightedTokenLedger,
};
pub use drift::{analyze_drift, DriftLevel, DriftReport, DriftThresholds, TokenDrift};
pub use persistence::{LedgerStore, PersistError};
