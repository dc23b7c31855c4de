use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::token::{AccountId, TokenId};

/// Strategy/oracle collaborator that proposes new target weights
///
/// The ledger only ever reads the most recently published vector; how the
/// vector gets produced (oracle signal, model output, manual push) is up to
/// the implementation.
#[cfg_attr(test, mockall::automock)]
pub trait StrategyPort: Send + Sync {
    /// Identity the ledger checks against its registered strategy
    fn strategy_id(&self) -> AccountId;

    /// Latest published weight vector
    fn latest_weights(&self) -> Result<WeightVector, StrategyError>;
}

/// A published set of target weights (parallel token / bps sequences)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightVector {
    pub tokens: Vec<TokenId>,
    pub weights_bps: Vec<u32>,
    pub published_by: AccountId,
    pub published_at: DateTime<Utc>,
}

impl WeightVector {
    pub fn new(tokens: Vec<TokenId>, weights_bps: Vec<u32>, published_by: AccountId) -> Self {
        Self {
            tokens,
            weights_bps,
            published_by,
            published_at: Utc::now(),
        }
    }
}

/// Strategy collaborator errors
#[derive(Debug, Error, Clone, PartialEq, Serialize, Deserialize)]
pub enum StrategyError {
    #[error("No weight vector has been published yet")]
    NoWeightsPublished,

    #[error("Caller {0} is not the strategy oracle")]
    Unauthorized(AccountId),

    #[error("Invalid weight vector: {0}")]
    InvalidVector(String),

    #[error("Strategy storage error: {0}")]
    Storage(String),
}
