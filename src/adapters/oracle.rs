//! Signal Strategy
//!
//! In-process strategy collaborator. A single oracle account pushes weight
//! vectors; the ledger pulls the latest one on `execute_strategy_rebalance`.
//! Published vectors are validated here too, so the oracle finds out about
//! a bad vector at publish time rather than at rebalance time.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::RwLock;

use crate::domain::persistence::{read_json, write_json_atomic};
use crate::domain::token::{AccountId, TokenId};
use crate::domain::weights::MAX_BPS;
use crate::ports::strategy::{StrategyError, StrategyPort, WeightVector};

/// On-disk form of a strategy
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StrategyState {
    id: AccountId,
    oracle: AccountId,
    latest: Option<WeightVector>,
}

#[derive(Debug)]
pub struct SignalStrategy {
    id: AccountId,
    oracle: AccountId,
    latest: RwLock<Option<WeightVector>>,
}

impl SignalStrategy {
    pub fn new(id: AccountId, oracle: AccountId) -> Self {
        Self {
            id,
            oracle,
            latest: RwLock::new(None),
        }
    }

    pub fn oracle(&self) -> &AccountId {
        &self.oracle
    }

    /// Publish a new target vector (oracle only)
    pub fn publish_weights(
        &self,
        caller: &AccountId,
        tokens: Vec<TokenId>,
        weights_bps: Vec<u32>,
    ) -> Result<(), StrategyError> {
        if *caller != self.oracle {
            tracing::warn!(caller = %caller, strategy = %self.id, "Publish rejected: not the oracle");
            return Err(StrategyError::Unauthorized(caller.clone()));
        }

        validate_vector(&tokens, &weights_bps)?;

        let vector = WeightVector::new(tokens, weights_bps, caller.clone());
        tracing::info!(
            strategy = %self.id,
            tokens = vector.tokens.len(),
            "Strategy weights published"
        );

        let mut latest = self
            .latest
            .write()
            .map_err(|e| StrategyError::Storage(e.to_string()))?;
        *latest = Some(vector);
        Ok(())
    }

    pub fn save(&self, path: &Path) -> Result<(), StrategyError> {
        let latest = self
            .latest
            .read()
            .map_err(|e| StrategyError::Storage(e.to_string()))?
            .clone();
        let state = StrategyState {
            id: self.id.clone(),
            oracle: self.oracle.clone(),
            latest,
        };
        write_json_atomic(path, &state).map_err(|e| StrategyError::Storage(e.to_string()))
    }

    /// Restore a strategy saved with `save`, or start fresh if the file is
    /// missing. The configured id/oracle win over whatever was on disk.
    pub fn load_or_new(path: &Path, id: AccountId, oracle: AccountId) -> Result<Self, StrategyError> {
        let state: Option<StrategyState> =
            read_json(path).map_err(|e| StrategyError::Storage(e.to_string()))?;

        let strategy = Self::new(id, oracle);
        if let Some(state) = state {
            if state.id != strategy.id || state.oracle != strategy.oracle {
                tracing::warn!(
                    saved_id = %state.id,
                    saved_oracle = %state.oracle,
                    "Saved strategy identity differs from config, discarding published vector"
                );
            } else if let Ok(mut latest) = strategy.latest.write() {
                *latest = state.latest;
            }
        }
        Ok(strategy)
    }
}

impl StrategyPort for SignalStrategy {
    fn strategy_id(&self) -> AccountId {
        self.id.clone()
    }

    fn latest_weights(&self) -> Result<WeightVector, StrategyError> {
        self.latest
            .read()
            .map_err(|e| StrategyError::Storage(e.to_string()))?
            .clone()
            .ok_or(StrategyError::NoWeightsPublished)
    }
}

fn validate_vector(tokens: &[TokenId], weights_bps: &[u32]) -> Result<(), StrategyError> {
    if tokens.len() != weights_bps.len() {
        return Err(StrategyError::InvalidVector(format!(
            "{} tokens but {} weights",
            tokens.len(),
            weights_bps.len()
        )));
    }

    if let Some((token, weight)) = tokens
        .iter()
        .zip(weights_bps)
        .find(|(_, w)| **w > MAX_BPS)
    {
        return Err(StrategyError::InvalidVector(format!(
            "{token} weight {weight} exceeds {MAX_BPS}"
        )));
    }

    let total: u64 = weights_bps.iter().map(|w| u64::from(*w)).sum();
    if total != u64::from(MAX_BPS) {
        return Err(StrategyError::InvalidVector(format!(
            "weights sum to {total}, expected {MAX_BPS}"
        )));
    }
    Ok(())
}
