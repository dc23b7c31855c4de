//! Weighted Token Ledger
//!
//! Registry of supported tokens and their target allocation weights in basis
//! points. Owner-gated mutations, optional strategy-driven rebalancing, and
//! an all-or-nothing weight replace that keeps the total at exactly 10000.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashSet, VecDeque};
use thiserror::Error;

use super::token::{AccountId, TokenEntry, TokenId};
use super::weights::{ensure_full_allocation, total_weight, validate_weight, MAX_BPS};
use crate::ports::strategy::{StrategyError, StrategyPort};

/// Maximum audit events kept in memory (and on disk)
pub const MAX_EVENT_HISTORY: usize = 100;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum LedgerError {
    #[error("Caller {caller} is not authorized for this operation")]
    Unauthorized { caller: AccountId },

    #[error("Token {0} is already supported")]
    DuplicateToken(TokenId),

    #[error("Invalid weight for {token}: {weight_bps} bps exceeds 10000")]
    InvalidWeight { token: TokenId, weight_bps: u32 },

    #[error("Token {0} is not supported")]
    UnknownToken(TokenId),

    #[error("Token set mismatch: missing {missing:?}, duplicated {duplicated:?}")]
    TokenSetMismatch {
        missing: Vec<TokenId>,
        duplicated: Vec<TokenId>,
    },

    #[error("Length mismatch: {tokens} tokens but {weights} weights")]
    LengthMismatch { tokens: usize, weights: usize },

    #[error("Weights sum to {total_bps} bps, expected 10000")]
    WeightSumInvalid { total_bps: u64 },

    #[error("No active strategy is configured")]
    StrategyNotSet,

    #[error("Strategy {got} is not the registered strategy {expected}")]
    StrategyMismatch { expected: AccountId, got: AccountId },

    #[error("Strategy error: {0}")]
    Strategy(#[from] StrategyError),
}

/// Broad class of a ledger failure, for callers deciding how to react
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Bad input; state unchanged, caller can correct and retry
    Validation,
    /// Caller lacks permission
    Authorization,
    /// Missing setup; nothing helps until `set_strategy` is called
    Configuration,
    /// The strategy collaborator failed
    Collaborator,
}

impl LedgerError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            LedgerError::Unauthorized { .. } => ErrorCategory::Authorization,
            LedgerError::StrategyNotSet | LedgerError::StrategyMismatch { .. } => {
                ErrorCategory::Configuration
            }
            LedgerError::Strategy(_) => ErrorCategory::Collaborator,
            _ => ErrorCategory::Validation,
        }
    }
}

/// When the 10000 bps sum is enforced for single add/remove calls
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WeightPolicy {
    /// Add/remove may leave the sum off 10000; the next weight update must fix it
    #[default]
    Deferred,
    /// Every mutating call must leave the sum at exactly 10000
    Strict,
}

/// Who may trigger a strategy rebalance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RebalanceTrigger {
    #[default]
    OwnerOnly,
    Public,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LedgerPolicy {
    #[serde(default)]
    pub weights: WeightPolicy,
    #[serde(default)]
    pub rebalance_trigger: RebalanceTrigger,
}

/// Registered strategy collaborator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrategyRegistration {
    pub id: AccountId,
    pub active: bool,
}

/// Where a weight update came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum UpdateSource {
    Owner,
    Strategy(AccountId),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LedgerEventKind {
    TokenAdded { token: TokenId, weight_bps: u32 },
    TokenRemoved { token: TokenId, weight_bps: u32 },
    WeightsUpdated { source: UpdateSource, weights: Vec<(TokenId, u32)> },
    StrategySet { strategy: AccountId, active: bool },
    OwnershipTransferred { from: AccountId, to: AccountId },
}

/// Audit record of a committed mutation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEvent {
    pub kind: LedgerEventKind,
    pub caller: AccountId,
    pub timestamp: DateTime<Utc>,
}

/// Read-only snapshot of supported tokens and their target weights
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PortfolioSummary {
    pub tokens: Vec<TokenId>,
    pub target_weights: Vec<u32>,
    pub total_weight_bps: u64,
    pub strategy: Option<StrategyRegistration>,
}

impl PortfolioSummary {
    pub fn weight_of(&self, token: &TokenId) -> Option<u32> {
        self.tokens
            .iter()
            .position(|t| t == token)
            .and_then(|idx| self.target_weights.get(idx).copied())
    }

    pub fn is_balanced(&self) -> bool {
        self.total_weight_bps == u64::from(MAX_BPS)
    }

    pub fn entries(&self) -> impl Iterator<Item = (&TokenId, u32)> + '_ {
        self.tokens.iter().zip(self.target_weights.iter().copied())
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

/// The ledger. One instance per deployment, passed explicitly to whatever
/// serves it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeightedTokenLedger {
    owner: AccountId,
    tokens: Vec<TokenEntry>,
    strategy: Option<StrategyRegistration>,
    #[serde(default)]
    policy: LedgerPolicy,
    #[serde(default)]
    events: VecDeque<LedgerEvent>,
}

impl WeightedTokenLedger {
    /// Create an empty ledger with default policy
    pub fn new(owner: AccountId) -> Self {
        Self::with_policy(owner, LedgerPolicy::default())
    }

    pub fn with_policy(owner: AccountId, policy: LedgerPolicy) -> Self {
        Self {
            owner,
            tokens: Vec::new(),
            strategy: None,
            policy,
            events: VecDeque::with_capacity(MAX_EVENT_HISTORY),
        }
    }

    // ===== ACCESS CONTROL =====

    fn ensure_owner(&self, caller: &AccountId) -> Result<(), LedgerError> {
        if *caller != self.owner {
            return Err(LedgerError::Unauthorized {
                caller: caller.clone(),
            });
        }
        Ok(())
    }

    // ===== GETTERS =====

    pub fn owner(&self) -> &AccountId {
        &self.owner
    }

    pub fn strategy(&self) -> Option<&StrategyRegistration> {
        self.strategy.as_ref()
    }

    pub fn policy(&self) -> LedgerPolicy {
        self.policy
    }

    /// Replace the policy; applies to subsequent calls only
    pub fn set_policy(&mut self, policy: LedgerPolicy) {
        self.policy = policy;
    }

    pub fn is_supported(&self, token: &TokenId) -> bool {
        self.position(token).is_some()
    }

    pub fn target_weight(&self, token: &TokenId) -> Option<u32> {
        self.position(token).map(|idx| self.tokens[idx].target_weight_bps)
    }

    pub fn total_weight_bps(&self) -> u64 {
        self.tokens
            .iter()
            .map(|e| u64::from(e.target_weight_bps))
            .sum()
    }

    pub fn is_balanced(&self) -> bool {
        self.total_weight_bps() == u64::from(MAX_BPS)
    }

    pub fn events(&self) -> &VecDeque<LedgerEvent> {
        &self.events
    }

    pub fn portfolio_summary(&self) -> PortfolioSummary {
        PortfolioSummary {
            tokens: self.tokens.iter().map(|e| e.id.clone()).collect(),
            target_weights: self.tokens.iter().map(|e| e.target_weight_bps).collect(),
            total_weight_bps: self.total_weight_bps(),
            strategy: self.strategy.clone(),
        }
    }

    /// Check the registry invariants a deserialized ledger cannot guarantee:
    /// unique token ids and every weight within 0..=10000.
    pub fn validate(&self) -> Result<(), LedgerError> {
        let mut seen = HashSet::with_capacity(self.tokens.len());
        for entry in &self.tokens {
            validate_weight(&entry.id, entry.target_weight_bps)?;
            if !seen.insert(&entry.id) {
                return Err(LedgerError::DuplicateToken(entry.id.clone()));
            }
        }
        Ok(())
    }

    fn position(&self, token: &TokenId) -> Option<usize> {
        self.tokens.iter().position(|e| e.id == *token)
    }

    // ===== TOKEN REGISTRY =====

    /// Add a supported token at the given target weight (owner only)
    pub fn add_supported_token(
        &mut self,
        caller: &AccountId,
        token: TokenId,
        weight_bps: u32,
    ) -> Result<(), LedgerError> {
        self.try_add(caller, token, weight_bps)
            .inspect_err(|e| log_rejection("add_supported_token", caller, e))
    }

    fn try_add(
        &mut self,
        caller: &AccountId,
        token: TokenId,
        weight_bps: u32,
    ) -> Result<(), LedgerError> {
        self.ensure_owner(caller)?;
        validate_weight(&token, weight_bps)?;

        if self.is_supported(&token) {
            return Err(LedgerError::DuplicateToken(token));
        }

        if self.policy.weights == WeightPolicy::Strict {
            let total = total_weight(
                self.tokens
                    .iter()
                    .map(|e| e.target_weight_bps)
                    .chain(std::iter::once(weight_bps)),
            )?;
            ensure_full_allocation(total)?;
        }

        self.tokens.push(TokenEntry::new(token.clone(), weight_bps));

        tracing::info!(
            token = %token,
            weight_bps,
            total_bps = self.total_weight_bps(),
            "Supported token added"
        );
        if !self.is_balanced() {
            tracing::debug!(
                total_bps = self.total_weight_bps(),
                "Weights not at 10000 bps; awaiting update_target_weights"
            );
        }

        self.record(caller, LedgerEventKind::TokenAdded { token, weight_bps });
        Ok(())
    }

    /// Remove a supported token (owner only). The freed weight is not
    /// redistributed.
    pub fn remove_supported_token(
        &mut self,
        caller: &AccountId,
        token: &TokenId,
    ) -> Result<(), LedgerError> {
        self.try_remove(caller, token)
            .inspect_err(|e| log_rejection("remove_supported_token", caller, e))
    }

    fn try_remove(&mut self, caller: &AccountId, token: &TokenId) -> Result<(), LedgerError> {
        self.ensure_owner(caller)?;

        let idx = self
            .position(token)
            .ok_or_else(|| LedgerError::UnknownToken(token.clone()))?;

        if self.policy.weights == WeightPolicy::Strict {
            let total = total_weight(
                self.tokens
                    .iter()
                    .enumerate()
                    .filter(|(i, _)| *i != idx)
                    .map(|(_, e)| e.target_weight_bps),
            )?;
            ensure_full_allocation(total)?;
        }

        let removed = self.tokens.remove(idx);

        tracing::info!(
            token = %removed.id,
            freed_bps = removed.target_weight_bps,
            total_bps = self.total_weight_bps(),
            "Supported token removed"
        );

        self.record(
            caller,
            LedgerEventKind::TokenRemoved {
                token: removed.id,
                weight_bps: removed.target_weight_bps,
            },
        );
        Ok(())
    }

    // ===== WEIGHT UPDATES =====

    /// Atomically replace every supported token's weight (owner only).
    ///
    /// `token_ids` must name exactly the supported set, once each, and the
    /// new weights must sum to 10000. On any error nothing changes.
    pub fn update_target_weights(
        &mut self,
        caller: &AccountId,
        token_ids: &[TokenId],
        weights_bps: &[u32],
    ) -> Result<(), LedgerError> {
        self.ensure_owner(caller)
            .and_then(|_| self.replace_weights(token_ids, weights_bps))
            .inspect_err(|e| log_rejection("update_target_weights", caller, e))?;

        tracing::info!(tokens = token_ids.len(), "Target weights updated by owner");
        self.record(
            caller,
            LedgerEventKind::WeightsUpdated {
                source: UpdateSource::Owner,
                weights: zip_weights(token_ids, weights_bps),
            },
        );
        Ok(())
    }

    /// Apply the registered strategy's latest weight vector.
    ///
    /// Goes through the same validate-and-replace path as
    /// `update_target_weights`.
    pub fn execute_strategy_rebalance(
        &mut self,
        caller: &AccountId,
        strategy: &dyn StrategyPort,
    ) -> Result<(), LedgerError> {
        let registered = self
            .try_strategy_rebalance(caller, strategy)
            .inspect_err(|e| log_rejection("execute_strategy_rebalance", caller, e))?;
        let vector_len = self.tokens.len();

        tracing::info!(
            strategy = %registered,
            tokens = vector_len,
            "Strategy rebalance applied"
        );
        let weights = self
            .tokens
            .iter()
            .map(|e| (e.id.clone(), e.target_weight_bps))
            .collect();
        self.record(
            caller,
            LedgerEventKind::WeightsUpdated {
                source: UpdateSource::Strategy(registered),
                weights,
            },
        );
        Ok(())
    }

    fn try_strategy_rebalance(
        &mut self,
        caller: &AccountId,
        strategy: &dyn StrategyPort,
    ) -> Result<AccountId, LedgerError> {
        if self.policy.rebalance_trigger == RebalanceTrigger::OwnerOnly {
            self.ensure_owner(caller)?;
        }

        let registered = match &self.strategy {
            Some(reg) if reg.active => reg.id.clone(),
            _ => return Err(LedgerError::StrategyNotSet),
        };

        let supplied = strategy.strategy_id();
        if supplied != registered {
            return Err(LedgerError::StrategyMismatch {
                expected: registered,
                got: supplied,
            });
        }

        let vector = strategy.latest_weights()?;
        tracing::debug!(
            published_by = %vector.published_by,
            published_at = %vector.published_at,
            "Read strategy weight vector"
        );
        self.replace_weights(&vector.tokens, &vector.weights_bps)?;
        Ok(registered)
    }

    /// Validate a full replacement vector, then commit it. Nothing is
    /// written unless every check passes.
    fn replace_weights(
        &mut self,
        token_ids: &[TokenId],
        weights_bps: &[u32],
    ) -> Result<(), LedgerError> {
        if token_ids.len() != weights_bps.len() {
            return Err(LedgerError::LengthMismatch {
                tokens: token_ids.len(),
                weights: weights_bps.len(),
            });
        }

        for (token, weight) in token_ids.iter().zip(weights_bps) {
            validate_weight(token, *weight)?;
        }

        if let Some(unknown) = token_ids.iter().find(|t| !self.is_supported(t)) {
            return Err(LedgerError::UnknownToken(unknown.clone()));
        }

        let mut seen = HashSet::with_capacity(token_ids.len());
        let duplicated: Vec<TokenId> = token_ids
            .iter()
            .filter(|t| !seen.insert(*t))
            .cloned()
            .collect();
        let missing: Vec<TokenId> = self
            .tokens
            .iter()
            .filter(|e| !seen.contains(&e.id))
            .map(|e| e.id.clone())
            .collect();
        if !duplicated.is_empty() || !missing.is_empty() {
            return Err(LedgerError::TokenSetMismatch {
                missing,
                duplicated,
            });
        }

        let total = total_weight(weights_bps.iter().copied())?;
        ensure_full_allocation(total)?;

        for (token, weight) in token_ids.iter().zip(weights_bps) {
            if let Some(idx) = self.position(token) {
                self.tokens[idx].target_weight_bps = *weight;
            }
        }
        Ok(())
    }

    // ===== ADMINISTRATION =====

    /// Register, replace or deactivate the strategy collaborator (owner only)
    pub fn set_strategy(
        &mut self,
        caller: &AccountId,
        strategy_id: AccountId,
        active: bool,
    ) -> Result<(), LedgerError> {
        self.ensure_owner(caller)
            .inspect_err(|e| log_rejection("set_strategy", caller, e))?;

        tracing::info!(strategy = %strategy_id, active, "Strategy registration updated");
        self.strategy = Some(StrategyRegistration {
            id: strategy_id.clone(),
            active,
        });
        self.record(
            caller,
            LedgerEventKind::StrategySet {
                strategy: strategy_id,
                active,
            },
        );
        Ok(())
    }

    /// Hand the owner role to another account (owner only)
    pub fn transfer_ownership(
        &mut self,
        caller: &AccountId,
        new_owner: AccountId,
    ) -> Result<(), LedgerError> {
        self.ensure_owner(caller)
            .inspect_err(|e| log_rejection("transfer_ownership", caller, e))?;

        tracing::warn!(from = %self.owner, to = %new_owner, "Ownership transferred");
        let previous = std::mem::replace(&mut self.owner, new_owner.clone());
        self.record(
            caller,
            LedgerEventKind::OwnershipTransferred {
                from: previous,
                to: new_owner,
            },
        );
        Ok(())
    }

    fn record(&mut self, caller: &AccountId, kind: LedgerEventKind) {
        if self.events.len() >= MAX_EVENT_HISTORY {
            self.events.pop_front();
        }
        self.events.push_back(LedgerEvent {
            kind,
            caller: caller.clone(),
            timestamp: Utc::now(),
        });
    }
}

fn zip_weights(token_ids: &[TokenId], weights_bps: &[u32]) -> Vec<(TokenId, u32)> {
    token_ids
        .iter()
        .cloned()
        .zip(weights_bps.iter().copied())
        .collect()
}

fn log_rejection(operation: &str, caller: &AccountId, error: &LedgerError) {
    tracing::warn!(
        operation,
        caller = %caller,
        category = ?error.category(),
        "Ledger call rejected: {}",
        error
    );
}
