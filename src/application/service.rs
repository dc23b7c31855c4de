//! Ledger Service
//!
//! Fronts a `WeightedTokenLedger` for concurrent callers. Mutations are
//! serialized behind one async lock and committed in three steps: apply to
//! a candidate copy, persist the candidate, swap it in. Reads are served
//! from the last committed snapshot over a `watch` channel and never wait
//! on the writer lock.

use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{watch, Mutex};

use crate::domain::ledger::{LedgerError, PortfolioSummary, WeightedTokenLedger};
use crate::domain::persistence::{LedgerStore, PersistError};
use crate::domain::token::{AccountId, TokenId};
use crate::ports::strategy::StrategyPort;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error("Persistence failed, change not committed: {0}")]
    Persist(#[from] PersistError),
}

impl ServiceError {
    /// The ledger-level error, if that is what failed
    pub fn ledger_error(&self) -> Option<&LedgerError> {
        match self {
            ServiceError::Ledger(e) => Some(e),
            ServiceError::Persist(_) => None,
        }
    }
}

#[derive(Clone)]
pub struct LedgerService {
    ledger: Arc<Mutex<WeightedTokenLedger>>,
    store: Option<LedgerStore>,
    snapshot_tx: Arc<watch::Sender<PortfolioSummary>>,
    snapshot_rx: watch::Receiver<PortfolioSummary>,
}

impl LedgerService {
    /// Wrap a ledger. With a store, every committed change is written to it.
    pub fn new(ledger: WeightedTokenLedger, store: Option<LedgerStore>) -> Self {
        let (snapshot_tx, snapshot_rx) = watch::channel(ledger.portfolio_summary());
        Self {
            ledger: Arc::new(Mutex::new(ledger)),
            store,
            snapshot_tx: Arc::new(snapshot_tx),
            snapshot_rx,
        }
    }

    /// Latest committed summary
    pub fn summary(&self) -> PortfolioSummary {
        self.snapshot_rx.borrow().clone()
    }

    /// Receiver that wakes on every committed change
    pub fn subscribe(&self) -> watch::Receiver<PortfolioSummary> {
        self.snapshot_tx.subscribe()
    }

    /// Copy of the full committed ledger (owner, policy, events)
    pub async fn ledger(&self) -> WeightedTokenLedger {
        self.ledger.lock().await.clone()
    }

    pub async fn add_supported_token(
        &self,
        caller: &AccountId,
        token: TokenId,
        weight_bps: u32,
    ) -> Result<PortfolioSummary, ServiceError> {
        self.commit(|ledger| ledger.add_supported_token(caller, token, weight_bps))
            .await
    }

    pub async fn remove_supported_token(
        &self,
        caller: &AccountId,
        token: &TokenId,
    ) -> Result<PortfolioSummary, ServiceError> {
        self.commit(|ledger| ledger.remove_supported_token(caller, token))
            .await
    }

    pub async fn update_target_weights(
        &self,
        caller: &AccountId,
        token_ids: &[TokenId],
        weights_bps: &[u32],
    ) -> Result<PortfolioSummary, ServiceError> {
        self.commit(|ledger| ledger.update_target_weights(caller, token_ids, weights_bps))
            .await
    }

    pub async fn execute_strategy_rebalance(
        &self,
        caller: &AccountId,
        strategy: &dyn StrategyPort,
    ) -> Result<PortfolioSummary, ServiceError> {
        self.commit(|ledger| ledger.execute_strategy_rebalance(caller, strategy))
            .await
    }

    pub async fn set_strategy(
        &self,
        caller: &AccountId,
        strategy_id: AccountId,
        active: bool,
    ) -> Result<PortfolioSummary, ServiceError> {
        self.commit(|ledger| ledger.set_strategy(caller, strategy_id, active))
            .await
    }

    pub async fn transfer_ownership(
        &self,
        caller: &AccountId,
        new_owner: AccountId,
    ) -> Result<PortfolioSummary, ServiceError> {
        self.commit(|ledger| ledger.transfer_ownership(caller, new_owner))
            .await
    }

    /// Apply `op` to a candidate, persist it, then make it the committed state
    async fn commit<F>(&self, op: F) -> Result<PortfolioSummary, ServiceError>
    where
        F: FnOnce(&mut WeightedTokenLedger) -> Result<(), LedgerError>,
    {
        let mut guard = self.ledger.lock().await;

        let mut candidate = guard.clone();
        op(&mut candidate)?;

        if let Some(store) = &self.store {
            store.save(&candidate)?;
        }

        let summary = candidate.portfolio_summary();
        *guard = candidate;
        self.snapshot_tx.send_replace(summary.clone());
        Ok(summary)
    }
}
