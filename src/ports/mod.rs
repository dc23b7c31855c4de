//! Ports Layer - Trait definitions for external collaborators
//!
//! The ledger reads proposed weights from a strategy/oracle collaborator
//! through `StrategyPort`. Execution and presentation layers sit on the
//! other side of `LedgerService` and need no port of their own.

pub mod strategy;

pub use strategy::{StrategyError, StrategyPort, WeightVector};

#[cfg(test)]
pub use strategy::MockStrategyPort;
