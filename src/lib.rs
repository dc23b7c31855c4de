//! SignalStack - Target-Weight Rebalancing Ledger Library
//!
//! A registry of supported tokens and their basis-point target weights. Every
//! committed weight set allocates exactly 10000 bps.
//!
//! # Modules
//!
//! - `domain`: Core ledger logic (WeightedTokenLedger, weights, drift, persistence)
//! - `ports`: Trait abstractions (StrategyPort)
//! - `adapters`: External implementations (SignalStrategy oracle, CLI)
//! - `config`: Configuration loading and validation
//! - `application`: LedgerService with serialized writes and snapshot reads

pub mod domain;
pub mod ports;
pub mod adapters;
pub mod config;
pub mod application;
