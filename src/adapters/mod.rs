//! Adapters Layer - External System Implementations
//!
//! - Oracle: in-process strategy collaborator fed by a single oracle account
//! - CLI: Command-line interface handlers

pub mod oracle;
pub mod cli;

pub use oracle::SignalStrategy;
pub use cli::CliApp;
