//! CLI Adapter
//!
//! Command-line interface for the SignalStack ledger.
//! Uses clap derive macros for argument parsing.

mod commands;

pub use commands::{
    AddCmd, CliApp, Command, DriftCmd, EventsCmd, InitCmd, NormalizeCmd, OutputFormat, RemoveCmd,
    SetStrategyCmd, SummaryCmd, TransferCmd, WeightsCmd,
};

use anyhow::Result;

/// Initialize the CLI application
pub fn init() -> CliApp {
    use clap::Parser;
    CliApp::parse()
}

/// Execute the CLI command
pub async fn execute(app: CliApp) -> Result<()> {
    commands::execute(app).await
}
