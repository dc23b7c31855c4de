//! SignalStack - Target-Weight Rebalancing Ledger CLI

use anyhow::Result;
use std::path::Path;
use tracing_subscriber::{fmt, EnvFilter};

use signalstack_ledger::adapters::cli::{self, CliApp};
use signalstack_ledger::config::load_config;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if it exists (SIGNALSTACK_DATA_DIR etc.)
    dotenvy::dotenv().ok();

    let app = cli::init();
    init_logging(&app)?;

    cli::execute(app).await
}

fn init_logging(app: &CliApp) -> Result<()> {
    let filter = if app.debug {
        EnvFilter::new("debug")
    } else if app.verbose {
        EnvFilter::new("info")
    } else if let Ok(env) = EnvFilter::try_from_default_env() {
        env
    } else {
        EnvFilter::new(configured_level(&app.config))
    };

    fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
    Ok(())
}

/// Log level from the config file, "warn" if it cannot be read yet
fn configured_level(path: &Path) -> String {
    load_config(path)
        .map(|c| c.logging.level.to_lowercase())
        .unwrap_or_else(|_| "warn".to_string())
}
