//! CLI Command Handlers
//!
//! Implementation of all CLI commands for the SignalStack ledger.

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::adapters::oracle::SignalStrategy;
use crate::application::LedgerService;
use crate::config::{load_config, Config, StrategySection};
use crate::domain::drift::{analyze_drift, DriftReport};
use crate::domain::ledger::{LedgerEventKind, PortfolioSummary};
use crate::domain::persistence::LedgerStore;
use crate::domain::token::{AccountId, TokenId};
use crate::domain::weights::normalize_to_bps;

/// SignalStack - target-weight rebalancing ledger
#[derive(Parser, Debug)]
#[command(
    name = "signalstack",
    version = env!("CARGO_PKG_VERSION"),
    author = env!("CARGO_PKG_AUTHORS"),
    about = "Target-weight rebalancing ledger",
    long_about = "Maintains a registry of supported tokens with basis-point target weights \
                  that always commit at exactly 10000 bps, updated by the owner or by an \
                  oracle-driven strategy."
)]
pub struct CliApp {
    /// The command to execute
    #[command(subcommand)]
    pub command: Command,

    /// Path to configuration file
    #[arg(short, long, global = true, value_name = "FILE", default_value = "config/ledger.toml")]
    pub config: PathBuf,

    /// Act as this account (defaults to the configured owner, or oracle for `publish`)
    #[arg(long, global = true, value_name = "ID")]
    pub caller: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create the ledger from the configured owner, strategy and seed tokens
    Init(InitCmd),

    /// Show supported tokens and target weights
    Summary(SummaryCmd),

    /// Add a supported token
    Add(AddCmd),

    /// Remove a supported token
    Remove(RemoveCmd),

    /// Replace all target weights (must cover every token, sum to 10000)
    Update(WeightsCmd),

    /// Register or deactivate the strategy collaborator
    SetStrategy(SetStrategyCmd),

    /// Publish a weight vector to the strategy (oracle only)
    Publish(WeightsCmd),

    /// Apply the strategy's latest weights to the ledger
    Rebalance,

    /// Hand the owner role to another account
    TransferOwnership(TransferCmd),

    /// Compare actual allocations against target weights
    Drift(DriftCmd),

    /// Rescale arbitrary values to bps summing to 10000
    Normalize(NormalizeCmd),

    /// Show the recent audit trail
    Events(EventsCmd),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Parser, Debug)]
pub struct InitCmd {
    /// Overwrite an existing ledger file
    #[arg(long)]
    pub force: bool,
}

#[derive(Parser, Debug)]
pub struct SummaryCmd {
    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Parser, Debug)]
pub struct AddCmd {
    /// Token identifier
    #[arg(value_name = "TOKEN")]
    pub token: String,

    /// Target weight in basis points (0-10000)
    #[arg(value_name = "BPS")]
    pub weight_bps: u32,
}

#[derive(Parser, Debug)]
pub struct RemoveCmd {
    /// Token identifier
    #[arg(value_name = "TOKEN")]
    pub token: String,
}

#[derive(Parser, Debug)]
pub struct WeightsCmd {
    /// Weights as TOKEN=BPS pairs
    #[arg(value_name = "TOKEN=BPS", required = true, value_parser = parse_bps_pair)]
    pub weights: Vec<(TokenId, u32)>,
}

#[derive(Parser, Debug)]
pub struct SetStrategyCmd {
    /// Strategy identifier
    #[arg(value_name = "ID")]
    pub id: String,

    /// Register the strategy as inactive
    #[arg(long)]
    pub inactive: bool,
}

#[derive(Parser, Debug)]
pub struct TransferCmd {
    /// New owner account
    #[arg(value_name = "ID")]
    pub new_owner: String,
}

#[derive(Parser, Debug)]
pub struct DriftCmd {
    /// Current allocations as TOKEN=BPS pairs
    #[arg(value_name = "TOKEN=BPS", required = true, value_parser = parse_bps_pair)]
    pub current: Vec<(TokenId, u32)>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Parser, Debug)]
pub struct NormalizeCmd {
    /// Raw values as TOKEN=VALUE pairs (e.g. slider percentages)
    #[arg(value_name = "TOKEN=VALUE", required = true, value_parser = parse_value_pair)]
    pub values: Vec<(TokenId, f64)>,
}

#[derive(Parser, Debug)]
pub struct EventsCmd {
    /// Show at most this many events, newest last
    #[arg(short, long, default_value = "20")]
    pub limit: usize,
}

fn split_pair(raw: &str) -> Result<(TokenId, &str), String> {
    let (token, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected TOKEN=VALUE, got '{raw}'"))?;
    let token = token.trim();
    if token.is_empty() {
        return Err(format!("missing token in '{raw}'"));
    }
    Ok((TokenId::new(token), value.trim()))
}

fn parse_bps_pair(raw: &str) -> Result<(TokenId, u32), String> {
    let (token, value) = split_pair(raw)?;
    let bps = value
        .parse::<u32>()
        .map_err(|e| format!("invalid bps '{value}' for {token}: {e}"))?;
    Ok((token, bps))
}

fn parse_value_pair(raw: &str) -> Result<(TokenId, f64), String> {
    let (token, value) = split_pair(raw)?;
    let parsed = value
        .parse::<f64>()
        .map_err(|e| format!("invalid value '{value}' for {token}: {e}"))?;
    Ok((token, parsed))
}

fn unzip_pairs(pairs: Vec<(TokenId, u32)>) -> (Vec<TokenId>, Vec<u32>) {
    pairs.into_iter().unzip()
}

/// Execute the parsed command
pub async fn execute(app: CliApp) -> Result<()> {
    // Normalize needs no ledger or config
    if let Command::Normalize(cmd) = &app.command {
        return normalize_command(cmd);
    }

    let config = load_config(&app.config)
        .with_context(|| format!("Failed to load configuration from {}", app.config.display()))?;
    let store = LedgerStore::new(config.storage.ledger_path());

    match app.command {
        Command::Init(cmd) => init_command(&config, &store, cmd),
        Command::Normalize(_) => Ok(()),
        command => {
            let service = open_service(&config, store)?;
            let caller = app
                .caller
                .clone()
                .map(AccountId::new)
                .unwrap_or_else(|| config.ledger.owner_id());
            run_ledger_command(&config, &service, caller, app.caller.is_some(), command).await
        }
    }
}

fn init_command(config: &Config, store: &LedgerStore, cmd: InitCmd) -> Result<()> {
    if store.exists() && !cmd.force {
        bail!(
            "Ledger already exists at {} (use --force to overwrite)",
            store.path().display()
        );
    }

    let ledger = config
        .seed_ledger()
        .context("Failed to seed ledger from configuration")?;
    store.save(&ledger).context("Failed to write ledger")?;
    tracing::info!(path = %store.path().display(), "Ledger initialized");

    print_summary(&ledger.portfolio_summary(), Some(ledger.owner()), OutputFormat::Text)
}

fn open_service(config: &Config, store: LedgerStore) -> Result<LedgerService> {
    let mut ledger = store
        .load()
        .context("Failed to read ledger")?
        .ok_or_else(|| {
            anyhow!(
                "No ledger at {} - run `signalstack init` first",
                store.path().display()
            )
        })?;
    ledger.set_policy(config.ledger.policy());
    Ok(LedgerService::new(ledger, Some(store)))
}

fn strategy_section(config: &Config) -> Result<&StrategySection> {
    config
        .strategy
        .as_ref()
        .ok_or_else(|| anyhow!("No [strategy] section in configuration"))
}

fn load_strategy(config: &Config) -> Result<SignalStrategy> {
    let section = strategy_section(config)?;
    SignalStrategy::load_or_new(
        &config.storage.strategy_path(),
        section.strategy_id(),
        section.oracle_id(),
    )
    .context("Failed to load strategy state")
}

async fn run_ledger_command(
    config: &Config,
    service: &LedgerService,
    caller: AccountId,
    explicit_caller: bool,
    command: Command,
) -> Result<()> {
    let summary = match command {
        Command::Summary(cmd) => {
            let ledger = service.ledger().await;
            return print_summary(&service.summary(), Some(ledger.owner()), cmd.format);
        }
        Command::Add(cmd) => service
            .add_supported_token(&caller, TokenId::new(cmd.token), cmd.weight_bps)
            .await
            .context("add failed")?,
        Command::Remove(cmd) => service
            .remove_supported_token(&caller, &TokenId::new(cmd.token))
            .await
            .context("remove failed")?,
        Command::Update(cmd) => {
            let (tokens, weights) = unzip_pairs(cmd.weights);
            service
                .update_target_weights(&caller, &tokens, &weights)
                .await
                .context("update failed")?
        }
        Command::SetStrategy(cmd) => service
            .set_strategy(&caller, AccountId::new(cmd.id), !cmd.inactive)
            .await
            .context("set-strategy failed")?,
        Command::Publish(cmd) => {
            let strategy = load_strategy(config)?;
            let publisher = if explicit_caller {
                caller
            } else {
                strategy.oracle().clone()
            };
            let (tokens, weights) = unzip_pairs(cmd.weights);
            strategy
                .publish_weights(&publisher, tokens, weights)
                .context("publish failed")?;
            strategy
                .save(&config.storage.strategy_path())
                .context("Failed to save strategy state")?;
            println!("Published weights for strategy {}", strategy_section(config)?.id);
            return Ok(());
        }
        Command::Rebalance => {
            let strategy = load_strategy(config)?;
            service
                .execute_strategy_rebalance(&caller, &strategy)
                .await
                .context("rebalance failed")?
        }
        Command::TransferOwnership(cmd) => service
            .transfer_ownership(&caller, AccountId::new(cmd.new_owner))
            .await
            .context("transfer-ownership failed")?,
        Command::Drift(cmd) => {
            let thresholds = config.drift_thresholds()?;
            let report = analyze_drift(&cmd.current, &service.summary(), &thresholds);
            return print_drift(&report, cmd.format);
        }
        Command::Events(cmd) => {
            let ledger = service.ledger().await;
            let events = ledger.events();
            let skip = events.len().saturating_sub(cmd.limit);
            for event in events.iter().skip(skip) {
                println!(
                    "{}  {:<10} {}",
                    event.timestamp.format("%Y-%m-%d %H:%M:%S"),
                    event.caller,
                    describe_event(&event.kind)
                );
            }
            return Ok(());
        }
        Command::Init(_) | Command::Normalize(_) => return Ok(()),
    };

    let ledger = service.ledger().await;
    print_summary(&summary, Some(ledger.owner()), OutputFormat::Text)
}

fn normalize_command(cmd: &NormalizeCmd) -> Result<()> {
    let normalized = normalize_to_bps(&cmd.values)?;
    let rendered: Vec<String> = normalized
        .iter()
        .map(|(token, bps)| format!("{token}={bps}"))
        .collect();
    println!("{}", rendered.join(" "));
    Ok(())
}

fn describe_event(kind: &LedgerEventKind) -> String {
    match kind {
        LedgerEventKind::TokenAdded { token, weight_bps } => {
            format!("added {token} at {weight_bps} bps")
        }
        LedgerEventKind::TokenRemoved { token, weight_bps } => {
            format!("removed {token} (was {weight_bps} bps)")
        }
        LedgerEventKind::WeightsUpdated { source, weights } => {
            let rendered: Vec<String> = weights.iter().map(|(t, w)| format!("{t}={w}")).collect();
            format!("weights set by {:?}: {}", source, rendered.join(" "))
        }
        LedgerEventKind::StrategySet { strategy, active } => {
            format!("strategy {strategy} active={active}")
        }
        LedgerEventKind::OwnershipTransferred { from, to } => {
            format!("ownership {from} -> {to}")
        }
    }
}

fn print_summary(
    summary: &PortfolioSummary,
    owner: Option<&AccountId>,
    format: OutputFormat,
) -> Result<()> {
    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(summary)?);
        return Ok(());
    }

    if let Some(owner) = owner {
        println!("Owner:    {owner}");
    }
    match &summary.strategy {
        Some(s) => println!(
            "Strategy: {} ({})",
            s.id,
            if s.active { "active" } else { "inactive" }
        ),
        None => println!("Strategy: none"),
    }
    println!();
    println!("{:<20} {:>8} {:>9}", "TOKEN", "BPS", "PCT");
    for (token, bps) in summary.entries() {
        println!(
            "{:<20} {:>8} {:>8.2}%",
            token.as_str(),
            bps,
            f64::from(bps) / 100.0
        );
    }
    println!(
        "{:<20} {:>8} {}",
        "TOTAL",
        summary.total_weight_bps,
        if summary.is_balanced() {
            "balanced"
        } else {
            "NOT BALANCED - run `update` to restore 10000 bps"
        }
    );
    Ok(())
}

fn print_drift(report: &DriftReport, format: OutputFormat) -> Result<()> {
    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }

    println!(
        "{:<20} {:>8} {:>8} {:>8}  {}",
        "TOKEN", "CURRENT", "TARGET", "DRIFT", "LEVEL"
    );
    for entry in &report.entries {
        println!(
            "{:<20} {:>8} {:>8} {:>8}  {}",
            entry.token.as_str(),
            entry.current_bps,
            entry.target_bps,
            entry.drift_bps,
            entry.level.as_str()
        );
    }
    println!();
    println!(
        "Max drift {} bps, total {} bps, level {} - {}",
        report.max_drift_bps,
        report.total_drift_bps,
        report.level.as_str(),
        if report.needs_rebalance {
            "REBALANCE"
        } else {
            "HOLD"
        }
    );
    Ok(())
}
