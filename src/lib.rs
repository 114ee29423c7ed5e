pub mod api;
pub mod cli;
pub mod core;
pub mod queries;
pub mod query;

pub use crate::core::config;

use crate::cli::AppContext;
use crate::cli::trading::Tab;
use crate::core::trading::RunBacktestRequest;
use anyhow::Result;
use tracing::{debug, info};

/// Commands that need the API and the query cache.
#[derive(Debug, Clone)]
pub enum AppCommand {
    Dashboard,
    Stocks {
        search: Option<String>,
    },
    Stock {
        symbol: String,
        days: u32,
        indicator: Option<String>,
    },
    Trading {
        account: Option<i64>,
        tab: Tab,
    },
    CreateAccount {
        name: String,
        balance: Option<f64>,
    },
    CalculateScores,
    Backtest(RunBacktestRequest),
    ToggleRule {
        id: i64,
        active: bool,
    },
    Watch {
        symbols: Vec<String>,
    },
}

pub async fn run_command(command: AppCommand, config_path: Option<&str>) -> Result<()> {
    info!("stockdash starting...");

    let config = match config_path {
        Some(path) => config::AppConfig::load_from_path(path)?,
        None => config::AppConfig::load()?,
    };
    debug!("Loaded config: {config:#?}");

    let ctx = AppContext::new(&config)?;
    let output = match command {
        AppCommand::Dashboard => cli::dashboard::run(&ctx).await?,
        AppCommand::Stocks { search } => cli::dashboard::stocks(&ctx, search.as_deref()).await?,
        AppCommand::Stock {
            symbol,
            days,
            indicator,
        } => cli::stock::run(&ctx, &symbol, days, indicator.as_deref()).await?,
        AppCommand::Trading { account, tab } => cli::trading::run(&ctx, account, tab).await?,
        AppCommand::CreateAccount { name, balance } => {
            cli::trading::create_account(&ctx, &name, balance).await?
        }
        AppCommand::CalculateScores => cli::trading::calculate_scores(&ctx).await?,
        AppCommand::Backtest(request) => cli::trading::run_backtest(&ctx, request).await?,
        AppCommand::ToggleRule { id, active } => {
            cli::trading::toggle_rule(&ctx, id, active).await?
        }
        AppCommand::Watch { symbols } => {
            cli::watch::run(&ctx, &symbols).await?;
            return Ok(());
        }
    };

    println!("{output}");
    Ok(())
}
