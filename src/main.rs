use anyhow::Result;
use chrono::NaiveDate;
use clap::{CommandFactory, Parser, Subcommand};
use stockdash::cli::stock::DEFAULT_DAYS;
use stockdash::cli::trading::Tab;
use stockdash::core::log::init_logging;
use stockdash::core::trading::RunBacktestRequest;

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to optional configuration file
    #[arg(short, long, global = true)]
    config_path: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

impl From<Commands> for stockdash::AppCommand {
    fn from(cmd: Commands) -> stockdash::AppCommand {
        use stockdash::AppCommand;
        match cmd {
            Commands::Dashboard => AppCommand::Dashboard,
            Commands::Stocks { search } => AppCommand::Stocks { search },
            Commands::Stock {
                symbol,
                days,
                indicator,
            } => AppCommand::Stock {
                symbol,
                days,
                indicator,
            },
            Commands::Trading { account, tab } => AppCommand::Trading { account, tab },
            Commands::CreateAccount { name, balance } => {
                AppCommand::CreateAccount { name, balance }
            }
            Commands::CalculateScores => AppCommand::CalculateScores,
            Commands::Backtest {
                start,
                end,
                strategy,
                initial_balance,
                buy_threshold,
                sell_threshold,
                max_positions,
                budget_ratio,
            } => AppCommand::Backtest(RunBacktestRequest {
                strategy_name: strategy,
                initial_balance,
                buy_threshold,
                sell_threshold,
                max_positions,
                budget_ratio,
                ..RunBacktestRequest::new(start, end)
            }),
            Commands::ToggleRule { id, active } => AppCommand::ToggleRule { id, active },
            Commands::Watch { symbols } => AppCommand::Watch { symbols },
            Commands::Setup => unreachable!("Setup command should be handled separately"),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Create default configuration
    Setup,
    /// Display the stock list and the AI market overview
    Dashboard,
    /// List registered stocks
    Stocks {
        /// Filter by symbol or name
        #[arg(short, long)]
        search: Option<String>,
    },
    /// Display one stock: profile, prices, indicators and AI analysis
    Stock {
        symbol: String,
        /// Days of history
        #[arg(short, long, default_value_t = DEFAULT_DAYS)]
        days: u32,
        /// Restrict indicators to one type (e.g. RSI)
        #[arg(short, long)]
        indicator: Option<String>,
    },
    /// Display the virtual trading console
    Trading {
        /// Account to show; defaults to the first account
        #[arg(short, long)]
        account: Option<i64>,
        #[arg(short, long, value_enum, default_value_t = Tab::Overview)]
        tab: Tab,
    },
    /// Create a virtual trading account
    CreateAccount {
        name: String,
        /// Initial balance
        #[arg(short, long)]
        balance: Option<f64>,
    },
    /// Recalculate stock scores
    CalculateScores,
    /// Run a backtest over a date range
    Backtest {
        #[arg(long)]
        start: NaiveDate,
        #[arg(long)]
        end: NaiveDate,
        #[arg(long)]
        strategy: Option<String>,
        #[arg(long)]
        initial_balance: Option<f64>,
        #[arg(long)]
        buy_threshold: Option<f64>,
        #[arg(long)]
        sell_threshold: Option<f64>,
        #[arg(long)]
        max_positions: Option<u32>,
        #[arg(long)]
        budget_ratio: Option<f64>,
    },
    /// Activate or deactivate an auto-trading rule
    ToggleRule {
        id: i64,
        #[arg(long, action = clap::ArgAction::Set)]
        active: bool,
    },
    /// Watch live quotes until Ctrl-C
    Watch { symbols: Vec<String> },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let result = match cli.command {
        Some(Commands::Setup) => stockdash::cli::setup::setup(),
        Some(cmd) => stockdash::run_command(cmd.into(), cli.config_path.as_deref()).await,
        None => {
            Cli::command().print_help()?;
            Ok(())
        }
    };

    if let Err(e) = &result {
        tracing::error!(error = %e, "Application failed");
    }
    result
}
