use super::{AppContext, settle, ui};
use crate::core::trading::{
    CreateAccountRequest, DEFAULT_INITIAL_BALANCE, RunBacktestRequest, Signal,
};
use crate::core::{
    AccountSummary, AutoTradingRule, BacktestResultSummary, StockScore, VirtualAccount,
    VirtualPosition, VirtualTrade,
};
use crate::queries::{
    AccountSummaryQuery, AccountsQuery, BacktestResultsQuery, PositionsQuery, RulesQuery,
    ScoresQuery, TradesQuery, TradingMutations,
};
use crate::query::{QueryHandle, QueryPolicy, QueryState};
use anyhow::{Context, Result};
use clap::ValueEnum;
use comfy_table::{Cell, Color};
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Tab {
    #[default]
    Overview,
    Scores,
    Backtest,
    Rules,
}

pub fn accounts_policy(defaults: QueryPolicy) -> QueryPolicy {
    defaults.stale_time(Duration::from_secs(30))
}

/// Account-scoped reads only run once an account is selected.
pub fn account_policy(defaults: QueryPolicy, selected: Option<i64>) -> QueryPolicy {
    defaults
        .stale_time(Duration::from_secs(10))
        .enabled(selected.is_some())
}

pub fn scores_policy(defaults: QueryPolicy) -> QueryPolicy {
    defaults.stale_time(Duration::from_secs(60))
}

pub fn backtests_policy(defaults: QueryPolicy) -> QueryPolicy {
    defaults.stale_time(Duration::from_secs(60))
}

pub fn rules_policy(defaults: QueryPolicy) -> QueryPolicy {
    defaults.stale_time(Duration::from_secs(30))
}

/// Live subscriptions behind the trading console.
pub struct TradingConsole {
    pub selected: Option<i64>,
    pub tab: Tab,
    accounts: QueryHandle<Vec<VirtualAccount>>,
    summary: QueryHandle<AccountSummary>,
    positions: QueryHandle<Vec<VirtualPosition>>,
    trades: QueryHandle<Vec<VirtualTrade>>,
    scores: QueryHandle<Vec<StockScore>>,
    backtests: QueryHandle<Vec<BacktestResultSummary>>,
    rules: QueryHandle<Vec<AutoTradingRule>>,
}

impl TradingConsole {
    /// Subscribes to the account list and picks `account`, or the first
    /// account when none is given. Every tab starts disabled.
    pub async fn open(ctx: &AppContext, account: Option<i64>) -> Self {
        let cache = &ctx.cache;
        let api = &ctx.api.trading;
        let mut accounts = cache.subscribe_query(
            AccountsQuery { api: api.clone() },
            accounts_policy(cache.policy()),
        );
        let listed = settle(&mut accounts, "Loading accounts...").await;
        let selected = account.or_else(|| {
            listed
                .data
                .as_deref()
                .and_then(|accounts| accounts.first())
                .map(|a| a.id)
        });
        debug!(?selected, "Selected trading account");

        let policy = account_policy(cache.policy(), selected);
        Self {
            selected,
            tab: Tab::Overview,
            accounts,
            summary: cache.subscribe_query(
                AccountSummaryQuery {
                    api: api.clone(),
                    account_id: selected,
                },
                policy.clone(),
            ),
            positions: cache.subscribe_query(
                PositionsQuery {
                    api: api.clone(),
                    account_id: selected,
                },
                policy.clone(),
            ),
            trades: cache.subscribe_query(
                TradesQuery {
                    api: api.clone(),
                    account_id: selected,
                },
                policy,
            ),
            scores: cache.subscribe_query(
                ScoresQuery { api: api.clone() },
                scores_policy(cache.policy()).enabled(false),
            ),
            backtests: cache.subscribe_query(
                BacktestResultsQuery { api: api.clone() },
                backtests_policy(cache.policy()).enabled(false),
            ),
            rules: cache.subscribe_query(
                RulesQuery { api: api.clone() },
                rules_policy(cache.policy()).enabled(false),
            ),
        }
    }

    /// Enables the queries of `tab` and disables the others.
    pub fn select_tab(&mut self, tab: Tab) {
        self.tab = tab;
        self.scores.set_enabled(tab == Tab::Scores);
        self.backtests.set_enabled(tab == Tab::Backtest);
        self.rules.set_enabled(tab == Tab::Rules);
    }

    /// Waits for the visible queries and renders them.
    pub async fn render(&mut self) -> String {
        let accounts = self.accounts.settled().await;
        let mut sections = vec![render_accounts(&accounts, self.selected)];
        match self.tab {
            Tab::Overview => {
                let summary = settle(&mut self.summary, "Loading account...").await;
                let positions = settle(&mut self.positions, "Loading positions...").await;
                let trades = settle(&mut self.trades, "Loading trades...").await;
                if self.selected.is_some() {
                    sections.push(render_summary(&summary));
                    sections.push(render_positions(&positions));
                    sections.push(render_trades(&trades));
                }
            }
            Tab::Scores => {
                let scores = settle(&mut self.scores, "Loading scores...").await;
                sections.push(render_scores(&scores));
            }
            Tab::Backtest => {
                let backtests = settle(&mut self.backtests, "Loading backtests...").await;
                sections.push(render_backtests(&backtests));
            }
            Tab::Rules => {
                let rules = settle(&mut self.rules, "Loading rules...").await;
                sections.push(render_rules(&rules));
            }
        }
        sections.join("\n\n")
    }
}

/// Trading console on one tab.
pub async fn run(ctx: &AppContext, account: Option<i64>, tab: Tab) -> Result<String> {
    let mut console = TradingConsole::open(ctx, account).await;
    console.select_tab(tab);
    Ok(console.render().await)
}

pub async fn create_account(ctx: &AppContext, name: &str, balance: Option<f64>) -> Result<String> {
    let cache = &ctx.cache;
    let mut accounts = cache.subscribe_query(
        AccountsQuery {
            api: ctx.api.trading.clone(),
        },
        accounts_policy(cache.policy()),
    );
    settle(&mut accounts, "Loading accounts...").await;

    let request = CreateAccountRequest {
        name: name.to_string(),
        initial_balance: Some(balance.unwrap_or(DEFAULT_INITIAL_BALANCE)),
    };
    mutations(ctx)
        .create_account()
        .mutate(request)
        .await
        .with_context(|| format!("Failed to create account {name}"))?;
    info!(name, "Created trading account");

    let accounts = settle(&mut accounts, "Refreshing accounts...").await;
    Ok(format!(
        "Created account \"{name}\"\n\n{}",
        render_accounts(&accounts, None)
    ))
}

pub async fn calculate_scores(ctx: &AppContext) -> Result<String> {
    let cache = &ctx.cache;
    let mut scores = cache.subscribe_query(
        ScoresQuery {
            api: ctx.api.trading.clone(),
        },
        scores_policy(cache.policy()),
    );
    settle(&mut scores, "Loading scores...").await;

    let calculated = mutations(ctx)
        .calculate_scores()
        .mutate(())
        .await
        .context("Failed to calculate scores")?;

    let scores = settle(&mut scores, "Refreshing scores...").await;
    Ok(format!(
        "Calculated {} score(s)\n\n{}",
        calculated.len(),
        render_scores(&scores)
    ))
}

pub async fn run_backtest(ctx: &AppContext, request: RunBacktestRequest) -> Result<String> {
    let cache = &ctx.cache;
    let mut backtests = cache.subscribe_query(
        BacktestResultsQuery {
            api: ctx.api.trading.clone(),
        },
        backtests_policy(cache.policy()),
    );
    settle(&mut backtests, "Loading backtests...").await;

    let (start, end) = (request.start_date, request.end_date);
    let spinner = ui::new_spinner("Running backtest...");
    let result = mutations(ctx).run_backtest().mutate(request).await;
    spinner.finish_and_clear();
    result.with_context(|| format!("Backtest {start}..{end} failed"))?;

    let backtests = settle(&mut backtests, "Refreshing backtests...").await;
    Ok(format!(
        "Backtest {start}..{end} finished\n\n{}",
        render_backtests(&backtests)
    ))
}

pub async fn toggle_rule(ctx: &AppContext, rule_id: i64, active: bool) -> Result<String> {
    let cache = &ctx.cache;
    let mut rules = cache.subscribe_query(
        RulesQuery {
            api: ctx.api.trading.clone(),
        },
        rules_policy(cache.policy()),
    );
    settle(&mut rules, "Loading rules...").await;

    let rule = mutations(ctx)
        .toggle_rule()
        .mutate((rule_id, active))
        .await
        .with_context(|| format!("Failed to update rule {rule_id}"))?;

    let rules = settle(&mut rules, "Refreshing rules...").await;
    let state = if rule.is_active { "activated" } else { "deactivated" };
    Ok(format!(
        "Rule \"{}\" {state}\n\n{}",
        rule.name,
        render_rules(&rules)
    ))
}

fn mutations(ctx: &AppContext) -> TradingMutations {
    TradingMutations::new(ctx.api.trading.clone(), ctx.cache.clone())
}

fn money(value: f64) -> String {
    format!("{value:.0}")
}

pub fn render_accounts(state: &QueryState<Vec<VirtualAccount>>, selected: Option<i64>) -> String {
    let view = state.view();
    if let Some(line) = ui::status_line("Accounts", &view) {
        return line;
    }
    let accounts = state.data.as_deref().map(Vec::as_slice).unwrap_or_default();
    if accounts.is_empty() {
        return "No trading accounts. Create one with `create-account`.".to_string();
    }

    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell(""),
        ui::header_cell("ID"),
        ui::header_cell("Name"),
        ui::header_cell("Initial"),
        ui::header_cell("Balance"),
        ui::header_cell("P/L"),
        ui::header_cell("Trades"),
    ]);
    for account in accounts {
        let marker = if Some(account.id) == selected { "*" } else { "" };
        table.add_row(vec![
            Cell::new(marker),
            Cell::new(account.id),
            Cell::new(&account.name),
            ui::number_cell(account.initial_balance, 0),
            ui::number_cell(account.current_balance, 0),
            ui::change_cell(account.total_profit_loss, ""),
            Cell::new(format!("{}/{}", account.win_trades, account.total_trades)),
        ]);
    }
    ui::titled(
        &format!("Accounts{}", ui::refreshing_marker(&view)),
        &table,
    )
}

pub fn render_summary(state: &QueryState<AccountSummary>) -> String {
    let view = state.view();
    if let Some(line) = ui::status_line("Account", &view) {
        return line;
    }
    let Some(summary) = state.data.as_deref() else {
        return String::new();
    };
    let mut table = ui::new_styled_table();
    table.set_header(vec![ui::header_cell("Metric"), ui::header_cell("Value")]);
    table.add_row(vec![Cell::new("Cash"), Cell::new(money(summary.current_balance))]);
    table.add_row(vec![
        Cell::new("Positions value"),
        Cell::new(money(summary.total_position_value)),
    ]);
    table.add_row(vec![Cell::new("Total assets"), Cell::new(money(summary.total_assets))]);
    table.add_row(vec![
        Cell::new("Return"),
        ui::change_cell(summary.total_return_rate, "%"),
    ]);
    table.add_row(vec![
        Cell::new("Win rate"),
        Cell::new(format!(
            "{:.1}% ({}/{})",
            summary.win_rate, summary.win_trades, summary.total_trades
        )),
    ]);
    ui::titled(
        &format!("Account: {}{}", summary.name, ui::refreshing_marker(&view)),
        &table,
    )
}

pub fn render_positions(state: &QueryState<Vec<VirtualPosition>>) -> String {
    let view = state.view();
    if let Some(line) = ui::status_line("Positions", &view) {
        return line;
    }
    let positions = state.data.as_deref().map(Vec::as_slice).unwrap_or_default();
    if positions.is_empty() {
        return "Positions: none".to_string();
    }
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Symbol"),
        ui::header_cell("Qty"),
        ui::header_cell("Avg Price"),
        ui::header_cell("Current"),
        ui::header_cell("Unrealized"),
    ]);
    for position in positions {
        table.add_row(vec![
            Cell::new(&position.symbol),
            Cell::new(position.quantity),
            ui::number_cell(position.avg_price, 2),
            ui::format_optional_cell(position.current_price, |p| format!("{p:.2}")),
            ui::change_cell(position.unrealized_pnl, ""),
        ]);
    }
    ui::titled(&format!("Positions{}", ui::refreshing_marker(&view)), &table)
}

pub fn render_trades(state: &QueryState<Vec<VirtualTrade>>) -> String {
    let view = state.view();
    if let Some(line) = ui::status_line("Trades", &view) {
        return line;
    }
    let trades = state.data.as_deref().map(Vec::as_slice).unwrap_or_default();
    if trades.is_empty() {
        return "Trades: none".to_string();
    }
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Time"),
        ui::header_cell("Symbol"),
        ui::header_cell("Side"),
        ui::header_cell("Qty"),
        ui::header_cell("Price"),
        ui::header_cell("Realized"),
    ]);
    for trade in trades {
        table.add_row(vec![
            Cell::new(&trade.timestamp),
            Cell::new(&trade.symbol),
            Cell::new(trade.trade_type),
            Cell::new(trade.quantity),
            ui::number_cell(trade.price, 2),
            trade
                .realized_pnl
                .map_or_else(|| Cell::new("-"), |pnl| ui::change_cell(pnl, "")),
        ]);
    }
    ui::titled(&format!("Recent trades{}", ui::refreshing_marker(&view)), &table)
}

pub fn render_scores(state: &QueryState<Vec<StockScore>>) -> String {
    let view = state.view();
    if let Some(line) = ui::status_line("Scores", &view) {
        return line;
    }
    let scores = state.data.as_deref().map(Vec::as_slice).unwrap_or_default();
    if scores.is_empty() {
        return "Scores: none calculated yet".to_string();
    }
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Symbol"),
        ui::header_cell("Total"),
        ui::header_cell("RSI"),
        ui::header_cell("MACD"),
        ui::header_cell("Bollinger"),
        ui::header_cell("EMA"),
        ui::header_cell("Prediction"),
        ui::header_cell("Signal"),
    ]);
    for score in scores {
        let color = match score.signal {
            Signal::Buy => Color::Green,
            Signal::Sell => Color::Red,
            Signal::Hold => Color::DarkGrey,
        };
        table.add_row(vec![
            Cell::new(&score.symbol),
            ui::number_cell(score.total_score, 1),
            ui::number_cell(score.rsi_score, 1),
            ui::number_cell(score.macd_score, 1),
            ui::number_cell(score.bollinger_score, 1),
            ui::number_cell(score.ema_score, 1),
            ui::number_cell(score.prediction_score, 1),
            Cell::new(score.signal).fg(color),
        ]);
    }
    ui::titled(&format!("Scores{}", ui::refreshing_marker(&view)), &table)
}

pub fn render_backtests(state: &QueryState<Vec<BacktestResultSummary>>) -> String {
    let view = state.view();
    if let Some(line) = ui::status_line("Backtests", &view) {
        return line;
    }
    let results = state.data.as_deref().map(Vec::as_slice).unwrap_or_default();
    if results.is_empty() {
        return "Backtests: none run yet".to_string();
    }
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("ID"),
        ui::header_cell("Strategy"),
        ui::header_cell("Period"),
        ui::header_cell("Return"),
        ui::header_cell("Win Rate"),
        ui::header_cell("Sharpe"),
        ui::header_cell("Max DD"),
        ui::header_cell("Trades"),
    ]);
    for result in results {
        table.add_row(vec![
            Cell::new(result.id),
            Cell::new(&result.strategy_name),
            Cell::new(format!("{} ~ {}", result.start_date, result.end_date)),
            ui::change_cell(result.total_return, "%"),
            ui::number_cell(result.win_rate, 1),
            ui::number_cell(result.sharpe_ratio, 2),
            ui::number_cell(result.max_drawdown, 2),
            Cell::new(result.total_trades),
        ]);
    }
    ui::titled(&format!("Backtests{}", ui::refreshing_marker(&view)), &table)
}

pub fn render_rules(state: &QueryState<Vec<AutoTradingRule>>) -> String {
    let view = state.view();
    if let Some(line) = ui::status_line("Rules", &view) {
        return line;
    }
    let rules = state.data.as_deref().map(Vec::as_slice).unwrap_or_default();
    if rules.is_empty() {
        return "Rules: none".to_string();
    }
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("ID"),
        ui::header_cell("Name"),
        ui::header_cell("Strategy"),
        ui::header_cell("Active"),
        ui::header_cell("Buy ≥"),
        ui::header_cell("Max Pos"),
        ui::header_cell("Budget"),
        ui::header_cell("Last Run"),
    ]);
    for rule in rules {
        let active = if rule.is_active {
            Cell::new("ON").fg(Color::Green)
        } else {
            Cell::new("OFF").fg(Color::DarkGrey)
        };
        table.add_row(vec![
            Cell::new(rule.id),
            Cell::new(&rule.name),
            Cell::new(&rule.strategy_type),
            active,
            ui::number_cell(rule.buy_score_threshold, 1),
            Cell::new(rule.max_position_count),
            Cell::new(format!("{:.0}%", rule.budget_ratio * 100.0)),
            Cell::new(rule.last_executed_at.as_deref().unwrap_or("-")),
        ]);
    }
    ui::titled(&format!("Auto-trading rules{}", ui::refreshing_marker(&view)), &table)
}
