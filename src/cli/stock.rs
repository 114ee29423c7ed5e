use super::{AppContext, settle, ui};
use crate::core::{Stock, StockAnalysis, StockIndicators, StockPrices};
use crate::queries::{StockAnalysisQuery, StockIndicatorsQuery, StockPricesQuery, StockQuery};
use crate::query::{QueryPolicy, QueryState};
use anyhow::Result;
use comfy_table::Cell;
use std::time::Duration;

pub const DEFAULT_DAYS: u32 = 30;
/// Closes shown in the price table.
const PRICE_ROWS: usize = 10;

pub fn analysis_policy(defaults: QueryPolicy) -> QueryPolicy {
    defaults.refetch_interval(Duration::from_secs(10 * 60))
}

/// Stock detail page: profile, recent prices, indicators and AI analysis.
pub async fn run(
    ctx: &AppContext,
    symbol: &str,
    days: u32,
    indicator_type: Option<&str>,
) -> Result<String> {
    let cache = &ctx.cache;
    let symbol = symbol.to_uppercase();
    let stocks = &ctx.api.stocks;

    let mut detail = cache.subscribe_query(
        StockQuery {
            api: stocks.clone(),
            symbol: symbol.clone(),
        },
        cache.policy(),
    );
    let mut prices = cache.subscribe_query(
        StockPricesQuery {
            api: stocks.clone(),
            symbol: symbol.clone(),
            days,
        },
        cache.policy(),
    );
    let mut indicators = cache.subscribe_query(
        StockIndicatorsQuery {
            api: stocks.clone(),
            symbol: symbol.clone(),
            days,
            indicator_type: indicator_type.map(str::to_string),
        },
        cache.policy(),
    );
    let mut analysis = cache.subscribe_query(
        StockAnalysisQuery {
            api: ctx.api.ai.clone(),
            symbol: symbol.clone(),
        },
        analysis_policy(cache.policy()),
    );

    let detail = settle(&mut detail, &format!("Loading {symbol}...")).await;
    let prices = settle(&mut prices, "Loading prices...").await;
    let indicators = settle(&mut indicators, "Loading indicators...").await;
    let analysis = settle(&mut analysis, "Loading AI analysis...").await;

    Ok([
        render_detail(&symbol, &detail),
        render_prices(&prices),
        render_indicators(&indicators),
        render_analysis(&analysis),
    ]
    .join("\n\n"))
}

pub fn render_detail(symbol: &str, state: &QueryState<Stock>) -> String {
    let view = state.view();
    if let Some(line) = ui::status_line(symbol, &view) {
        return line;
    }
    let Some(stock) = state.data.as_deref() else {
        return String::new();
    };
    let mut table = ui::new_styled_table();
    table.set_header(vec![ui::header_cell("Field"), ui::header_cell("Value")]);
    table.add_row(vec![Cell::new("Name"), Cell::new(&stock.name)]);
    table.add_row(vec![
        Cell::new("Sector"),
        Cell::new(stock.sector.as_deref().unwrap_or("-")),
    ]);
    table.add_row(vec![
        Cell::new("Industry"),
        Cell::new(stock.industry.as_deref().unwrap_or("-")),
    ]);
    table.add_row(vec![
        Cell::new("Market Cap"),
        ui::format_optional_cell(stock.market_cap, |v| format!("{v:.0}")),
    ]);
    let title = format!("{} ({}){}", stock.symbol, stock.name, ui::refreshing_marker(&view));
    ui::titled(&title, &table)
}

pub fn render_prices(state: &QueryState<StockPrices>) -> String {
    let view = state.view();
    if let Some(line) = ui::status_line("Prices", &view) {
        return line;
    }
    let Some(prices) = state.data.as_deref() else {
        return String::new();
    };
    if prices.prices.is_empty() {
        return "Prices: no data".to_string();
    }

    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Date"),
        ui::header_cell("Open"),
        ui::header_cell("High"),
        ui::header_cell("Low"),
        ui::header_cell("Close"),
        ui::header_cell("Volume"),
    ]);
    let skip = prices.prices.len().saturating_sub(PRICE_ROWS);
    for price in prices.prices.iter().skip(skip) {
        table.add_row(vec![
            Cell::new(&price.date),
            ui::number_cell(price.open, 2),
            ui::number_cell(price.high, 2),
            ui::number_cell(price.low, 2),
            ui::number_cell(price.close, 2),
            ui::number_cell(price.volume, 0),
        ]);
    }

    let mut output = ui::titled(
        &format!("Prices{}", ui::refreshing_marker(&view)),
        &table,
    );
    if let Some((change, pct)) = prices.latest_change() {
        output.push_str(&format!(
            "\nLast change: {} ({})",
            ui::change_cell(change, "").content(),
            ui::change_cell(pct, "%").content()
        ));
    }
    output
}

pub fn render_indicators(state: &QueryState<StockIndicators>) -> String {
    let view = state.view();
    if let Some(line) = ui::status_line("Indicators", &view) {
        return line;
    }
    let Some(indicators) = state.data.as_deref() else {
        return String::new();
    };
    if indicators.indicators.is_empty() {
        return "Indicators: no data".to_string();
    }

    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Indicator"),
        ui::header_cell("Date"),
        ui::header_cell("Latest"),
    ]);
    for (name, points) in &indicators.indicators {
        let latest = points.last();
        table.add_row(vec![
            Cell::new(name),
            Cell::new(latest.map_or("-", |p| p.date.as_str())),
            ui::format_optional_cell(latest.map(|p| p.value), |v| format!("{v:.2}")),
        ]);
    }
    ui::titled(
        &format!("Indicators{}", ui::refreshing_marker(&view)),
        &table,
    )
}

pub fn render_analysis(state: &QueryState<StockAnalysis>) -> String {
    let view = state.view();
    if let Some(line) = ui::status_line("AI analysis", &view) {
        return line;
    }
    let Some(analysis) = state.data.as_deref() else {
        return String::new();
    };

    let sections = [
        ("Technical", &analysis.technical_analysis),
        ("News", &analysis.news_analysis),
        ("Sentiment", &analysis.sentiment_analysis),
        ("Opinion", &analysis.investment_opinion),
        ("Risk", &analysis.risk_assessment),
        ("Price target", &analysis.price_target),
        ("Holding period", &analysis.holding_period),
    ];
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Section"),
        ui::header_cell("Field"),
        ui::header_cell("Value"),
    ]);
    for (section, value) in sections {
        for (field, text) in StockAnalysis::section_rows(value) {
            table.add_row(vec![Cell::new(section), Cell::new(field), Cell::new(text)]);
        }
    }

    let title = format!(
        "AI analysis: {}{}",
        analysis.stock_name,
        ui::refreshing_marker(&view)
    );
    ui::titled(&title, &table)
}
