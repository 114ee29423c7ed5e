use super::{AppContext, settle, ui};
use crate::core::{MarketOverview, Stock};
use crate::queries::{MarketOverviewQuery, StocksQuery};
use crate::query::{QueryPolicy, QueryState};
use anyhow::Result;
use comfy_table::Cell;
use std::time::Duration;

const MINUTE: Duration = Duration::from_secs(60);

pub fn stocks_policy(defaults: QueryPolicy) -> QueryPolicy {
    defaults
        .stale_time(5 * MINUTE)
        .gc_time(10 * MINUTE)
        .retry(3, Duration::from_secs(1))
}

pub fn market_overview_policy(defaults: QueryPolicy) -> QueryPolicy {
    defaults
        .refetch_interval(5 * MINUTE)
        .stale_time(10 * MINUTE)
        .gc_time(15 * MINUTE)
        .retry(3, Duration::from_secs(1))
}

/// Stock list and market overview.
pub async fn run(ctx: &AppContext) -> Result<String> {
    let cache = &ctx.cache;
    let mut stocks = cache.subscribe_query(
        StocksQuery {
            api: ctx.api.stocks.clone(),
        },
        stocks_policy(cache.policy()),
    );
    let mut overview = cache.subscribe_query(
        MarketOverviewQuery {
            api: ctx.api.ai.clone(),
        },
        market_overview_policy(cache.policy()),
    );

    let overview_state = settle(&mut overview, "Loading market overview...").await;
    let stocks_state = settle(&mut stocks, "Loading stocks...").await;

    Ok(format!(
        "{}\n\n{}",
        render_market_overview(&overview_state),
        render_stock_list(&stocks_state, None)
    ))
}

/// Stock list, optionally filtered by symbol or name.
pub async fn stocks(ctx: &AppContext, search: Option<&str>) -> Result<String> {
    let mut stocks = ctx.cache.subscribe_query(
        StocksQuery {
            api: ctx.api.stocks.clone(),
        },
        stocks_policy(ctx.cache.policy()),
    );
    let state = settle(&mut stocks, "Loading stocks...").await;
    Ok(render_stock_list(&state, search))
}

pub fn render_stock_list(state: &QueryState<Vec<Stock>>, search: Option<&str>) -> String {
    let view = state.view();
    if let Some(line) = ui::status_line("Stocks", &view) {
        return line;
    }
    let stocks = state.data.as_deref().map(Vec::as_slice).unwrap_or_default();
    let matching: Vec<&Stock> = stocks
        .iter()
        .filter(|s| search.is_none_or(|q| s.matches(q)))
        .collect();

    if matching.is_empty() {
        return match search {
            Some(q) => format!("No stocks match \"{q}\"."),
            None => "No stocks registered.".to_string(),
        };
    }

    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Symbol"),
        ui::header_cell("Name"),
        ui::header_cell("Sector"),
        ui::header_cell("Market Cap"),
    ]);
    for stock in matching {
        table.add_row(vec![
            Cell::new(&stock.symbol),
            Cell::new(&stock.name),
            Cell::new(stock.sector.as_deref().unwrap_or("-")),
            ui::format_optional_cell(stock.market_cap, |v| format!("{v:.0}")),
        ]);
    }

    let title = format!("Stocks{}", ui::refreshing_marker(&view));
    ui::titled(&title, &table)
}

pub fn render_market_overview(state: &QueryState<MarketOverview>) -> String {
    let view = state.view();
    if let Some(line) = ui::status_line("Market overview", &view) {
        return line;
    }
    let Some(overview) = state.data.as_deref() else {
        return String::new();
    };

    let mut table = ui::new_styled_table();
    table.set_header(vec![ui::header_cell("Metric"), ui::header_cell("Value")]);
    table.add_row(vec![
        Cell::new("Sentiment"),
        Cell::new(format!(
            "{} ({:.2})",
            overview.overall_sentiment, overview.sentiment_score
        )),
    ]);
    table.add_row(vec![Cell::new("Trend"), Cell::new(&overview.market_trend)]);
    let optional = [
        ("Risk level", &overview.risk_level),
        ("Volatility", &overview.market_volatility),
        ("Liquidity", &overview.liquidity_condition),
        ("Advice", &overview.investment_advice),
    ];
    for (label, value) in optional {
        if let Some(value) = value {
            table.add_row(vec![Cell::new(label), Cell::new(value)]);
        }
    }
    for factor in &overview.key_factors {
        table.add_row(vec![Cell::new("Key factor"), Cell::new(factor)]);
    }
    for (sector, outlook) in &overview.sector_outlook {
        table.add_row(vec![Cell::new(format!("Sector: {sector}")), Cell::new(outlook)]);
    }

    let title = format!("Market overview{}", ui::refreshing_marker(&view));
    ui::titled(&title, &table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::QueryStatus;
    use std::collections::BTreeMap;
    use std::sync::Arc;

    fn stock(symbol: &str, name: &str) -> Stock {
        Stock {
            id: 1,
            symbol: symbol.to_string(),
            name: name.to_string(),
            sector: Some("Technology".to_string()),
            industry: None,
            market_cap: Some(3.0e12),
            created_at: None,
            updated_at: None,
        }
    }

    fn ready<T>(data: T, is_fetching: bool) -> QueryState<T> {
        QueryState {
            status: if is_fetching {
                QueryStatus::Loading
            } else {
                QueryStatus::Success
            },
            data: Some(Arc::new(data)),
            error: None,
            updated_at: None,
            is_fetching,
            is_invalidated: false,
        }
    }

    #[test]
    fn test_policies() {
        let stocks = stocks_policy(QueryPolicy::default());
        assert_eq!(stocks.stale_time, Duration::from_secs(300));
        assert_eq!(stocks.gc_time, Duration::from_secs(600));
        assert_eq!(stocks.retry, 3);
        assert_eq!(stocks.refetch_interval, None);

        let overview = market_overview_policy(QueryPolicy::default());
        assert_eq!(overview.refetch_interval, Some(Duration::from_secs(300)));
        assert_eq!(overview.gc_time, Duration::from_secs(900));
    }

    #[test]
    fn test_stock_list_filters_and_marks_refresh() {
        let state = ready(vec![stock("AAPL", "Apple Inc."), stock("MSFT", "Microsoft")], true);

        let all = render_stock_list(&state, None);
        assert!(all.contains("AAPL"));
        assert!(all.contains("Microsoft"));
        assert!(all.contains("(refreshing)"));

        let filtered = render_stock_list(&state, Some("apple"));
        assert!(filtered.contains("AAPL"));
        assert!(!filtered.contains("MSFT"));

        assert_eq!(
            render_stock_list(&state, Some("zzz")),
            "No stocks match \"zzz\"."
        );
    }

    #[test]
    fn test_market_overview_rows() {
        let overview = MarketOverview {
            overall_sentiment: "positive".to_string(),
            sentiment_score: 0.62,
            market_trend: "upward".to_string(),
            key_factors: vec!["Rate cuts".to_string()],
            risk_level: Some("medium".to_string()),
            investment_advice: None,
            sector_outlook: BTreeMap::from([("Tech".to_string(), "strong".to_string())]),
            market_volatility: None,
            liquidity_condition: None,
            analysis_timestamp: None,
        };
        let out = render_market_overview(&ready(overview, false));
        assert!(out.contains("positive (0.62)"));
        assert!(out.contains("Rate cuts"));
        assert!(out.contains("Sector: Tech"));
        assert!(!out.contains("(refreshing)"));
    }
}
