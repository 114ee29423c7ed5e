use super::dashboard::{market_overview_policy, render_market_overview, stocks_policy};
use super::{AppContext, settle, ui};
use crate::core::{MarketOverview, StockPrices};
use crate::queries::{LatestPriceQuery, MarketOverviewQuery, StocksQuery};
use crate::query::{QueryHandle, QueryPolicy, QueryState};
use anyhow::Result;
use comfy_table::Cell;
use futures::future::select_all;
use std::time::Duration;
use tracing::{debug, info};

const MINUTE: Duration = Duration::from_secs(60);

pub fn latest_price_policy(defaults: QueryPolicy) -> QueryPolicy {
    defaults
        .refetch_interval(5 * MINUTE)
        .stale_time(MINUTE)
        .gc_time(3 * MINUTE)
        .retry(3, Duration::from_secs(1))
}

/// Live quotes for `symbols` (every listed stock when empty) plus the market
/// overview, re-rendered on every change until Ctrl-C.
pub async fn run(ctx: &AppContext, symbols: &[String]) -> Result<()> {
    let cache = &ctx.cache;
    let symbols: Vec<String> = if symbols.is_empty() {
        let mut stocks = cache.subscribe_query(
            StocksQuery {
                api: ctx.api.stocks.clone(),
            },
            stocks_policy(cache.policy()),
        );
        let state = settle(&mut stocks, "Loading stocks...").await;
        state
            .data
            .as_deref()
            .map(|stocks| stocks.iter().map(|s| s.symbol.clone()).collect())
            .unwrap_or_default()
    } else {
        symbols.iter().map(|s| s.to_uppercase()).collect()
    };

    let mut quotes: Vec<QueryHandle<StockPrices>> = symbols
        .iter()
        .map(|symbol| {
            cache.subscribe_query(
                LatestPriceQuery {
                    api: ctx.api.stocks.clone(),
                    symbol: symbol.clone(),
                },
                latest_price_policy(cache.policy()),
            )
        })
        .collect();
    let mut overview = cache.subscribe_query(
        MarketOverviewQuery {
            api: ctx.api.ai.clone(),
        },
        market_overview_policy(cache.policy()),
    );
    info!(symbols = symbols.len(), "Watching live quotes");

    loop {
        println!("{}", render(&symbols, &quotes, &overview.state()));
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Stopping watch");
                break;
            }
            changed = overview.changed() => {
                if changed.is_none() {
                    break;
                }
            }
            changed = next_quote_change(&mut quotes) => {
                if !changed {
                    break;
                }
            }
        }
    }
    Ok(())
}

/// Resolves once any quote changes; `false` when an entry went away.
async fn next_quote_change(quotes: &mut [QueryHandle<StockPrices>]) -> bool {
    if quotes.is_empty() {
        return std::future::pending().await;
    }
    let (changed, index, _) = select_all(quotes.iter_mut().map(|q| Box::pin(q.changed()))).await;
    debug!(index, "Quote changed");
    changed.is_some()
}

fn render(
    symbols: &[String],
    quotes: &[QueryHandle<StockPrices>],
    overview: &QueryState<MarketOverview>,
) -> String {
    let states: Vec<(&str, QueryState<StockPrices>)> = symbols
        .iter()
        .zip(quotes)
        .map(|(symbol, handle)| (symbol.as_str(), handle.state()))
        .collect();
    format!(
        "{}\n{}\n\n{}",
        ui::separator(),
        render_quotes(&states),
        render_market_overview(overview)
    )
}

pub fn render_quotes(quotes: &[(&str, QueryState<StockPrices>)]) -> String {
    if quotes.is_empty() {
        return "No symbols to watch.".to_string();
    }
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Symbol"),
        ui::header_cell("Date"),
        ui::header_cell("Close"),
        ui::header_cell("Change"),
        ui::header_cell("Change %"),
        ui::header_cell("Status"),
    ]);

    for (symbol, state) in quotes {
        let latest = state.data.as_deref().and_then(|p| p.prices.last());
        let change = state.data.as_deref().and_then(StockPrices::latest_change);
        let status = match (state.is_fetching, &state.error) {
            (true, _) => ui::style_text("updating", ui::StyleType::Subtle),
            (false, Some(err)) => ui::style_text(&ui::error_message(err), ui::StyleType::Error),
            (false, None) => String::new(),
        };
        table.add_row(vec![
            Cell::new(symbol),
            Cell::new(latest.map_or("-", |p| p.date.as_str())),
            ui::format_optional_cell(latest.map(|p| p.close), |c| format!("{c:.2}")),
            change.map_or_else(|| Cell::new("-"), |(abs, _)| ui::change_cell(abs, "")),
            change.map_or_else(|| Cell::new("-"), |(_, pct)| ui::change_cell(pct, "%")),
            Cell::new(status),
        ]);
    }
    ui::titled("Live quotes", &table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ApiError;
    use crate::core::StockPrice;
    use crate::query::{QueryError, QueryStatus};
    use std::sync::Arc;

    fn prices(closes: &[f64]) -> StockPrices {
        StockPrices {
            symbol: "AAPL".to_string(),
            name: None,
            prices: closes
                .iter()
                .enumerate()
                .map(|(i, close)| StockPrice {
                    date: format!("2025-01-0{}", i + 1),
                    open: *close,
                    high: *close,
                    low: *close,
                    close: *close,
                    volume: 1.0,
                })
                .collect(),
        }
    }

    #[test]
    fn test_latest_price_policy() {
        let policy = latest_price_policy(QueryPolicy::default());
        assert_eq!(policy.refetch_interval, Some(Duration::from_secs(300)));
        assert_eq!(policy.stale_time, Duration::from_secs(60));
        assert_eq!(policy.gc_time, Duration::from_secs(180));
        assert_eq!(policy.retry, 3);
    }

    #[test]
    fn test_quotes_keep_last_value_on_error() {
        let ok = QueryState {
            status: QueryStatus::Success,
            data: Some(Arc::new(prices(&[200.0, 190.0]))),
            error: None,
            updated_at: None,
            is_fetching: false,
            is_invalidated: false,
        };
        let failed = QueryState {
            status: QueryStatus::Error,
            data: Some(Arc::new(prices(&[100.0, 102.0]))),
            error: Some(QueryError::RetriesExhausted {
                attempts: 4,
                last: ApiError::Timeout,
            }),
            updated_at: None,
            is_fetching: false,
            is_invalidated: false,
        };
        let out = render_quotes(&[("MSFT", ok), ("AAPL", failed)]);
        assert!(out.contains("190.00"));
        assert!(out.contains("-10.00"));
        assert!(out.contains("102.00"));
        assert!(out.contains("+2.00%"));
        assert!(out.contains("request timed out"));
    }
}
