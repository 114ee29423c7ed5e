use serde_json::{Value, json};
use std::fs;
use std::time::Duration;
use stockdash::api::ApiError;
use stockdash::cli::AppContext;
use stockdash::config::{ApiConfig, AppConfig};
use stockdash::queries::StockPricesQuery;
use stockdash::query::{QueryError, QueryStatus, ViewState};
use stockdash::query_key;
use tracing::info;
use wiremock::matchers::{body_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

mod test_utils {
    use super::*;

    pub fn envelope(data: Value) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(json!({ "success": true, "data": data }))
    }

    pub fn account(id: i64, name: &str) -> Value {
        json!({
            "id": id,
            "name": name,
            "initial_balance": 10_000_000.0,
            "current_balance": 10_000_000.0,
            "total_profit_loss": 0.0,
            "total_trades": 0,
            "win_trades": 0,
            "created_at": "2025-01-01T00:00:00"
        })
    }

    pub fn write_config(base_url: &str) -> tempfile::NamedTempFile {
        let config_file = tempfile::NamedTempFile::new().expect("Failed to create temp file");
        let config_content = format!(
            r#"
api:
  base_url: "{base_url}"
  timeout_ms: 2000
query:
  retry: 0
  retry_delay_ms: 10
"#
        );
        fs::write(config_file.path(), config_content).expect("Failed to write config file");
        config_file
    }

    pub fn context(base_url: &str, timeout: Duration) -> AppContext {
        let config = AppConfig {
            api: ApiConfig {
                base_url: base_url.to_string(),
                timeout_ms: timeout.as_millis() as u64,
            },
            ..AppConfig::default()
        };
        AppContext::new(&config).expect("Failed to build context")
    }
}

#[test_log::test(tokio::test)]
async fn test_full_app_flow_with_mock() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/stocks/"))
        .respond_with(test_utils::envelope(json!([
            {"id": 1, "symbol": "AAPL", "name": "Apple Inc.", "sector": "Technology", "market_cap": 3.0e12},
            {"id": 2, "symbol": "MSFT", "name": "Microsoft", "sector": "Technology"}
        ])))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/ai-analysis/market-overview"))
        .respond_with(test_utils::envelope(json!({
            "overall_sentiment": "neutral",
            "sentiment_score": 0.1,
            "market_trend": "sideways",
            "key_factors": ["Earnings season"],
            "sector_outlook": {"Technology": "positive"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let config_file = test_utils::write_config(&server.uri());
    let result = stockdash::run_command(
        stockdash::AppCommand::Dashboard,
        Some(config_file.path().to_str().unwrap()),
    )
    .await;
    assert!(
        result.is_ok(),
        "Main function failed with: {:?}",
        result.err()
    );
}

#[test_log::test(tokio::test)]
async fn test_create_account_refreshes_account_list() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/trading/accounts"))
        .respond_with(test_utils::envelope(json!([test_utils::account(1, "Alpha")])))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/trading/accounts"))
        .respond_with(test_utils::envelope(json!([
            test_utils::account(1, "Alpha"),
            test_utils::account(2, "Growth")
        ])))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/trading/accounts"))
        .and(body_json(json!({"name": "Growth", "initial_balance": 10_000_000.0})))
        .respond_with(test_utils::envelope(json!({
            "account_id": 2,
            "name": "Growth",
            "initial_balance": 10_000_000.0
        })))
        .expect(1)
        .mount(&server)
        .await;

    let ctx = test_utils::context(&server.uri(), Duration::from_secs(2));
    let output = stockdash::cli::trading::create_account(&ctx, "Growth", None)
        .await
        .expect("create-account failed");
    info!(%output, "Rendered account list");

    assert!(output.contains("Created account \"Growth\""));
    assert!(output.contains("Alpha"));
    assert!(output.contains("Growth"));
    let cached = ctx
        .cache
        .get_data::<Vec<stockdash::core::VirtualAccount>>(&query_key!["trading-accounts"])
        .expect("account list stays cached");
    assert_eq!(cached.len(), 2);
}

#[test_log::test(tokio::test)]
async fn test_timeouts_exhaust_retries() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/stocks/AAPL/prices"))
        .and(query_param("days", "2"))
        .respond_with(test_utils::envelope(json!({"symbol": "AAPL", "prices": []})).set_delay(Duration::from_secs(2)))
        .expect(3)
        .mount(&server)
        .await;

    let ctx = test_utils::context(&server.uri(), Duration::from_millis(200));
    let query = StockPricesQuery {
        api: ctx.api.stocks.clone(),
        symbol: "AAPL".to_string(),
        days: 2,
    };
    let policy = ctx.cache.policy().retry(2, Duration::from_millis(10));
    let mut handle = ctx.cache.subscribe_query(query, policy);
    assert_eq!(handle.key(), &query_key!["stock-prices", "AAPL", 2u32]);

    let state = handle.settled().await;
    assert_eq!(state.status, QueryStatus::Error);
    assert_eq!(
        state.error,
        Some(QueryError::RetriesExhausted {
            attempts: 3,
            last: ApiError::Timeout
        })
    );
    assert!(matches!(state.view(), ViewState::Error(_)));
    assert_eq!(server.received_requests().await.map_or(0, |r| r.len()), 3);
}

#[test_log::test(tokio::test)]
async fn test_unreachable_api_renders_in_place_error() {
    let config_file = test_utils::write_config("http://127.0.0.1:9");
    let ctx = AppContext::new(&AppConfig::load_from_path(config_file.path()).unwrap()).unwrap();

    let output = stockdash::cli::dashboard::stocks(&ctx, None)
        .await
        .expect("view should render even when the API is down");
    assert!(output.starts_with("Stocks: "));
    assert!(output.contains("network error"));

    let result = stockdash::run_command(
        stockdash::AppCommand::Trading {
            account: None,
            tab: stockdash::cli::trading::Tab::Rules,
        },
        Some(config_file.path().to_str().unwrap()),
    )
    .await;
    assert!(result.is_ok(), "Trading view failed with: {:?}", result.err());
}

#[test_log::test(tokio::test)]
async fn test_stock_view_with_mock() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/stocks/AAPL"))
        .respond_with(test_utils::envelope(json!({
            "id": 1, "symbol": "AAPL", "name": "Apple Inc.", "sector": "Technology"
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/stocks/AAPL/prices"))
        .and(query_param("days", "30"))
        .respond_with(test_utils::envelope(json!({
            "symbol": "AAPL",
            "prices": [
                {"date": "2025-01-02", "open": 1.0, "high": 1.0, "low": 1.0, "close": 180.0, "volume": 100.0},
                {"date": "2025-01-03", "open": 1.0, "high": 1.0, "low": 1.0, "close": 189.0, "volume": 120.0}
            ]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/stocks/AAPL/indicators"))
        .respond_with(test_utils::envelope(json!({
            "symbol": "AAPL",
            "indicators": {"RSI": [{"date": "2025-01-03", "value": 61.5}]}
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/ai-analysis/stocks/AAPL/analysis"))
        .respond_with(ResponseTemplate::new(500).set_body_string("model unavailable"))
        .mount(&server)
        .await;

    let ctx = test_utils::context(&server.uri(), Duration::from_secs(2));
    let output = stockdash::cli::stock::run(&ctx, "aapl", 30, None).await.unwrap();

    assert!(output.contains("Apple Inc."));
    assert!(output.contains("189.00"));
    assert!(output.contains("+5.00%"));
    assert!(output.contains("61.50"));
    assert!(output.contains("AI analysis: "));
    assert!(output.contains("500"));
}
