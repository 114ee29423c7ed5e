//! Market data payloads served under `/stocks`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Stock {
    pub id: i64,
    pub symbol: String,
    pub name: String,
    #[serde(default)]
    pub sector: Option<String>,
    #[serde(default)]
    pub industry: Option<String>,
    #[serde(default)]
    pub market_cap: Option<f64>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

impl Stock {
    /// Case-insensitive substring match on symbol or name.
    pub fn matches(&self, query: &str) -> bool {
        let query = query.trim().to_lowercase();
        query.is_empty()
            || self.symbol.to_lowercase().contains(&query)
            || self.name.to_lowercase().contains(&query)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct StockPrice {
    pub date: String,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct StockPrices {
    pub symbol: String,
    #[serde(default)]
    pub name: Option<String>,
    pub prices: Vec<StockPrice>,
}

impl StockPrices {
    /// Change of the last close against the previous one, as `(absolute, percent)`.
    pub fn latest_change(&self) -> Option<(f64, f64)> {
        let [.., previous, latest] = self.prices.as_slice() else {
            return None;
        };
        if previous.close == 0.0 {
            return None;
        }
        let change = latest.close - previous.close;
        Some((change, change / previous.close * 100.0))
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct IndicatorPoint {
    pub date: String,
    pub value: f64,
    #[serde(default)]
    pub parameters: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct StockIndicators {
    pub symbol: String,
    #[serde(default)]
    pub name: Option<String>,
    pub indicators: BTreeMap<String, Vec<IndicatorPoint>>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct LatestPrice {
    pub date: String,
    pub close: f64,
    pub volume: f64,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct StockSummary {
    pub symbol: String,
    pub name: String,
    #[serde(default)]
    pub sector: Option<String>,
    #[serde(default)]
    pub industry: Option<String>,
    pub latest_price: Option<LatestPrice>,
    #[serde(default)]
    pub current_indicators: BTreeMap<String, f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn price(close: f64) -> StockPrice {
        StockPrice {
            date: "2025-01-01".to_string(),
            open: close,
            high: close,
            low: close,
            close,
            volume: 100.0,
        }
    }

    #[test]
    fn test_latest_change() {
        let prices = StockPrices {
            symbol: "AAPL".to_string(),
            name: None,
            prices: vec![price(90.0), price(100.0), price(110.0)],
        };
        let (change, pct) = prices.latest_change().unwrap();
        assert!((change - 10.0).abs() < 1e-9);
        assert!((pct - 10.0).abs() < 1e-9);

        let single = StockPrices {
            prices: vec![price(100.0)],
            ..prices
        };
        assert!(single.latest_change().is_none());
    }

    #[test]
    fn test_stock_matches() {
        let stock: Stock = serde_json::from_str(
            r#"{"id": 1, "symbol": "005930", "name": "Samsung Electronics", "sector": "Tech"}"#,
        )
        .unwrap();
        assert!(stock.matches("samsung"));
        assert!(stock.matches("0059"));
        assert!(stock.matches("  "));
        assert!(!stock.matches("apple"));
        assert!(stock.industry.is_none());
    }
}
