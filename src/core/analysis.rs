//! AI narrative analysis payloads served under `/ai-analysis`.
//!
//! The nested sections of a per-stock analysis are free-form on the server
//! side, so they are kept as JSON values and only the headline fields are
//! typed.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct MarketOverview {
    pub overall_sentiment: String,
    pub sentiment_score: f64,
    pub market_trend: String,
    #[serde(default)]
    pub key_factors: Vec<String>,
    #[serde(default)]
    pub risk_level: Option<String>,
    #[serde(default)]
    pub investment_advice: Option<String>,
    #[serde(default)]
    pub sector_outlook: BTreeMap<String, String>,
    #[serde(default)]
    pub market_volatility: Option<String>,
    #[serde(default)]
    pub liquidity_condition: Option<String>,
    #[serde(default)]
    pub analysis_timestamp: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct StockAnalysis {
    pub stock_symbol: String,
    pub stock_name: String,
    #[serde(default)]
    pub analysis_timestamp: Option<String>,
    #[serde(default)]
    pub technical_analysis: Value,
    #[serde(default)]
    pub news_analysis: Value,
    #[serde(default)]
    pub sentiment_analysis: Value,
    #[serde(default)]
    pub investment_opinion: Value,
    #[serde(default)]
    pub risk_assessment: Value,
    #[serde(default)]
    pub price_target: Value,
    #[serde(default)]
    pub holding_period: Value,
}

impl StockAnalysis {
    /// Flattens one section into `(field, value)` rows for display.
    pub fn section_rows(section: &Value) -> Vec<(String, String)> {
        let Value::Object(map) = section else {
            return Vec::new();
        };
        let mut rows: Vec<(String, String)> = map
            .iter()
            .filter(|(_, v)| !v.is_array() && !v.is_object())
            .map(|(k, v)| {
                let text = match v {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                (k.clone(), text)
            })
            .collect();
        rows.sort();
        rows
    }
}
