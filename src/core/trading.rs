//! Virtual trading payloads and request bodies served under `/trading`.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt::Display;
use std::str::FromStr;

pub const DEFAULT_INITIAL_BALANCE: f64 = 10_000_000.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TradeType {
    Buy,
    Sell,
}

impl Display for TradeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TradeType::Buy => write!(f, "BUY"),
            TradeType::Sell => write!(f, "SELL"),
        }
    }
}

impl FromStr for TradeType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "BUY" => Ok(TradeType::Buy),
            "SELL" => Ok(TradeType::Sell),
            _ => Err(anyhow::anyhow!("Invalid trade type: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Signal {
    Buy,
    Sell,
    Hold,
}

impl Display for Signal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Signal::Buy => write!(f, "BUY"),
            Signal::Sell => write!(f, "SELL"),
            Signal::Hold => write!(f, "HOLD"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct VirtualAccount {
    pub id: i64,
    pub name: String,
    pub initial_balance: f64,
    pub current_balance: f64,
    #[serde(default)]
    pub total_profit_loss: f64,
    #[serde(default)]
    pub total_trades: u32,
    #[serde(default)]
    pub win_trades: u32,
    #[serde(default)]
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct AccountSummary {
    pub account_id: i64,
    pub name: String,
    pub initial_balance: f64,
    pub current_balance: f64,
    pub total_position_value: f64,
    pub total_assets: f64,
    pub total_return_rate: f64,
    pub total_profit_loss: f64,
    pub total_trades: u32,
    pub win_trades: u32,
    pub win_rate: f64,
    pub positions: u32,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct VirtualPosition {
    pub id: i64,
    pub stock_id: i64,
    pub symbol: String,
    pub quantity: i64,
    pub avg_price: f64,
    pub current_price: Option<f64>,
    pub unrealized_pnl: f64,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct VirtualTrade {
    pub id: i64,
    #[serde(default)]
    pub account_id: Option<i64>,
    pub symbol: String,
    pub trade_type: TradeType,
    pub quantity: i64,
    pub price: f64,
    pub total_amount: f64,
    pub commission: f64,
    pub tax: f64,
    pub realized_pnl: Option<f64>,
    pub timestamp: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct StockScore {
    pub id: i64,
    pub stock_id: i64,
    pub symbol: String,
    pub rsi_score: f64,
    pub macd_score: f64,
    pub bollinger_score: f64,
    pub ema_score: f64,
    pub prediction_score: f64,
    pub total_score: f64,
    pub signal: Signal,
    pub date: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct BacktestResultSummary {
    pub id: i64,
    pub strategy_name: String,
    pub start_date: String,
    pub end_date: String,
    pub total_return: f64,
    pub win_rate: f64,
    pub sharpe_ratio: f64,
    pub max_drawdown: f64,
    pub total_trades: u32,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct BacktestTrade {
    pub date: String,
    pub symbol: String,
    #[serde(rename = "type")]
    pub trade_type: String,
    pub quantity: i64,
    pub price: f64,
    pub total_amount: f64,
    pub commission: f64,
    pub tax: f64,
    pub realized_pnl: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct BacktestResult {
    pub id: i64,
    pub strategy_name: String,
    pub start_date: String,
    pub end_date: String,
    pub initial_balance: f64,
    pub final_balance: f64,
    pub total_return: f64,
    pub sharpe_ratio: f64,
    pub max_drawdown: f64,
    pub win_rate: f64,
    pub total_trades: u32,
    pub win_trades: u32,
    pub strategy_type: String,
    #[serde(default)]
    pub trade_details: Vec<BacktestTrade>,
    #[serde(default)]
    pub parameters: BTreeMap<String, f64>,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct AutoTradingRule {
    pub id: i64,
    pub name: String,
    pub strategy_type: String,
    pub account_id: Option<i64>,
    pub is_active: bool,
    pub buy_score_threshold: f64,
    pub max_position_count: u32,
    pub budget_ratio: f64,
    pub schedule_buy: Option<String>,
    pub schedule_sell: Option<String>,
    pub last_executed_at: Option<String>,
    #[serde(default)]
    pub parameters: BTreeMap<String, Value>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct DeletedRule {
    pub id: i64,
    pub deleted: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CreateAccountRequest {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub initial_balance: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlaceOrderRequest {
    pub account_id: i64,
    pub stock_id: i64,
    pub symbol: String,
    pub trade_type: TradeType,
    pub quantity: i64,
    pub price: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunBacktestRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strategy_name: Option<String>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub initial_balance: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub buy_threshold: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sell_threshold: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_positions: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub budget_ratio: Option<f64>,
}

impl RunBacktestRequest {
    pub fn new(start_date: NaiveDate, end_date: NaiveDate) -> Self {
        Self {
            strategy_name: None,
            start_date,
            end_date,
            initial_balance: None,
            buy_threshold: None,
            sell_threshold: None,
            max_positions: None,
            budget_ratio: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CreateRuleRequest {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strategy_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub buy_score_threshold: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_position_count: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub budget_ratio: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schedule_buy: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schedule_sell: Option<String>,
}

/// Partial update; only the fields that are set are sent.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UpdateRuleRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub buy_score_threshold: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_position_count: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub budget_ratio: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schedule_buy: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schedule_sell: Option<String>,
}

impl UpdateRuleRequest {
    pub fn toggle(is_active: bool) -> Self {
        Self {
            is_active: Some(is_active),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_serialization_skips_unset_fields() {
        let toggle = serde_json::to_value(UpdateRuleRequest::toggle(false)).unwrap();
        assert_eq!(toggle, json!({"is_active": false}));

        let backtest = RunBacktestRequest::new(
            NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2025, 12, 31).unwrap(),
        );
        assert_eq!(
            serde_json::to_value(backtest).unwrap(),
            json!({"start_date": "2025-01-01", "end_date": "2025-12-31"})
        );

        let account = CreateAccountRequest {
            name: "A".to_string(),
            initial_balance: Some(DEFAULT_INITIAL_BALANCE),
        };
        assert_eq!(
            serde_json::to_value(account).unwrap(),
            json!({"name": "A", "initial_balance": 10000000.0})
        );
    }

    #[test]
    fn test_trade_deserialization() {
        let trade: VirtualTrade = serde_json::from_value(json!({
            "id": 1,
            "symbol": "AAPL",
            "trade_type": "SELL",
            "quantity": 10,
            "price": 150.0,
            "total_amount": 1500.0,
            "commission": 0.23,
            "tax": 3.45,
            "realized_pnl": null,
            "timestamp": "2025-01-02 09:00:00"
        }))
        .unwrap();
        assert_eq!(trade.trade_type, TradeType::Sell);
        assert!(trade.realized_pnl.is_none());
        assert!(trade.account_id.is_none());
    }

    #[test]
    fn test_trade_type_from_str() {
        assert_eq!("buy".parse::<TradeType>().unwrap(), TradeType::Buy);
        assert_eq!("SELL".parse::<TradeType>().unwrap(), TradeType::Sell);
        assert!("hold".parse::<TradeType>().is_err());
    }
}
