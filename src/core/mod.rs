//! Configuration, logging and the payload types of the dashboard API

pub mod analysis;
pub mod config;
pub mod log;
pub mod stock;
pub mod trading;

// Re-export main types for cleaner imports
pub use analysis::{MarketOverview, StockAnalysis};
pub use stock::{Stock, StockIndicators, StockPrice, StockPrices, StockSummary};
pub use trading::{
    AccountSummary, AutoTradingRule, BacktestResult, BacktestResultSummary, StockScore,
    VirtualAccount, VirtualPosition, VirtualTrade,
};
