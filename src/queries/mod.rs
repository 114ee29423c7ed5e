//! One descriptor per cached resource, pairing its key with its accessor,
//! plus the trading mutations and the keys they invalidate.

pub mod stocks;
pub mod trading;

pub use stocks::{
    LatestPriceQuery, MarketOverviewQuery, StockAnalysisQuery, StockIndicatorsQuery,
    StockPricesQuery, StockQuery, StockSummaryQuery, StocksQuery,
};
pub use trading::{
    AccountSummaryQuery, AccountsQuery, BacktestResultsQuery, PositionsQuery, RulesQuery,
    ScoresQuery, TradesQuery, TradingMutations,
};
