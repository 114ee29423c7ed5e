use crate::api::{ApiError, TradingApi};
use crate::core::trading::{
    CreateAccountRequest, CreateRuleRequest, DeletedRule, PlaceOrderRequest, RunBacktestRequest,
    UpdateRuleRequest,
};
use crate::core::{
    AccountSummary, AutoTradingRule, BacktestResultSummary, StockScore, VirtualAccount,
    VirtualPosition, VirtualTrade,
};
use crate::query::{Mutation, Query, QueryCache, QueryKey};
use crate::query_key;
use async_trait::async_trait;
use serde_json::Value;

pub const TRADE_HISTORY_LIMIT: u32 = 20;
pub const SCORES_LIMIT: u32 = 20;
pub const BACKTEST_RESULTS_LIMIT: u32 = 10;

fn no_account() -> ApiError {
    ApiError::Unknown("no trading account selected".to_string())
}

#[derive(Debug, Clone)]
pub struct AccountsQuery {
    pub api: TradingApi,
}

#[async_trait]
impl Query for AccountsQuery {
    type Output = Vec<VirtualAccount>;

    fn key(&self) -> QueryKey {
        query_key!["trading-accounts"]
    }

    async fn fetch(&self) -> Result<Self::Output, ApiError> {
        self.api.accounts().await
    }
}

/// Account-scoped reads take an optional id; subscribe them disabled while
/// no account is selected.
#[derive(Debug, Clone)]
pub struct AccountSummaryQuery {
    pub api: TradingApi,
    pub account_id: Option<i64>,
}

#[async_trait]
impl Query for AccountSummaryQuery {
    type Output = AccountSummary;

    fn key(&self) -> QueryKey {
        query_key!["account-summary", self.account_id]
    }

    async fn fetch(&self) -> Result<Self::Output, ApiError> {
        let id = self.account_id.ok_or_else(no_account)?;
        self.api.account_detail(id).await
    }
}

#[derive(Debug, Clone)]
pub struct PositionsQuery {
    pub api: TradingApi,
    pub account_id: Option<i64>,
}

#[async_trait]
impl Query for PositionsQuery {
    type Output = Vec<VirtualPosition>;

    fn key(&self) -> QueryKey {
        query_key!["positions", self.account_id]
    }

    async fn fetch(&self) -> Result<Self::Output, ApiError> {
        let id = self.account_id.ok_or_else(no_account)?;
        self.api.positions(id).await
    }
}

/// The most recent [`TRADE_HISTORY_LIMIT`] trades.
#[derive(Debug, Clone)]
pub struct TradesQuery {
    pub api: TradingApi,
    pub account_id: Option<i64>,
}

#[async_trait]
impl Query for TradesQuery {
    type Output = Vec<VirtualTrade>;

    fn key(&self) -> QueryKey {
        query_key!["trades", self.account_id]
    }

    async fn fetch(&self) -> Result<Self::Output, ApiError> {
        let id = self.account_id.ok_or_else(no_account)?;
        self.api.trade_history(id, TRADE_HISTORY_LIMIT).await
    }
}

#[derive(Debug, Clone)]
pub struct ScoresQuery {
    pub api: TradingApi,
}

#[async_trait]
impl Query for ScoresQuery {
    type Output = Vec<StockScore>;

    fn key(&self) -> QueryKey {
        query_key!["scores"]
    }

    async fn fetch(&self) -> Result<Self::Output, ApiError> {
        self.api.scores(SCORES_LIMIT).await
    }
}

#[derive(Debug, Clone)]
pub struct BacktestResultsQuery {
    pub api: TradingApi,
}

#[async_trait]
impl Query for BacktestResultsQuery {
    type Output = Vec<BacktestResultSummary>;

    fn key(&self) -> QueryKey {
        query_key!["backtest-results"]
    }

    async fn fetch(&self) -> Result<Self::Output, ApiError> {
        self.api.backtest_results(BACKTEST_RESULTS_LIMIT).await
    }
}

#[derive(Debug, Clone)]
pub struct RulesQuery {
    pub api: TradingApi,
}

#[async_trait]
impl Query for RulesQuery {
    type Output = Vec<AutoTradingRule>;

    fn key(&self) -> QueryKey {
        query_key!["trading-rules"]
    }

    async fn fetch(&self) -> Result<Self::Output, ApiError> {
        self.api.rules().await
    }
}

/// Writes of the trading console, each wired to the keys it makes stale.
#[derive(Debug, Clone)]
pub struct TradingMutations {
    api: TradingApi,
    cache: QueryCache,
}

impl TradingMutations {
    pub fn new(api: TradingApi, cache: QueryCache) -> Self {
        Self { api, cache }
    }

    pub fn create_account(&self) -> Mutation<CreateAccountRequest, Value> {
        let api = self.api.clone();
        Mutation::new("create-account", self.cache.clone(), move |req: CreateAccountRequest| {
            let api = api.clone();
            async move { api.create_account(&req).await }
        })
        .invalidates(query_key!["trading-accounts"])
    }

    pub fn calculate_scores(&self) -> Mutation<(), Vec<Value>> {
        let api = self.api.clone();
        Mutation::new("calculate-scores", self.cache.clone(), move |()| {
            let api = api.clone();
            async move { api.calculate_scores().await }
        })
        .invalidates(query_key!["scores"])
    }

    pub fn run_backtest(&self) -> Mutation<RunBacktestRequest, Value> {
        let api = self.api.clone();
        Mutation::new("run-backtest", self.cache.clone(), move |req: RunBacktestRequest| {
            let api = api.clone();
            async move { api.run_backtest(&req).await }
        })
        .invalidates(query_key!["backtest-results"])
    }

    /// Takes `(rule_id, is_active)`.
    pub fn toggle_rule(&self) -> Mutation<(i64, bool), AutoTradingRule> {
        let api = self.api.clone();
        Mutation::new("toggle-rule", self.cache.clone(), move |(id, active): (i64, bool)| {
            let api = api.clone();
            async move { api.update_rule(id, &UpdateRuleRequest::toggle(active)).await }
        })
        .invalidates(query_key!["trading-rules"])
    }

    pub fn place_order(&self) -> Mutation<PlaceOrderRequest, VirtualTrade> {
        let api = self.api.clone();
        Mutation::new("place-order", self.cache.clone(), move |req: PlaceOrderRequest| {
            let api = api.clone();
            async move { api.place_order(&req).await }
        })
        .invalidates(query_key!["account-summary"])
        .invalidates(query_key!["positions"])
        .invalidates(query_key!["trades"])
        .invalidates(query_key!["trading-accounts"])
    }

    pub fn create_rule(&self) -> Mutation<CreateRuleRequest, AutoTradingRule> {
        let api = self.api.clone();
        Mutation::new("create-rule", self.cache.clone(), move |req: CreateRuleRequest| {
            let api = api.clone();
            async move { api.create_rule(&req).await }
        })
        .invalidates(query_key!["trading-rules"])
    }

    pub fn delete_rule(&self) -> Mutation<i64, DeletedRule> {
        let api = self.api.clone();
        Mutation::new("delete-rule", self.cache.clone(), move |id: i64| {
            let api = api.clone();
            async move { api.delete_rule(id).await }
        })
        .invalidates(query_key!["trading-rules"])
    }
}
