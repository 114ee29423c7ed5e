use super::{ApiClient, ApiError};
use crate::core::trading::{
    AccountSummary, AutoTradingRule, BacktestResult, BacktestResultSummary, CreateAccountRequest,
    CreateRuleRequest, DeletedRule, PlaceOrderRequest, RunBacktestRequest, StockScore,
    UpdateRuleRequest, VirtualAccount, VirtualPosition, VirtualTrade,
};
use serde_json::Value;
use tracing::instrument;

/// Accessors for `/trading`.
#[derive(Debug, Clone)]
pub struct TradingApi {
    client: ApiClient,
}

impl TradingApi {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    #[instrument(name = "ListAccounts", skip(self))]
    pub async fn accounts(&self) -> Result<Vec<VirtualAccount>, ApiError> {
        self.client.get("/trading/accounts", &[]).await
    }

    /// The server answers with the subset of account fields known at creation.
    #[instrument(name = "CreateAccount", skip(self))]
    pub async fn create_account(&self, req: &CreateAccountRequest) -> Result<Value, ApiError> {
        self.client.post("/trading/accounts", Some(req)).await
    }

    #[instrument(name = "AccountDetail", skip(self))]
    pub async fn account_detail(&self, account_id: i64) -> Result<AccountSummary, ApiError> {
        self.client
            .get(&format!("/trading/accounts/{account_id}"), &[])
            .await
    }

    #[instrument(name = "Positions", skip(self))]
    pub async fn positions(&self, account_id: i64) -> Result<Vec<VirtualPosition>, ApiError> {
        self.client
            .get(&format!("/trading/positions/{account_id}"), &[])
            .await
    }

    #[instrument(name = "TradeHistory", skip(self))]
    pub async fn trade_history(
        &self,
        account_id: i64,
        limit: u32,
    ) -> Result<Vec<VirtualTrade>, ApiError> {
        self.client
            .get(
                &format!("/trading/history/{account_id}"),
                &[("limit", limit.to_string())],
            )
            .await
    }

    #[instrument(name = "PlaceOrder", skip(self))]
    pub async fn place_order(&self, req: &PlaceOrderRequest) -> Result<VirtualTrade, ApiError> {
        self.client.post("/trading/orders", Some(req)).await
    }

    #[instrument(name = "Scores", skip(self))]
    pub async fn scores(&self, limit: u32) -> Result<Vec<StockScore>, ApiError> {
        self.client
            .get("/trading/scores", &[("limit", limit.to_string())])
            .await
    }

    /// Rescoring returns the raw per-stock score breakdowns.
    #[instrument(name = "CalculateScores", skip(self))]
    pub async fn calculate_scores(&self) -> Result<Vec<Value>, ApiError> {
        self.client
            .post::<_, ()>("/trading/scores/calculate", None)
            .await
    }

    #[instrument(name = "BacktestResults", skip(self))]
    pub async fn backtest_results(
        &self,
        limit: u32,
    ) -> Result<Vec<BacktestResultSummary>, ApiError> {
        self.client
            .get("/trading/backtest", &[("limit", limit.to_string())])
            .await
    }

    #[instrument(name = "BacktestResult", skip(self))]
    pub async fn backtest_result(&self, result_id: i64) -> Result<BacktestResult, ApiError> {
        self.client
            .get(&format!("/trading/backtest/{result_id}"), &[])
            .await
    }

    #[instrument(name = "RunBacktest", skip(self))]
    pub async fn run_backtest(&self, req: &RunBacktestRequest) -> Result<Value, ApiError> {
        self.client.post("/trading/backtest", Some(req)).await
    }

    #[instrument(name = "ListRules", skip(self))]
    pub async fn rules(&self) -> Result<Vec<AutoTradingRule>, ApiError> {
        self.client.get("/trading/rules", &[]).await
    }

    #[instrument(name = "CreateRule", skip(self))]
    pub async fn create_rule(&self, req: &CreateRuleRequest) -> Result<AutoTradingRule, ApiError> {
        self.client.post("/trading/rules", Some(req)).await
    }

    #[instrument(name = "UpdateRule", skip(self))]
    pub async fn update_rule(
        &self,
        rule_id: i64,
        req: &UpdateRuleRequest,
    ) -> Result<AutoTradingRule, ApiError> {
        self.client
            .patch(&format!("/trading/rules/{rule_id}"), req)
            .await
    }

    #[instrument(name = "DeleteRule", skip(self))]
    pub async fn delete_rule(&self, rule_id: i64) -> Result<DeletedRule, ApiError> {
        self.client
            .delete(&format!("/trading/rules/{rule_id}"))
            .await
    }
}
