use super::{ApiClient, ApiError};
use crate::core::{MarketOverview, StockAnalysis};
use tracing::instrument;

/// Accessors for `/ai-analysis`.
#[derive(Debug, Clone)]
pub struct AiAnalysisApi {
    client: ApiClient,
}

impl AiAnalysisApi {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    #[instrument(name = "MarketOverview", skip(self))]
    pub async fn market_overview(&self) -> Result<MarketOverview, ApiError> {
        self.client.get("/ai-analysis/market-overview", &[]).await
    }

    #[instrument(name = "StockAnalysis", skip(self))]
    pub async fn stock_analysis(&self, symbol: &str) -> Result<StockAnalysis, ApiError> {
        self.client
            .get(&format!("/ai-analysis/stocks/{symbol}/analysis"), &[])
            .await
    }
}
