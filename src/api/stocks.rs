use super::{ApiClient, ApiError};
use crate::core::{Stock, StockIndicators, StockPrices, StockSummary};
use tracing::instrument;

/// Accessors for `/stocks`.
#[derive(Debug, Clone)]
pub struct StocksApi {
    client: ApiClient,
}

impl StocksApi {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    #[instrument(name = "ListStocks", skip(self))]
    pub async fn list(&self) -> Result<Vec<Stock>, ApiError> {
        self.client.get("/stocks/", &[]).await
    }

    #[instrument(name = "StockDetail", skip(self))]
    pub async fn detail(&self, symbol: &str) -> Result<Stock, ApiError> {
        self.client.get(&format!("/stocks/{symbol}"), &[]).await
    }

    #[instrument(name = "StockPrices", skip(self))]
    pub async fn prices(&self, symbol: &str, days: u32) -> Result<StockPrices, ApiError> {
        self.client
            .get(
                &format!("/stocks/{symbol}/prices"),
                &[("days", days.to_string())],
            )
            .await
    }

    #[instrument(name = "StockIndicators", skip(self))]
    pub async fn indicators(
        &self,
        symbol: &str,
        days: u32,
        indicator_type: Option<&str>,
    ) -> Result<StockIndicators, ApiError> {
        let mut params = vec![("days", days.to_string())];
        if let Some(indicator_type) = indicator_type {
            params.push(("indicator_type", indicator_type.to_string()));
        }
        self.client
            .get(&format!("/stocks/{symbol}/indicators"), &params)
            .await
    }

    #[instrument(name = "StockSummary", skip(self))]
    pub async fn summary(&self, symbol: &str) -> Result<StockSummary, ApiError> {
        self.client
            .get(&format!("/stocks/{symbol}/summary"), &[])
            .await
    }
}
