use crate::api::{AiAnalysisApi, ApiError, StocksApi};
use crate::core::{MarketOverview, Stock, StockAnalysis, StockIndicators, StockPrices, StockSummary};
use crate::query::{Query, QueryKey};
use crate::query_key;
use async_trait::async_trait;

/// Days of history behind the live quote: enough for a day-over-day change.
pub const LATEST_PRICE_DAYS: u32 = 2;

#[derive(Debug, Clone)]
pub struct StocksQuery {
    pub api: StocksApi,
}

#[async_trait]
impl Query for StocksQuery {
    type Output = Vec<Stock>;

    fn key(&self) -> QueryKey {
        query_key!["stocks"]
    }

    async fn fetch(&self) -> Result<Self::Output, ApiError> {
        self.api.list().await
    }
}

#[derive(Debug, Clone)]
pub struct StockQuery {
    pub api: StocksApi,
    pub symbol: String,
}

#[async_trait]
impl Query for StockQuery {
    type Output = Stock;

    fn key(&self) -> QueryKey {
        query_key!["stock", &self.symbol]
    }

    async fn fetch(&self) -> Result<Self::Output, ApiError> {
        self.api.detail(&self.symbol).await
    }
}

#[derive(Debug, Clone)]
pub struct StockPricesQuery {
    pub api: StocksApi,
    pub symbol: String,
    pub days: u32,
}

#[async_trait]
impl Query for StockPricesQuery {
    type Output = StockPrices;

    fn key(&self) -> QueryKey {
        query_key!["stock-prices", &self.symbol, self.days]
    }

    async fn fetch(&self) -> Result<Self::Output, ApiError> {
        self.api.prices(&self.symbol, self.days).await
    }
}

/// The two most recent closes, polled by the live quote view.
#[derive(Debug, Clone)]
pub struct LatestPriceQuery {
    pub api: StocksApi,
    pub symbol: String,
}

#[async_trait]
impl Query for LatestPriceQuery {
    type Output = StockPrices;

    fn key(&self) -> QueryKey {
        query_key!["stock-prices", &self.symbol, "latest"]
    }

    async fn fetch(&self) -> Result<Self::Output, ApiError> {
        self.api.prices(&self.symbol, LATEST_PRICE_DAYS).await
    }
}

#[derive(Debug, Clone)]
pub struct StockIndicatorsQuery {
    pub api: StocksApi,
    pub symbol: String,
    pub days: u32,
    pub indicator_type: Option<String>,
}

#[async_trait]
impl Query for StockIndicatorsQuery {
    type Output = StockIndicators;

    fn key(&self) -> QueryKey {
        query_key![
            "stock-indicators",
            &self.symbol,
            self.days,
            self.indicator_type.as_deref()
        ]
    }

    async fn fetch(&self) -> Result<Self::Output, ApiError> {
        self.api
            .indicators(&self.symbol, self.days, self.indicator_type.as_deref())
            .await
    }
}

#[derive(Debug, Clone)]
pub struct StockSummaryQuery {
    pub api: StocksApi,
    pub symbol: String,
}

#[async_trait]
impl Query for StockSummaryQuery {
    type Output = StockSummary;

    fn key(&self) -> QueryKey {
        query_key!["stock-summary", &self.symbol]
    }

    async fn fetch(&self) -> Result<Self::Output, ApiError> {
        self.api.summary(&self.symbol).await
    }
}

#[derive(Debug, Clone)]
pub struct MarketOverviewQuery {
    pub api: AiAnalysisApi,
}

#[async_trait]
impl Query for MarketOverviewQuery {
    type Output = MarketOverview;

    fn key(&self) -> QueryKey {
        query_key!["market-overview"]
    }

    async fn fetch(&self) -> Result<Self::Output, ApiError> {
        self.api.market_overview().await
    }
}

#[derive(Debug, Clone)]
pub struct StockAnalysisQuery {
    pub api: AiAnalysisApi,
    pub symbol: String,
}

#[async_trait]
impl Query for StockAnalysisQuery {
    type Output = StockAnalysis;

    fn key(&self) -> QueryKey {
        query_key!["stock-analysis", &self.symbol]
    }

    async fn fetch(&self) -> Result<Self::Output, ApiError> {
        self.api.stock_analysis(&self.symbol).await
    }
}
