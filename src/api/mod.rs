//! HTTP adapter and one accessor per logical resource of the dashboard API.
//!
//! Accessors never cache and never retry; both are the query layer's job.

pub mod ai_analysis;
pub mod client;
pub mod error;
pub mod stocks;
pub mod trading;

pub use ai_analysis::AiAnalysisApi;
pub use client::{ApiClient, ApiResponse};
pub use error::ApiError;
pub use stocks::StocksApi;
pub use trading::TradingApi;

/// All accessors sharing one underlying client.
#[derive(Debug, Clone)]
pub struct Api {
    pub stocks: StocksApi,
    pub ai: AiAnalysisApi,
    pub trading: TradingApi,
}

impl Api {
    pub fn new(client: ApiClient) -> Self {
        Self {
            stocks: StocksApi::new(client.clone()),
            ai: AiAnalysisApi::new(client.clone()),
            trading: TradingApi::new(client),
        }
    }
}
