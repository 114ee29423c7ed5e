//! Terminal views. Each view declares the queries it depends on, waits for
//! them to settle and renders tables; none of them calls an accessor directly.

pub mod dashboard;
pub mod setup;
pub mod stock;
pub mod trading;
pub mod ui;
pub mod watch;

use crate::api::{Api, ApiClient};
use crate::core::config::AppConfig;
use crate::query::{QueryCache, QueryHandle, QueryState};
use anyhow::{Context, Result};

/// Accessors plus the cache every view subscribes through.
#[derive(Debug, Clone)]
pub struct AppContext {
    pub api: Api,
    pub cache: QueryCache,
}

impl AppContext {
    pub fn new(config: &AppConfig) -> Result<Self> {
        let client = ApiClient::from_config(&config.api).context("Failed to create HTTP client")?;
        Ok(Self {
            api: Api::new(client),
            cache: QueryCache::new(config.query.to_policy()),
        })
    }
}

/// Waits for a subscription to settle behind a spinner.
pub async fn settle<T: Send + Sync + 'static>(
    handle: &mut QueryHandle<T>,
    message: &str,
) -> QueryState<T> {
    let pb = ui::new_spinner(message);
    let state = handle.settled().await;
    pb.finish_and_clear();
    state
}
