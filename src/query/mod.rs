//! Client-side query cache: keyed entries with staleness windows, polling,
//! retries, deduplication of concurrent fetches, idle eviction and
//! mutation-driven invalidation.

pub mod cache;
pub mod error;
pub mod handle;
pub mod key;
pub mod mutation;
pub mod policy;
pub mod retry;

pub use cache::{QueryCache, QueryStatus};
pub use error::QueryError;
pub use handle::{QueryHandle, QueryState, ViewState};
pub use key::{KeyPart, QueryKey};
pub use mutation::{Mutation, MutationStatus};
pub use policy::QueryPolicy;

use crate::api::ApiError;
use async_trait::async_trait;

/// A cacheable read: the key it lives under and how to fetch it.
///
/// Every parameter the fetch depends on must appear in the key.
#[async_trait]
pub trait Query: Send + Sync + 'static {
    type Output: Send + Sync + 'static;

    fn key(&self) -> QueryKey;

    async fn fetch(&self) -> Result<Self::Output, ApiError>;
}
