use crate::api::ApiError;
use thiserror::Error;

/// Failure surfaced by the query cache or the mutation pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    /// Every allowed attempt failed; `last` is the final attempt's failure.
    #[error("query failed after {attempts} attempt(s): {last}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        last: ApiError,
    },
    #[error("mutation `{name}` failed: {source}")]
    MutationFailed {
        name: String,
        #[source]
        source: ApiError,
    },
}

impl QueryError {
    /// The adapter failure underneath.
    pub fn api_error(&self) -> &ApiError {
        match self {
            QueryError::RetriesExhausted { last, .. } => last,
            QueryError::MutationFailed { source, .. } => source,
        }
    }
}
