use super::cache::QueryCache;
use super::error::QueryError;
use super::key::QueryKey;
use crate::api::ApiError;
use futures::FutureExt;
use futures::future::BoxFuture;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn};

type MutationFn<A, T> = Arc<dyn Fn(A) -> BoxFuture<'static, Result<T, ApiError>> + Send + Sync>;
type SuccessFn<T> = Arc<dyn Fn(&T) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationStatus {
    Idle,
    Pending,
    Success,
    Error,
}

/// A one-shot write that marks related cache entries stale when it succeeds.
///
/// Mutations never retry and never touch cached values directly; subscribed
/// views pick up the change through the refetch that invalidation triggers.
pub struct Mutation<A, T> {
    name: String,
    cache: QueryCache,
    mutation_fn: MutationFn<A, T>,
    invalidates: Vec<QueryKey>,
    on_success: Option<SuccessFn<T>>,
    status: watch::Sender<MutationStatus>,
}

impl<A, T> fmt::Debug for Mutation<A, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mutation")
            .field("name", &self.name)
            .field("invalidates", &self.invalidates)
            .field("status", &*self.status.borrow())
            .finish()
    }
}

impl<A, T> Mutation<A, T>
where
    A: Send + 'static,
    T: Send + 'static,
{
    pub fn new<F, Fut>(name: impl Into<String>, cache: QueryCache, mutation_fn: F) -> Self
    where
        F: Fn(A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, ApiError>> + Send + 'static,
    {
        let (status, _) = watch::channel(MutationStatus::Idle);
        Self {
            name: name.into(),
            cache,
            mutation_fn: Arc::new(move |args| mutation_fn(args).boxed()),
            invalidates: Vec::new(),
            on_success: None,
            status,
        }
    }

    /// Adds a key prefix to invalidate on success. Duplicates are ignored.
    pub fn invalidates(mut self, prefix: QueryKey) -> Self {
        if !self.invalidates.contains(&prefix) {
            self.invalidates.push(prefix);
        }
        self
    }

    /// Runs after invalidation, on success only.
    pub fn on_success(mut self, callback: impl Fn(&T) + Send + Sync + 'static) -> Self {
        self.on_success = Some(Arc::new(callback));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn status(&self) -> MutationStatus {
        *self.status.borrow()
    }

    pub fn watch_status(&self) -> watch::Receiver<MutationStatus> {
        self.status.subscribe()
    }

    pub async fn mutate(&self, args: A) -> Result<T, QueryError> {
        self.status.send_replace(MutationStatus::Pending);
        match (self.mutation_fn)(args).await {
            Ok(value) => {
                info!(mutation = %self.name, "Mutation succeeded");
                for prefix in &self.invalidates {
                    self.cache.invalidate(prefix);
                }
                self.status.send_replace(MutationStatus::Success);
                if let Some(callback) = &self.on_success {
                    callback(&value);
                }
                Ok(value)
            }
            Err(source) => {
                warn!(mutation = %self.name, error = %source, "Mutation failed");
                self.status.send_replace(MutationStatus::Error);
                Err(QueryError::MutationFailed {
                    name: self.name.clone(),
                    source,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query_key;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn counting_fetch(calls: &Arc<AtomicUsize>) -> impl Fn() -> BoxFuture<'static, Result<usize, ApiError>> + Send + Sync + 'static {
        let calls = Arc::clone(calls);
        move || {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            async move { Ok(n) }.boxed()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_invalidates_then_calls_back() {
        let cache = QueryCache::default();
        let calls = Arc::new(AtomicUsize::new(0));
        let policy = cache.policy().stale_time(Duration::from_secs(30));
        let mut accounts = cache.subscribe(query_key!["trading-accounts"], counting_fetch(&calls), policy.clone());
        let mut rules = cache.subscribe(query_key!["trading-rules"], counting_fetch(&calls), policy);
        accounts.settled().await;
        rules.settled().await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        let seen = Arc::new(Mutex::new(Vec::new()));
        let recorded = Arc::clone(&seen);
        let mutation = Mutation::new("create-account", cache.clone(), |name: String| async move {
            Ok(format!("created {name}"))
        })
        .invalidates(query_key!["trading-accounts"])
        .invalidates(query_key!["trading-accounts"])
        .on_success(move |msg: &String| recorded.lock().unwrap().push(msg.clone()));

        let result = mutation.mutate("Alpha".to_string()).await;
        assert_eq!(result.unwrap(), "created Alpha");
        assert_eq!(mutation.status(), MutationStatus::Success);
        assert_eq!(*seen.lock().unwrap(), vec!["created Alpha".to_string()]);

        let state = accounts.settled().await;
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(state.data.as_deref(), Some(&3));
        assert_eq!(rules.state().data.as_deref(), Some(&2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_skips_invalidation() {
        let cache = QueryCache::default();
        let calls = Arc::new(AtomicUsize::new(0));
        let mut scores = cache.subscribe(query_key!["scores"], counting_fetch(&calls), cache.policy().stale_time(Duration::from_secs(60)));
        scores.settled().await;

        let callbacks = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&callbacks);
        let mutation = Mutation::new("calculate-scores", cache.clone(), |_: ()| async {
            Err::<(), _>(ApiError::Http {
                status: 500,
                body: "boom".to_string(),
            })
        })
        .invalidates(query_key!["scores"])
        .on_success(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let mut status = mutation.watch_status();
        let err = mutation.mutate(()).await.unwrap_err();
        assert_eq!(
            err,
            QueryError::MutationFailed {
                name: "calculate-scores".to_string(),
                source: ApiError::Http {
                    status: 500,
                    body: "boom".to_string()
                }
            }
        );
        assert_eq!(*status.borrow_and_update(), MutationStatus::Error);
        assert_eq!(callbacks.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(!scores.state().is_invalidated);
    }

    #[test]
    fn test_new_mutation_is_idle() {
        let mutation = Mutation::new("noop", QueryCache::default(), |x: u8| async move { Ok(x) });
        assert_eq!(mutation.status(), MutationStatus::Idle);
        assert_eq!(mutation.name(), "noop");
    }
}
