use super::cache::{QueryCache, QueryStatus, Shared, Snapshot};
use super::error::QueryError;
use super::key::QueryKey;
use std::fmt;
use std::marker::PhantomData;
use std::sync::{Arc, Weak};
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::warn;

/// Typed view of one cache entry as seen by a subscriber.
pub struct QueryState<T> {
    pub status: QueryStatus,
    /// Last successful value; kept through later loads and failures.
    pub data: Option<Arc<T>>,
    pub error: Option<QueryError>,
    pub updated_at: Option<Instant>,
    pub is_fetching: bool,
    pub is_invalidated: bool,
}

// Manual impls: `T` itself need not be `Clone` or `Debug`.
impl<T> Clone for QueryState<T> {
    fn clone(&self) -> Self {
        Self {
            status: self.status,
            data: self.data.clone(),
            error: self.error.clone(),
            updated_at: self.updated_at,
            is_fetching: self.is_fetching,
            is_invalidated: self.is_invalidated,
        }
    }
}

impl<T> fmt::Debug for QueryState<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryState")
            .field("status", &self.status)
            .field("has_data", &self.data.is_some())
            .field("error", &self.error)
            .field("is_fetching", &self.is_fetching)
            .field("is_invalidated", &self.is_invalidated)
            .finish()
    }
}

/// What a view should render for a [`QueryState`].
#[derive(Debug)]
pub enum ViewState<'a, T> {
    /// Disabled, or never fetched.
    Idle,
    /// First load with nothing to show yet.
    Loading,
    Error(&'a QueryError),
    /// Data to render; `refreshing` while a background fetch runs.
    Ready { data: &'a T, refreshing: bool },
}

impl<T: Send + Sync + 'static> QueryState<T> {
    pub(crate) fn from_snapshot(snapshot: &Snapshot) -> Self {
        let data = snapshot.data.clone().and_then(|any| match any.downcast::<T>() {
            Ok(data) => Some(data),
            Err(_) => {
                warn!(
                    expected = std::any::type_name::<T>(),
                    "Cached value has an unexpected type"
                );
                None
            }
        });
        Self {
            status: snapshot.status,
            data,
            error: snapshot.error.clone(),
            updated_at: snapshot.updated_at,
            is_fetching: snapshot.is_fetching,
            is_invalidated: snapshot.is_invalidated,
        }
    }
}

impl<T> QueryState<T> {
    pub fn is_loading(&self) -> bool {
        self.status == QueryStatus::Loading
    }

    pub fn is_success(&self) -> bool {
        self.status == QueryStatus::Success
    }

    pub fn is_error(&self) -> bool {
        self.status == QueryStatus::Error
    }

    /// Data wins over everything, so a failed or running refetch keeps
    /// showing the previous value.
    pub fn view(&self) -> ViewState<'_, T> {
        if let Some(data) = self.data.as_deref() {
            return ViewState::Ready {
                data,
                refreshing: self.is_fetching,
            };
        }
        match (&self.status, &self.error) {
            (QueryStatus::Loading, _) => ViewState::Loading,
            (_, Some(err)) => ViewState::Error(err),
            _ => ViewState::Idle,
        }
    }
}

/// A live subscription. Dropping it unsubscribes.
pub struct QueryHandle<T> {
    cache: Weak<Shared>,
    key: QueryKey,
    observer_id: u64,
    enabled: bool,
    receiver: watch::Receiver<Snapshot>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> fmt::Debug for QueryHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryHandle")
            .field("key", &self.key)
            .field("observer_id", &self.observer_id)
            .field("enabled", &self.enabled)
            .finish()
    }
}

impl<T: Send + Sync + 'static> QueryHandle<T> {
    pub(crate) fn new(
        cache: Weak<Shared>,
        key: QueryKey,
        observer_id: u64,
        enabled: bool,
        receiver: watch::Receiver<Snapshot>,
    ) -> Self {
        Self {
            cache,
            key,
            observer_id,
            enabled,
            receiver,
            _marker: PhantomData,
        }
    }

    pub fn key(&self) -> &QueryKey {
        &self.key
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Current state without waiting.
    pub fn state(&self) -> QueryState<T> {
        QueryState::from_snapshot(&self.receiver.borrow())
    }

    /// Waits for the next state change. `None` once the entry is gone.
    pub async fn changed(&mut self) -> Option<QueryState<T>> {
        self.receiver.changed().await.ok()?;
        Some(QueryState::from_snapshot(&self.receiver.borrow_and_update()))
    }

    /// Waits until no fetch is running and the entry has been fetched at
    /// least once. Returns at once for a disabled subscription.
    pub async fn settled(&mut self) -> QueryState<T> {
        if !self.enabled {
            return self.state();
        }
        let settled = self
            .receiver
            .wait_for(|s| !s.is_fetching && s.status != QueryStatus::Idle)
            .await
            .map(|s| QueryState::from_snapshot(&s));
        settled.unwrap_or_else(|_| self.state())
    }

    /// Fetches again now, unless a fetch is already running or this
    /// subscription is disabled.
    pub fn refetch(&self) {
        if !self.enabled {
            return;
        }
        if let Some(cache) = self.cache() {
            cache.refetch(&self.key);
        }
    }

    /// Toggles whether this subscription drives fetching.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
        if let Some(cache) = self.cache() {
            cache.set_enabled(&self.key, self.observer_id, enabled);
        }
    }

    pub fn unsubscribe(self) {
        drop(self);
    }

    fn cache(&self) -> Option<QueryCache> {
        self.cache.upgrade().map(QueryCache::from_shared)
    }
}

impl<T> Drop for QueryHandle<T> {
    fn drop(&mut self) {
        if let Some(shared) = self.cache.upgrade() {
            QueryCache::from_shared(shared).unsubscribe(&self.key, self.observer_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ApiError;
    use crate::query::cache::AnyValue;

    fn state(status: QueryStatus, data: Option<u32>, error: Option<QueryError>, is_fetching: bool) -> QueryState<u32> {
        QueryState {
            status,
            data: data.map(Arc::new),
            error,
            updated_at: None,
            is_fetching,
            is_invalidated: false,
        }
    }

    #[test]
    fn test_view_prefers_data() {
        let err = QueryError::RetriesExhausted {
            attempts: 2,
            last: ApiError::Timeout,
        };

        let s = state(QueryStatus::Error, Some(7), Some(err.clone()), false);
        assert!(matches!(s.view(), ViewState::Ready { data: &7, refreshing: false }));

        let s = state(QueryStatus::Loading, Some(7), None, true);
        assert!(matches!(s.view(), ViewState::Ready { data: &7, refreshing: true }));

        let s = state(QueryStatus::Loading, None, None, true);
        assert!(matches!(s.view(), ViewState::Loading));

        let s = state(QueryStatus::Error, None, Some(err), false);
        assert!(matches!(s.view(), ViewState::Error(QueryError::RetriesExhausted { attempts: 2, .. })));

        let s = state(QueryStatus::Idle, None, None, false);
        assert!(matches!(s.view(), ViewState::Idle));
    }

    #[test]
    fn test_wrong_type_yields_no_data() {
        let snapshot = Snapshot {
            status: QueryStatus::Success,
            data: Some(Arc::new("text".to_string()) as AnyValue),
            ..Snapshot::default()
        };
        let typed = QueryState::<u32>::from_snapshot(&snapshot);
        assert!(typed.is_success());
        assert!(typed.data.is_none());

        let typed = QueryState::<String>::from_snapshot(&snapshot);
        assert_eq!(typed.data.as_deref().map(String::as_str), Some("text"));
    }
}
