use std::time::Duration;

/// Per-subscription cache policy.
///
/// Every knob is set per call site; two views may subscribe to the same key
/// with different windows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryPolicy {
    /// How long a successful value counts as fresh.
    pub stale_time: Duration,
    /// How long an entry outlives its last subscriber.
    pub gc_time: Duration,
    /// Unconditional refetch period while subscribed.
    pub refetch_interval: Option<Duration>,
    /// Extra attempts after the first failure.
    pub retry: u32,
    pub retry_delay: Duration,
    /// Disabled subscriptions never fetch.
    pub enabled: bool,
}

impl Default for QueryPolicy {
    fn default() -> Self {
        Self {
            stale_time: Duration::ZERO,
            gc_time: Duration::from_secs(5 * 60),
            refetch_interval: None,
            retry: 1,
            retry_delay: Duration::from_secs(1),
            enabled: true,
        }
    }
}

impl QueryPolicy {
    pub fn stale_time(mut self, stale_time: Duration) -> Self {
        self.stale_time = stale_time;
        self
    }

    pub fn gc_time(mut self, gc_time: Duration) -> Self {
        self.gc_time = gc_time;
        self
    }

    pub fn refetch_interval(mut self, interval: Duration) -> Self {
        self.refetch_interval = Some(interval);
        self
    }

    pub fn retry(mut self, retry: u32, retry_delay: Duration) -> Self {
        self.retry = retry;
        self.retry_delay = retry_delay;
        self
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}
