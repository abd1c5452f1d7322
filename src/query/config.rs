use std::time::Duration;

/// Configuration for query cache behavior.
///
/// This controls when cached data is considered stale and how long idle
/// entries are kept.
#[derive(Debug, Clone)]
pub struct QueryConfig {
    /// How long data is considered fresh before becoming stale.
    ///
    /// `None` means data never goes stale by age; only an explicit
    /// invalidation makes the next read refetch.
    pub stale_time: Option<Duration>,

    /// How long an idle entry is retained before garbage collection removes it.
    ///
    /// An entry is idle when it has not been read and has no fetch in flight.
    pub cache_time: Duration,

    /// Capacity of the event channel. Listeners that fall further behind lose
    /// the oldest events.
    pub event_capacity: usize,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            stale_time: None,
            cache_time: Duration::from_secs(5 * 60), // 5 minutes
            event_capacity: 100,
        }
    }
}

impl QueryConfig {
    /// Creates a new query configuration with the given stale and cache times.
    #[must_use]
    pub fn new(stale_time: Option<Duration>, cache_time: Duration) -> Self {
        Self {
            stale_time,
            cache_time,
            ..Self::default()
        }
    }

    #[must_use]
    pub const fn with_stale_time(mut self, stale_time: Duration) -> Self {
        self.stale_time = Some(stale_time);
        self
    }

    #[must_use]
    pub const fn with_cache_time(mut self, cache_time: Duration) -> Self {
        self.cache_time = cache_time;
        self
    }
}
