use std::any::Any;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::error::Error;

/// Type-erased cached value.
pub(crate) type Data = Arc<dyn Any + Send + Sync>;

/// A snapshot of one cache entry, as seen by readers.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry<T> {
    /// Last successfully fetched or seeded data.
    pub data: Option<T>,
    /// Error of the most recent fetch, cleared by the next success.
    pub error: Option<Error>,
    /// Whether a fetch is currently in flight.
    pub is_fetching: bool,
    /// Whether the next read will refetch.
    pub is_stale: bool,
    /// When `data` was last written.
    pub updated_at: Option<Instant>,
}

impl<T> CacheEntry<T> {
    /// Returns `true` while the very first fetch is running.
    pub const fn is_loading(&self) -> bool {
        self.is_fetching && self.data.is_none()
    }

    /// Returns `true` if the last fetch failed.
    pub const fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// The stored form of a [`CacheEntry`].
///
/// Snapshots are never modified once stored; every transition builds a new one
/// and swaps it in.
#[derive(Clone)]
pub(crate) struct Snapshot {
    pub data: Option<Data>,
    pub error: Option<Error>,
    pub is_fetching: bool,
    pub is_stale: bool,
    pub updated_at: Option<Instant>,
}

impl Snapshot {
    /// An entry that has never held data.
    pub const fn empty() -> Self {
        Self {
            data: None,
            error: None,
            is_fetching: false,
            is_stale: false,
            updated_at: None,
        }
    }

    /// A fresh entry holding `data`.
    pub fn with_data(data: Data) -> Self {
        Self {
            data: Some(data),
            error: None,
            is_fetching: false,
            is_stale: false,
            updated_at: Some(Instant::now()),
        }
    }

    /// Checks if this entry should be refetched on read.
    pub fn needs_fetch(&self, stale_time: Option<Duration>) -> bool {
        if self.is_fetching {
            return false;
        }
        if self.is_stale {
            return true;
        }
        match (stale_time, self.updated_at) {
            (Some(stale_time), Some(updated_at)) => updated_at.elapsed() > stale_time,
            _ => false,
        }
    }

    /// Views the snapshot as typed data. Data of another type reads as absent.
    pub fn view<T: Clone + 'static>(&self) -> CacheEntry<T> {
        CacheEntry {
            data: self.typed::<T>().cloned(),
            error: self.error.clone(),
            is_fetching: self.is_fetching,
            is_stale: self.is_stale,
            updated_at: self.updated_at,
        }
    }

    pub fn typed<T: 'static>(&self) -> Option<&T> {
        self.data.as_ref().and_then(|data| data.downcast_ref::<T>())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;

    #[test]
    fn test_empty_snapshot() {
        let snapshot = Snapshot::empty();
        let entry = snapshot.view::<i32>();
        assert_eq!(entry.data, None);
        assert!(!entry.is_loading());
        assert!(!snapshot.needs_fetch(None));
    }

    #[test]
    fn test_with_data() {
        let snapshot = Snapshot::with_data(Arc::new(42));
        let entry = snapshot.view::<i32>();
        assert_eq!(entry.data, Some(42));
        assert!(!entry.is_stale);
        assert!(entry.updated_at.is_some());
    }

    #[test]
    fn test_view_with_wrong_type() {
        let snapshot = Snapshot::with_data(Arc::new(42));
        assert_eq!(snapshot.view::<String>().data, None);
    }

    #[test]
    fn test_needs_fetch_when_stale() {
        let mut snapshot = Snapshot::with_data(Arc::new(42));
        assert!(!snapshot.needs_fetch(None));
        snapshot.is_stale = true;
        assert!(snapshot.needs_fetch(None));
        snapshot.is_fetching = true;
        assert!(!snapshot.needs_fetch(None));
    }

    #[test]
    fn test_needs_fetch_by_age() {
        let snapshot = Snapshot::with_data(Arc::new(42));
        assert!(!snapshot.needs_fetch(Some(Duration::from_secs(1))));
        sleep(Duration::from_millis(10));
        assert!(snapshot.needs_fetch(Some(Duration::from_millis(5))));
    }

    #[test]
    fn test_is_loading() {
        let entry: CacheEntry<i32> = CacheEntry {
            data: None,
            error: None,
            is_fetching: true,
            is_stale: false,
            updated_at: None,
        };
        assert!(entry.is_loading());

        let refetching = CacheEntry {
            data: Some(1),
            ..entry
        };
        assert!(!refetching.is_loading());
    }
}
