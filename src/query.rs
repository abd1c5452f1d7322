//! Query cache with coalescing, invalidation and change notification.
//!
//! This module mediates between presentation code and the remote API, similar
//! to SWR or TanStack Query.
//!
//! # Design Pattern: Read-through Snapshots
//!
//! Every cache entry is keyed by a [`Fingerprint`] and stored as an immutable
//! snapshot; each transition replaces the snapshot and emits one
//! [`CacheEvent`]. Reading never blocks on the network:
//!
//! 1. If no entry exists, or the entry is stale, a fetch is started and the
//!    entry is marked in-flight
//! 2. Reads issued while that fetch runs do not start another one
//! 3. When the fetch completes its outcome is stored: data on success, the
//!    error (next to the previous data) on failure
//!
//! Writes that already know the new value use [`QueryCache::seed`] or
//! [`QueryCache::update`] instead of paying for a refetch; writes that don't
//! use [`QueryCache::invalidate`].
//!
//! # Example
//!
//! ```rust,ignore
//! use postboard::query::{Fingerprint, QueryCache};
//!
//! let cache = QueryCache::new();
//! let entry = cache.read(&Fingerprint::PostList, move || {
//!     Box::pin(async move { api.list_posts(&credential).await })
//! });
//! if entry.is_loading() {
//!     // render a spinner; a `FetchSucceeded` event follows
//! }
//! ```

mod cache;
mod config;
mod entry;
mod fingerprint;

pub use cache::{CacheEvent, CacheEventKind, QueryCache};
pub use config::QueryConfig;
pub use entry::CacheEntry;
pub use fingerprint::Fingerprint;
