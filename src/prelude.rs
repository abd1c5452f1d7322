//! Prelude module for convenient imports.
//!
//! ```
//! use postboard::prelude::*;
//! ```
//!
//! # What's included
//!
//! - [`PostsClient`] - The client context
//! - [`ClientConfig`] and [`QueryConfig`] - Configuration
//! - [`CacheEntry`] and [`Fingerprint`] - What the cache hands out and how it is keyed
//! - [`MutationState`] - The outcome of the latest write
//! - [`SessionState`] - The login state
//! - The post data model and [`Error`]

pub use crate::client::PostsClient;
pub use crate::config::ClientConfig;
pub use crate::error::{Error, Result};
pub use crate::model::{CreatePostRequest, Post, PostId, PostList, SearchParams, User};
pub use crate::mutation::MutationState;
pub use crate::query::{CacheEntry, Fingerprint, QueryConfig};
pub use crate::session::SessionState;
