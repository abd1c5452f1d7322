//! # Postboard - Blog-post API client
//!
//! Postboard is a client-side data layer for a blog-post REST service. It pairs
//! a typed HTTP client with a query cache in the spirit of SWR and TanStack
//! Query: reads are served from the cache and coalesced per request, writes
//! reconcile the cache instead of refetching everything.
//!
//! ## Core Components
//!
//! - [`PostsClient`](client::PostsClient): the context handed to presentation code
//! - [`SessionStore`](session::SessionStore): login state machine holding the credential
//! - [`QueryCache`](query::QueryCache): coalescing cache keyed by [`Fingerprint`](query::Fingerprint)
//! - [`Mutation`](mutation::Mutation): writes plus their cache reconciliation
//! - [`PostsApi`](api::PostsApi): one typed call per endpoint
//!
//! ## Example
//!
//! ```rust,no_run
//! use postboard::prelude::*;
//!
//! # async fn run() -> postboard::Result<()> {
//! let client = PostsClient::new(&ClientConfig::default())?;
//! client.login("emilys", "emilyspass").await?;
//!
//! let posts = client.fetch_posts().await?;
//! if let Some(list) = posts.data {
//!     println!("{} posts", list.total);
//! }
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod model;
pub mod mutation;
pub mod prelude;
pub mod query;
pub mod session;
pub mod subscription;

pub use error::{Error, Result};
