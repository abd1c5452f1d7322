use std::fmt;

use crate::model::{PostId, SearchParams};

/// Structural cache key: a resource tag plus its parameters.
///
/// Two fingerprints hit the same entry iff they are equal; list and search are
/// distinct resources even though both are served from `/auth/posts`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Fingerprint {
    /// `GET /auth/posts`
    PostList,
    /// `GET /auth/posts?skip=&limit=`
    PostSearch(SearchParams),
    /// `GET /auth/posts/{id}`
    Post(PostId),
}

impl Fingerprint {
    pub const fn search(skip: u64, limit: u64) -> Self {
        Self::PostSearch(SearchParams::new(skip, limit))
    }

    /// The resource tag, without parameters.
    pub const fn resource(&self) -> &'static str {
        match self {
            Self::PostList => "list",
            Self::PostSearch(_) => "search",
            Self::Post(_) => "by-id",
        }
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PostList => f.write_str("posts/list"),
            Self::PostSearch(params) => {
                write!(f, "posts/search?skip={}&limit={}", params.skip, params.limit)
            }
            Self::Post(id) => write!(f, "posts/{id}"),
        }
    }
}
