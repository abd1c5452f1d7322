use crate::query::QueryConfig;

/// Default remote service.
pub const DEFAULT_BASE_URL: &str = "https://dummyjson.com";

/// Configuration for a [`PostsClient`](crate::client::PostsClient).
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Scheme and authority of the remote service; endpoint paths are appended to it.
    pub base_url: String,

    /// Sent as `User-Agent` on every request.
    pub user_agent: String,

    /// Cache behaviour.
    pub query: QueryConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            user_agent: concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")).to_string(),
            query: QueryConfig::default(),
        }
    }
}

impl ClientConfig {
    /// Creates a configuration for the given service with default cache behaviour.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_query(mut self, query: QueryConfig) -> Self {
        self.query = query;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_default_config() {
        let config = ClientConfig::default();
        assert_eq!(config.base_url, "https://dummyjson.com");
        assert!(config.user_agent.starts_with("postboard/"));
        assert_eq!(config.query.stale_time, None);
    }

    #[test]
    fn test_builder() {
        let query = QueryConfig::default().with_stale_time(Duration::from_secs(30));
        let config = ClientConfig::new("http://localhost:8080").with_query(query);
        assert_eq!(config.base_url, "http://localhost:8080");
        assert_eq!(config.query.stale_time, Some(Duration::from_secs(30)));
    }
}
