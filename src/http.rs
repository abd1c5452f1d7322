//! Thin JSON-over-HTTP layer.
//!
//! [`HttpClient::request`] is the only place that talks to the network. It
//! attaches the bearer credential when one is supplied, treats any non-2xx
//! status as [`Error::RequestFailed`] without reading the body, and never
//! retries.

use reqwest::Method;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::model::Credential;

/// Passed as `body` for requests that carry none.
pub const NO_BODY: Option<&()> = None;

#[derive(Debug, Clone)]
pub struct HttpClient {
    inner: reqwest::Client,
    base_url: String,
}

impl HttpClient {
    /// Builds a client for `config.base_url`.
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let inner = reqwest::Client::builder()
            .user_agent(&config.user_agent)
            .build()
            .map_err(|err| Error::Config(err.to_string()))?;
        Ok(Self {
            inner,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Sends one request and returns the decoded JSON body.
    ///
    /// An empty success body (as some `DELETE` handlers return) decodes to
    /// [`Value::Null`].
    pub async fn request<B>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
        credential: Option<&Credential>,
    ) -> Result<Value>
    where
        B: Serialize + ?Sized,
    {
        let url = format!("{}{}", self.base_url, path);
        let mut builder = self.inner.request(method.clone(), &url);
        if let Some(credential) = credential {
            builder = builder.bearer_auth(credential.expose());
        }
        if let Some(body) = body {
            builder = builder.json(body);
        }

        debug!(%method, path, authenticated = credential.is_some(), "Sending request");
        let network_failure = |err: reqwest::Error| Error::NetworkFailure {
            method: method.clone(),
            path: path.to_string(),
            reason: err.to_string(),
        };

        let response = builder.send().await.map_err(network_failure)?;
        let status = response.status();
        if !status.is_success() {
            warn!(%method, path, status = status.as_u16(), "Request failed");
            return Err(Error::RequestFailed {
                method: method.clone(),
                path: path.to_string(),
                status: status.as_u16(),
            });
        }

        let bytes = response.bytes().await.map_err(network_failure)?;
        debug!(%method, path, status = status.as_u16(), len = bytes.len(), "Request succeeded");
        if bytes.is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Like [`request`](Self::request), decoding the body into `T`.
    pub async fn send<T, B>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
        credential: Option<&Credential>,
    ) -> Result<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let value = self.request(method, path, body, credential).await?;
        Ok(serde_json::from_value(value)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, Request, ResponseTemplate};

    fn client_for(server: &MockServer) -> HttpClient {
        HttpClient::new(&ClientConfig::new(server.uri())).unwrap()
    }

    #[tokio::test]
    async fn test_attaches_bearer_credential() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/auth/posts/1"))
            .and(header("Authorization", "Bearer tok-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": 1 })))
            .expect(1)
            .mount(&server)
            .await;

        let value = client_for(&server)
            .request(Method::GET, "/auth/posts/1", NO_BODY, Some(&Credential::new("tok-1")))
            .await
            .unwrap();
        assert_eq!(value, json!({ "id": 1 }));
    }

    #[tokio::test]
    async fn test_omits_header_without_credential() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/login"))
            .and(body_json(json!({ "username": "u", "password": "p" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "ok": true })))
            .expect(1)
            .mount(&server)
            .await;

        client_for(&server)
            .request(
                Method::POST,
                "/auth/login",
                Some(&json!({ "username": "u", "password": "p" })),
                None,
            )
            .await
            .unwrap();

        let requests: Vec<Request> = server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 1);
        assert!(!requests[0].headers.contains_key("authorization"));
    }

    #[tokio::test]
    async fn test_non_success_is_request_failed() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/auth/posts/9"))
            .respond_with(ResponseTemplate::new(404).set_body_string("not json at all"))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .request(Method::DELETE, "/auth/posts/9", NO_BODY, Some(&Credential::new("t")))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            Error::RequestFailed {
                method: Method::DELETE,
                path: "/auth/posts/9".to_string(),
                status: 404,
            }
        );
    }

    #[tokio::test]
    async fn test_empty_body_is_null() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;

        let value = client_for(&server)
            .request(Method::DELETE, "/auth/posts/2", NO_BODY, None)
            .await
            .unwrap();
        assert_eq!(value, Value::Null);
    }

    #[tokio::test]
    async fn test_malformed_body_is_decode_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{ nope"))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .request(Method::GET, "/auth/posts", NO_BODY, None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Decode(_)));
    }

    #[tokio::test]
    async fn test_unreachable_host_is_network_failure() {
        // Nothing listens on the discard port on loopback.
        let client = HttpClient::new(&ClientConfig::new("http://127.0.0.1:9")).unwrap();
        let err = client
            .request(Method::GET, "/auth/posts", NO_BODY, None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NetworkFailure { .. }));
    }

    #[test]
    fn test_base_url_trailing_slash() {
        let client = HttpClient::new(&ClientConfig::new("http://example.test/")).unwrap();
        assert_eq!(client.base_url(), "http://example.test");
    }
}
