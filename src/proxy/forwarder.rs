//! Outbound calls to the API service.
//!
//! One attempt per request, bounded by a single timeout that covers connect,
//! send and the full response body. Failures come back as a typed
//! [`ForwardError`] so the handler never inspects error text.

use std::time::Duration;

use bytes::Bytes;
use reqwest::header::HeaderMap;
use reqwest::{redirect, Client};
use url::Url;

use crate::http::request::Method;

/// A fully built backend request.
#[derive(Debug)]
pub struct OutboundRequest {
    pub url: Url,
    pub method: Method,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
}

/// What the backend answered, before header filtering.
#[derive(Debug)]
pub struct BackendResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: Bytes,
}

#[derive(Debug, thiserror::Error)]
pub enum ForwardError {
    #[error("backend did not answer within the timeout")]
    Timeout,
    #[error("backend unreachable: {0}")]
    Network(String),
    #[error("unexpected forwarding failure: {0}")]
    Unexpected(String),
}

impl From<reqwest::Error> for ForwardError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ForwardError::Timeout
        } else if err.is_connect() || err.is_request() || err.is_body() {
            ForwardError::Network(err.to_string())
        } else {
            ForwardError::Unexpected(err.to_string())
        }
    }
}

/// Why a backend URL could not be built.
#[derive(Debug, thiserror::Error)]
pub enum TargetError {
    #[error("invalid backend URL: {0}")]
    Invalid(#[from] url::ParseError),
    #[error("request target would not reach the backend verbatim")]
    Rewritten,
}

/// Sends requests to the single configured backend.
#[derive(Debug, Clone)]
pub struct BackendForwarder {
    client: Client,
    base_url: Url,
    timeout: Duration,
}

impl BackendForwarder {
    pub fn new(base_url: Url, timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder()
            // Redirects would replay the credential to whatever host they name
            .redirect(redirect::Policy::none())
            .no_proxy()
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            base_url,
            timeout,
        })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// `{base}{backend_path}{?query}`, refused unless the parsed URL carries
    /// both parts byte-for-byte.
    ///
    /// `url` normalises special-scheme URLs on parse: it resolves dot
    /// segments, turns `\` into `/`, strips tabs and percent-encodes `'` in
    /// the query. A target it would rewrite is rejected rather than forwarded
    /// in a different spelling.
    pub fn backend_url(&self, backend_path: &str, query: Option<&str>) -> Result<Url, TargetError> {
        let base = self.base_url.as_str().trim_end_matches('/');
        let expected_path = format!("{}{}", self.base_url.path().trim_end_matches('/'), backend_path);
        let query = query.filter(|q| !q.is_empty());

        let mut target = format!("{base}{backend_path}");
        if let Some(query) = query {
            target.push('?');
            target.push_str(query);
        }
        let url = Url::parse(&target)?;

        if url.path() != expected_path || url.query() != query || url.fragment().is_some() {
            return Err(TargetError::Rewritten);
        }
        Ok(url)
    }

    pub async fn forward(&self, request: OutboundRequest) -> Result<BackendResponse, ForwardError> {
        let method = reqwest::Method::from_bytes(request.method.as_str().as_bytes())
            .map_err(|e| ForwardError::Unexpected(e.to_string()))?;

        let mut builder = self
            .client
            .request(method, request.url)
            .headers(request.headers);

        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let body = response.bytes().await?;

        Ok(BackendResponse {
            status,
            headers,
            body,
        })
    }
}
