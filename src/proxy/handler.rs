//! The `/api/v1/*` catch-all.
//!
//! Checks run in a fixed order and the first failure decides the response:
//!
//! ```text
//! route → method → service key → session → exclusion → forward
//!  404      405        500          401        403      400/504/502/500
//! ```
//!
//! A request that passes every check is forwarded once. The browser gets the
//! backend's status and body untouched, with headers cut down to the
//! allow-list.

use secrecy::SecretString;

use crate::auth::SessionValidator;
use crate::config::BackendConfig;
use crate::error::ProxyError;
use crate::http::request::{Method, Request};
use crate::http::response::{Response, ResponseBuilder, StatusCode};
use crate::proxy::forwarder::{BackendForwarder, ForwardError, OutboundRequest, TargetError};
use crate::proxy::headers;
use crate::proxy::policy::{self, ProxyDecision};

pub struct ProxyHandler<V> {
    sessions: V,
    forwarder: BackendForwarder,
    service_key: Option<SecretString>,
}

impl<V: SessionValidator> ProxyHandler<V> {
    pub fn new(backend: BackendConfig, sessions: V) -> anyhow::Result<Self> {
        if backend.service_key.is_none() {
            tracing::warn!("BACKEND_SERVICE_KEY not configured; proxied requests will fail");
        }
        Ok(Self {
            sessions,
            forwarder: BackendForwarder::new(backend.url, backend.timeout)?,
            service_key: backend.service_key,
        })
    }

    /// Handles one browser request. Never fails: every error becomes a JSON
    /// error response.
    pub async fn handle(&self, request: Request) -> Response {
        match self.proxy(request).await {
            Ok(response) => response,
            Err(err) => err.into_response(),
        }
    }

    async fn proxy(&self, request: Request) -> Result<Response, ProxyError> {
        let segments = policy::route_segments(request.uri_path()).ok_or(ProxyError::NotFound)?;

        if !policy::is_method_allowed(&request.method) {
            return Err(ProxyError::MethodNotAllowed);
        }

        let Some(service_key) = &self.service_key else {
            tracing::error!(
                method = %request.method,
                path = %request.uri_path(),
                "BACKEND_SERVICE_KEY not configured"
            );
            return Err(ProxyError::ServiceMisconfigured);
        };

        let Some(identity) = self.sessions.validate(&request).await else {
            tracing::debug!(method = %request.method, path = %request.uri_path(), "No valid session");
            return Err(ProxyError::Unauthenticated);
        };

        let backend_path = match policy::classify(&request.method, &segments) {
            ProxyDecision::Allowed(path) => path,
            ProxyDecision::PathExcluded => {
                tracing::debug!(method = %request.method, path = %request.uri_path(), "Excluded path");
                return Err(ProxyError::PathExcluded);
            }
            ProxyDecision::MethodNotAllowed => return Err(ProxyError::MethodNotAllowed),
        };

        let url = self
            .forwarder
            .backend_url(&backend_path, request.query())
            .map_err(|e| match &e {
                TargetError::Rewritten => {
                    tracing::debug!(method = %request.method, path = %backend_path, "Non-canonical request target");
                    ProxyError::BadRequest
                }
                TargetError::Invalid(_) => {
                    tracing::error!(method = %request.method, path = %backend_path, error = %e, "Invalid backend URL");
                    ProxyError::Internal
                }
            })?;

        let outbound_headers = headers::outbound_headers(&request, &identity, service_key).map_err(|e| {
            tracing::error!(method = %request.method, path = %backend_path, error = %e, "Cannot build backend headers");
            ProxyError::Internal
        })?;

        let method = request.method.clone();
        let body = Some(request.body)
            .filter(|body| method.carries_body() && !body.is_empty());

        let outbound = OutboundRequest {
            url,
            method,
            headers: outbound_headers,
            body,
        };

        let backend = self.forwarder.forward(outbound).await.map_err(|err| {
            self.log_forward_error(&request.method, &backend_path, &err);
            ProxyError::from(&err)
        })?;

        let status = StatusCode::from_u16(backend.status).ok_or_else(|| {
            tracing::error!(method = %request.method, path = %backend_path, status = backend.status, "Backend returned invalid status");
            ProxyError::Internal
        })?;

        tracing::info!(
            method = %request.method,
            path = %backend_path,
            status = backend.status,
            user = %identity.email,
            "Request forwarded"
        );

        let mut response = ResponseBuilder::new(status).body(backend.body);
        for (name, value) in headers::filter_response_headers(&backend.headers) {
            response = response.header(name, value);
        }
        Ok(response.build())
    }

    fn log_forward_error(&self, method: &Method, path: &str, err: &ForwardError) {
        match err {
            ForwardError::Timeout => tracing::error!(
                method = %method,
                path = %path,
                timeout_ms = self.forwarder.timeout().as_millis() as u64,
                "Backend timeout"
            ),
            ForwardError::Network(detail) => tracing::error!(
                method = %method,
                path = %path,
                error = %detail,
                "Backend network error"
            ),
            ForwardError::Unexpected(detail) => tracing::error!(
                method = %method,
                path = %path,
                error = %detail,
                "Unexpected proxy error"
            ),
        }
    }
}
