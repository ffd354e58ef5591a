//! Client-facing failure taxonomy.
//!
//! Every way a proxied request can fail ends as one of these variants. The
//! `Display` text is exactly what the browser receives, so it must never carry
//! backend detail.

use crate::http::response::{Response, StatusCode};
use crate::proxy::forwarder::ForwardError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ProxyError {
    #[error("Not found")]
    NotFound,
    #[error("Method not allowed")]
    MethodNotAllowed,
    #[error("Service configuration error")]
    ServiceMisconfigured,
    #[error("Authentication required")]
    Unauthenticated,
    #[error("This endpoint is not available through the proxy")]
    PathExcluded,
    #[error("Bad request")]
    BadRequest,
    #[error("Backend request timed out")]
    BackendTimeout,
    #[error("Backend service unavailable")]
    BackendUnavailable,
    #[error("Internal proxy error")]
    Internal,
}

impl ProxyError {
    pub fn status(&self) -> StatusCode {
        match self {
            ProxyError::NotFound => StatusCode::NOT_FOUND,
            ProxyError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            ProxyError::ServiceMisconfigured => StatusCode::INTERNAL_SERVER_ERROR,
            ProxyError::Unauthenticated => StatusCode::UNAUTHORIZED,
            ProxyError::PathExcluded => StatusCode::FORBIDDEN,
            ProxyError::BadRequest => StatusCode::BAD_REQUEST,
            ProxyError::BackendTimeout => StatusCode::GATEWAY_TIMEOUT,
            ProxyError::BackendUnavailable => StatusCode::BAD_GATEWAY,
            ProxyError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// `{"error": "<message>"}` with the matching status.
    pub fn into_response(self) -> Response {
        Response::json_error(self.status(), &self.to_string())
    }
}

impl From<&ForwardError> for ProxyError {
    fn from(err: &ForwardError) -> Self {
        match err {
            ForwardError::Timeout => ProxyError::BackendTimeout,
            ForwardError::Network(_) => ProxyError::BackendUnavailable,
            ForwardError::Unexpected(_) => ProxyError::Internal,
        }
    }
}
