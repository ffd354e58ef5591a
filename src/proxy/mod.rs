//! Backend-for-frontend proxy
//!
//! Everything between the browser-facing HTTP layer and the API service:
//! which requests may pass, what headers cross in each direction, and the
//! outbound call itself.

pub mod forwarder;
pub mod handler;
pub mod headers;
pub mod policy;

pub use forwarder::{BackendForwarder, BackendResponse, ForwardError, OutboundRequest, TargetError};
pub use handler::ProxyHandler;
pub use policy::ProxyDecision;
