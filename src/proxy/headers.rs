//! Header projection across the proxy boundary.
//!
//! Outbound, the backend sees a header set built from scratch: the service
//! credential, audit and tracing headers, plus `Content-Type`/`Accept` copied
//! from the browser. No other inbound header crosses.
//!
//! Inbound, only [`RESPONSE_HEADER_ALLOW_LIST`] survives. Anything else the
//! backend sets, now or in the future, is dropped.

use std::collections::HashMap;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, CONTENT_TYPE};
use secrecy::{ExposeSecret, SecretString};

use crate::auth::Identity;
use crate::http::request::Request;

pub const SERVICE_KEY_HEADER: &str = "x-api-key";
pub const USER_EMAIL_HEADER: &str = "x-forwarded-user-email";
pub const USER_IP_HEADER: &str = "x-forwarded-user-ip";
pub const REQUEST_ID_HEADER: &str = "x-request-id";
pub const FORWARDED_HOST_HEADER: &str = "x-forwarded-host";
pub const FORWARDED_PROTO_HEADER: &str = "x-forwarded-proto";

pub const UNKNOWN_CLIENT_IP: &str = "unknown";
const FALLBACK_HOST: &str = "localhost";

/// Backend response headers the browser is allowed to see.
pub const RESPONSE_HEADER_ALLOW_LIST: &[&str] = &[
    "content-type",
    "x-total-count",
    "x-page",
    "x-per-page",
    "x-request-id",
];

#[derive(Debug, thiserror::Error)]
#[error("header {name} has a value that cannot be sent")]
pub struct InvalidHeader {
    pub name: &'static str,
}

/// Builds the complete header set for the backend call.
///
/// The credential value is flagged sensitive, so `HeaderMap`'s `Debug`
/// output redacts it.
pub fn outbound_headers(
    request: &Request,
    identity: &Identity,
    service_key: &SecretString,
) -> Result<HeaderMap, InvalidHeader> {
    let mut headers = HeaderMap::new();

    let mut key = value_for(SERVICE_KEY_HEADER, service_key.expose_secret())?;
    key.set_sensitive(true);
    headers.insert(HeaderName::from_static(SERVICE_KEY_HEADER), key);

    insert(&mut headers, USER_EMAIL_HEADER, &identity.email)?;
    insert(&mut headers, USER_IP_HEADER, &client_ip(request))?;
    insert(&mut headers, REQUEST_ID_HEADER, &request_id(request))?;
    insert(&mut headers, FORWARDED_HOST_HEADER, &forwarded_host(request))?;
    insert(&mut headers, FORWARDED_PROTO_HEADER, "https")?;

    if let Some(content_type) = request.header("content-type") {
        headers.insert(CONTENT_TYPE, value_for("content-type", content_type)?);
    }
    if let Some(accept) = request.header("accept") {
        headers.insert(ACCEPT, value_for("accept", accept)?);
    }

    Ok(headers)
}

/// Best-effort browser address from the fronting proxy's headers.
pub fn client_ip(request: &Request) -> String {
    ["x-forwarded-for", "x-real-ip"]
        .iter()
        .filter_map(|name| request.header(name))
        .map(str::trim)
        .find(|value| !value.is_empty())
        .unwrap_or(UNKNOWN_CLIENT_IP)
        .to_string()
}

/// Inbound correlation id, or a fresh one.
pub fn request_id(request: &Request) -> String {
    request
        .header(REQUEST_ID_HEADER)
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string())
}

/// Browser-facing hostname: the `Host` header without its port.
pub fn forwarded_host(request: &Request) -> String {
    let host = request.header("host").map(str::trim).unwrap_or("");
    let hostname = if host.starts_with('[') {
        // IPv6 literal keeps its brackets
        match host.find(']') {
            Some(end) => &host[..=end],
            None => host,
        }
    } else {
        host.split(':').next().unwrap_or("")
    };

    if hostname.is_empty() {
        FALLBACK_HOST.to_string()
    } else {
        hostname.to_ascii_lowercase()
    }
}

/// Keeps the allow-listed headers the backend actually set. Repeated values
/// are joined with `", "`; empty values are dropped.
pub fn filter_response_headers(backend: &HeaderMap) -> HashMap<String, String> {
    RESPONSE_HEADER_ALLOW_LIST
        .iter()
        .filter_map(|name| {
            let value = backend
                .get_all(*name)
                .iter()
                .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned())
                .filter(|v| !v.is_empty())
                .collect::<Vec<_>>()
                .join(", ");
            (!value.is_empty()).then(|| (name.to_string(), value))
        })
        .collect()
}

fn insert(headers: &mut HeaderMap, name: &'static str, value: &str) -> Result<(), InvalidHeader> {
    headers.insert(HeaderName::from_static(name), value_for(name, value)?);
    Ok(())
}

fn value_for(name: &'static str, value: &str) -> Result<HeaderValue, InvalidHeader> {
    HeaderValue::from_bytes(value.as_bytes()).map_err(|_| InvalidHeader { name })
}
