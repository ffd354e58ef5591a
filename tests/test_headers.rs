//! Tests for outbound header construction and response header filtering

use pulse_bff::auth::Identity;
use pulse_bff::http::request::{Method, Request, RequestBuilder};
use pulse_bff::proxy::headers::{
    client_ip, filter_response_headers, forwarded_host, outbound_headers, request_id,
};
use reqwest::header::{HeaderMap, HeaderValue};
use secrecy::SecretString;

fn request(headers: &[(&str, &str)]) -> Request {
    headers
        .iter()
        .fold(
            RequestBuilder::new().method(Method::GET).path("/api/v1/x"),
            |builder, (name, value)| builder.header(name, *value),
        )
        .build()
        .unwrap()
}

#[test]
fn test_outbound_headers_full_set() {
    let req = request(&[
        ("Host", "dashboard.pulsebiz.io:443"),
        ("X-Forwarded-For", "203.0.113.7, 10.0.0.2"),
        ("X-Request-ID", "trace-123"),
        ("Content-Type", "application/json"),
        ("Accept", "application/json"),
        ("Cookie", "pulse.session-token=abc"),
        ("User-Agent", "Mozilla/5.0"),
    ]);
    let key = SecretString::from("svc-key");

    let headers = outbound_headers(&req, &Identity::new("a@bursor.com"), &key).unwrap();

    assert_eq!(headers.get("x-api-key").unwrap(), "svc-key");
    assert!(headers.get("x-api-key").unwrap().is_sensitive());
    assert_eq!(headers.get("x-forwarded-user-email").unwrap(), "a@bursor.com");
    assert_eq!(headers.get("x-forwarded-user-ip").unwrap(), "203.0.113.7, 10.0.0.2");
    assert_eq!(headers.get("x-request-id").unwrap(), "trace-123");
    assert_eq!(headers.get("x-forwarded-host").unwrap(), "dashboard.pulsebiz.io");
    assert_eq!(headers.get("x-forwarded-proto").unwrap(), "https");
    assert_eq!(headers.get("content-type").unwrap(), "application/json");
    assert_eq!(headers.get("accept").unwrap(), "application/json");
    assert!(headers.get("cookie").is_none());
    assert!(headers.get("user-agent").is_none());
    assert_eq!(headers.len(), 8);
}

#[test]
fn test_outbound_headers_minimal_request() {
    let req = request(&[]);
    let key = SecretString::from("svc-key");

    let headers = outbound_headers(&req, &Identity::new("a@bursor.com"), &key).unwrap();

    assert!(headers.get("content-type").is_none());
    assert!(headers.get("accept").is_none());
    assert_eq!(headers.get("x-forwarded-user-ip").unwrap(), "unknown");
    assert_eq!(headers.get("x-forwarded-host").unwrap(), "localhost");
    assert_eq!(headers.len(), 6);
}

#[test]
fn test_outbound_headers_reject_control_characters() {
    let req = request(&[]);
    let key = SecretString::from("svc-key");

    let result = outbound_headers(&req, &Identity::new("a@b.com\nx: y"), &key);

    assert!(result.is_err());
}

#[test]
fn test_client_ip_fallback_chain() {
    assert_eq!(client_ip(&request(&[("x-forwarded-for", "198.51.100.1")])), "198.51.100.1");
    assert_eq!(client_ip(&request(&[("x-real-ip", "198.51.100.2")])), "198.51.100.2");
    assert_eq!(
        client_ip(&request(&[("x-forwarded-for", "  "), ("x-real-ip", "198.51.100.3")])),
        "198.51.100.3"
    );
    assert_eq!(client_ip(&request(&[])), "unknown");
}

#[test]
fn test_request_id_generated_when_absent() {
    let first = request_id(&request(&[]));
    let second = request_id(&request(&[]));

    assert_ne!(first, second);
    assert!(uuid::Uuid::parse_str(&first).is_ok());
    assert_eq!(request_id(&request(&[("x-request-id", "keep-me")])), "keep-me");
}

#[test]
fn test_forwarded_host_strips_port() {
    assert_eq!(forwarded_host(&request(&[("host", "app.pulsebiz.io:3000")])), "app.pulsebiz.io");
    assert_eq!(forwarded_host(&request(&[("host", "[::1]:8080")])), "[::1]");
    assert_eq!(forwarded_host(&request(&[("host", "App.PulseBiz.io")])), "app.pulsebiz.io");
}

#[test]
fn test_filter_response_headers_allow_list_only() {
    let mut backend = HeaderMap::new();
    backend.insert("content-type", HeaderValue::from_static("application/json"));
    backend.insert("x-total-count", HeaderValue::from_static("120"));
    backend.insert("x-page", HeaderValue::from_static("3"));
    backend.insert("x-per-page", HeaderValue::from_static("40"));
    backend.insert("x-request-id", HeaderValue::from_static("r-1"));
    backend.insert("x-internal-secret", HeaderValue::from_static("hunter2"));
    backend.insert("server", HeaderValue::from_static("uvicorn"));
    backend.insert("x-upstream-host", HeaderValue::from_static("10.2.3.4"));

    let filtered = filter_response_headers(&backend);

    assert_eq!(filtered.len(), 5);
    assert_eq!(filtered["x-total-count"], "120");
    assert!(!filtered.contains_key("x-internal-secret"));
    assert!(!filtered.contains_key("server"));
    assert!(!filtered.contains_key("x-upstream-host"));
}

#[test]
fn test_filter_response_headers_skips_unset_and_empty() {
    let mut backend = HeaderMap::new();
    backend.insert("x-page", HeaderValue::from_static(""));
    backend.append("x-request-id", HeaderValue::from_static("a"));
    backend.append("x-request-id", HeaderValue::from_static("b"));

    let filtered = filter_response_headers(&backend);

    assert_eq!(filtered.len(), 1);
    assert_eq!(filtered["x-request-id"], "a, b");
}
