//! Which requests may be forwarded, and where to.

use percent_encoding::percent_decode_str;

use crate::http::request::Method;

/// Route prefix and backend API root; the catch-all serves everything below it.
pub const API_ROOT: &str = "/api/v1/";

pub const ALLOWED_METHODS: &[Method] = &[
    Method::GET,
    Method::POST,
    Method::PUT,
    Method::PATCH,
    Method::DELETE,
];

/// Backend paths the BFF serves itself and must never forward.
pub const EXCLUDED_PATHS: &[&str] = &["/api/v1/auth/google"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProxyDecision {
    Allowed(String),
    MethodNotAllowed,
    PathExcluded,
}

/// Splits a request path into catch-all segments.
///
/// `None` means the path is not routed to the proxy at all: it is outside
/// [`API_ROOT`], has no segments, or spells a segment in a way the backend
/// URL would not carry verbatim. That covers bytes outside RFC 3986 `pchar`
/// (`\`, whitespace, controls, non-ASCII) and dot segments, raw or
/// percent-encoded.
pub fn route_segments(path: &str) -> Option<Vec<String>> {
    let rest = path.strip_prefix(API_ROOT)?;
    let segments: Vec<String> = rest
        .split('/')
        .filter(|segment| !segment.is_empty())
        .map(str::to_string)
        .collect();

    if segments.is_empty() || !segments.iter().all(|segment| is_canonical_segment(segment)) {
        None
    } else {
        Some(segments)
    }
}

fn is_canonical_segment(segment: &str) -> bool {
    if !segment.bytes().all(is_pchar) {
        return false;
    }
    let decoded = percent_decode_str(segment).decode_utf8_lossy();
    !decoded
        .split(['/', '\\'])
        .any(|part| part == "." || part == "..")
}

/// RFC 3986 `pchar`, with `%` standing in for a pct-encoded triplet.
fn is_pchar(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b"-._~!$&'()*+,;=:@%".contains(&b)
}

pub fn is_method_allowed(method: &Method) -> bool {
    ALLOWED_METHODS.contains(method)
}

/// Backend path for the given segments. Segments stay percent-encoded.
pub fn backend_path(segments: &[String]) -> String {
    format!("{}{}", API_ROOT, segments.join("/"))
}

/// Matches the decoded form, so `auth%2Fgoogle` and `auth%5Cgoogle` cannot
/// slip past the list.
pub fn is_excluded(backend_path: &str) -> bool {
    let decoded = percent_decode_str(backend_path)
        .decode_utf8_lossy()
        .replace('\\', "/");
    EXCLUDED_PATHS
        .iter()
        .any(|excluded| decoded.eq_ignore_ascii_case(excluded))
}

pub fn classify(method: &Method, segments: &[String]) -> ProxyDecision {
    if !is_method_allowed(method) {
        return ProxyDecision::MethodNotAllowed;
    }

    let path = backend_path(segments);
    if is_excluded(&path) {
        ProxyDecision::PathExcluded
    } else {
        ProxyDecision::Allowed(path)
    }
}
