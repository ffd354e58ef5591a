use bytes::Bytes;
use serde::Serialize;
use std::collections::HashMap;

/// HTTP status code.
///
/// A thin wrapper over the numeric code. The proxy mirrors whatever status the
/// backend returns, so this is open-ended rather than a closed enum; the
/// associated constants name the codes the server produces itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StatusCode(u16);

impl StatusCode {
    /// 200 OK
    pub const OK: StatusCode = StatusCode(200);
    /// 201 Created
    pub const CREATED: StatusCode = StatusCode(201);
    /// 204 No Content
    pub const NO_CONTENT: StatusCode = StatusCode(204);
    /// 304 Not Modified
    pub const NOT_MODIFIED: StatusCode = StatusCode(304);
    /// 400 Bad Request
    pub const BAD_REQUEST: StatusCode = StatusCode(400);
    /// 401 Unauthorized
    pub const UNAUTHORIZED: StatusCode = StatusCode(401);
    /// 403 Forbidden
    pub const FORBIDDEN: StatusCode = StatusCode(403);
    /// 404 Not Found
    pub const NOT_FOUND: StatusCode = StatusCode(404);
    /// 405 Method Not Allowed
    pub const METHOD_NOT_ALLOWED: StatusCode = StatusCode(405);
    /// 413 Payload Too Large
    pub const PAYLOAD_TOO_LARGE: StatusCode = StatusCode(413);
    /// 500 Internal Server Error
    pub const INTERNAL_SERVER_ERROR: StatusCode = StatusCode(500);
    /// 502 Bad Gateway
    pub const BAD_GATEWAY: StatusCode = StatusCode(502);
    /// 503 Service Unavailable
    pub const SERVICE_UNAVAILABLE: StatusCode = StatusCode(503);
    /// 504 Gateway Timeout
    pub const GATEWAY_TIMEOUT: StatusCode = StatusCode(504);

    /// Wraps a numeric code. Returns `None` outside 100..=999.
    pub fn from_u16(code: u16) -> Option<Self> {
        (100..=999).contains(&code).then_some(StatusCode(code))
    }

    /// The numeric code.
    ///
    /// # Example
    ///
    /// ```
    /// # use pulse_bff::http::response::StatusCode;
    /// assert_eq!(StatusCode::OK.as_u16(), 200);
    /// assert_eq!(StatusCode::GATEWAY_TIMEOUT.as_u16(), 504);
    /// ```
    pub fn as_u16(&self) -> u16 {
        self.0
    }

    /// Returns the standard reason phrase, or an empty string for codes
    /// without a registered phrase.
    pub fn reason_phrase(&self) -> &'static str {
        match self.0 {
            200 => "OK",
            201 => "Created",
            202 => "Accepted",
            204 => "No Content",
            301 => "Moved Permanently",
            302 => "Found",
            303 => "See Other",
            304 => "Not Modified",
            307 => "Temporary Redirect",
            308 => "Permanent Redirect",
            400 => "Bad Request",
            401 => "Unauthorized",
            403 => "Forbidden",
            404 => "Not Found",
            405 => "Method Not Allowed",
            409 => "Conflict",
            413 => "Payload Too Large",
            422 => "Unprocessable Content",
            429 => "Too Many Requests",
            500 => "Internal Server Error",
            502 => "Bad Gateway",
            503 => "Service Unavailable",
            504 => "Gateway Timeout",
            _ => "",
        }
    }

    /// Responses with these codes never carry a body.
    pub fn is_bodiless(&self) -> bool {
        (100..200).contains(&self.0) || self.0 == 204 || self.0 == 304
    }
}

/// A complete HTTP response ready to be sent to a client.
///
/// Header names are lower-cased. Transport headers (`content-length`,
/// `connection`) are not stored here; the writer derives them at
/// serialisation time.
#[derive(Debug, Clone)]
pub struct Response {
    pub status: StatusCode,
    /// Response headers keyed by lower-cased name
    pub headers: HashMap<String, String>,
    /// Response body
    pub body: Bytes,
}

/// Fluent construction of a [`Response`].
///
/// # Example
///
/// ```
/// # use pulse_bff::http::response::{ResponseBuilder, StatusCode};
/// let response = ResponseBuilder::new(StatusCode::OK)
///     .header("Content-Type", "application/json")
///     .body(b"{}".to_vec())
///     .build();
/// assert_eq!(response.headers.get("content-type").unwrap(), "application/json");
/// ```
pub struct ResponseBuilder {
    status: StatusCode,
    headers: HashMap<String, String>,
    body: Bytes,
}

impl ResponseBuilder {
    /// Starts an empty response with `status`.
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: HashMap::new(),
            body: Bytes::new(),
        }
    }

    /// Adds or replaces a header. The name is lower-cased.
    pub fn header(mut self, key: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.headers
            .insert(key.as_ref().to_ascii_lowercase(), value.into());
        self
    }

    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn build(self) -> Response {
        Response {
            status: self.status,
            headers: self.headers,
            body: self.body,
        }
    }
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
}

impl Response {
    /// Plain 200 with `body` and no headers.
    pub fn ok(body: impl Into<Bytes>) -> Self {
        ResponseBuilder::new(StatusCode::OK).body(body).build()
    }

    /// `{"error": "<message>"}` with a JSON content type. Every error the
    /// proxy produces itself goes through here.
    pub fn json_error(status: StatusCode, message: &str) -> Self {
        let body = serde_json::to_vec(&ErrorBody { error: message }).unwrap_or_default();
        ResponseBuilder::new(status)
            .header("content-type", "application/json")
            .body(body)
            .build()
    }

    pub fn not_found() -> Self {
        Self::json_error(StatusCode::NOT_FOUND, "Not found")
    }

    pub fn bad_request() -> Self {
        Self::json_error(StatusCode::BAD_REQUEST, "Bad request")
    }

    pub fn payload_too_large() -> Self {
        Self::json_error(StatusCode::PAYLOAD_TOO_LARGE, "Request too large")
    }

    pub fn internal_error() -> Self {
        Self::json_error(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
    }

    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers
            .get(&key.to_ascii_lowercase())
            .map(|v| v.as_str())
    }
}
