use bytes::Bytes;
use std::collections::HashMap;
use std::fmt;

/// Request method as it appeared on the request line.
///
/// Verbs the proxy reasons about have their own variant. Every other valid
/// token lands in `Other`, so it can still be answered (with a 405) rather
/// than treated as a protocol error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Method {
    GET,
    POST,
    PUT,
    DELETE,
    HEAD,
    OPTIONS,
    PATCH,
    /// TRACE, CONNECT, WebDAV verbs and so on
    Other(String),
}

impl Method {
    /// Parses a method token. Matching is case-sensitive, as on the wire.
    ///
    /// Returns `None` only when `token` is not a valid RFC 9110 token.
    ///
    /// ```
    /// # use pulse_bff::http::request::Method;
    /// assert_eq!(Method::from_token("PATCH"), Some(Method::PATCH));
    /// assert_eq!(Method::from_token("PURGE"), Some(Method::Other("PURGE".into())));
    /// assert_eq!(Method::from_token("GE T"), None);
    /// ```
    pub fn from_token(token: &str) -> Option<Self> {
        let method = match token {
            "GET" => Self::GET,
            "POST" => Self::POST,
            "PUT" => Self::PUT,
            "DELETE" => Self::DELETE,
            "HEAD" => Self::HEAD,
            "OPTIONS" => Self::OPTIONS,
            "PATCH" => Self::PATCH,
            other if !other.is_empty() && other.bytes().all(is_tchar) => {
                Self::Other(other.to_string())
            }
            _ => return None,
        };
        Some(method)
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::GET => "GET",
            Self::POST => "POST",
            Self::PUT => "PUT",
            Self::DELETE => "DELETE",
            Self::HEAD => "HEAD",
            Self::OPTIONS => "OPTIONS",
            Self::PATCH => "PATCH",
            Self::Other(token) => token,
        }
    }

    /// Methods whose request body is forwarded to the backend.
    pub fn carries_body(&self) -> bool {
        matches!(self, Self::POST | Self::PUT | Self::PATCH)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn is_tchar(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b"!#$%&'*+-.^_`|~".contains(&b)
}

/// One browser request off the wire.
///
/// Header names are lower-cased on the way in, and the body is de-framed
/// (chunked requests arrive here as one contiguous buffer).
#[derive(Debug, Clone)]
pub struct Request {
    pub method: Method,
    /// Request target exactly as sent, query included
    pub path: String,
    pub version: String,
    pub headers: HashMap<String, String>,
    pub body: Bytes,
}

impl Request {
    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Target path without the query string.
    pub fn uri_path(&self) -> &str {
        self.path
            .split_once('?')
            .map_or(self.path.as_str(), |(path, _)| path)
    }

    /// Raw query string after the first `?`, still percent-encoded.
    pub fn query(&self) -> Option<&str> {
        self.path.split_once('?').map(|(_, query)| query)
    }

    /// Whether the connection stays open after this exchange.
    ///
    /// An explicit `Connection` header wins; otherwise HTTP/1.1 persists and
    /// HTTP/1.0 does not.
    pub fn keep_alive(&self) -> bool {
        match self.header("connection") {
            Some(v) if v.eq_ignore_ascii_case("close") => false,
            Some(v) if v.eq_ignore_ascii_case("keep-alive") => true,
            _ => self.version != "HTTP/1.0",
        }
    }
}

/// Assembles a [`Request`] by hand, mostly for tests.
#[derive(Default)]
pub struct RequestBuilder {
    method: Option<Method>,
    path: Option<String>,
    version: Option<String>,
    headers: HashMap<String, String>,
    body: Bytes,
}

impl RequestBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn method(mut self, method: Method) -> Self {
        self.method = Some(method);
        self
    }

    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// Sets a header, replacing any earlier value under the same name.
    pub fn header(mut self, name: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.headers
            .insert(name.as_ref().to_ascii_lowercase(), value.into());
        self
    }

    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn build(self) -> Result<Request, &'static str> {
        let method = self.method.ok_or("request method not set")?;
        let path = self.path.ok_or("request path not set")?;
        Ok(Request {
            method,
            path,
            version: self.version.unwrap_or_else(|| String::from("HTTP/1.1")),
            headers: self.headers,
            body: self.body,
        })
    }
}
