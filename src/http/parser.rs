use crate::http::request::{Method, Request};
use bytes::Bytes;
use std::collections::HashMap;

/// Upper bound on the request line plus headers.
pub const MAX_HEADER_BYTES: usize = 64 * 1024;

/// Upper bound on a de-framed request body.
pub const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("malformed request line")]
    InvalidRequest,
    #[error("invalid method token")]
    InvalidMethod,
    #[error("malformed header line")]
    InvalidHeader,
    #[error("invalid content-length")]
    InvalidContentLength,
    #[error("malformed chunked body")]
    InvalidChunk,
    #[error("request headers too large")]
    HeadersTooLarge,
    #[error("request body too large")]
    BodyTooLarge,
    #[error("incomplete request")]
    Incomplete,
}

impl ParseError {
    /// Errors that should be answered with 413 rather than 400.
    pub fn is_too_large(&self) -> bool {
        matches!(self, ParseError::HeadersTooLarge | ParseError::BodyTooLarge)
    }
}

/// Parses one HTTP/1.x request from the front of `buf`.
///
/// On success returns the request and the number of bytes it occupied, so the
/// caller can drain them and keep any pipelined remainder.
pub fn parse_http_request(buf: &[u8]) -> Result<(Request, usize), ParseError> {
    // Look for header/body separator
    let headers_end = match find_headers_end(buf) {
        Some(end) if end > MAX_HEADER_BYTES => return Err(ParseError::HeadersTooLarge),
        Some(end) => end,
        None if buf.len() > MAX_HEADER_BYTES => return Err(ParseError::HeadersTooLarge),
        None => return Err(ParseError::Incomplete),
    };
    let header_bytes = &buf[..headers_end];
    let body_bytes = &buf[headers_end + 4..];

    let headers_str =
        std::str::from_utf8(header_bytes).map_err(|_| ParseError::InvalidRequest)?;

    let mut lines = headers_str.split("\r\n");

    // Request line
    let request_line = lines.next().ok_or(ParseError::InvalidRequest)?;
    let mut parts = request_line.split(' ');

    let method_str = parts.next().ok_or(ParseError::InvalidRequest)?;
    let path = parts.next().ok_or(ParseError::InvalidRequest)?;
    let version = parts.next().ok_or(ParseError::InvalidRequest)?;
    if parts.next().is_some() || path.is_empty() || !version.starts_with("HTTP/1.") {
        return Err(ParseError::InvalidRequest);
    }
    // Request targets are visible US-ASCII only (no tabs, controls or UTF-8)
    if !path.bytes().all(|b| b.is_ascii_graphic()) {
        return Err(ParseError::InvalidRequest);
    }

    let method = Method::from_token(method_str).ok_or(ParseError::InvalidMethod)?;

    // Headers
    let mut headers: HashMap<String, String> = HashMap::new();

    for line in lines {
        if line.is_empty() {
            continue;
        }

        let (key, value) = line.split_once(':').ok_or(ParseError::InvalidHeader)?;
        if key.is_empty() || key.bytes().any(|b| b.is_ascii_whitespace()) {
            return Err(ParseError::InvalidHeader);
        }

        let key = key.to_ascii_lowercase();
        let value = value.trim();
        headers
            .entry(key)
            .and_modify(|existing| {
                existing.push_str(", ");
                existing.push_str(value);
            })
            .or_insert_with(|| value.to_string());
    }

    // Body
    let chunked = headers
        .get("transfer-encoding")
        .map(|te| {
            te.rsplit(',')
                .next()
                .is_some_and(|last| last.trim().eq_ignore_ascii_case("chunked"))
        })
        .unwrap_or(false);

    let (body, body_consumed) = if chunked {
        if headers.contains_key("content-length") {
            return Err(ParseError::InvalidRequest);
        }
        decode_chunked(body_bytes)?
    } else {
        let content_length = headers
            .get("content-length")
            .map(|v| v.parse::<usize>().map_err(|_| ParseError::InvalidContentLength))
            .transpose()?
            .unwrap_or(0);

        if content_length > MAX_BODY_BYTES {
            return Err(ParseError::BodyTooLarge);
        }
        if body_bytes.len() < content_length {
            return Err(ParseError::Incomplete);
        }
        (body_bytes[..content_length].to_vec(), content_length)
    };

    let request = Request {
        method,
        path: path.to_string(),
        version: version.to_string(),
        headers,
        body: Bytes::from(body),
    };

    let total_consumed = headers_end + 4 + body_consumed;
    Ok((request, total_consumed))
}

fn find_headers_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n")
}

fn find_crlf(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|w| w == b"\r\n")
}

/// Decodes a chunked body. Returns the payload and the bytes consumed,
/// including the terminating chunk and any trailer section.
fn decode_chunked(buf: &[u8]) -> Result<(Vec<u8>, usize), ParseError> {
    let mut body = Vec::new();
    let mut pos = 0;

    loop {
        let line_end = find_crlf(&buf[pos..]).ok_or(ParseError::Incomplete)?;
        let size_line =
            std::str::from_utf8(&buf[pos..pos + line_end]).map_err(|_| ParseError::InvalidChunk)?;
        let size_hex = size_line.split(';').next().unwrap_or("").trim();
        let size = usize::from_str_radix(size_hex, 16).map_err(|_| ParseError::InvalidChunk)?;
        pos += line_end + 2;

        if size == 0 {
            // Trailer section ends with an empty line
            loop {
                let trailer_end = find_crlf(&buf[pos..]).ok_or(ParseError::Incomplete)?;
                pos += trailer_end + 2;
                if trailer_end == 0 {
                    return Ok((body, pos));
                }
            }
        }

        if body.len() + size > MAX_BODY_BYTES {
            return Err(ParseError::BodyTooLarge);
        }
        if buf.len() < pos + size + 2 {
            return Err(ParseError::Incomplete);
        }
        body.extend_from_slice(&buf[pos..pos + size]);
        pos += size;
        if &buf[pos..pos + 2] != b"\r\n" {
            return Err(ParseError::InvalidChunk);
        }
        pos += 2;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_simple_get() {
        let req = b"GET / HTTP/1.1\r\nHost: example.com\r\n\r\n";

        let (parsed, consumed) = parse_http_request(req).unwrap();

        assert_eq!(parsed.path, "/");
        assert_eq!(parsed.header("Host").unwrap(), "example.com");
        assert_eq!(consumed, req.len());
    }

    #[test]
    fn chunked_body_is_deframed() {
        let req = b"POST /api/v1/x HTTP/1.1\r\nTransfer-Encoding: chunked\r\n\r\n4\r\nWiki\r\n5;ext=1\r\npedia\r\n0\r\n\r\n";

        let (parsed, consumed) = parse_http_request(req).unwrap();

        assert_eq!(&parsed.body[..], b"Wikipedia");
        assert_eq!(consumed, req.len());
    }

    #[test]
    fn chunked_body_waits_for_terminator() {
        let req = b"POST / HTTP/1.1\r\nTransfer-Encoding: chunked\r\n\r\n4\r\nWiki\r\n";
        assert_eq!(parse_http_request(req).unwrap_err(), ParseError::Incomplete);
    }
}
