//! HTTP/1.1 response building, serialization, and parsing.
//!
//! Serialization is used by the server side; parsing is used by the
//! client when relaying backend responses.

use super::error::{HttpError, HttpResult};
use bytes::{Bytes, BytesMut};
use http::StatusCode;
use std::collections::HashMap;

/// Maximum number of headers accepted when parsing a response.
const MAX_HEADERS: usize = 64;

/// HTTP response.
#[derive(Debug, Clone)]
pub struct Response {
    status: StatusCode,
    headers: HashMap<String, String>,
    body: Bytes,
}

impl Response {
    /// Create a new response builder.
    #[must_use]
    pub fn builder() -> ResponseBuilder {
        ResponseBuilder::new()
    }

    /// Create an OK (200) response builder.
    #[must_use]
    pub fn ok() -> ResponseBuilder {
        ResponseBuilder::new().status(StatusCode::OK)
    }

    /// Create a Bad Request (400) response builder.
    #[must_use]
    pub fn bad_request() -> ResponseBuilder {
        ResponseBuilder::new().status(StatusCode::BAD_REQUEST)
    }

    /// Create an Internal Server Error (500) response builder.
    #[must_use]
    pub fn internal_error() -> ResponseBuilder {
        ResponseBuilder::new().status(StatusCode::INTERNAL_SERVER_ERROR)
    }

    /// Status code.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Header value by case-insensitive name.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_lowercase()).map(String::as_str)
    }

    /// Set a header value.
    pub fn set_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.headers
            .insert(name.into().to_lowercase(), value.into());
    }

    /// Response body.
    #[must_use]
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Serialize the response to wire format.
    #[must_use]
    pub fn serialize(&self) -> BytesMut {
        let mut buf = BytesMut::new();

        buf.extend_from_slice(
            format!(
                "HTTP/1.1 {} {}\r\n",
                self.status.as_u16(),
                self.status.canonical_reason().unwrap_or("")
            )
            .as_bytes(),
        );

        for (name, value) in &self.headers {
            buf.extend_from_slice(format!("{name}: {value}\r\n").as_bytes());
        }

        if !self.headers.contains_key("content-length") {
            buf.extend_from_slice(format!("content-length: {}\r\n", self.body.len()).as_bytes());
        }

        buf.extend_from_slice(b"\r\n");
        buf.extend_from_slice(&self.body);

        buf
    }

    /// Try to parse a response from a buffer.
    ///
    /// Returns `Ok(None)` while the buffer is incomplete. A response
    /// without a `content-length` header is only complete at EOF, which
    /// the caller signals via `at_eof`.
    ///
    /// # Errors
    ///
    /// Returns [`HttpError::Parse`] for malformed responses.
    pub fn parse(data: &[u8], at_eof: bool) -> HttpResult<Option<Self>> {
        let mut header_storage = [httparse::EMPTY_HEADER; MAX_HEADERS];
        let mut parsed = httparse::Response::new(&mut header_storage);

        let header_len = match parsed.parse(data)? {
            httparse::Status::Complete(len) => len,
            httparse::Status::Partial => return Ok(None),
        };

        let code = parsed
            .code
            .ok_or_else(|| HttpError::Parse("missing status code".to_string()))?;
        let status = StatusCode::from_u16(code)
            .map_err(|_| HttpError::Parse(format!("invalid status code: {code}")))?;

        let mut headers = HashMap::new();
        for header in parsed.headers.iter() {
            headers.insert(
                header.name.to_lowercase(),
                String::from_utf8_lossy(header.value).to_string(),
            );
        }

        let body = match headers.get("content-length") {
            Some(raw) => {
                let body_len = raw
                    .parse::<usize>()
                    .map_err(|_| HttpError::Parse(format!("invalid content-length: {raw}")))?;
                if data.len() < header_len + body_len {
                    return Ok(None);
                }
                Bytes::copy_from_slice(&data[header_len..header_len + body_len])
            }
            None => {
                if !at_eof {
                    return Ok(None);
                }
                Bytes::copy_from_slice(&data[header_len..])
            }
        };

        Ok(Some(Self {
            status,
            headers,
            body,
        }))
    }
}

/// Builder for [`Response`].
#[derive(Debug, Default)]
pub struct ResponseBuilder {
    status: Option<StatusCode>,
    headers: HashMap<String, String>,
    body: Bytes,
}

impl ResponseBuilder {
    /// Create an empty builder (status defaults to 200).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the status code.
    #[must_use]
    pub fn status(mut self, status: StatusCode) -> Self {
        self.status = Some(status);
        self
    }

    /// Add a header.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers
            .insert(name.into().to_lowercase(), value.into());
        self
    }

    /// Set a raw body.
    #[must_use]
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Set a JSON body with the matching content type.
    #[must_use]
    pub fn json(self, value: &serde_json::Value) -> Self {
        self.header("content-type", "application/json")
            .body(value.to_string())
    }

    /// Set a plain-text body.
    #[must_use]
    pub fn text(self, text: impl Into<String>) -> Self {
        self.header("content-type", "text/plain").body(text.into())
    }

    /// Finalize the response.
    #[must_use]
    pub fn build(self) -> Response {
        Response {
            status: self.status.unwrap_or(StatusCode::OK),
            headers: self.headers,
            body: self.body,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_serialize_includes_status_and_length() {
        let response = Response::ok()
            .json(&json!({"status": "successful"}))
            .build();
        let wire = response.serialize();
        let text = String::from_utf8_lossy(&wire);

        assert!(text.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(text.contains("content-type: application/json\r\n"));
        assert!(text.contains("content-length: 23\r\n"));
        assert!(text.ends_with("{\"status\":\"successful\"}"));
    }

    #[test]
    fn test_serialize_parse_roundtrip() {
        let original = Response::bad_request()
            .json(&json!({"message": "<Error> bad", "status": "failure"}))
            .build();
        let wire = original.serialize();

        let parsed = Response::parse(&wire, false).unwrap().unwrap();
        assert_eq!(parsed.status(), StatusCode::BAD_REQUEST);
        assert_eq!(parsed.header("content-type"), Some("application/json"));
        assert_eq!(parsed.body(), original.body());
    }

    #[test]
    fn test_parse_partial_returns_none() {
        let raw = b"HTTP/1.1 200 OK\r\ncontent-le";
        assert!(Response::parse(raw, false).unwrap().is_none());
    }

    #[test]
    fn test_parse_body_without_length_needs_eof() {
        let raw = b"HTTP/1.1 200 OK\r\nconnection: close\r\n\r\nhello";
        assert!(Response::parse(raw, false).unwrap().is_none());

        let parsed = Response::parse(raw, true).unwrap().unwrap();
        assert_eq!(parsed.body().as_ref(), b"hello");
    }

    #[test]
    fn test_parse_arbitrary_status_relayed() {
        let raw = b"HTTP/1.1 418 I'm a teapot\r\ncontent-length: 0\r\n\r\n";
        let parsed = Response::parse(raw, false).unwrap().unwrap();
        assert_eq!(parsed.status().as_u16(), 418);
    }

    #[test]
    fn test_parse_invalid_status_code() {
        let raw = b"HTTP/1.1 9999 Nope\r\n\r\n";
        assert!(Response::parse(raw, true).is_err());
    }

    #[test]
    fn test_builder_defaults_to_ok() {
        let response = Response::builder().text("hi").build();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.header("content-type"), Some("text/plain"));
    }
}
