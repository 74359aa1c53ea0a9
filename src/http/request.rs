//! HTTP/1.1 request parsing.

use super::error::{HttpError, HttpResult};
use bytes::Bytes;
use http::Method;
use std::collections::HashMap;

/// Maximum number of headers accepted per request.
const MAX_HEADERS: usize = 64;

/// Parsed HTTP request.
#[derive(Debug, Clone)]
pub struct Request {
    method: Method,
    path: String,
    headers: HashMap<String, String>,
    body: Bytes,
}

impl Request {
    /// Try to parse a request from a buffer.
    ///
    /// Returns `Ok(None)` when the buffer does not yet hold a complete
    /// request (headers or declared body still in flight), and
    /// `Ok(Some((request, consumed)))` once it does.
    ///
    /// # Errors
    ///
    /// Returns [`HttpError::Parse`] for malformed requests.
    pub fn parse(data: &[u8]) -> HttpResult<Option<(Self, usize)>> {
        let mut header_storage = [httparse::EMPTY_HEADER; MAX_HEADERS];
        let mut parsed = httparse::Request::new(&mut header_storage);

        let header_len = match parsed.parse(data)? {
            httparse::Status::Complete(len) => len,
            httparse::Status::Partial => return Ok(None),
        };

        let method: Method = parsed
            .method
            .ok_or_else(|| HttpError::Parse("missing method".to_string()))?
            .parse()
            .map_err(|_| HttpError::Parse("invalid method".to_string()))?;
        let path = parsed
            .path
            .ok_or_else(|| HttpError::Parse("missing path".to_string()))?
            .to_string();

        let mut headers = HashMap::new();
        for header in parsed.headers.iter() {
            headers.insert(
                header.name.to_lowercase(),
                String::from_utf8_lossy(header.value).to_string(),
            );
        }

        let body_len = match headers.get("content-length") {
            Some(raw) => raw
                .parse::<usize>()
                .map_err(|_| HttpError::Parse(format!("invalid content-length: {raw}")))?,
            None => 0,
        };

        let total = header_len + body_len;
        if data.len() < total {
            return Ok(None);
        }

        let body = Bytes::copy_from_slice(&data[header_len..total]);

        Ok(Some((
            Self {
                method,
                path,
                headers,
                body,
            },
            total,
        )))
    }

    /// HTTP method.
    #[must_use]
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Request path, including any query string.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Header value by case-insensitive name.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_lowercase()).map(String::as_str)
    }

    /// Request body.
    #[must_use]
    pub fn body(&self) -> &Bytes {
        &self.body
    }
}
