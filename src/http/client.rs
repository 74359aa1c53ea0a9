//! Minimal async HTTP client.
//!
//! One request per connection with `Connection: close`, which is all the
//! balancer needs for liveness probes and proxying backend calls. Every
//! failure mode a caller cares about (connect error, timeout, truncated
//! or malformed response) collapses into [`HttpError::Unreachable`], since
//! they all mean the same thing: this backend cannot serve the request.

use super::error::{HttpError, HttpResult};
use super::response::Response;
use bytes::BytesMut;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;

/// Issue a GET request and read the full response.
///
/// # Errors
///
/// Returns [`HttpError::Unreachable`] on connect failure, timeout, or a
/// response that cannot be parsed.
pub async fn get(host: &str, port: u16, path: &str, deadline: Duration) -> HttpResult<Response> {
    match timeout(deadline, request(host, port, path)).await {
        Ok(result) => result,
        Err(_) => Err(HttpError::Unreachable(format!(
            "request to {host}:{port} timed out after {deadline:?}"
        ))),
    }
}

async fn request(host: &str, port: u16, path: &str) -> HttpResult<Response> {
    let mut stream = TcpStream::connect((host, port))
        .await
        .map_err(|e| HttpError::Unreachable(format!("connect to {host}:{port} failed: {e}")))?;

    let wire = format!("GET {path} HTTP/1.1\r\nHost: {host}\r\nConnection: close\r\n\r\n");
    stream
        .write_all(wire.as_bytes())
        .await
        .map_err(|e| HttpError::Unreachable(format!("send to {host}:{port} failed: {e}")))?;

    let mut buf = BytesMut::with_capacity(8192);
    let mut chunk = [0u8; 8192];

    loop {
        let read = stream
            .read(&mut chunk)
            .await
            .map_err(|e| HttpError::Unreachable(format!("read from {host}:{port} failed: {e}")))?;

        if read == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..read]);

        // Responses carrying a content-length can complete before EOF.
        if let Some(response) = Response::parse(&buf, false)
            .map_err(|e| HttpError::Unreachable(format!("bad response from {host}:{port}: {e}")))?
        {
            return Ok(response);
        }
    }

    match Response::parse(&buf, true) {
        Ok(Some(response)) => Ok(response),
        Ok(None) => Err(HttpError::Unreachable(format!(
            "truncated response from {host}:{port}"
        ))),
        Err(e) => Err(HttpError::Unreachable(format!(
            "bad response from {host}:{port}: {e}"
        ))),
    }
}
