//! TCP accept loop for the control surface.
//!
//! Connections are short-lived: one request is read (with a deadline and
//! a size cap), dispatched through the [`Api`](super::api::Api), answered,
//! and the connection is closed.

use super::api::Api;
use super::error::HttpError;
use super::request::Request;
use super::response::Response;
use bytes::BytesMut;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// Deadline for reading a complete request from a client.
const READ_TIMEOUT: Duration = Duration::from_secs(10);

/// Upper bound on request size, headers and body together.
const MAX_REQUEST_SIZE: usize = 64 * 1024;

/// Accept connections until the shutdown channel fires.
pub async fn serve(listener: TcpListener, api: Arc<Api>, mut shutdown: mpsc::Receiver<()>) {
    match listener.local_addr() {
        Ok(addr) => info!(address = %addr, "control surface listening"),
        Err(e) => warn!(error = %e, "control surface listening on unknown address"),
    }

    loop {
        tokio::select! {
            result = listener.accept() => {
                match result {
                    Ok((stream, peer)) => {
                        debug!(peer = %peer, "new connection");
                        let api = Arc::clone(&api);
                        tokio::spawn(async move {
                            handle_connection(stream, &api).await;
                        });
                    }
                    Err(e) => {
                        warn!(error = %e, "accept error");
                    }
                }
            }
            _ = shutdown.recv() => {
                info!("control surface shutting down");
                break;
            }
        }
    }
}

/// Read one request, dispatch it, write the response.
async fn handle_connection(mut stream: TcpStream, api: &Api) {
    let response = match read_request(&mut stream).await {
        Ok(request) => {
            let mut response = api.dispatch(&request).await;
            response.set_header("connection", "close");
            response
        }
        Err(HttpError::ConnectionClosed) => return,
        Err(e) => {
            debug!(error = %e, "failed to read request");
            Response::bad_request()
                .json(&serde_json::json!({
                    "message": format!("<Error> {e}"),
                    "status": "failure",
                }))
                .build()
        }
    };

    if let Err(e) = stream.write_all(&response.serialize()).await {
        debug!(error = %e, "failed to write response");
    }
}

/// Accumulate bytes until a complete request parses.
async fn read_request(stream: &mut TcpStream) -> Result<Request, HttpError> {
    let mut buf = BytesMut::with_capacity(8192);
    let mut chunk = [0u8; 8192];

    loop {
        let read = match timeout(READ_TIMEOUT, stream.read(&mut chunk)).await {
            Ok(Ok(0)) => {
                return if buf.is_empty() {
                    Err(HttpError::ConnectionClosed)
                } else {
                    Err(HttpError::Parse("unexpected end of request".to_string()))
                };
            }
            Ok(Ok(read)) => read,
            Ok(Err(e)) => return Err(HttpError::Io(e)),
            Err(_) => return Err(HttpError::Timeout("request read".to_string())),
        };

        buf.extend_from_slice(&chunk[..read]);
        if buf.len() > MAX_REQUEST_SIZE {
            return Err(HttpError::RequestTooLarge {
                size: buf.len(),
                max: MAX_REQUEST_SIZE,
            });
        }

        if let Some((request, _consumed)) = Request::parse(&buf)? {
            return Ok(request);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Endpoint, InstanceRuntime, PoolResult, ReplicaPool, RuntimeFuture};
    use http::StatusCode;
    use serde_json::Value;

    struct NullRuntime;

    impl InstanceRuntime for NullRuntime {
        fn start<'a>(&'a self, _identity: &'a str) -> RuntimeFuture<'a, Endpoint> {
            Box::pin(async move {
                PoolResult::Ok(Endpoint {
                    host: "127.0.0.1".to_string(),
                    port: 9,
                })
            })
        }

        fn stop<'a>(&'a self, _identity: &'a str) -> RuntimeFuture<'a, ()> {
            Box::pin(async move { Ok(()) })
        }
    }

    async fn start_server() -> (std::net::SocketAddr, mpsc::Sender<()>) {
        let pool = Arc::new(ReplicaPool::new(512, 9, Arc::new(NullRuntime)));
        let api = Arc::new(Api::new(pool, Duration::from_millis(300)));

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = mpsc::channel(1);
        tokio::spawn(serve(listener, api, rx));

        (addr, tx)
    }

    async fn send_raw(addr: std::net::SocketAddr, raw: &str) -> (StatusCode, Value) {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream.write_all(raw.as_bytes()).await.unwrap();

        let mut data = Vec::new();
        stream.read_to_end(&mut data).await.unwrap();
        let response = Response::parse(&data, true).unwrap().unwrap();
        let body = serde_json::from_slice(response.body()).unwrap();
        (response.status(), body)
    }

    #[tokio::test]
    async fn test_serves_rep_endpoint() {
        let (addr, _shutdown) = start_server().await;

        let (status, body) =
            send_raw(addr, "GET /rep HTTP/1.1\r\nHost: localhost\r\n\r\n").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "successful");
        assert_eq!(body["message"]["N"], 0);
    }

    #[tokio::test]
    async fn test_scale_up_over_the_wire() {
        let (addr, _shutdown) = start_server().await;

        let payload = r#"{"n":1,"hostnames":["Saaaaa"]}"#;
        let raw = format!(
            "POST /add HTTP/1.1\r\nContent-Length: {}\r\n\r\n{payload}",
            payload.len()
        );
        let (status, body) = send_raw(addr, &raw).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"]["N"], 1);
        assert_eq!(body["message"]["replicas"][0], "Saaaaa");
    }

    #[tokio::test]
    async fn test_malformed_request_gets_400() {
        let (addr, _shutdown) = start_server().await;

        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream.write_all(b"GARBAGE\r\n\r\n").await.unwrap();
        let mut data = Vec::new();
        stream.read_to_end(&mut data).await.unwrap();

        let response = Response::parse(&data, true).unwrap().unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_shutdown_stops_accepting() {
        let (addr, shutdown) = start_server().await;
        shutdown.send(()).await.unwrap();

        // Give the accept loop a moment to observe the signal.
        tokio::time::sleep(Duration::from_millis(50)).await;

        let result = TcpStream::connect(addr).await;
        // Either refused outright, or accepted by the OS backlog and then
        // never served; both mean the loop is gone. A refused connect is
        // the common case.
        if let Ok(mut stream) = result {
            stream
                .write_all(b"GET /rep HTTP/1.1\r\n\r\n")
                .await
                .unwrap();
            let mut data = Vec::new();
            let read = tokio::time::timeout(
                Duration::from_millis(200),
                stream.read_to_end(&mut data),
            )
            .await;
            assert!(read.is_err() || data.is_empty());
        }
    }
}
