//! Control-surface endpoints and the catch-all proxy.
//!
//! Request/response shapes follow the deployment's wire contract: every
//! body is JSON with a `status` field of `"successful"` or `"failure"`,
//! scale operations echo the updated replica listing, and arbitrary GET
//! paths are proxied to the replica that owns the request's ring
//! territory.

use super::client;
use super::request::Request;
use super::response::Response;
use crate::pool::{PoolError, ReplicaListing, ReplicaPool};
use http::Method;
use rand::Rng;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Body of `/add` and `/rm` requests.
#[derive(Debug, Deserialize)]
pub struct ScalePayload {
    /// Number of replicas to add or remove.
    pub n: usize,
    /// Their identities; length must equal `n`.
    #[serde(default)]
    pub hostnames: Vec<String>,
}

/// Control surface over a shared replica pool.
#[derive(Debug)]
pub struct Api {
    pool: Arc<ReplicaPool>,
    proxy_timeout: Duration,
}

impl Api {
    /// Create the control surface.
    #[must_use]
    pub fn new(pool: Arc<ReplicaPool>, proxy_timeout: Duration) -> Self {
        Self {
            pool,
            proxy_timeout,
        }
    }

    /// Dispatch a parsed request to the matching handler.
    pub async fn dispatch(&self, request: &Request) -> Response {
        let method = request.method().clone();
        let path = request.path();

        if method == Method::GET && path == "/rep" {
            self.list_replicas().await
        } else if method == Method::POST && path == "/add" {
            self.add_replicas(request).await
        } else if method == Method::DELETE && path == "/rm" {
            self.remove_replicas(request).await
        } else if method == Method::GET {
            self.proxy(request).await
        } else {
            Response::builder()
                .status(http::StatusCode::METHOD_NOT_ALLOWED)
                .json(&failure_body(&format!(
                    "<Error> unsupported method {method} for {path}"
                )))
                .build()
        }
    }

    /// Handle `GET /rep`: current replica listing.
    async fn list_replicas(&self) -> Response {
        let listing = self.pool.list().await;
        Response::ok().json(&listing_body(&listing)).build()
    }

    /// Handle `POST /add`: scale up by `n` named replicas.
    async fn add_replicas(&self, request: &Request) -> Response {
        let payload = match parse_payload(request) {
            Ok(payload) => payload,
            Err(response) => return *response,
        };

        match self.pool.add_replicas(payload.n, payload.hostnames).await {
            Ok(listing) => Response::ok().json(&listing_body(&listing)).build(),
            Err(e) => scale_failure(&e),
        }
    }

    /// Handle `DELETE /rm`: scale down by `n` named replicas.
    async fn remove_replicas(&self, request: &Request) -> Response {
        let payload = match parse_payload(request) {
            Ok(payload) => payload,
            Err(response) => return *response,
        };

        match self.pool.remove_replicas(payload.n, payload.hostnames).await {
            Ok(listing) => Response::ok().json(&listing_body(&listing)).build(),
            Err(e) => scale_failure(&e),
        }
    }

    /// Handle any other `GET`: forward to the replica owning a fresh request key.
    async fn proxy(&self, request: &Request) -> Response {
        let request_id: u32 = rand::rng().random_range(100_000..=999_999);

        let target = match self.pool.locate(&request_id.to_string()).await {
            Ok(target) => target,
            Err(e) => {
                warn!(request_id, error = %e, "routing failed");
                return Response::bad_request()
                    .json(&failure_body(&format!("<Error> {e}")))
                    .build();
            }
        };

        debug!(
            request_id,
            path = %request.path(),
            replica = %target.identity,
            "proxying request"
        );

        match client::get(
            &target.endpoint.host,
            target.endpoint.port,
            request.path(),
            self.proxy_timeout,
        )
        .await
        {
            Ok(backend_response) => {
                // Relay status and body verbatim.
                let mut response = Response::builder()
                    .status(backend_response.status())
                    .body(backend_response.body().clone())
                    .build();
                if let Some(content_type) = backend_response.header("content-type") {
                    response.set_header("content-type", content_type);
                }
                response
            }
            Err(e) => {
                warn!(
                    request_id,
                    replica = %target.identity,
                    error = %e,
                    "backend unreachable"
                );
                Response::internal_error()
                    .json(&json!({
                        "message": "Server not reachable",
                        "status": "failure",
                    }))
                    .build()
            }
        }
    }
}

/// Successful listing envelope.
fn listing_body(listing: &ReplicaListing) -> serde_json::Value {
    json!({
        "message": {
            "N": listing.count,
            "replicas": listing.replicas,
        },
        "status": "successful",
    })
}

/// Failure envelope.
fn failure_body(message: &str) -> serde_json::Value {
    json!({
        "message": message,
        "status": "failure",
    })
}

/// Map a pool error from a scale operation to its client response.
fn scale_failure(error: &PoolError) -> Response {
    Response::bad_request()
        .json(&failure_body(&format!("<Error> {error}")))
        .build()
}

/// Parse a scale payload, producing the client-facing 400 on failure.
fn parse_payload(request: &Request) -> Result<ScalePayload, Box<Response>> {
    serde_json::from_slice(request.body()).map_err(|e| {
        Box::new(
            Response::bad_request()
                .json(&failure_body(&format!("<Error> invalid payload: {e}")))
                .build(),
        )
    })
}
