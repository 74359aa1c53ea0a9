//! # HTTP Module
//!
//! Hand-rolled HTTP/1.1 plumbing for the balancer: request parsing,
//! response building, a minimal GET client used for liveness probes and
//! proxying, the control-surface API, and the TCP accept loop.
//!
//! The balancer's surface is deliberately small (three control endpoints
//! plus a catch-all GET proxy, one request per connection), so it speaks
//! HTTP directly over [`tokio::net::TcpStream`] rather than pulling in a
//! full server framework.

pub mod api;
pub mod client;
pub mod error;
pub mod request;
pub mod response;
pub mod server;

pub use api::{Api, ScalePayload};
pub use error::{HttpError, HttpResult};
pub use request::Request;
pub use response::{Response, ResponseBuilder};
