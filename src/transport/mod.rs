//! Transport bindings for the dispatch engine.
//!
//! # Data Flow
//! ```text
//! Driver accept loop
//!     → Transport::serve (plain: HTTP/1.1, tls: ALPN h2 / http/1.1)
//!     → exchange.rs (raw request → contexts, HyperResponse as RawResponse)
//!     → Engine::dispatch
//!     → HyperResponse → hyper::Response
//! ```
//!
//! # Design Decisions
//! - The engine only sees [`RawResponse`]; nothing above this module names hyper
//! - Raw response writes cannot fail; transport errors surface from `serve`

pub mod exchange;
pub mod plain;
pub mod tls;

use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use futures_util::future::BoxFuture;
use http::{HeaderName, HeaderValue, StatusCode};
use thiserror::Error;
use tokio::net::TcpStream;

use crate::dispatch::Engine;
use crate::http::{BodyStream, BoxError, Cookie};
use crate::net::listener::{Listener, ListenerError};

pub use exchange::{build_exchange, request_uri, HyperResponse, ResponseBody};
pub use plain::PlainTransport;
pub use tls::TlsTransport;

/// Error type for transport operations.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("HTTP connection error: {0}")]
    Http(#[from] hyper::Error),

    #[error("TLS error: {0}")]
    Tls(#[source] std::io::Error),

    #[error("invalid PEM file {path}: {reason}")]
    Pem { path: String, reason: String },

    #[error("connection error: {0}")]
    Serve(#[source] BoxError),
}

/// Write primitives of an outgoing wire response.
pub trait RawResponse: Send {
    fn set_header(&mut self, name: &HeaderName, value: &HeaderValue);

    fn set_content_length(&mut self, len: u64);

    fn set_chunked_encoding(&mut self, chunked: bool);

    fn set_status_code(&mut self, status: StatusCode);

    fn add_cookies(&mut self, cookies: &[Cookie]);

    fn write_body(&mut self, body: Bytes);

    fn write_stream(&mut self, body: BodyStream);

    /// Mark the response complete. Later writes are ignored.
    fn close(&mut self);

    fn is_closed(&self) -> bool;
}

/// A wire protocol the driver can serve connections with.
pub trait Transport: Send + Sync + 'static {
    /// URL scheme reported in the server handle.
    fn scheme(&self) -> &'static str;

    /// Bind a bounded listener.
    fn bind(&self, addr: SocketAddr, max_connections: usize) -> BoxFuture<'_, Result<Listener, ListenerError>> {
        Box::pin(Listener::bind(addr, max_connections))
    }

    /// Serve every request arriving on one accepted connection.
    fn serve(
        &self,
        stream: TcpStream,
        remote: SocketAddr,
        engine: Arc<Engine>,
    ) -> BoxFuture<'static, Result<(), TransportError>>;
}
