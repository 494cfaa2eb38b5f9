//! Plain-text transport: HTTP/1.1 over TCP.

use std::net::SocketAddr;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use tokio::net::TcpStream;

use crate::dispatch::Engine;
use crate::transport::exchange::handle;
use crate::transport::{Transport, TransportError};

#[derive(Debug, Clone, Copy, Default)]
pub struct PlainTransport;

impl Transport for PlainTransport {
    fn scheme(&self) -> &'static str {
        "http"
    }

    fn serve(
        &self,
        stream: TcpStream,
        remote: SocketAddr,
        engine: Arc<Engine>,
    ) -> BoxFuture<'static, Result<(), TransportError>> {
        Box::pin(async move {
            let io = TokioIo::new(stream);
            let service = service_fn(move |req| handle(Arc::clone(&engine), remote, req));
            http1::Builder::new().serve_connection(io, service).await?;
            Ok(())
        })
    }
}
