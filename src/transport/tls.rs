//! Encrypted transport: TLS with ALPN choosing HTTP/2 or HTTP/1.1.

use std::fs::File;
use std::io::BufReader;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use axum_server::accept::Accept;
use axum_server::tls_rustls::{RustlsAcceptor, RustlsConfig};
use futures_util::future::BoxFuture;
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto;
use tokio::net::TcpStream;

use crate::dispatch::Engine;
use crate::transport::exchange::handle;
use crate::transport::{Transport, TransportError};

#[derive(Clone)]
pub struct TlsTransport {
    acceptor: RustlsAcceptor,
}

impl TlsTransport {
    /// Load a PEM certificate chain and private key.
    pub async fn from_pem_files(cert_path: &Path, key_path: &Path) -> Result<Self, TransportError> {
        check_pem(cert_path, key_path)?;
        let config = RustlsConfig::from_pem_file(cert_path, key_path)
            .await
            .map_err(TransportError::Tls)?;
        tracing::info!(cert = %cert_path.display(), "TLS certificate loaded");
        Ok(Self {
            acceptor: RustlsAcceptor::new(config),
        })
    }
}

impl std::fmt::Debug for TlsTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TlsTransport").finish_non_exhaustive()
    }
}

/// Fail early with a readable error when either file holds no usable PEM item.
fn check_pem(cert_path: &Path, key_path: &Path) -> Result<(), TransportError> {
    let pem_error = |path: &Path, reason: String| TransportError::Pem {
        path: path.display().to_string(),
        reason,
    };

    let mut certs = BufReader::new(File::open(cert_path).map_err(|e| pem_error(cert_path, e.to_string()))?);
    let chain = rustls_pemfile::certs(&mut certs)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| pem_error(cert_path, e.to_string()))?;
    if chain.is_empty() {
        return Err(pem_error(cert_path, "no certificates found".into()));
    }

    let mut key = BufReader::new(File::open(key_path).map_err(|e| pem_error(key_path, e.to_string()))?);
    match rustls_pemfile::private_key(&mut key) {
        Ok(Some(_)) => Ok(()),
        Ok(None) => Err(pem_error(key_path, "no private key found".into())),
        Err(e) => Err(pem_error(key_path, e.to_string())),
    }
}

impl Transport for TlsTransport {
    fn scheme(&self) -> &'static str {
        "https"
    }

    fn serve(
        &self,
        stream: TcpStream,
        remote: SocketAddr,
        engine: Arc<Engine>,
    ) -> BoxFuture<'static, Result<(), TransportError>> {
        let acceptor = self.acceptor.clone();
        Box::pin(async move {
            let (tls, ()) = acceptor.accept(stream, ()).await.map_err(TransportError::Tls)?;
            let io = TokioIo::new(tls);
            let service = service_fn(move |req| handle(Arc::clone(&engine), remote, req));
            auto::Builder::new(TokioExecutor::new())
                .serve_connection(io, service)
                .await
                .map_err(TransportError::Serve)?;
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_certificate_is_reported() {
        let err = check_pem(Path::new("missing/cert.pem"), Path::new("missing/key.pem")).unwrap_err();
        assert!(matches!(err, TransportError::Pem { ref path, .. } if path == "missing/cert.pem"));
    }
}
