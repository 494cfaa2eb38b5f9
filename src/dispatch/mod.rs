//! Request dispatch engine.
//!
//! # Data Flow
//! ```text
//! (RequestContext, ResponseContext) from the transport
//!     → boundary.rs (resolve → pipeline → finalizer::prepare, faults caught)
//!         ok    → finalizer::commit
//!         fault → report → responder.rs → finalizer::commit
//!     → RawResponse closed
//!
//! Context construction failed:
//!     → report → responder::respond_without_context (plain 500)
//! ```
//!
//! # Design Decisions
//! - The engine is transport-agnostic; it only writes through `RawResponse`
//! - The resolution cache is consulted only in production mode
//! - A fault raised by the responder is fatal for the request and never
//!   re-enters the boundary

pub mod boundary;
pub mod encoding;
pub mod finalizer;
pub mod responder;

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::FutureExt;
use tracing::Instrument;

use crate::app::Application;
use crate::config::{DispatchConfig, Isolation};
use crate::http::{HttpException, RequestContext, ResponseContext};
use crate::routing::ResolutionCache;
use crate::transport::RawResponse;

pub use boundary::Outcome;
pub use encoding::{builtin_codec, negotiate, CodecError, CompressionLevel, ContentCodec};

/// The dispatch engine shared by every connection.
#[derive(Debug)]
pub struct Engine {
    app: Arc<Application>,
    cache: ResolutionCache,
    isolation: Isolation,
    max_body_bytes: usize,
}

impl Engine {
    pub fn new(app: Arc<Application>, config: &DispatchConfig) -> Self {
        Self {
            app,
            cache: ResolutionCache::new(),
            isolation: config.isolation,
            max_body_bytes: config.max_body_bytes,
        }
    }

    pub fn app(&self) -> &Arc<Application> {
        &self.app
    }

    pub fn cache(&self) -> &ResolutionCache {
        &self.cache
    }

    pub fn isolation(&self) -> Isolation {
        self.isolation
    }

    pub fn max_body_bytes(&self) -> usize {
        self.max_body_bytes
    }

    /// Dispatch one request and leave `raw` closed.
    pub async fn dispatch(
        &self,
        uri: &str,
        exchange: Result<(RequestContext, ResponseContext), HttpException>,
        raw: &mut dyn RawResponse,
    ) {
        let (req, res) = match exchange {
            Ok(contexts) => contexts,
            Err(exception) => {
                boundary::report(&self.app, uri, &exception);
                responder::respond_without_context(raw);
                return;
            }
        };

        let span = tracing::info_span!(
            "request",
            request_id = %req.id(),
            method = %req.method(),
            path = %req.uri().path(),
        );
        self.run(uri, req, res, raw).instrument(span).await
    }

    async fn run(&self, uri: &str, req: RequestContext, res: ResponseContext, raw: &mut dyn RawResponse) {
        let app = &self.app;
        match boundary::execute(app, &self.cache, self.isolation, req, res).await {
            Outcome::Prepared(req, mut res) => finalizer::commit(app, &req, &mut res, raw),
            Outcome::Faulted {
                exception,
                mut req,
                mut res,
            } => {
                boundary::report(app, uri, &exception);
                let handled = AssertUnwindSafe(responder::respond(app, &exception, &mut req, &mut res))
                    .catch_unwind()
                    .await;
                match handled {
                    Ok(Ok(())) => finalizer::commit(app, &req, &mut res, raw),
                    Ok(Err(e)) => responder::fail(app, uri, &e, raw),
                    Err(payload) => responder::fail(app, uri, &HttpException::from_panic(payload), raw),
                }
            }
        }
    }
}
