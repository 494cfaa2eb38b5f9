//! Per-request fault isolation.
//!
//! # Responsibilities
//! - Run resolution, the pipeline and finalizer preparation as one fallible unit
//! - Catch returned errors and panics from that unit, for this request only
//! - Normalize every fault into an [`HttpException`] exactly once
//! - Report the fault (application logger or stderr)
//!
//! # Design Decisions
//! - Isolated mode spawns the unit on its own task; a panic there loses the
//!   moved contexts, so they are rebuilt from a snapshot taken before spawning
//! - Direct mode polls the unit inline under `catch_unwind`
//! - In both modes a panic discards the partially written response

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::FutureExt;

use crate::app::Application;
use crate::config::Isolation;
use crate::dispatch::finalizer;
use crate::http::{BoxError, HttpException, RequestContext, ResponseContext};
use crate::observability::logging::report_to_stderr;
use crate::observability::metrics;
use crate::pipeline::run_pipeline;
use crate::routing::{resolve_pipeline, ResolutionCache};

/// What the fallible part of dispatch produced.
pub enum Outcome {
    /// Ready to commit.
    Prepared(RequestContext, ResponseContext),
    /// A fault was caught and normalized.
    Faulted {
        exception: HttpException,
        req: RequestContext,
        res: ResponseContext,
    },
}

/// Resolve, run the pipeline, prepare the response.
async fn process(
    app: &Application,
    cache: Option<&ResolutionCache>,
    req: &mut RequestContext,
    res: &mut ResponseContext,
) -> Result<(), BoxError> {
    let resolver = app.resolver();
    let resolution = resolve_pipeline(&**resolver, cache, req.method(), req.path());
    resolution.apply_to(req);
    tracing::debug!(handlers = resolution.chain().len(), "Pipeline resolved");

    run_pipeline(resolution.chain(), app.executor(), req, res).await?;
    finalizer::prepare(app, req, res, false).await
}

/// Run the fallible part of dispatch under the configured isolation.
pub async fn execute(
    app: &Arc<Application>,
    cache: &ResolutionCache,
    isolation: Isolation,
    req: RequestContext,
    res: ResponseContext,
) -> Outcome {
    match isolation {
        Isolation::Isolated => isolated(app, cache, req, res).await,
        Isolation::Direct => direct(app, cache, req, res).await,
    }
}

async fn isolated(
    app: &Arc<Application>,
    cache: &ResolutionCache,
    mut req: RequestContext,
    mut res: ResponseContext,
) -> Outcome {
    let snapshot = req.clone();
    let task_app = Arc::clone(app);
    let task_cache = cache.clone();

    let task = tokio::spawn(async move {
        let cache = task_app.is_production().then_some(&task_cache);
        let result = process(&task_app, cache, &mut req, &mut res).await;
        (req, res, result)
    });

    match task.await {
        Ok((req, res, Ok(()))) => Outcome::Prepared(req, res),
        Ok((req, res, Err(fault))) => Outcome::Faulted {
            exception: HttpException::from_fault(fault),
            req,
            res,
        },
        Err(e) if e.is_panic() => Outcome::Faulted {
            exception: HttpException::from_panic(e.into_panic()),
            req: snapshot,
            res: app.new_response_context(),
        },
        Err(e) => Outcome::Faulted {
            exception: HttpException::internal("dispatch task cancelled").with_cause(Box::new(e)),
            req: snapshot,
            res: app.new_response_context(),
        },
    }
}

async fn direct(
    app: &Arc<Application>,
    cache: &ResolutionCache,
    mut req: RequestContext,
    mut res: ResponseContext,
) -> Outcome {
    let cache = app.is_production().then_some(cache);
    let caught = AssertUnwindSafe(process(app, cache, &mut req, &mut res))
        .catch_unwind()
        .await;

    match caught {
        Ok(Ok(())) => Outcome::Prepared(req, res),
        Ok(Err(fault)) => Outcome::Faulted {
            exception: HttpException::from_fault(fault),
            req,
            res,
        },
        Err(payload) => Outcome::Faulted {
            exception: HttpException::from_panic(payload),
            req,
            res: app.new_response_context(),
        },
    }
}

/// Report a normalized fault once.
pub fn report(app: &Application, uri: &str, exception: &HttpException) {
    metrics::record_fault(exception.status().as_u16());
    match app.logger() {
        Some(logger) => logger.severe(uri, exception),
        None => report_to_stderr(uri, exception),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::InputError;
    use crate::pipeline::{Handler, HandlerResult};
    use crate::routing::RouteTable;
    use bytes::Bytes;
    use http::{HeaderMap, Method, StatusCode};

    fn app() -> Arc<Application> {
        let table = RouteTable::new()
            .get("ok", vec![Handler::value(HandlerResult::Text("fine".into()))])
            .get(
                "input",
                vec![Handler::callable(|_req, _res| {
                    Box::pin(async move { Err(InputError::new("id must be numeric").into()) })
                })],
            )
            .get(
                "boom",
                vec![Handler::callable(|_req, _res| {
                    Box::pin(async move {
                        let cause: BoxError = "disk full".into();
                        Err(cause)
                    })
                })],
            )
            .get(
                "panic",
                vec![Handler::callable(|_req, res| {
                    Box::pin(async move {
                        res.write("partial")?;
                        panic!("handler exploded");
                    })
                })],
            );
        Arc::new(Application::builder().resolver(table).build())
    }

    async fn run(isolation: Isolation, path: &str) -> Outcome {
        let app = app();
        let req = RequestContext::new(Method::GET, path.parse().unwrap(), HeaderMap::new(), Bytes::new());
        let res = app.new_response_context();
        execute(&app, &ResolutionCache::new(), isolation, req, res).await
    }

    fn fault_status(outcome: Outcome) -> (StatusCode, String, ResponseContext) {
        match outcome {
            Outcome::Faulted { exception, res, .. } => (exception.status(), exception.message().to_string(), res),
            Outcome::Prepared(..) => panic!("expected a fault"),
        }
    }

    #[tokio::test]
    async fn success_is_prepared_in_both_modes() {
        for isolation in [Isolation::Isolated, Isolation::Direct] {
            match run(isolation, "/ok").await {
                Outcome::Prepared(_, res) => assert_eq!(res.body(), b"fine"),
                Outcome::Faulted { exception, .. } => panic!("unexpected fault: {exception}"),
            }
        }
    }

    #[tokio::test]
    async fn input_errors_become_400() {
        for isolation in [Isolation::Isolated, Isolation::Direct] {
            let (status, message, _) = fault_status(run(isolation, "/input").await);
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(message, "id must be numeric");
        }
    }

    #[tokio::test]
    async fn unclassified_errors_become_500() {
        for isolation in [Isolation::Isolated, Isolation::Direct] {
            let (status, _, _) = fault_status(run(isolation, "/boom").await);
            assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        }
    }

    #[tokio::test]
    async fn panics_become_500_with_a_fresh_response() {
        for isolation in [Isolation::Isolated, Isolation::Direct] {
            let (status, _, res) = fault_status(run(isolation, "/panic").await);
            assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
            assert!(res.is_open());
            assert!(res.body().is_empty());
        }
    }
}
