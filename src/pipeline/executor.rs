//! Sequential pipeline execution.
//!
//! # Responsibilities
//! - Run the flattened chain left to right, one handler at a time
//! - Hand each result to the application's [`HandlerExecutor`]
//! - Stop as soon as the response is closed
//!
//! # Design Decisions
//! - Handler results are discarded after interpretation; only `is_open` decides
//!   whether the next handler runs
//! - Faults propagate with `?` to the dispatch boundary; nothing is caught here

use futures_util::future::BoxFuture;

use crate::http::{BoxError, RequestContext, ResponseContext};
use crate::pipeline::handler::{HandlerFn, HandlerResult};

/// Interprets a handler's return value against the response.
///
/// Returns whether the pipeline may continue.
pub trait HandlerExecutor: Send + Sync {
    fn apply<'a>(
        &'a self,
        result: HandlerResult,
        req: &'a mut RequestContext,
        res: &'a mut ResponseContext,
    ) -> BoxFuture<'a, Result<bool, BoxError>>;
}

/// Default interpretation of handler results.
///
/// - `Continue` continues while the response is open
/// - `Bool(false)` closes the response
/// - `Text`, `Json` and `Bytes` write the body and close
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultExecutor;

impl HandlerExecutor for DefaultExecutor {
    fn apply<'a>(
        &'a self,
        result: HandlerResult,
        _req: &'a mut RequestContext,
        res: &'a mut ResponseContext,
    ) -> BoxFuture<'a, Result<bool, BoxError>> {
        Box::pin(async move {
            match result {
                HandlerResult::Continue => {}
                HandlerResult::Bool(true) => {}
                HandlerResult::Bool(false) => res.close(),
                HandlerResult::Text(text) if res.is_open() => res.text(text)?,
                HandlerResult::Json(value) if res.is_open() => res.json(&value)?,
                HandlerResult::Bytes(bytes) if res.is_open() => {
                    res.write(&bytes)?;
                    res.close();
                }
                // Body results against a closed response are dropped.
                HandlerResult::Text(_) | HandlerResult::Json(_) | HandlerResult::Bytes(_) => {}
            }
            Ok(res.is_open())
        })
    }
}

/// Run `chain` in order until it is exhausted or the response closes.
pub async fn run_pipeline(
    chain: &[HandlerFn],
    executor: &dyn HandlerExecutor,
    req: &mut RequestContext,
    res: &mut ResponseContext,
) -> Result<(), BoxError> {
    for handler in chain {
        if !res.is_open() {
            break;
        }
        let result = handler(req, res).await?;
        executor.apply(result, req, res).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::CodecMap;
    use crate::pipeline::handler::{flatten, Handler};
    use bytes::Bytes;
    use http::{HeaderMap, Method};
    use std::sync::{Arc, Mutex};

    fn contexts() -> (RequestContext, ResponseContext) {
        let req = RequestContext::new(Method::GET, "/".parse().unwrap(), HeaderMap::new(), Bytes::new());
        (req, ResponseContext::new(CodecMap::new()))
    }

    fn recorder(log: &Arc<Mutex<Vec<&'static str>>>, name: &'static str, close: bool) -> Handler {
        let log = Arc::clone(log);
        Handler::callable(move |_req, res| {
            let log = Arc::clone(&log);
            Box::pin(async move {
                log.lock().unwrap().push(name);
                if close {
                    res.close();
                }
                Ok(HandlerResult::Continue)
            })
        })
    }

    #[tokio::test]
    async fn handlers_run_in_declared_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let handlers = vec![
            recorder(&log, "a", false),
            Handler::group(vec![recorder(&log, "b", false), recorder(&log, "c", false)]),
            recorder(&log, "d", false),
        ];
        let chain = flatten([handlers.as_slice()]);
        let (mut req, mut res) = contexts();

        run_pipeline(&chain, &DefaultExecutor, &mut req, &mut res).await.unwrap();

        assert_eq!(*log.lock().unwrap(), vec!["a", "b", "c", "d"]);
    }

    #[tokio::test]
    async fn closing_the_response_halts_the_chain() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let handlers = vec![
            recorder(&log, "auth", true),
            recorder(&log, "never", false),
        ];
        let chain = flatten([handlers.as_slice()]);
        let (mut req, mut res) = contexts();

        run_pipeline(&chain, &DefaultExecutor, &mut req, &mut res).await.unwrap();

        assert_eq!(*log.lock().unwrap(), vec!["auth"]);
        assert!(!res.is_open());
    }

    #[tokio::test]
    async fn body_results_write_and_close() {
        let handlers = vec![
            Handler::value(HandlerResult::Text("hi".into())),
            Handler::value(HandlerResult::Text("ignored".into())),
        ];
        let chain = flatten([handlers.as_slice()]);
        let (mut req, mut res) = contexts();

        run_pipeline(&chain, &DefaultExecutor, &mut req, &mut res).await.unwrap();

        assert_eq!(res.body(), b"hi");
        assert!(!res.is_open());
    }

    #[tokio::test]
    async fn false_result_stops_the_pipeline() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let handlers = vec![
            Handler::value(HandlerResult::Bool(false)),
            recorder(&log, "never", false),
        ];
        let chain = flatten([handlers.as_slice()]);
        let (mut req, mut res) = contexts();

        run_pipeline(&chain, &DefaultExecutor, &mut req, &mut res).await.unwrap();

        assert!(log.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn faults_propagate() {
        let handlers = vec![Handler::callable(|_req, _res| {
            Box::pin(async move { Err("nope".into()) })
        })];
        let chain = flatten([handlers.as_slice()]);
        let (mut req, mut res) = contexts();

        let err = run_pipeline(&chain, &DefaultExecutor, &mut req, &mut res).await.unwrap_err();
        assert_eq!(err.to_string(), "nope");
    }
}
