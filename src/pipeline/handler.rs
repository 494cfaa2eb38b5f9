//! Handler model.
//!
//! A route carries a list of [`Handler`]s. Groups nest; everything is
//! flattened into a single ordered chain once, at resolution time.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use bytes::Bytes;
use futures_util::future::BoxFuture;

use crate::http::{BoxError, RequestContext, ResponseContext};

/// What a handler returns; interpreted by the application's executor.
#[derive(Debug, Clone, PartialEq)]
pub enum HandlerResult {
    /// Nothing to add; the pipeline continues while the response is open.
    Continue,
    /// `true` continues, `false` closes the response.
    Bool(bool),
    /// Plain-text body.
    Text(String),
    /// JSON body.
    Json(serde_json::Value),
    /// Raw body bytes.
    Bytes(Bytes),
}

/// Outcome of invoking a handler or hook.
pub type HandlerOutcome = Result<HandlerResult, BoxError>;

/// A callable pipeline step.
pub type HandlerFn = Arc<
    dyn for<'a> Fn(&'a mut RequestContext, &'a mut ResponseContext) -> BoxFuture<'a, HandlerOutcome>
        + Send
        + Sync,
>;

/// One entry of a route's handler list.
#[derive(Clone)]
pub enum Handler {
    /// Stops the pipeline. Ignored when it leads the chain.
    Terminator,
    /// An async function of the request and response.
    Callable(HandlerFn),
    /// A nested ordered sub-chain.
    Group(Vec<Handler>),
}

impl Handler {
    /// Wrap an async function as a handler.
    ///
    /// ```ignore
    /// let hello = Handler::callable(|_req, res| Box::pin(async move {
    ///     res.text("hello")?;
    ///     Ok(HandlerResult::Continue)
    /// }));
    /// ```
    pub fn callable<F>(f: F) -> Self
    where
        F: for<'a> Fn(&'a mut RequestContext, &'a mut ResponseContext) -> BoxFuture<'a, HandlerOutcome>
            + Send
            + Sync
            + 'static,
    {
        Handler::Callable(Arc::new(f))
    }

    /// A handler that always yields the same result.
    pub fn value(result: HandlerResult) -> Self {
        Handler::callable(move |_req, _res| {
            let result = result.clone();
            Box::pin(async move { Ok(result) })
        })
    }

    /// A handler from a function that only needs the request.
    pub fn from_fn<F, Fut>(f: F) -> Self
    where
        F: Fn(RequestContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerOutcome> + Send + 'static,
    {
        let f = Arc::new(f);
        Handler::callable(move |req, _res| {
            let fut = f(req.clone());
            Box::pin(fut)
        })
    }

    pub fn group(handlers: impl IntoIterator<Item = Handler>) -> Self {
        Handler::Group(handlers.into_iter().collect())
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Handler::Terminator => f.write_str("Terminator"),
            Handler::Callable(_) => f.write_str("Callable"),
            Handler::Group(inner) => f.debug_tuple("Group").field(inner).finish(),
        }
    }
}

enum Flatten {
    Continue,
    Stop,
}

/// Flatten handler groups into one ordered chain.
///
/// A leading terminator is skipped; any later terminator truncates the chain.
pub fn flatten<'h>(groups: impl IntoIterator<Item = &'h [Handler]>) -> Vec<HandlerFn> {
    let mut chain = Vec::new();
    let mut leading = true;
    for group in groups {
        if let Flatten::Stop = flatten_into(group, &mut chain, &mut leading) {
            break;
        }
    }
    chain
}

fn flatten_into(handlers: &[Handler], chain: &mut Vec<HandlerFn>, leading: &mut bool) -> Flatten {
    for handler in handlers {
        match handler {
            Handler::Terminator if *leading => {
                *leading = false;
            }
            Handler::Terminator => return Flatten::Stop,
            Handler::Callable(f) => {
                *leading = false;
                chain.push(Arc::clone(f));
            }
            Handler::Group(inner) => {
                if let Flatten::Stop = flatten_into(inner, chain, leading) {
                    return Flatten::Stop;
                }
            }
        }
    }
    Flatten::Continue
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop() -> Handler {
        Handler::value(HandlerResult::Continue)
    }

    #[test]
    fn nested_groups_flatten_in_order() {
        let handlers = vec![noop(), Handler::group(vec![noop(), Handler::group(vec![noop()])]), noop()];
        assert_eq!(flatten([handlers.as_slice()]).len(), 4);
    }

    #[test]
    fn leading_terminator_is_skipped() {
        let handlers = vec![Handler::Terminator, noop(), noop()];
        assert_eq!(flatten([handlers.as_slice()]).len(), 2);
    }

    #[test]
    fn later_terminator_truncates_across_matches() {
        let first = vec![noop(), Handler::group(vec![Handler::Terminator, noop()])];
        let second = vec![noop()];
        assert_eq!(flatten([first.as_slice(), second.as_slice()]).len(), 1);
    }

    #[test]
    fn empty_input_gives_empty_chain() {
        assert!(flatten(std::iter::empty()).is_empty());
    }
}
