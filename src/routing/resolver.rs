//! Resolver contract consumed by the dispatch engine.

use std::collections::HashMap;

use http::Method;

use crate::pipeline::Handler;

/// Structured result of matching a path against a route pattern.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ParseResult {
    /// Pattern of the matched route, e.g. `users/:id`.
    pub pattern: String,
    /// Normalized path that was matched.
    pub path: String,
    /// Captured parameters in pattern order.
    pub captures: Vec<(String, String)>,
    /// Remainder swallowed by a trailing `*`, if any.
    pub tail: Option<String>,
}

/// A single route that matched the request.
#[derive(Debug, Clone)]
pub struct RouteMatch {
    pub handlers: Vec<Handler>,
    pub params: HashMap<String, String>,
    pub parse_result: ParseResult,
}

/// Maps a normalized path and method to the ordered list of matches.
///
/// Implementations must be pure with respect to their inputs: the engine
/// memoizes results in production mode.
pub trait RouteResolver: Send + Sync {
    fn resolve(&self, path: &str, method: &Method) -> Vec<RouteMatch>;
}
