//! Minimal ordered route table.
//!
//! # Responsibilities
//! - Match method (exact, or any) and path pattern
//! - Capture `:name` segments and a trailing `*` remainder
//! - Report every matching route, in registration order
//!
//! # Design Decisions
//! - Path matching is case-sensitive, segment by segment
//! - No regex and no tree: an O(n) scan over registered routes
//! - Several routes may match one request (e.g. a `*` middleware route
//!   followed by the endpoint); the engine merges them in order

use std::collections::HashMap;

use http::Method;

use crate::http::normalize_path;
use crate::pipeline::Handler;
use crate::routing::resolver::{ParseResult, RouteMatch, RouteResolver};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param(String),
    Wildcard,
}

/// A compiled path pattern such as `users/:id/*`.
#[derive(Debug, Clone)]
pub struct PathPattern {
    source: String,
    segments: Vec<Segment>,
}

impl PathPattern {
    pub fn parse(pattern: &str) -> Self {
        let source = normalize_path(pattern).to_string();
        let segments = source
            .split('/')
            .filter(|s| !s.is_empty())
            .map(|s| match s {
                "*" => Segment::Wildcard,
                s if s.starts_with(':') => Segment::Param(s[1..].to_string()),
                s => Segment::Literal(s.to_string()),
            })
            .collect();
        Self { source, segments }
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Match a normalized path, returning the parse result on success.
    pub fn matches(&self, path: &str) -> Option<ParseResult> {
        let parts: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        let mut captures = Vec::new();

        for (i, segment) in self.segments.iter().enumerate() {
            match segment {
                Segment::Wildcard => {
                    return Some(ParseResult {
                        pattern: self.source.clone(),
                        path: path.to_string(),
                        captures,
                        tail: Some(parts.get(i..).unwrap_or_default().join("/")),
                    });
                }
                Segment::Literal(lit) => {
                    if parts.get(i) != Some(&lit.as_str()) {
                        return None;
                    }
                }
                Segment::Param(name) => {
                    let value = parts.get(i)?;
                    captures.push((name.clone(), (*value).to_string()));
                }
            }
        }

        if parts.len() != self.segments.len() {
            return None;
        }

        Some(ParseResult {
            pattern: self.source.clone(),
            path: path.to_string(),
            captures,
            tail: None,
        })
    }
}

#[derive(Debug, Clone)]
struct Route {
    method: Option<Method>,
    pattern: PathPattern,
    handlers: Vec<Handler>,
}

/// Ordered list of routes implementing [`RouteResolver`].
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    routes: Vec<Route>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register handlers for `method` (or every method when `None`).
    pub fn route(mut self, method: Option<Method>, pattern: &str, handlers: Vec<Handler>) -> Self {
        self.routes.push(Route {
            method,
            pattern: PathPattern::parse(pattern),
            handlers,
        });
        self
    }

    pub fn get(self, pattern: &str, handlers: Vec<Handler>) -> Self {
        self.route(Some(Method::GET), pattern, handlers)
    }

    pub fn post(self, pattern: &str, handlers: Vec<Handler>) -> Self {
        self.route(Some(Method::POST), pattern, handlers)
    }

    pub fn put(self, pattern: &str, handlers: Vec<Handler>) -> Self {
        self.route(Some(Method::PUT), pattern, handlers)
    }

    pub fn delete(self, pattern: &str, handlers: Vec<Handler>) -> Self {
        self.route(Some(Method::DELETE), pattern, handlers)
    }

    pub fn any(self, pattern: &str, handlers: Vec<Handler>) -> Self {
        self.route(None, pattern, handlers)
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

impl RouteResolver for RouteTable {
    fn resolve(&self, path: &str, method: &Method) -> Vec<RouteMatch> {
        self.routes
            .iter()
            .filter(|route| route.method.as_ref().map_or(true, |m| m == method))
            .filter_map(|route| {
                let parse_result = route.pattern.matches(path)?;
                let params: HashMap<String, String> = parse_result.captures.iter().cloned().collect();
                Some(RouteMatch {
                    handlers: route.handlers.clone(),
                    params,
                    parse_result,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::HandlerResult;

    fn noop() -> Vec<Handler> {
        vec![Handler::value(HandlerResult::Continue)]
    }

    #[test]
    fn test_literal_and_param_segments() {
        let pattern = PathPattern::parse("/users/:id");
        let parsed = pattern.matches("users/42").unwrap();
        assert_eq!(parsed.captures, vec![("id".to_string(), "42".to_string())]);
        assert!(pattern.matches("users").is_none());
        assert!(pattern.matches("users/42/posts").is_none());
        assert!(pattern.matches("Users/42").is_none()); // Case sensitive
    }

    #[test]
    fn test_wildcard_swallows_remainder() {
        let pattern = PathPattern::parse("static/*");
        let parsed = pattern.matches("static/css/site.css").unwrap();
        assert_eq!(parsed.tail.as_deref(), Some("css/site.css"));
        assert!(PathPattern::parse("*").matches("").is_some());
    }

    #[test]
    fn test_root_pattern() {
        let pattern = PathPattern::parse("/");
        assert!(pattern.matches("").is_some());
        assert!(pattern.matches("a").is_none());
    }

    #[test]
    fn test_all_matches_in_registration_order() {
        let table = RouteTable::new()
            .any("*", noop())
            .get("users/:id", noop())
            .post("users/:id", noop());

        let matches = table.resolve("users/7", &Method::GET);
        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].parse_result.pattern, "*");
        assert_eq!(matches[1].params.get("id").map(String::as_str), Some("7"));
    }
}
