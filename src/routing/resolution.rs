//! Pipeline resolution: route matches → flattened chain + merged parameters.

use std::collections::HashMap;
use std::sync::Arc;

use http::Method;

use crate::http::RequestContext;
use crate::pipeline::{flatten, HandlerFn};
use crate::routing::cache::{ResolutionCache, ResolutionKey};
use crate::routing::resolver::{ParseResult, RouteResolver};

/// Immutable result of resolving one (method, path).
pub struct PipelineResolution {
    chain: Vec<HandlerFn>,
    params: HashMap<String, String>,
    parse_result: Option<Arc<ParseResult>>,
}

impl PipelineResolution {
    /// A resolution with no handlers; dispatch falls straight through to
    /// finalization.
    pub fn empty() -> Self {
        Self {
            chain: Vec::new(),
            params: HashMap::new(),
            parse_result: None,
        }
    }

    /// Ask the resolver and fold its matches into one resolution.
    pub fn compute(resolver: &dyn RouteResolver, path: &str, method: &Method) -> Self {
        let matches = resolver.resolve(path, method);

        let chain = flatten(matches.iter().map(|m| m.handlers.as_slice()));

        // Later matches overwrite earlier keys.
        let mut params = HashMap::new();
        for m in &matches {
            params.extend(m.params.iter().map(|(k, v)| (k.clone(), v.clone())));
        }

        let parse_result = matches.first().map(|m| Arc::new(m.parse_result.clone()));

        Self {
            chain,
            params,
            parse_result,
        }
    }

    pub fn chain(&self) -> &[HandlerFn] {
        &self.chain
    }

    pub fn params(&self) -> &HashMap<String, String> {
        &self.params
    }

    pub fn parse_result(&self) -> Option<&ParseResult> {
        self.parse_result.as_deref()
    }

    /// Seed the request's parameter map and parse result.
    pub fn apply_to(&self, req: &mut RequestContext) {
        req.params_mut()
            .extend(self.params.iter().map(|(k, v)| (k.clone(), v.clone())));
        req.set_parse_result(self.parse_result.clone());
    }
}

impl std::fmt::Debug for PipelineResolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineResolution")
            .field("handlers", &self.chain.len())
            .field("params", &self.params)
            .field("parse_result", &self.parse_result)
            .finish()
    }
}

/// Resolve `path` for `method`, memoizing in `cache` when one is given.
///
/// Passing `None` (development mode) always recomputes so that route edits
/// take effect immediately.
pub fn resolve_pipeline(
    resolver: &dyn RouteResolver,
    cache: Option<&ResolutionCache>,
    method: &Method,
    normalized_path: &str,
) -> Arc<PipelineResolution> {
    let Some(cache) = cache else {
        return Arc::new(PipelineResolution::compute(resolver, normalized_path, method));
    };

    let key = ResolutionKey::new(method, normalized_path);
    if let Some(hit) = cache.get(&key) {
        return hit;
    }

    let computed = Arc::new(PipelineResolution::compute(resolver, normalized_path, method));
    cache.insert(key, computed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::normalize_path;
    use crate::pipeline::{Handler, HandlerResult};
    use crate::routing::table::RouteTable;
    use crate::routing::RouteMatch;

    fn noop() -> Handler {
        Handler::value(HandlerResult::Continue)
    }

    fn table() -> RouteTable {
        RouteTable::new()
            .any("*", vec![noop()])
            .get("/", vec![noop(), noop()])
            .get("users/:id", vec![noop()])
            .get(":section/:id", vec![noop()])
    }

    #[test]
    fn test_root_and_empty_resolve_identically() {
        let table = table();
        let root = resolve_pipeline(&table, None, &Method::GET, normalize_path("/"));
        let empty = resolve_pipeline(&table, None, &Method::GET, normalize_path(""));
        assert_eq!(root.chain().len(), empty.chain().len());
        assert_eq!(root.chain().len(), 3);
        assert_eq!(root.params(), empty.params());
        assert_eq!(root.parse_result(), empty.parse_result());
    }

    #[test]
    fn test_overlapping_routes_merge_params() {
        let resolution = resolve_pipeline(&table(), None, &Method::GET, "users/7");
        assert_eq!(resolution.params().get("id").map(String::as_str), Some("7"));
        assert_eq!(resolution.params().get("section").map(String::as_str), Some("users"));
        assert_eq!(resolution.parse_result().unwrap().pattern, "*");
        assert_eq!(resolution.chain().len(), 3);
    }

    /// Returns fixed matches regardless of the request.
    struct Fixed(Vec<RouteMatch>);

    impl RouteResolver for Fixed {
        fn resolve(&self, _path: &str, _method: &Method) -> Vec<RouteMatch> {
            self.0.clone()
        }
    }

    fn route(pattern: &str, params: &[(&str, &str)]) -> RouteMatch {
        RouteMatch {
            handlers: vec![noop()],
            params: params.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
            parse_result: ParseResult {
                pattern: pattern.to_string(),
                ..ParseResult::default()
            },
        }
    }

    #[test]
    fn test_later_matches_win_parameter_collisions() {
        let resolver = Fixed(vec![
            route("tenants/:id", &[("id", "first"), ("tenant", "acme")]),
            route("users/:id", &[("id", "second")]),
        ]);

        let resolution = resolve_pipeline(&resolver, None, &Method::GET, "anything");

        assert_eq!(resolution.params().get("id").map(String::as_str), Some("second"));
        assert_eq!(resolution.params().get("tenant").map(String::as_str), Some("acme"));
        assert_eq!(resolution.parse_result().unwrap().pattern, "tenants/:id");
        assert_eq!(resolution.chain().len(), 2);
    }

    #[test]
    fn test_production_cache_returns_same_object() {
        let cache = ResolutionCache::new();
        let table = table();
        let first = resolve_pipeline(&table, Some(&cache), &Method::GET, "users/7");
        let second = resolve_pipeline(&table, Some(&cache), &Method::GET, "users/7");
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_development_mode_recomputes() {
        let table = table();
        let first = resolve_pipeline(&table, None, &Method::GET, "users/7");
        let second = resolve_pipeline(&table, None, &Method::GET, "users/7");
        assert!(!Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_no_match_is_empty() {
        let table = RouteTable::new().get("users", vec![noop()]);
        let resolution = resolve_pipeline(&table, None, &Method::GET, "");
        assert!(resolution.chain().is_empty());
        assert!(resolution.parse_result().is_none());
    }

    #[test]
    fn test_apply_seeds_request() {
        let resolution = resolve_pipeline(&table(), None, &Method::GET, "users/7");
        let mut req = RequestContext::new(
            Method::GET,
            "/users/7".parse().unwrap(),
            http::HeaderMap::new(),
            bytes::Bytes::new(),
        );
        resolution.apply_to(&mut req);
        assert_eq!(req.param("id"), Some("7"));
        assert_eq!(req.parse_result().unwrap().pattern, "*");
    }
}
