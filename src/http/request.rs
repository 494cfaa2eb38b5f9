//! Request context handed to handlers.
//!
//! # Responsibilities
//! - Carry a unique request ID (UUID v4) for log correlation
//! - Expose method, path, query, headers and the collected body
//! - Hold the mutable parameter map seeded by route resolution
//! - Hold request-scoped state (parse result, start instant, typed extensions)
//!
//! # Design Decisions
//! - Path is normalized once at construction (stray slashes trimmed)
//! - Body is collected before dispatch; handlers see a `Bytes` snapshot
//! - Named fields replace a per-request service container

use std::collections::HashMap;
use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use http::{Extensions, HeaderMap, Method, Uri};
use serde::de::DeserializeOwned;
use uuid::Uuid;

use crate::routing::ParseResult;

/// Header carrying the request ID back to the client.
pub const X_REQUEST_ID: &str = "x-request-id";

/// Unique identifier for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestId(Uuid);

impl RequestId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Trim stray leading and trailing slashes. `/` and `` both become ``.
pub fn normalize_path(path: &str) -> &str {
    path.trim_matches('/')
}

/// Per-request state visible to every handler in the pipeline.
#[derive(Debug, Clone)]
pub struct RequestContext {
    id: RequestId,
    method: Method,
    uri: Uri,
    path: String,
    headers: HeaderMap,
    body: Bytes,
    remote_addr: Option<SocketAddr>,
    started: Instant,
    params: HashMap<String, String>,
    parse_result: Option<Arc<ParseResult>>,
    state: Extensions,
}

impl RequestContext {
    pub fn new(method: Method, uri: Uri, headers: HeaderMap, body: Bytes) -> Self {
        let path = normalize_path(uri.path()).to_string();
        Self {
            id: RequestId::new(),
            method,
            uri,
            path,
            headers,
            body,
            remote_addr: None,
            started: Instant::now(),
            params: HashMap::new(),
            parse_result: None,
            state: Extensions::new(),
        }
    }

    pub fn with_remote_addr(mut self, addr: SocketAddr) -> Self {
        self.remote_addr = Some(addr);
        self
    }

    pub fn id(&self) -> RequestId {
        self.id
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    /// Normalized path, without leading or trailing slashes.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn query(&self) -> Option<&str> {
        self.uri.query()
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Header value as a string; `None` when absent or not visible ASCII.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Deserialize the body as JSON.
    ///
    /// Malformed bodies surface as `serde_json::Error`, which the dispatch
    /// boundary maps to 400.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }

    pub fn remote_addr(&self) -> Option<SocketAddr> {
        self.remote_addr
    }

    /// Instant the request entered dispatch.
    pub fn started(&self) -> Instant {
        self.started
    }

    pub fn params(&self) -> &HashMap<String, String> {
        &self.params
    }

    pub fn params_mut(&mut self) -> &mut HashMap<String, String> {
        &mut self.params
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    /// Parse result of the first route match, once resolution has run.
    pub fn parse_result(&self) -> Option<&ParseResult> {
        self.parse_result.as_deref()
    }

    pub(crate) fn set_parse_result(&mut self, parse_result: Option<Arc<ParseResult>>) {
        self.parse_result = parse_result;
    }

    /// Request-scoped typed state.
    pub fn state(&self) -> &Extensions {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut Extensions {
        &mut self.state
    }
}
