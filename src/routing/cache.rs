//! Production-mode resolution cache.

use std::sync::Arc;

use dashmap::DashMap;
use http::Method;

use crate::observability::metrics;
use crate::routing::resolution::PipelineResolution;

/// Cache key. Method and path stay separate fields so no two distinct
/// (method, path) pairs can produce the same key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResolutionKey {
    method: Method,
    path: String,
}

impl ResolutionKey {
    pub fn new(method: &Method, normalized_path: &str) -> Self {
        Self {
            method: method.clone(),
            path: normalized_path.to_string(),
        }
    }
}

/// A thread-safe memo of resolutions, never invalidated or evicted.
#[derive(Debug, Clone, Default)]
pub struct ResolutionCache {
    inner: Arc<DashMap<ResolutionKey, Arc<PipelineResolution>>>,
}

impl ResolutionCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &ResolutionKey) -> Option<Arc<PipelineResolution>> {
        let hit = self.inner.get(key).map(|r| Arc::clone(r.value()));
        metrics::record_cache_lookup(hit.is_some());
        hit
    }

    /// Store `resolution` unless another caller got there first.
    ///
    /// Returns the stored entry, which is the earlier one under a race.
    pub fn insert(&self, key: ResolutionKey, resolution: Arc<PipelineResolution>) -> Arc<PipelineResolution> {
        let entry = self.inner.entry(key).or_insert(resolution);
        Arc::clone(entry.value())
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}
