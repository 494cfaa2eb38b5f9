//! Lifecycle hooks and response finalizers registered on an application.

use std::sync::Arc;

use futures_util::future::BoxFuture;

use crate::app::Application;
use crate::http::{BoxError, RequestContext, ResponseContext};

/// Async startup or shutdown hook. Hooks run one at a time, in registration order.
pub type Hook = Arc<dyn for<'a> Fn(&'a Application) -> BoxFuture<'a, Result<(), BoxError>> + Send + Sync>;

/// Async response finalizer, run after the pipeline on buffered responses.
pub type Finalizer = Arc<
    dyn for<'a> Fn(&'a mut RequestContext, &'a mut ResponseContext) -> BoxFuture<'a, Result<(), BoxError>>
        + Send
        + Sync,
>;
