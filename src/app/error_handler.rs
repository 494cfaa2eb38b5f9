//! Conversion of a normalized fault into a handler result.

use futures_util::future::BoxFuture;
use serde_json::json;

use crate::http::{BoxError, HttpException, RequestContext, ResponseContext};
use crate::pipeline::HandlerResult;

/// Turns an [`HttpException`] into something the executor can write.
///
/// The response status is already set from the exception when this runs.
pub trait ErrorHandler: Send + Sync {
    fn handle<'a>(
        &'a self,
        exception: &'a HttpException,
        req: &'a mut RequestContext,
        res: &'a mut ResponseContext,
    ) -> BoxFuture<'a, Result<HandlerResult, BoxError>>;
}

/// Renders `{"status", "error", "message"}` as JSON.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultErrorHandler;

impl ErrorHandler for DefaultErrorHandler {
    fn handle<'a>(
        &'a self,
        exception: &'a HttpException,
        _req: &'a mut RequestContext,
        _res: &'a mut ResponseContext,
    ) -> BoxFuture<'a, Result<HandlerResult, BoxError>> {
        let status = exception.status();
        let body = json!({
            "status": status.as_u16(),
            "error": status.canonical_reason().unwrap_or("Unknown"),
            "message": exception.message(),
        });
        Box::pin(async move { Ok(HandlerResult::Json(body)) })
    }
}
