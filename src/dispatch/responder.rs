//! Exception responder: turns a normalized fault into a response.

use bytes::Bytes;
use http::header::{HeaderValue, CONTENT_TYPE};
use http::StatusCode;

use crate::app::Application;
use crate::dispatch::finalizer;
use crate::http::{BoxError, HttpException, RequestContext, ResponseContext};
use crate::transport::RawResponse;

const GENERIC_500: &str = "500 Internal Server Error";

/// Prepare the error response on the contexts.
///
/// An already closed response is left as it is and only committed. Otherwise
/// any partial body or pending stream is dropped, the status is set from the exception and the
/// application's error handler result goes through the executor. Finalizer
/// hooks are skipped.
pub async fn respond(
    app: &Application,
    exception: &HttpException,
    req: &mut RequestContext,
    res: &mut ResponseContext,
) -> Result<(), BoxError> {
    if !res.is_open() {
        return Ok(());
    }

    res.reset_body();
    res.set_status(exception.status().as_u16())?;
    let result = app.error_handler().handle(exception, req, res).await?;
    app.executor().apply(result, req, res).await?;
    res.close();
    finalizer::prepare(app, req, res, true).await
}

/// Force a plain-text 500 when no contexts could be built.
pub fn respond_without_context(raw: &mut dyn RawResponse) {
    raw.set_status_code(StatusCode::INTERNAL_SERVER_ERROR);
    raw.set_header(&CONTENT_TYPE, &HeaderValue::from_static("text/plain; charset=utf-8"));
    raw.set_content_length(GENERIC_500.len() as u64);
    raw.write_body(Bytes::from_static(GENERIC_500.as_bytes()));
    raw.close();
}

/// A fault while handling a fault: log it and make sure the response ends.
pub fn fail(app: &Application, uri: &str, error: &dyn std::fmt::Display, raw: &mut dyn RawResponse) {
    match app.logger() {
        Some(logger) => logger.fatal(uri, error),
        None => eprintln!("Fatal fault while handling a fault for {}: {}", uri, error),
    }
    if !raw.is_closed() {
        raw.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::ErrorHandler;
    use crate::pipeline::HandlerResult;
    use crate::transport::HyperResponse;
    use futures_util::future::BoxFuture;
    use futures_util::stream;
    use http::{HeaderMap, Method};
    use http_body_util::BodyExt;

    fn request() -> RequestContext {
        RequestContext::new(Method::GET, "/orders".parse().unwrap(), HeaderMap::new(), Bytes::new())
    }

    #[tokio::test]
    async fn open_response_gets_error_body() {
        let app = Application::builder().build();
        let mut req = request();
        let mut res = app.new_response_context();
        res.write("half written").unwrap();

        respond(&app, &HttpException::not_found("no such order"), &mut req, &mut res)
            .await
            .unwrap();

        assert_eq!(res.status(), StatusCode::NOT_FOUND);
        assert!(!res.is_open());
        let body: serde_json::Value = serde_json::from_slice(res.body()).unwrap();
        assert_eq!(body["message"], "no such order");
        assert_eq!(body["status"], 404);
    }

    #[tokio::test]
    async fn pending_stream_is_replaced_by_error_body() {
        let app = Application::builder().build();
        let mut req = request();
        let mut res = app.new_response_context();
        res.stream(Box::pin(stream::iter(vec![Ok::<_, std::io::Error>(Bytes::from_static(b"STREAMED"))])))
            .unwrap();

        respond(&app, &HttpException::internal("backend died"), &mut req, &mut res)
            .await
            .unwrap();
        let mut raw = HyperResponse::new();
        finalizer::commit(&app, &req, &mut res, &mut raw);

        let response = raw.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let body: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body["message"], "backend died");
    }

    #[tokio::test]
    async fn closed_response_is_left_alone() {
        let app = Application::builder().build();
        let mut req = request();
        let mut res = app.new_response_context();
        res.set_status(201).unwrap();
        res.text("created").unwrap();

        respond(&app, &HttpException::internal("late failure"), &mut req, &mut res)
            .await
            .unwrap();

        assert_eq!(res.status(), StatusCode::CREATED);
        assert_eq!(res.body(), b"created");
    }

    struct Failing;

    impl ErrorHandler for Failing {
        fn handle<'a>(
            &'a self,
            _exception: &'a HttpException,
            _req: &'a mut RequestContext,
            _res: &'a mut ResponseContext,
        ) -> BoxFuture<'a, Result<HandlerResult, BoxError>> {
            Box::pin(async move { Err("template missing".into()) })
        }
    }

    #[tokio::test]
    async fn error_handler_faults_surface() {
        let app = Application::builder().error_handler(Failing).build();
        let mut req = request();
        let mut res = app.new_response_context();

        let err = respond(&app, &HttpException::internal("x"), &mut req, &mut res)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "template missing");
    }

    #[test]
    fn missing_context_forces_plain_500() {
        let mut raw = HyperResponse::new();
        respond_without_context(&mut raw);

        assert!(raw.is_closed());
        let response = raw.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(response.headers()[CONTENT_TYPE], "text/plain; charset=utf-8");
    }

    #[test]
    fn fail_closes_the_raw_response() {
        let app = Application::builder().build();
        let mut raw = HyperResponse::new();
        fail(&app, "/orders", &"handler for the handler failed", &mut raw);
        assert!(raw.is_closed());
    }
}
