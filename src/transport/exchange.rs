//! Bridge between hyper requests/responses and the dispatch contexts.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use futures_util::TryStreamExt;
use http::header::{CONTENT_LENGTH, SET_COOKIE, TRANSFER_ENCODING};
use http::{HeaderMap, HeaderName, HeaderValue, Request, Response, StatusCode};
use http_body_util::combinators::UnsyncBoxBody;
use http_body_util::{BodyExt, Empty, Full, Limited, StreamBody};
use hyper::body::{Frame, Incoming};

use crate::dispatch::Engine;
use crate::http::{BodyStream, Cookie, HttpException, RequestContext, ResponseContext};
use crate::transport::RawResponse;

/// Body type of every response the transports send.
pub type ResponseBody = UnsyncBoxBody<Bytes, std::io::Error>;

enum PendingBody {
    Buffered(Bytes),
    Streamed(BodyStream),
}

/// [`RawResponse`] that accumulates into a `hyper::Response`.
///
/// Starts at status 500 so a response closed without a status is an error.
pub struct HyperResponse {
    status: StatusCode,
    headers: HeaderMap,
    content_length: Option<u64>,
    chunked: bool,
    body: Option<PendingBody>,
    closed: bool,
}

impl HyperResponse {
    pub fn new() -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            headers: HeaderMap::new(),
            content_length: None,
            chunked: false,
            body: None,
            closed: false,
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn chunked(&self) -> bool {
        self.chunked
    }

    /// Convert into the hyper response.
    ///
    /// A known content length always wins over the chunked flag; hyper picks
    /// chunked framing for HTTP/1.1 streams on its own.
    pub fn into_response(mut self) -> Response<ResponseBody> {
        self.headers.remove(TRANSFER_ENCODING);
        let body: ResponseBody = match self.body.take() {
            Some(PendingBody::Buffered(bytes)) => {
                let len = self.content_length.unwrap_or(bytes.len() as u64);
                self.headers.insert(CONTENT_LENGTH, HeaderValue::from(len));
                Full::new(bytes).map_err(|never| match never {}).boxed_unsync()
            }
            Some(PendingBody::Streamed(stream)) => {
                self.headers.remove(CONTENT_LENGTH);
                StreamBody::new(stream.map_ok(Frame::data)).boxed_unsync()
            }
            None => {
                self.headers.insert(CONTENT_LENGTH, HeaderValue::from(0u64));
                Empty::new().map_err(|never| match never {}).boxed_unsync()
            }
        };

        let mut response = Response::new(body);
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers;
        response
    }
}

impl Default for HyperResponse {
    fn default() -> Self {
        Self::new()
    }
}

impl RawResponse for HyperResponse {
    fn set_header(&mut self, name: &HeaderName, value: &HeaderValue) {
        if !self.closed {
            self.headers.append(name.clone(), value.clone());
        }
    }

    fn set_content_length(&mut self, len: u64) {
        if !self.closed {
            self.content_length = Some(len);
        }
    }

    fn set_chunked_encoding(&mut self, chunked: bool) {
        if !self.closed {
            self.chunked = chunked;
        }
    }

    fn set_status_code(&mut self, status: StatusCode) {
        if !self.closed {
            self.status = status;
        }
    }

    fn add_cookies(&mut self, cookies: &[Cookie]) {
        if self.closed {
            return;
        }
        for cookie in cookies {
            match HeaderValue::from_str(&cookie.to_string()) {
                Ok(value) => {
                    self.headers.append(SET_COOKIE, value);
                }
                Err(e) => tracing::warn!(cookie = %cookie.name, error = %e, "Dropping invalid cookie"),
            }
        }
    }

    fn write_body(&mut self, body: Bytes) {
        if !self.closed {
            self.body = Some(PendingBody::Buffered(body));
        }
    }

    fn write_stream(&mut self, body: BodyStream) {
        if !self.closed {
            self.body = Some(PendingBody::Streamed(body));
        }
    }

    fn close(&mut self) {
        self.closed = true;
    }

    fn is_closed(&self) -> bool {
        self.closed
    }
}

/// The URI as the client sent it, for logs.
pub fn request_uri<B>(req: &Request<B>) -> String {
    req.uri().to_string()
}

/// Build the request and response contexts from a raw hyper request.
///
/// The body is collected up to the engine's limit; failing to read it is a
/// context construction failure.
pub async fn build_exchange(
    req: Request<Incoming>,
    remote: SocketAddr,
    engine: &Engine,
) -> Result<(RequestContext, ResponseContext), HttpException> {
    let (parts, body) = req.into_parts();
    let collected = Limited::new(body, engine.max_body_bytes())
        .collect()
        .await
        .map_err(|e| HttpException::internal("failed to read request body").with_cause(e))?;

    let request = RequestContext::new(parts.method, parts.uri, parts.headers, collected.to_bytes())
        .with_remote_addr(remote);
    Ok((request, engine.app().new_response_context()))
}

/// Serve one hyper request through the engine.
pub async fn handle(
    engine: Arc<Engine>,
    remote: SocketAddr,
    req: Request<Incoming>,
) -> Result<Response<ResponseBody>, Infallible> {
    let uri = request_uri(&req);
    let exchange = build_exchange(req, remote, &engine).await;
    let mut raw = HyperResponse::new();
    engine.dispatch(&uri, exchange, &mut raw).await;
    Ok(raw.into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::Cookie;
    use http::header::CONTENT_TYPE;

    #[test]
    fn unset_status_is_500() {
        let mut raw = HyperResponse::new();
        raw.close();
        assert_eq!(raw.into_response().status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn writes_after_close_are_ignored() {
        let mut raw = HyperResponse::new();
        raw.set_status_code(StatusCode::CREATED);
        raw.close();
        raw.set_status_code(StatusCode::OK);
        raw.set_header(&CONTENT_TYPE, &HeaderValue::from_static("text/plain"));

        assert!(raw.is_closed());
        assert_eq!(raw.status(), StatusCode::CREATED);
        assert!(raw.headers().is_empty());
    }

    #[test]
    fn buffered_body_sets_content_length_and_cookies() {
        let mut raw = HyperResponse::new();
        raw.set_status_code(StatusCode::OK);
        raw.set_content_length(5);
        raw.set_chunked_encoding(true);
        raw.add_cookies(&[Cookie::new("session", "abc"), Cookie::new("theme", "dark")]);
        raw.write_body(Bytes::from_static(b"hello"));
        raw.close();

        let response = raw.into_response();
        assert_eq!(response.headers()[CONTENT_LENGTH], "5");
        assert!(!response.headers().contains_key(TRANSFER_ENCODING));
        assert_eq!(response.headers().get_all(SET_COOKIE).iter().count(), 2);
    }
}
