//! Response context mutated by handlers and the finalizer.
//!
//! # Responsibilities
//! - Buffer the response body until finalization
//! - Track the open/closed state (closed exactly once)
//! - Hold headers, cookies, status and the registered content encoders
//! - Support an unbuffered streaming mode that bypasses finalization
//!
//! # Design Decisions
//! - Writes after close fail with `ResponseError::Closed`
//! - Headers stay mutable after close; finalizer hooks run on closed responses
//! - The chunked flag is tri-state; unset means "chunked" at commit time

use std::fmt;
use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use futures_util::stream::BoxStream;
use http::header::{HeaderValue, CONTENT_TYPE};
use http::{HeaderMap, StatusCode};
use indexmap::IndexMap;
use serde::Serialize;
use thiserror::Error;

use crate::dispatch::encoding::ContentCodec;
use crate::http::cookie::Cookie;

/// Body stream used in unbuffered mode.
pub type BodyStream = BoxStream<'static, Result<Bytes, std::io::Error>>;

/// Ordered name → codec map; registration order matters for `*`.
pub type CodecMap = IndexMap<String, Arc<dyn ContentCodec>>;

/// Errors raised when mutating a response.
#[derive(Debug, Error)]
pub enum ResponseError {
    /// The response was already closed.
    #[error("cannot write to a closed response")]
    Closed,

    /// Status code outside 100..=599.
    #[error("invalid status code {0}")]
    InvalidStatus(u16),

    /// Body could not be serialized.
    #[error("failed to serialize response body: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Per-request response state.
pub struct ResponseContext {
    status: StatusCode,
    headers: HeaderMap,
    cookies: Vec<Cookie>,
    buffer: BytesMut,
    open: bool,
    buffered: bool,
    stream: Option<BodyStream>,
    codecs: CodecMap,
    chunked: Option<bool>,
    finalized: bool,
}

impl ResponseContext {
    /// Create an open, buffered response with status 200.
    pub fn new(codecs: CodecMap) -> Self {
        Self {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            cookies: Vec::new(),
            buffer: BytesMut::new(),
            open: true,
            buffered: true,
            stream: None,
            codecs,
            chunked: None,
            finalized: false,
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn set_status(&mut self, status: u16) -> Result<(), ResponseError> {
        if !(100..=599).contains(&status) {
            return Err(ResponseError::InvalidStatus(status));
        }
        let status = StatusCode::from_u16(status).map_err(|_| ResponseError::InvalidStatus(status))?;
        self.status = status;
        Ok(())
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    pub fn set_content_type(&mut self, content_type: &'static str) {
        self.headers
            .insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
    }

    pub fn cookies(&self) -> &[Cookie] {
        &self.cookies
    }

    pub fn add_cookie(&mut self, cookie: Cookie) {
        self.cookies.push(cookie);
    }

    /// Append bytes to the buffer.
    pub fn write(&mut self, bytes: impl AsRef<[u8]>) -> Result<(), ResponseError> {
        if !self.open {
            return Err(ResponseError::Closed);
        }
        self.buffer.extend_from_slice(bytes.as_ref());
        Ok(())
    }

    /// Write a plain-text body and close.
    pub fn text(&mut self, body: impl AsRef<str>) -> Result<(), ResponseError> {
        self.write(body.as_ref())?;
        if !self.headers.contains_key(CONTENT_TYPE) {
            self.set_content_type("text/plain; charset=utf-8");
        }
        self.close();
        Ok(())
    }

    /// Serialize `value` as JSON into the body and close.
    pub fn json<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), ResponseError> {
        if !self.open {
            return Err(ResponseError::Closed);
        }
        let bytes = serde_json::to_vec(value)?;
        self.write(bytes)?;
        self.set_content_type("application/json");
        self.close();
        Ok(())
    }

    pub fn body(&self) -> &[u8] {
        &self.buffer
    }

    pub(crate) fn take_body(&mut self) -> Bytes {
        self.buffer.split().freeze()
    }

    pub(crate) fn replace_body(&mut self, body: Bytes) {
        self.buffer = BytesMut::from(&body[..]);
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    /// Close the response. Later writes fail; closing twice is a no-op.
    pub fn close(&mut self) {
        self.open = false;
    }

    pub fn is_buffered(&self) -> bool {
        self.buffered
    }

    /// Switch to unbuffered mode and hand over the body stream.
    ///
    /// Finalizer hooks and content encoding are skipped for streamed bodies.
    pub fn stream(&mut self, body: BodyStream) -> Result<(), ResponseError> {
        if !self.open {
            return Err(ResponseError::Closed);
        }
        self.buffered = false;
        self.stream = Some(body);
        Ok(())
    }

    pub(crate) fn take_stream(&mut self) -> Option<BodyStream> {
        self.stream.take()
    }

    /// Drop any buffered bytes or pending stream and return to buffered mode.
    pub(crate) fn reset_body(&mut self) {
        self.buffer.clear();
        self.stream = None;
        self.buffered = true;
    }

    pub fn codecs(&self) -> &CodecMap {
        &self.codecs
    }

    pub fn codecs_mut(&mut self) -> &mut CodecMap {
        &mut self.codecs
    }

    pub fn chunked(&self) -> Option<bool> {
        self.chunked
    }

    pub fn set_chunked(&mut self, chunked: bool) {
        self.chunked = Some(chunked);
    }

    pub(crate) fn is_finalized(&self) -> bool {
        self.finalized
    }

    pub(crate) fn mark_finalized(&mut self) {
        self.finalized = true;
    }
}

impl fmt::Debug for ResponseContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResponseContext")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .field("cookies", &self.cookies)
            .field("body_len", &self.buffer.len())
            .field("open", &self.open)
            .field("buffered", &self.buffered)
            .field("codecs", &self.codecs.keys().collect::<Vec<_>>())
            .field("chunked", &self.chunked)
            .finish()
    }
}
