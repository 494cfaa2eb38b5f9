//! Typed HTTP exception and fault normalization.
//!
//! Every fault raised during dispatch is funneled through
//! [`HttpException::from_fault`] exactly once before a response is produced.

use std::any::Any;
use std::backtrace::{Backtrace, BacktraceStatus};
use std::error::Error as StdError;
use std::fmt;

use http::StatusCode;
use thiserror::Error;

/// Boxed error returned by handlers, hooks and codecs.
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// An error carrying an HTTP status code.
#[derive(Debug, Error)]
#[error("{status}: {message}")]
pub struct HttpException {
    status: StatusCode,
    message: String,
    #[source]
    cause: Option<BoxError>,
    trace: Option<Backtrace>,
}

impl HttpException {
    /// Create an exception with the given status and message.
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            cause: None,
            trace: None,
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    /// Attach the underlying cause.
    pub fn with_cause(mut self, cause: BoxError) -> Self {
        self.cause = Some(cause);
        self
    }

    /// Normalize an arbitrary fault.
    ///
    /// - an `HttpException` passes through untouched (never re-wrapped)
    /// - malformed input maps to 400 with the original message
    /// - anything else maps to 500, keeping the fault as cause plus a backtrace
    pub fn from_fault(fault: BoxError) -> Self {
        let fault = match fault.downcast::<HttpException>() {
            Ok(exception) => return *exception,
            Err(fault) => fault,
        };

        if is_malformed_input(fault.as_ref()) {
            return Self::new(StatusCode::BAD_REQUEST, fault.to_string());
        }

        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: fault.to_string(),
            cause: Some(fault),
            trace: Some(Backtrace::capture()),
        }
    }

    /// Normalize a panic payload caught at the isolation boundary.
    pub fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        Self::from_fault(Box::new(PanicError::from_payload(payload)))
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn cause(&self) -> Option<&(dyn StdError + Send + Sync + 'static)> {
        self.cause.as_deref()
    }

    /// Captured backtrace, present only when the fault was unclassified and
    /// backtrace capture is enabled (`RUST_BACKTRACE`).
    pub fn trace(&self) -> Option<&Backtrace> {
        self.trace
            .as_ref()
            .filter(|trace| trace.status() == BacktraceStatus::Captured)
    }

    /// The first `lines` lines of the backtrace.
    pub fn trimmed_trace(&self, lines: usize) -> Option<String> {
        self.trace().map(|trace| {
            trace
                .to_string()
                .lines()
                .take(lines)
                .collect::<Vec<_>>()
                .join("\n")
        })
    }
}

/// Malformed request data raised by handlers or context construction.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct InputError(pub String);

impl InputError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// A panic caught inside the pipeline, rendered as an ordinary error.
#[derive(Debug)]
pub struct PanicError {
    message: String,
}

impl PanicError {
    fn from_payload(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&'static str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "handler panicked".to_string()
        };
        Self { message }
    }
}

impl fmt::Display for PanicError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "panic: {}", self.message)
    }
}

impl StdError for PanicError {}

fn is_malformed_input(fault: &(dyn StdError + Send + Sync + 'static)) -> bool {
    if let Some(e) = fault.downcast_ref::<serde_json::Error>() {
        return e.is_syntax() || e.is_data() || e.is_eof();
    }
    fault.is::<InputError>()
        || fault.is::<std::num::ParseIntError>()
        || fault.is::<std::num::ParseFloatError>()
        || fault.is::<std::str::ParseBoolError>()
        || fault.is::<std::str::Utf8Error>()
        || fault.is::<std::string::FromUtf8Error>()
        || fault.is::<http::header::ToStrError>()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typed_exception_is_not_rewrapped() {
        let original = HttpException::forbidden("nope");
        let normalized = HttpException::from_fault(Box::new(original));
        assert_eq!(normalized.status(), StatusCode::FORBIDDEN);
        assert_eq!(normalized.message(), "nope");
        assert!(normalized.cause().is_none());
    }

    #[test]
    fn parse_errors_become_bad_request() {
        let fault = "abc".parse::<u32>().unwrap_err();
        let message = fault.to_string();
        let normalized = HttpException::from_fault(Box::new(fault));
        assert_eq!(normalized.status(), StatusCode::BAD_REQUEST);
        assert_eq!(normalized.message(), message);

        let json = serde_json::from_str::<serde_json::Value>("{oops").unwrap_err();
        let normalized = HttpException::from_fault(Box::new(json));
        assert_eq!(normalized.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn unclassified_faults_keep_their_cause() {
        let fault = std::io::Error::new(std::io::ErrorKind::Other, "disk on fire");
        let normalized = HttpException::from_fault(Box::new(fault));
        assert_eq!(normalized.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(normalized.message(), "disk on fire");
        let cause = normalized.cause().expect("cause retained");
        assert!(cause.is::<std::io::Error>());
    }

    #[test]
    fn panics_become_internal_errors() {
        let normalized = HttpException::from_panic(Box::new("boom"));
        assert_eq!(normalized.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(normalized.message(), "panic: boom");
    }
}
