//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the tracing subscriber (pretty or JSON)
//! - Provide the application-level [`Logger`] used by dispatch
//!
//! # Design Decisions
//! - `RUST_LOG` wins over the configured level
//! - The application logger is optional; without it, fault reports go to
//!   stderr and per-request timing lines are not emitted

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{LogFormat, ObservabilityConfig};
use crate::http::HttpException;

/// Install the global tracing subscriber.
///
/// Returns an error if a subscriber is already installed.
pub fn init_logging(config: &ObservabilityConfig) -> Result<(), tracing_subscriber::util::TryInitError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("dispatch_engine={}", config.log_level).into());

    let registry = tracing_subscriber::registry().with(filter);
    match config.log_format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).try_init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).try_init(),
    }
}

/// Lines of backtrace kept in fault reports.
const TRACE_LINES: usize = 12;

/// Application logger handle.
#[derive(Debug, Clone)]
pub struct Logger {
    name: String,
}

impl Logger {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Report a normalized fault at error ("severe") level.
    pub fn severe(&self, uri: &str, exception: &HttpException) {
        tracing::error!(
            logger = %self.name,
            uri = %uri,
            status = exception.status().as_u16(),
            cause = ?exception.cause(),
            trace = exception.trimmed_trace(TRACE_LINES).as_deref().unwrap_or(""),
            "{}",
            exception.message()
        );
    }

    /// Report a fault raised while a fault was being handled.
    pub fn fatal(&self, uri: &str, error: &dyn std::fmt::Display) {
        tracing::error!(
            logger = %self.name,
            uri = %uri,
            fatal = true,
            "fault while handling a fault: {}",
            error
        );
    }

    /// `{status} {method} {uri} ({elapsed} ms)`.
    pub fn request(&self, status: u16, method: &str, uri: &str, elapsed_ms: u128) {
        tracing::info!(
            logger = %self.name,
            status,
            method = %method,
            uri = %uri,
            elapsed_ms = elapsed_ms as u64,
            "{} {} {} ({} ms)",
            status,
            method,
            uri,
            elapsed_ms
        );
    }
}

/// Fallback fault report when no logger is configured.
pub fn report_to_stderr(uri: &str, exception: &HttpException) {
    eprintln!("Unhandled fault while serving {}: {}", uri, exception);
    if let Some(cause) = exception.cause() {
        eprintln!("  caused by: {}", cause);
    }
    if let Some(trace) = exception.trimmed_trace(TRACE_LINES) {
        eprintln!("{}", trace);
    }
}
