//! Application contract consumed by the dispatch engine.
//!
//! # Data Flow
//! ```text
//! ApplicationBuilder
//!     → resolver, executor, error handler, finalizers, hooks, logger, codecs
//!     → Application (shared behind Arc)
//!     → driver runs hooks; engine reads everything else per request
//! ```

pub mod application;
pub mod error_handler;
pub mod hooks;

pub use application::{codecs_from_config, Application, ApplicationBuilder, SharedResolver};
pub use error_handler::{DefaultErrorHandler, ErrorHandler};
pub use hooks::{Finalizer, Hook};
