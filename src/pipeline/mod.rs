//! Handler pipeline subsystem.
//!
//! # Data Flow
//! ```text
//! RouteMatch[].handlers (Terminator | Callable | Group)
//!     → handler.rs (flatten once, at resolution time)
//!     → executor.rs (run sequentially, stop when the response closes)
//! ```

pub mod executor;
pub mod handler;

pub use executor::{run_pipeline, DefaultExecutor, HandlerExecutor};
pub use handler::{flatten, Handler, HandlerFn, HandlerOutcome, HandlerResult};
