//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Start (driver.rs):
//!     Bind listener → Startup hooks → Production mode → Accept loop
//!
//! Close (driver.rs, shutdown.rs):
//!     Trigger shutdown → Accept loop exits → Application close → Shutdown hooks
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → binary calls Driver::close
//! ```
//!
//! # Design Decisions
//! - Ordered startup: a failing hook aborts start before any connection is accepted
//! - In-flight connections finish on their own tasks after close

pub mod driver;
pub mod shutdown;
pub mod signals;

pub use driver::{Driver, DriverError, DriverState, ServerHandle};
pub use shutdown::Shutdown;
pub use signals::wait_for_signal;
