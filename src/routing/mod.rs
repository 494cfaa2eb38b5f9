//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! (method, normalized path)
//!     → cache.rs (production only: memoized lookup)
//!     → resolver.rs (RouteResolver: ordered RouteMatch list)
//!     → resolution.rs (flatten handlers, merge params, keep first parse result)
//!     → seed RequestContext
//! ```
//!
//! # Design Decisions
//! - The resolver is an opaque collaborator; `table.rs` is a minimal
//!   linear-scan implementation for applications that need nothing more
//! - Resolutions are immutable and shared behind `Arc`
//! - Cache entries live for the process lifetime; no eviction

pub mod cache;
pub mod resolution;
pub mod resolver;
pub mod table;

pub use cache::{ResolutionCache, ResolutionKey};
pub use resolution::{resolve_pipeline, PipelineResolution};
pub use resolver::{ParseResult, RouteMatch, RouteResolver};
pub use table::{PathPattern, RouteTable};
