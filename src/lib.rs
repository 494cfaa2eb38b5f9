//! Transport-agnostic request dispatch engine.
//!
//! # Architecture Overview
//!
//! ```text
//!                 ┌──────────────────────────────────────────────────────────┐
//!                 │                     DISPATCH ENGINE                      │
//!                 │                                                          │
//!   Client  ──────┼─▶ lifecycle::Driver ─▶ transport (plain / tls)           │
//!                 │                              │                           │
//!                 │                              ▼                           │
//!                 │                       dispatch::Engine                   │
//!                 │        ┌─────────────────────┴──────────────────┐        │
//!                 │        ▼                                        ▼        │
//!                 │  routing (resolver + cache)          boundary (faults)   │
//!                 │        │                                        │        │
//!                 │        ▼                                        ▼        │
//!                 │  pipeline (handlers, executor)          responder        │
//!                 │        │                                        │        │
//!                 │        └──────────────▶ finalizer ◀─────────────┘        │
//!                 │                   (hooks, encoding, commit)              │
//!   Client  ◀─────┼──────────────────────────────┘                           │
//!                 │                                                          │
//!                 │  Cross-cutting: app, config, observability, net          │
//!                 └──────────────────────────────────────────────────────────┘
//! ```

// Core
pub mod app;
pub mod dispatch;
pub mod http;
pub mod pipeline;
pub mod routing;

// Wire
pub mod net;
pub mod transport;

// Cross-cutting concerns
pub mod config;
pub mod lifecycle;
pub mod observability;

pub use app::{Application, ApplicationBuilder};
pub use config::EngineConfig;
pub use dispatch::Engine;
pub use lifecycle::{Driver, ServerHandle};
