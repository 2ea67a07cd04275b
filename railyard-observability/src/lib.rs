//! Logger port implementation and tracing setup (spec §3.1).
//!
//! This crate carries the ambient logging stack: a `Logger` port
//! implementation backed by `tracing`, a null implementation for tests,
//! and a thin `init_tracing()` for binaries that embed `railyard`. It
//! deliberately stops there — no exporter, no HTTP middleware, no
//! distributed-tracing context propagation, none of which this system
//! has a surface for.

pub mod logger;
pub mod tracing_setup;

pub use logger::{NullLogger, TracingLogger};
pub use tracing_setup::init_tracing;
