//! # relay-logging
//!
//! Structured logging with `tracing`.
//!
//! Installs a `tracing_subscriber::fmt` subscriber filtered by `RUST_LOG`
//! (falling back to the configured level), with optional JSON output.

#![deny(unsafe_code)]

pub mod subscriber;
pub mod types;

pub use subscriber::{build_filter, init_subscriber};
pub use types::LogLevel;
