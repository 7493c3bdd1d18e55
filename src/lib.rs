//! Resource Cache Library
//!
//! A keyed, asynchronous, two-tier (memory + disk) cache for byte payloads
//! fetched over HTTP(S). Concurrent requests for the same key share a single
//! fetch, and every request moves from `Loading` to exactly one terminal state.

pub mod app;
pub mod cli;
pub mod config;
pub mod constants;
pub mod errors;
pub mod prelude;

// Re-export commonly used types for convenience
pub use errors::{AppError, Result};
