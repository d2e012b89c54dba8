//! Centralized error handling for the NVR daemon.
//!
//! Unifies error types across layers (repository, relay, web) behind one
//! `AppError`, with HTTP-boundary mapping per spec.md §7.

pub mod types;

pub use types::*;
