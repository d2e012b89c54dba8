//! Utility modules for the daemon.
//!
//! This module contains reusable utilities shared across different parts
//! of the system.

pub mod circuit_breaker;
pub mod circuit_breaker_noop;
pub mod circuit_breaker_simple;
pub mod database_retry;
pub mod jitter;
pub mod time;

// Re-export commonly used types for convenience
pub use circuit_breaker::{
    CircuitBreaker, CircuitBreakerConfig, CircuitBreakerError, CircuitBreakerResult,
    CircuitBreakerState, CircuitBreakerStats, CircuitBreakerType, ConcreteCircuitBreaker,
    create_circuit_breaker, create_circuit_breaker_for_service,
    create_circuit_breaker_from_profile,
};
pub use database_retry::{RetryConfig, with_retry};
