//! Unified Health Monitor (spec.md §4.4): the watchdog (`monitor`) and the
//! restart rate limiter it consults (`rate_limiter`).

pub mod monitor;
pub mod rate_limiter;

pub use monitor::{HealthMonitor, ReconnectSignal};
pub use rate_limiter::RestartLimiter;
