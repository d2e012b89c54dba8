//! Media Relay integration layer (spec.md §4.1, §4.2): subprocess
//! supervision (`controller`) and the idempotent HTTP client against its
//! management port (`client`).

pub mod client;
pub mod controller;

pub use client::RelayApiClient;
pub use controller::RelayController;
