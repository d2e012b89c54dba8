//! Unified Health Monitor (C6): a single cooperative watchdog that wakes on
//! a fixed tick and runs Relay health (Phase 1) then per-stream health
//! (Phase 2) (spec.md §4.4).
//!
//! Grounded on the teacher's background-task pattern (a long-lived tokio
//! task polling on an interval, checking a cancellation token at a tighter
//! granularity than the tick itself).

use std::sync::Arc;
use std::sync::atomic::{AtomicI64, AtomicU32, Ordering};
use std::time::Duration;

use chrono::Utc;
use tokio::sync::mpsc::Sender;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::catalog::StreamCatalog;
use crate::config::HealthConfig;
use crate::models::StreamState;
use crate::relay::{RelayApiClient, RelayController};

use super::rate_limiter::RestartLimiter;

/// Sent to every Recording Consumer so the Health Monitor can break its
/// cyclic dependency on them (spec.md §9: "publishes 'reconnect' events on
/// a bounded channel drained by the Recording Consumer").
#[derive(Debug, Clone)]
pub enum ReconnectSignal {
    Stream(String),
    All,
}

pub struct HealthMonitor {
    config: HealthConfig,
    relay_controller: Arc<RelayController>,
    relay_client: Arc<RelayApiClient>,
    catalog: Arc<StreamCatalog>,
    reconnect_tx: Sender<ReconnectSignal>,
    rate_limiter: RestartLimiter,
    consecutive_api_failures: AtomicU32,
    cancellation: CancellationToken,
    last_tick_at_ms: AtomicI64,
}

impl HealthMonitor {
    pub fn new(
        config: HealthConfig,
        relay_controller: Arc<RelayController>,
        relay_client: Arc<RelayApiClient>,
        catalog: Arc<StreamCatalog>,
        reconnect_tx: Sender<ReconnectSignal>,
        cancellation: CancellationToken,
    ) -> Self {
        let cooldown = parse_duration(&config.restart_cooldown);
        let window = parse_duration(&config.restart_window);
        let rate_limiter = RestartLimiter::new(
            config.restart_history_capacity,
            cooldown,
            window,
            config.max_restarts_per_window,
        );
        Self {
            config,
            relay_controller,
            relay_client,
            catalog,
            reconnect_tx,
            rate_limiter,
            consecutive_api_failures: AtomicU32::new(0),
            cancellation,
            last_tick_at_ms: AtomicI64::new(0),
        }
    }

    /// Age of the last completed tick, used by the readiness endpoint to
    /// surface a stalled monitor. `None` before the first tick runs.
    pub fn last_tick_age(&self) -> Option<Duration> {
        let last = self.last_tick_at_ms.load(Ordering::SeqCst);
        if last == 0 {
            return None;
        }
        let age_ms = Utc::now().timestamp_millis() - last;
        Some(Duration::from_millis(age_ms.max(0) as u64))
    }

    /// Runs until the cancellation token fires. Checks the token once per
    /// second regardless of the configured tick interval (spec.md §4.4:
    /// "shutdown remains responsive").
    pub async fn run(self: Arc<Self>) {
        let tick_interval = parse_duration(&self.config.tick_interval);
        let mut elapsed = tick_interval;
        loop {
            if self.cancellation.is_cancelled() {
                info!("health monitor shutting down");
                return;
            }
            if elapsed >= tick_interval {
                elapsed = Duration::ZERO;
                if let Err(err) = self.tick().await {
                    error!(error = %err, "health monitor tick failed unexpectedly");
                }
            }
            tokio::time::sleep(Duration::from_secs(1)).await;
            elapsed += Duration::from_secs(1);
        }
    }

    async fn tick(&self) -> Result<(), crate::errors::AppError> {
        let skip_phase_two = self.phase_one_relay_health().await?;
        if !skip_phase_two {
            self.phase_two_stream_health().await;
        }
        self.last_tick_at_ms.store(Utc::now().timestamp_millis(), Ordering::SeqCst);
        Ok(())
    }

    /// Phase 1 (spec.md §4.4): Relay liveness, consensus-failure detection,
    /// rate-limited restart. Returns true if Phase 2 should be skipped on
    /// this tick — either a restart just occurred, or the relay just
    /// recovered and needs a tick to settle before streams are
    /// re-registered.
    async fn phase_one_relay_health(&self) -> Result<bool, crate::errors::AppError> {
        if self.relay_controller.is_ready().await {
            if self.consecutive_api_failures.swap(0, Ordering::SeqCst) > 0 {
                info!("relay recovered, resetting consecutive failure counter");
                return Ok(true);
            }
            return Ok(false);
        }

        let failures = self.consecutive_api_failures.fetch_add(1, Ordering::SeqCst) + 1;
        warn!(failures, "relay health check failed");
        if failures < self.config.max_api_failures {
            return Ok(false);
        }

        self.log_consensus_failure().await;

        let now = Utc::now();
        if !self.rate_limiter.allowed(now) {
            warn!("relay restart suppressed by rate limiter");
            return Ok(false);
        }

        info!("restarting relay subprocess");
        let _ = self.relay_controller.stop().await;
        tokio::time::sleep(Duration::from_secs(2)).await;
        if let Err(err) = self.relay_controller.start(self.relay_client.management_port()).await {
            error!(error = %err, "failed to restart relay");
            return Ok(false);
        }

        let mut ready = false;
        for _ in 0..10 {
            tokio::time::sleep(Duration::from_secs(2)).await;
            if self.relay_controller.is_ready().await {
                ready = true;
                break;
            }
        }
        if !ready {
            error!("relay did not become ready after restart");
            return Ok(false);
        }

        if let Err(err) = self.catalog.register_all().await {
            error!(error = %err, "register_all failed after relay restart");
        }
        tokio::time::sleep(Duration::from_secs(2)).await;
        let _ = self.reconnect_tx.send(ReconnectSignal::All).await;

        self.rate_limiter.record(now);
        self.consecutive_api_failures.store(0, Ordering::SeqCst);
        Ok(true)
    }

    async fn log_consensus_failure(&self) {
        let streams = self.catalog.enabled_entries().await;
        let total_enabled = streams.len();
        if total_enabled < 2 {
            return;
        }
        let mut failed = 0;
        for entry in &streams {
            if entry.composite.lock().await.state.is_unhealthy() {
                failed += 1;
            }
        }
        if failed == total_enabled {
            warn!(total_enabled, "consensus failure: every enabled stream is unhealthy");
        }
    }

    /// Phase 2 (spec.md §4.4): per-stream re-registration once consecutive
    /// failures and the cooldown both clear.
    async fn phase_two_stream_health(&self) {
        let entries = self.catalog.enabled_entries().await;
        let cooldown = parse_duration(&self.config.stream_reregistration_cooldown);

        for entry in entries {
            let unhealthy = {
                let composite = entry.composite.lock().await;
                composite.state.is_unhealthy()
            };
            if !unhealthy {
                continue;
            }
            if entry.counters.attempts() < self.config.stream_max_consecutive_failures {
                continue;
            }
            if entry.counters.seconds_since_last_reconnect() < cooldown.as_secs() as i64 {
                continue;
            }

            let name = entry.stream.name.clone();
            info!(stream = %name, "re-registering stream after consecutive failures");
            let _ = self.relay_client.unregister(&name).await;
            tokio::time::sleep(Duration::from_millis(500)).await;
            match self
                .relay_client
                .register(
                    &entry.stream.name,
                    &entry.stream.url,
                    entry.stream.onvif_username.as_deref(),
                    entry.stream.onvif_password.as_deref(),
                    entry.stream.backchannel,
                )
                .await
            {
                Ok(()) => {
                    entry.counters.reset();
                    let mut composite = entry.composite.lock().await;
                    composite.state = StreamState::Running;
                    let _ = self.reconnect_tx.send(ReconnectSignal::Stream(name)).await;
                }
                Err(err) => {
                    warn!(stream = %entry.stream.name, error = %err, "re-registration failed, will retry next tick");
                }
            }
        }
    }
}

fn parse_duration(value: &str) -> Duration {
    humantime::parse_duration(value).unwrap_or(Duration::from_secs(30))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reconnect_signal_variants_are_distinct() {
        matches!(ReconnectSignal::All, ReconnectSignal::All);
        matches!(ReconnectSignal::Stream("x".into()), ReconnectSignal::Stream(_));
    }
}
