//! Relay Controller (C3): lifecycle of the Relay subprocess (spec.md §4.1).
//!
//! Grounded on the teacher's `services/ffmpeg_wrapper.rs` subprocess
//! lifecycle (`kill_on_drop`, piped stdio, stderr line monitoring), adapted
//! to a long-lived management-port process instead of a per-client muxer.

use reqwest::Client;
use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::config::RelayConfig;
use crate::errors::{RelayError, RelayResult};

/// Supervises exactly one Relay subprocess bound to a loopback management
/// port (spec.md §4.1 invariant: "at most one Relay process alive at any
/// time").
pub struct RelayController {
    config: RelayConfig,
    http: Client,
    child: Mutex<Option<Child>>,
}

impl RelayController {
    pub fn new(config: RelayConfig) -> RelayResult<Self> {
        let connect_timeout = parse_duration(&config.connect_timeout)?;
        let request_timeout = parse_duration(&config.request_timeout)?;
        let http = Client::builder()
            .connect_timeout(connect_timeout)
            .timeout(request_timeout)
            .build()
            .map_err(|_| RelayError::BindFailed)?;
        Ok(Self {
            config,
            http,
            child: Mutex::new(None),
        })
    }

    /// `start(port) → ok | error{bind_failed, spawn_failed}` (spec.md §4.1).
    pub async fn start(&self, port: u16) -> RelayResult<()> {
        let mut guard = self.child.lock().await;
        if let Some(child) = guard.as_mut() {
            if child.try_wait().ok().flatten().is_none() {
                warn!("relay start requested while already running");
                return Err(RelayError::SpawnFailed("relay already running".to_string()));
            }
        }

        let mut cmd = Command::new(&self.config.binary);
        cmd.arg("--management-port").arg(port.to_string());
        cmd.kill_on_drop(true);
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        let mut child = cmd
            .spawn()
            .map_err(|e| RelayError::SpawnFailed(e.to_string()))?;

        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!(target: "relay", "{line}");
                }
            });
        }
        // Relay's own stdout is diagnostic only; drop it rather than buffering.
        child.stdout.take();

        info!(port, "relay process spawned");
        *guard = Some(child);
        Ok(())
    }

    /// `stop() → ok | error{not_running}` (spec.md §4.1): terminate signal,
    /// bounded grace period, escalate to forced kill.
    pub async fn stop(&self) -> RelayResult<()> {
        let mut guard = self.child.lock().await;
        let mut child = guard.take().ok_or(RelayError::NotRunning)?;

        let grace_period = parse_duration(&self.config.stop_grace_period)?;

        #[cfg(unix)]
        if let Some(pid) = child.id() {
            let nix_pid = nix::unistd::Pid::from_raw(pid as i32);
            if let Err(e) = nix::sys::signal::kill(nix_pid, nix::sys::signal::Signal::SIGTERM) {
                warn!("failed to send SIGTERM to relay process {pid}: {e}");
            }
        }

        match tokio::time::timeout(grace_period, child.wait()).await {
            Ok(Ok(status)) => {
                info!(?status, "relay process exited");
            }
            Ok(Err(e)) => warn!("error waiting for relay to exit: {e}"),
            Err(_) => {
                warn!("relay did not exit within grace period, killing");
                let _ = child.kill().await;
            }
        }
        Ok(())
    }

    /// `is_ready() → bool` (spec.md §4.1): probed via HTTP, never via
    /// process liveness, because the process may be running but not
    /// listening.
    pub async fn is_ready(&self) -> bool {
        let url = format!(
            "http://127.0.0.1:{}/api/streams",
            self.config.management_port
        );
        matches!(self.http.get(&url).send().await, Ok(resp) if resp.status().is_success())
    }

    /// `wait_ready(deadline) → ok | timeout` (spec.md §4.1): polls
    /// `is_ready` with 1-second backoff until the deadline.
    pub async fn wait_ready(&self, deadline: Duration) -> RelayResult<()> {
        let started = Instant::now();
        loop {
            if self.is_ready().await {
                return Ok(());
            }
            if started.elapsed() >= deadline {
                return Err(RelayError::Timeout);
            }
            tokio::time::sleep(Duration::from_secs(1)).await;
        }
    }

    pub fn readiness_timeout(&self) -> RelayResult<Duration> {
        parse_duration(&self.config.readiness_timeout)
    }

    pub fn management_port(&self) -> u16 {
        self.config.management_port
    }
}

fn parse_duration(value: &str) -> RelayResult<Duration> {
    humantime::parse_duration(value).map_err(|_| RelayError::SpawnFailed(format!("invalid duration: {value}")))
}

pub type SharedRelayController = Arc<RelayController>;
