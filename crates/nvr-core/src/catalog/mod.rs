//! Stream Catalog (C5): the in-memory registry coordinating stream identity,
//! credentials, Relay registration state, and downstream recording/HLS
//! consumers (spec.md §4.3).
//!
//! Grounded on the teacher's in-memory proxy registry pattern (a
//! `RwLock<HashMap<..>>` of shared entries, each independently locked) and
//! generalized to the per-stream state machine spec.md §4.3 names.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, RwLock};
use tracing::{info, warn};

use crate::errors::{AppError, AppResult, RelayError};
use crate::models::{
    validate_stream_name, OriginalConfig, ReconnectCounters, RelayRegistration, Stream,
    StreamRequest, StreamState,
};
use crate::relay::{RelayApiClient, RelayController};
use crate::repositories::{Repository, StreamRepository};

/// Composite per-stream state, protected by one `Mutex` so a reader never
/// observes a torn update across `state`/`registration`/`original_config`
/// (spec.md §5: "per-stream lock for composite state").
#[derive(Debug, Clone)]
pub struct StreamComposite {
    pub state: StreamState,
    pub registration: RelayRegistration,
    pub recording_via_relay: bool,
    pub original_config: Option<OriginalConfig>,
}

impl StreamComposite {
    fn new() -> Self {
        Self {
            state: StreamState::Initializing,
            registration: RelayRegistration::default(),
            recording_via_relay: false,
            original_config: None,
        }
    }
}

/// One catalog slot: the persisted row plus its runtime state. Counters live
/// outside the composite mutex because they're read constantly (by the
/// Health Monitor and status endpoints) and must never block on it.
pub struct StreamEntry {
    pub stream: Stream,
    pub composite: Mutex<StreamComposite>,
    pub counters: ReconnectCounters,
}

impl StreamEntry {
    fn new(stream: Stream) -> Self {
        Self {
            stream,
            composite: Mutex::new(StreamComposite::new()),
            counters: ReconnectCounters::default(),
        }
    }
}

/// Outcome of a bulk registration pass (spec.md §4.3: "never fails
/// globally, returns the set of failures").
#[derive(Debug, Clone, Default)]
pub struct RegisterAllOutcome {
    pub failed_names: Vec<String>,
}

impl RegisterAllOutcome {
    pub fn is_ok(&self) -> bool {
        self.failed_names.is_empty()
    }
}

const SETTLING_DELAY: Duration = Duration::from_millis(500);

/// In-memory registry of all streams, keyed by name (spec.md §4.3).
pub struct StreamCatalog {
    entries: RwLock<HashMap<String, Arc<StreamEntry>>>,
    repository: StreamRepository,
    relay_controller: Arc<RelayController>,
    relay_client: Arc<RelayApiClient>,
}

impl StreamCatalog {
    pub fn new(
        repository: StreamRepository,
        relay_controller: Arc<RelayController>,
        relay_client: Arc<RelayApiClient>,
    ) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            repository,
            relay_controller,
            relay_client,
        }
    }

    /// `reload_from_config()` (spec.md §4.3): replace the catalog from the
    /// Config Store and register every enabled stream with the Relay.
    pub async fn reload_from_config(&self) -> AppResult<RegisterAllOutcome> {
        let streams = self.repository.find_all(Default::default()).await?;
        {
            let mut entries = self.entries.write().await;
            entries.clear();
            for stream in streams {
                entries.insert(stream.name.clone(), Arc::new(StreamEntry::new(stream)));
            }
        }
        self.register_all().await
    }

    /// `register_all() → ok | partial(failed_names)` (spec.md §4.3).
    pub async fn register_all(&self) -> AppResult<RegisterAllOutcome> {
        let entries: Vec<Arc<StreamEntry>> = {
            let guard = self.entries.read().await;
            guard
                .values()
                .filter(|e| e.stream.enabled)
                .cloned()
                .collect()
        };

        let mut failed_names = Vec::new();
        for entry in entries {
            match self.register_one(&entry).await {
                Ok(()) => {}
                Err(err) => {
                    warn!(stream = %entry.stream.name, error = %err, "registration failed during register_all");
                    failed_names.push(entry.stream.name.clone());
                }
            }
        }
        Ok(RegisterAllOutcome { failed_names })
    }

    async fn register_one(&self, entry: &StreamEntry) -> AppResult<()> {
        self.relay_client
            .register(
                &entry.stream.name,
                &entry.stream.url,
                entry.stream.onvif_username.as_deref(),
                entry.stream.onvif_password.as_deref(),
                entry.stream.backchannel,
            )
            .await?;

        let mut composite = entry.composite.lock().await;
        composite.registration = RelayRegistration::derive(
            self.relay_client.management_port(),
            &entry.stream.name,
        );
        composite.state = StreamState::Running;
        Ok(())
    }

    /// `add(request)` (spec.md §4.3): persist, then mirror into the catalog
    /// and register with the Relay if enabled.
    pub async fn add(&self, request: StreamRequest) -> AppResult<Stream> {
        let name = request
            .name
            .clone()
            .ok_or_else(|| AppError::validation("stream name is required"))?;
        validate_stream_name(&name).map_err(AppError::validation)?;

        {
            let guard = self.entries.read().await;
            if guard.contains_key(&name) {
                return Err(AppError::StreamConflict(name));
            }
        }

        let stream = self.repository.create(request).await?;
        let entry = Arc::new(StreamEntry::new(stream.clone()));
        self.entries
            .write()
            .await
            .insert(stream.name.clone(), entry.clone());

        if stream.enabled {
            if let Err(err) = self.register_one(&entry).await {
                warn!(stream = %stream.name, error = %err, "initial registration failed, will retry on next tick");
            }
        }
        Ok(stream)
    }

    /// `update(name, request)` (spec.md §4.3): on update-to-disabled,
    /// unregister. On a changed URL/credentials, unregister-then-register
    /// with a 500 ms settling delay.
    pub async fn update(&self, name: &str, request: StreamRequest) -> AppResult<Stream> {
        let entry = self.get_entry(name).await?;
        let previous = entry.stream.clone();

        let updated = self.repository.update(name.to_string(), request).await?;

        {
            let guard = self.entries.read().await;
            if let Some(existing) = guard.get(name) {
                // Arc<StreamEntry>::stream is immutable once built; swap the
                // whole entry in place so readers never see a half-updated row.
                let fresh = Arc::new(StreamEntry {
                    stream: updated.clone(),
                    composite: Mutex::new(existing.composite.lock().await.clone()),
                    counters: ReconnectCounters::default(),
                });
                drop(guard);
                self.entries.write().await.insert(name.to_string(), fresh);
            }
        }
        let entry = self.get_entry(name).await?;

        let credentials_changed = previous.url != updated.url
            || previous.onvif_username != updated.onvif_username
            || previous.onvif_password != updated.onvif_password;

        if !updated.enabled {
            let _ = self.relay_client.unregister(name).await;
            entry.composite.lock().await.state = StreamState::Stopped;
        } else if credentials_changed || !previous.enabled {
            let _ = self.relay_client.unregister(name).await;
            tokio::time::sleep(SETTLING_DELAY).await;
            self.register_one(&entry).await?;
        }
        Ok(updated)
    }

    /// `delete(name)` (spec.md §4.3): unregister from the Relay, drop the
    /// Config Store row, and remove from the catalog.
    pub async fn delete(&self, name: &str) -> AppResult<()> {
        let _ = self.relay_client.unregister(name).await;
        self.repository.delete(name.to_string()).await?;
        self.entries.write().await.remove(name);
        Ok(())
    }

    /// `ensure_ready_for(name) → ok | error` (spec.md §4.3): block up to a
    /// bounded deadline (default 40 s) with retries.
    pub async fn ensure_ready_for(&self, name: &str, deadline: Duration) -> AppResult<()> {
        let entry = self.get_entry(name).await?;
        self.relay_controller.wait_ready(deadline).await?;

        let started = std::time::Instant::now();
        loop {
            if self.relay_client.exists(name).await.unwrap_or(false) {
                entry.composite.lock().await.state = StreamState::Running;
                return Ok(());
            }
            if self.register_one(&entry).await.is_ok() {
                return Ok(());
            }
            if started.elapsed() >= deadline {
                return Err(RelayError::Timeout.into());
            }
            tokio::time::sleep(Duration::from_secs(1)).await;
        }
    }

    /// `begin_recording_via_relay(name)` (spec.md §4.3): mark the per-stream
    /// flag and save `OriginalConfig` so it can be restored on stop.
    pub async fn begin_recording_via_relay(&self, name: &str) -> AppResult<()> {
        let entry = self.get_entry(name).await?;
        let mut composite = entry.composite.lock().await;
        composite.recording_via_relay = true;
        composite.original_config = Some(OriginalConfig::from(&entry.stream));
        Ok(())
    }

    /// `end_recording_via_relay(name)` (spec.md §4.3): clear the flag and
    /// drop the saved original config.
    pub async fn end_recording_via_relay(&self, name: &str) -> AppResult<()> {
        let entry = self.get_entry(name).await?;
        let mut composite = entry.composite.lock().await;
        composite.recording_via_relay = false;
        composite.original_config = None;
        Ok(())
    }

    /// Transition a stream's state (called by the Recording Consumer and the
    /// Health Monitor, spec.md §4.3's state machine; never by HTTP handlers).
    pub async fn transition(&self, name: &str, to: StreamState) -> AppResult<()> {
        let entry = self.get_entry(name).await?;
        let mut composite = entry.composite.lock().await;
        if composite.state != to {
            info!(stream = name, from = %composite.state, to = %to, "stream state transition");
        }
        composite.state = to;
        Ok(())
    }

    pub async fn state_of(&self, name: &str) -> AppResult<StreamState> {
        let entry = self.get_entry(name).await?;
        let composite = entry.composite.lock().await;
        Ok(composite.state)
    }

    pub async fn list(&self) -> Vec<Stream> {
        self.entries
            .read()
            .await
            .values()
            .map(|e| e.stream.clone())
            .collect()
    }

    pub async fn enabled_entries(&self) -> Vec<Arc<StreamEntry>> {
        self.entries
            .read()
            .await
            .values()
            .filter(|e| e.stream.enabled)
            .cloned()
            .collect()
    }

    pub async fn get_entry(&self, name: &str) -> AppResult<Arc<StreamEntry>> {
        self.entries
            .read()
            .await
            .get(name)
            .cloned()
            .ok_or_else(|| AppError::StreamNotFound(name.to_string()))
    }
}
