//! Relay API Client (C4): thin idempotent HTTP client against the Relay's
//! local management port (spec.md §4.2).

use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

use crate::config::RelayConfig;
use crate::errors::{RelayError, RelayResult};
use crate::models::RelayRegistration;
use crate::utils::circuit_breaker::{CircuitBreaker, CircuitBreakerError, ConcreteCircuitBreaker};

#[derive(Debug, Clone, Serialize)]
struct RegisterRequest<'a> {
    name: &'a str,
    url: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    username: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    password: Option<&'a str>,
    backchannel: bool,
}

#[derive(Debug, Deserialize)]
struct StreamListEntry {
    name: String,
}

/// Idempotent client against the Relay's management HTTP API (spec.md
/// §4.2). Every call is wrapped in the shared circuit breaker so a Relay
/// outage fails fast instead of stacking up blocked request threads
/// (SPEC_FULL.md §C).
pub struct RelayApiClient {
    http: Client,
    base_url: String,
    offer_timeout: Duration,
    circuit_breaker: Arc<ConcreteCircuitBreaker>,
}

impl RelayApiClient {
    pub fn new(config: &RelayConfig, circuit_breaker: Arc<ConcreteCircuitBreaker>) -> RelayResult<Self> {
        let connect_timeout = parse_duration(&config.connect_timeout)?;
        let request_timeout = parse_duration(&config.request_timeout)?;
        let offer_timeout = parse_duration(&config.offer_timeout)?;
        let http = Client::builder()
            .connect_timeout(connect_timeout)
            .timeout(request_timeout)
            .build()
            .map_err(|_| RelayError::BindFailed)?;
        Ok(Self {
            http,
            base_url: format!("http://127.0.0.1:{}", config.management_port),
            offer_timeout,
            circuit_breaker,
        })
    }

    /// `register(name, url, user?, pass?, backchannel)` (spec.md §4.2).
    pub async fn register(
        &self,
        name: &str,
        url: &str,
        username: Option<&str>,
        password: Option<&str>,
        backchannel: bool,
    ) -> RelayResult<()> {
        let base_url = self.base_url.clone();
        let http = self.http.clone();
        let body = json!(RegisterRequest {
            name,
            url,
            username,
            password,
            backchannel,
        });

        let result = self
            .circuit_breaker
            .execute(|| {
                let http = http.clone();
                let base_url = base_url.clone();
                let body = body.clone();
                async move {
                    let resp = http
                        .post(format!("{base_url}/api/streams"))
                        .json(&body)
                        .send()
                        .await
                        .map_err(|e| e.to_string())?;
                    Ok(resp.status())
                }
            })
            .await;

        match map_circuit_result(result)? {
            status if status.is_success() => Ok(()),
            StatusCode::CONFLICT => Err(RelayError::ConflictResolvedAsReplace),
            status => Err(RelayError::HttpError(status.as_u16())),
        }
    }

    /// `unregister(name)` (spec.md §4.2): success if Relay reports removed
    /// or already absent.
    pub async fn unregister(&self, name: &str) -> RelayResult<()> {
        let base_url = self.base_url.clone();
        let http = self.http.clone();
        let name = name.to_string();

        let result = self
            .circuit_breaker
            .execute(|| {
                let http = http.clone();
                let base_url = base_url.clone();
                let name = name.clone();
                async move {
                    let resp = http
                        .delete(format!("{base_url}/api/streams/{name}"))
                        .send()
                        .await
                        .map_err(|e| e.to_string())?;
                    Ok(resp.status())
                }
            })
            .await;

        match map_circuit_result(result)? {
            status if status.is_success() || status == StatusCode::NOT_FOUND => Ok(()),
            status => Err(RelayError::HttpError(status.as_u16())),
        }
    }

    /// `exists(name)` (spec.md §4.2): true iff Relay lists the stream.
    pub async fn exists(&self, name: &str) -> RelayResult<bool> {
        let base_url = self.base_url.clone();
        let http = self.http.clone();

        let result = self
            .circuit_breaker
            .execute(|| {
                let http = http.clone();
                let base_url = base_url.clone();
                async move {
                    let resp = http
                        .get(format!("{base_url}/api/streams"))
                        .send()
                        .await
                        .map_err(|e| e.to_string())?;
                    if !resp.status().is_success() {
                        return Err(format!("relay returned {}", resp.status()));
                    }
                    let entries: Vec<StreamListEntry> =
                        resp.json().await.map_err(|e| e.to_string())?;
                    Ok(entries)
                }
            })
            .await;

        let entries = map_circuit_result(result)?;
        Ok(entries.iter().any(|e| e.name == name))
    }

    /// `derive_rtsp_url(name)` (spec.md §3, §4.2).
    pub async fn derive_rtsp_url(&self, name: &str) -> RelayResult<String> {
        if !self.exists(name).await? {
            return Err(RelayError::NotFound(name.to_string()));
        }
        Ok(RelayRegistration::derive(self.management_port(), name)
            .rtsp_url
            .expect("derive always sets rtsp_url"))
    }

    /// `derive_webrtc_url(name)` (spec.md §4.2).
    pub async fn derive_webrtc_url(&self, name: &str) -> RelayResult<String> {
        if !self.exists(name).await? {
            return Err(RelayError::NotFound(name.to_string()));
        }
        Ok(RelayRegistration::derive(self.management_port(), name)
            .webrtc_url
            .expect("derive always sets webrtc_url"))
    }

    /// `proxy_webrtc_offer(name, sdp)` (spec.md §4.2): forwards the SDP
    /// offer to the Relay and returns its SDP answer.
    pub async fn proxy_webrtc_offer(&self, name: &str, sdp: &str) -> RelayResult<String> {
        let base_url = self.base_url.clone();
        let http = self.http.clone();
        let name = name.to_string();
        let sdp = sdp.to_string();
        let offer_timeout = self.offer_timeout;

        let result = self
            .circuit_breaker
            .execute(|| {
                let http = http.clone();
                let base_url = base_url.clone();
                let name = name.clone();
                let sdp = sdp.clone();
                async move {
                    let resp = tokio::time::timeout(
                        offer_timeout,
                        http.post(format!("{base_url}/webrtc?src={name}"))
                            .header("content-type", "application/sdp")
                            .body(sdp)
                            .send(),
                    )
                    .await
                    .map_err(|_| "timeout".to_string())?
                    .map_err(|e| e.to_string())?;

                    if resp.status() == StatusCode::NOT_FOUND {
                        return Err("not_found".to_string());
                    }
                    if !resp.status().is_success() {
                        return Err(format!("relay returned {}", resp.status()));
                    }
                    resp.text().await.map_err(|e| e.to_string())
                }
            })
            .await;

        match result.result {
            Ok(answer) => Ok(answer),
            Err(CircuitBreakerError::CircuitOpen) => Err(RelayError::NotReady),
            Err(CircuitBreakerError::Timeout) => Err(RelayError::Timeout),
            Err(CircuitBreakerError::ServiceError(e)) if e == "timeout" => Err(RelayError::Timeout),
            Err(CircuitBreakerError::ServiceError(e)) if e == "not_found" => {
                Err(RelayError::NotFound(name))
            }
            Err(CircuitBreakerError::ServiceError(e)) => Err(RelayError::SpawnFailed(e)),
        }
    }

    /// `proxy_webrtc_ice(name, candidate)` (spec.md §4.2): forwards a
    /// trickled ICE candidate.
    pub async fn proxy_webrtc_ice(&self, name: &str, candidate: &serde_json::Value) -> RelayResult<()> {
        let base_url = self.base_url.clone();
        let http = self.http.clone();
        let name = name.to_string();
        let candidate = candidate.clone();

        let result = self
            .circuit_breaker
            .execute(|| {
                let http = http.clone();
                let base_url = base_url.clone();
                let name = name.clone();
                let candidate = candidate.clone();
                async move {
                    let resp = http
                        .post(format!("{base_url}/webrtc/ice?src={name}"))
                        .json(&candidate)
                        .send()
                        .await
                        .map_err(|e| e.to_string())?;
                    if resp.status() == StatusCode::NOT_FOUND {
                        return Err("not_found".to_string());
                    }
                    if !resp.status().is_success() {
                        return Err(format!("relay returned {}", resp.status()));
                    }
                    Ok(())
                }
            })
            .await;

        match result.result {
            Ok(()) => Ok(()),
            Err(CircuitBreakerError::CircuitOpen) => Err(RelayError::NotReady),
            Err(CircuitBreakerError::Timeout) => Err(RelayError::Timeout),
            Err(CircuitBreakerError::ServiceError(e)) if e == "not_found" => {
                Err(RelayError::NotFound(name))
            }
            Err(CircuitBreakerError::ServiceError(e)) => Err(RelayError::SpawnFailed(e)),
        }
    }

    pub fn management_port(&self) -> u16 {
        self.base_url
            .rsplit(':')
            .next()
            .and_then(|p| p.parse().ok())
            .unwrap_or(0)
    }
}

fn map_circuit_result<T>(
    result: crate::utils::circuit_breaker::CircuitBreakerResult<T>,
) -> RelayResult<T> {
    match result.result {
        Ok(value) => Ok(value),
        Err(CircuitBreakerError::CircuitOpen) => Err(RelayError::NotReady),
        Err(CircuitBreakerError::Timeout) => Err(RelayError::Timeout),
        Err(CircuitBreakerError::ServiceError(e)) => Err(RelayError::SpawnFailed(e)),
    }
}

fn parse_duration(value: &str) -> RelayResult<Duration> {
    humantime::parse_duration(value).map_err(|_| RelayError::SpawnFailed(format!("invalid duration: {value}")))
}
