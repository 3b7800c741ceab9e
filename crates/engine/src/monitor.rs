// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The resilience monitor: couples upstream connectivity to the queue.
//!
//! Every tick probes a small rotation of anycast hosts, records the
//! health snapshot, and drives the outage state machine: 30 s offline
//! pauses every active scan, recovery resumes exactly those scans after
//! a settle delay.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use dn_adapters::TriageAdapter;
use dn_core::{Clock, NetworkStatus, SystemState};
use dn_storage::ArtifactStore;

use crate::events::EngineEvent;

/// Pause/resume surface the monitor drives; implemented by the task queue.
pub trait ScanControl: Send + Sync {
    fn pause_all(&self, reason: &str) -> Vec<String>;
    fn resume_scans(&self, scan_ids: &[String]);
}

/// Connectivity probe seam, injectable for tests.
#[async_trait]
pub trait ConnectivityProbe: Send + Sync {
    async fn is_online(&self) -> bool;
}

/// TCP reachability to a rotation of anycast resolvers; any success
/// counts as online. No ICMP so it works unprivileged.
pub struct TcpProbe {
    hosts: Vec<String>,
    timeout: Duration,
}

impl Default for TcpProbe {
    fn default() -> Self {
        Self {
            hosts: vec![
                "1.1.1.1:53".to_string(),
                "8.8.8.8:53".to_string(),
                "9.9.9.9:53".to_string(),
            ],
            timeout: Duration::from_secs(5),
        }
    }
}

#[async_trait]
impl ConnectivityProbe for TcpProbe {
    async fn is_online(&self) -> bool {
        for host in &self.hosts {
            if tokio::time::timeout(self.timeout, tokio::net::TcpStream::connect(host))
                .await
                .map(|r| r.is_ok())
                .unwrap_or(false)
            {
                return true;
            }
        }
        false
    }
}

/// Monitor tuning.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    pub check_interval: Duration,
    /// Offline this long before the outage pause fires.
    pub pause_after_offline: Duration,
    /// Settle time after reconnect before resuming.
    pub resume_delay: Duration,
    /// Pause when battery drops below this while discharging.
    pub low_battery_threshold: Option<u8>,
    /// Pause when the device runs hotter than this (celsius).
    pub max_temperature: Option<f64>,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            check_interval: Duration::from_secs(10),
            pause_after_offline: Duration::from_secs(30),
            resume_delay: Duration::from_secs(10),
            low_battery_threshold: None,
            max_temperature: None,
        }
    }
}

#[derive(Default)]
struct MonitorState {
    offline_since: Option<Instant>,
    /// Scans paused by the outage machinery, awaiting auto-resume.
    outage_paused: Option<Vec<String>>,
    /// Scans paused for battery/thermal reasons.
    power_paused: Option<Vec<String>>,
}

/// Periodic health monitor; the sole writer of the SystemState row.
pub struct ResilienceMonitor<C: Clock, Q: ScanControl> {
    store: Arc<ArtifactStore>,
    queue: Arc<Q>,
    probe: Arc<dyn ConnectivityProbe>,
    triage: Option<Arc<TriageAdapter>>,
    config: MonitorConfig,
    clock: C,
    events: Option<broadcast::Sender<EngineEvent>>,
    state: Mutex<MonitorState>,
}

impl<C: Clock, Q: ScanControl> std::fmt::Debug for ResilienceMonitor<C, Q> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResilienceMonitor").finish_non_exhaustive()
    }
}

impl<C: Clock, Q: ScanControl> ResilienceMonitor<C, Q> {
    pub fn new(
        store: Arc<ArtifactStore>,
        queue: Arc<Q>,
        probe: Arc<dyn ConnectivityProbe>,
        config: MonitorConfig,
        clock: C,
    ) -> Self {
        Self {
            store,
            queue,
            probe,
            triage: None,
            config,
            clock,
            events: None,
            state: Mutex::new(MonitorState::default()),
        }
    }

    pub fn with_events(mut self, events: broadcast::Sender<EngineEvent>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn with_triage(mut self, triage: Arc<TriageAdapter>) -> Self {
        self.triage = Some(triage);
        self
    }

    /// Monitor loop; ticks until cancelled.
    pub async fn run(&self, shutdown: CancellationToken) {
        tracing::info!("resilience monitor started");
        loop {
            self.tick().await;
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(self.config.check_interval) => {}
            }
        }
        tracing::info!("resilience monitor stopped");
    }

    /// One monitor cycle: probe, record, drive the outage machine.
    pub async fn tick(&self) {
        let online = self.probe.is_online().await;
        let (battery_level, is_charging) = read_battery();
        let temperature = read_temperature();

        let snapshot = SystemState {
            network_status: if online { NetworkStatus::Online } else { NetworkStatus::Offline },
            battery_level,
            is_charging,
            temperature,
            llm_model: self.triage.as_ref().and_then(|t| t.loaded_model()),
            free_memory_mb: Some(free_memory_mb()),
            updated_at_ms: self.clock.epoch_ms(),
        };
        if let Err(error) = self.store.upsert_system_state(&snapshot) {
            tracing::error!(%error, "failed to record system state");
        }
        if let Some(events) = &self.events {
            let _ = events.send(EngineEvent::SystemStatus { network: snapshot.network_status });
        }

        self.handle_network(online).await;
        self.handle_power(battery_level, is_charging, temperature);
    }

    async fn handle_network(&self, online: bool) {
        if !online {
            let pause_now = {
                let mut state = self.state.lock();
                let since = *state.offline_since.get_or_insert_with(|| {
                    tracing::warn!("network connection lost");
                    self.clock.now()
                });
                self.clock.now().duration_since(since) >= self.config.pause_after_offline
                    && state.outage_paused.is_none()
            };
            if pause_now {
                let paused = self.queue.pause_all("network outage");
                self.state.lock().outage_paused = Some(paused);
            }
            return;
        }

        let to_resume = {
            let mut state = self.state.lock();
            if let Some(since) = state.offline_since.take() {
                let secs = self.clock.now().duration_since(since).as_secs();
                tracing::info!(offline_secs = secs, "network restored");
            }
            state.outage_paused.take()
        };
        if let Some(scan_ids) = to_resume {
            // Let the connection settle before resuming.
            tokio::time::sleep(self.config.resume_delay).await;
            tracing::info!(count = scan_ids.len(), "auto-resuming after outage");
            self.queue.resume_scans(&scan_ids);
        }
    }

    fn handle_power(&self, battery: Option<u8>, is_charging: bool, temperature: Option<f64>) {
        let low_battery = match (self.config.low_battery_threshold, battery) {
            (Some(threshold), Some(level)) => level < threshold && !is_charging,
            _ => false,
        };
        let overheated = match (self.config.max_temperature, temperature) {
            (Some(max), Some(current)) => current > max,
            _ => false,
        };

        if low_battery || overheated {
            let mut state = self.state.lock();
            if state.power_paused.is_none() {
                let reason = if low_battery { "low battery" } else { "overheating" };
                let paused = self.queue.pause_all(reason);
                state.power_paused = Some(paused);
            }
        } else {
            let to_resume = self.state.lock().power_paused.take();
            if let Some(scan_ids) = to_resume {
                tracing::info!("power conditions recovered, resuming");
                self.queue.resume_scans(&scan_ids);
            }
        }
    }

    /// Manual system-wide pause.
    pub fn trigger_pause(&self, reason: &str) -> Vec<String> {
        tracing::info!(reason, "manual pause triggered");
        self.queue.pause_all(reason)
    }

    /// Manual system-wide resume.
    pub fn trigger_resume(&self, scan_ids: &[String]) {
        tracing::info!("manual resume triggered");
        self.queue.resume_scans(scan_ids);
    }
}

/// Battery level and charging state from sysfs, when present.
fn read_battery() -> (Option<u8>, bool) {
    for bat in ["BAT0", "BAT1", "battery"] {
        let base = format!("/sys/class/power_supply/{bat}");
        let Ok(capacity) = std::fs::read_to_string(format!("{base}/capacity")) else {
            continue;
        };
        let level = capacity.trim().parse::<u8>().ok();
        let charging = std::fs::read_to_string(format!("{base}/status"))
            .map(|s| s.trim() == "Charging" || s.trim() == "Full")
            .unwrap_or(false);
        return (level, charging);
    }
    (None, false)
}

/// First readable thermal zone, in celsius.
fn read_temperature() -> Option<f64> {
    for zone in 0..10 {
        let path = format!("/sys/class/thermal/thermal_zone{zone}/temp");
        let Ok(raw) = std::fs::read_to_string(&path) else {
            continue;
        };
        if let Ok(value) = raw.trim().parse::<f64>() {
            // Sysfs reports millidegrees.
            return Some(if value > 1000.0 { value / 1000.0 } else { value });
        }
    }
    None
}

fn free_memory_mb() -> u64 {
    let mut system = sysinfo::System::new();
    system.refresh_memory();
    system.available_memory() / (1024 * 1024)
}

#[cfg(test)]
#[path = "monitor_tests.rs"]
mod tests;
