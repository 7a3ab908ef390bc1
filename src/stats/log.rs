//! Cycle statistics for the tilt module.
//!
//! Counters are updated lock-free from the worker and the control paths and
//! can be persisted between runs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Running counters for one module instance.
#[derive(Debug)]
pub struct ModuleStats {
    /// Sampling cycles executed
    cycles: AtomicU64,
    /// Cycles whose sensor read failed
    sample_failures: AtomicU64,
    /// Inactive-to-active transitions
    alerts_raised: AtomicU64,
    /// Heartbeat re-alerts emitted
    heartbeats: AtomicU64,
    /// Notifications handed to the uplink
    notifications: AtomicU64,
    /// Explicit poll requests
    polls: AtomicU64,
    /// Physical button presses
    button_presses: AtomicU64,
    /// Wake signals absorbed by a saturated queue
    signals_coalesced: AtomicU64,
    /// Session start time
    session_start: DateTime<Utc>,
    /// Path for persisting stats
    persist_path: Option<PathBuf>,
}

impl ModuleStats {
    pub fn new() -> Self {
        Self {
            cycles: AtomicU64::new(0),
            sample_failures: AtomicU64::new(0),
            alerts_raised: AtomicU64::new(0),
            heartbeats: AtomicU64::new(0),
            notifications: AtomicU64::new(0),
            polls: AtomicU64::new(0),
            button_presses: AtomicU64::new(0),
            signals_coalesced: AtomicU64::new(0),
            session_start: Utc::now(),
            persist_path: None,
        }
    }

    /// Create stats that resume from, and save to, `path`.
    pub fn with_persistence(path: PathBuf) -> Self {
        let mut stats = Self::new();
        stats.persist_path = Some(path);

        if let Err(e) = stats.load() {
            tracing::warn!("Could not load previous statistics: {}", e);
        }

        stats
    }

    pub fn record_cycle(&self) {
        self.cycles.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_sample_failure(&self) {
        self.sample_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_alert(&self) {
        self.alerts_raised.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_heartbeat(&self) {
        self.heartbeats.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_notification(&self) {
        self.notifications.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_poll(&self) {
        self.polls.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_button_press(&self) {
        self.button_presses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_signal_coalesced(&self) {
        self.signals_coalesced.fetch_add(1, Ordering::Relaxed);
    }

    /// Point-in-time copy of every counter.
    pub fn stats(&self) -> StatsSnapshot {
        StatsSnapshot {
            cycles: self.cycles.load(Ordering::Relaxed),
            sample_failures: self.sample_failures.load(Ordering::Relaxed),
            alerts_raised: self.alerts_raised.load(Ordering::Relaxed),
            heartbeats: self.heartbeats.load(Ordering::Relaxed),
            notifications: self.notifications.load(Ordering::Relaxed),
            polls: self.polls.load(Ordering::Relaxed),
            button_presses: self.button_presses.load(Ordering::Relaxed),
            signals_coalesced: self.signals_coalesced.load(Ordering::Relaxed),
            session_start: self.session_start,
            session_duration_secs: (Utc::now() - self.session_start).num_seconds() as u64,
        }
    }

    /// Get a summary string for display.
    pub fn summary(&self) -> String {
        let stats = self.stats();
        format!(
            "Session Statistics:\n\
             - Cycles run: {}\n\
             - Sample failures: {}\n\
             - Alerts raised: {}\n\
             - Heartbeat re-alerts: {}\n\
             - Notifications sent: {}\n\
             - Polls requested: {}\n\
             - Button presses: {}\n\
             - Wake signals coalesced: {}\n\
             - Session duration: {} seconds",
            stats.cycles,
            stats.sample_failures,
            stats.alerts_raised,
            stats.heartbeats,
            stats.notifications,
            stats.polls,
            stats.button_presses,
            stats.signals_coalesced,
            stats.session_duration_secs
        )
    }

    /// Save stats to disk.
    pub fn save(&self) -> Result<(), std::io::Error> {
        if let Some(ref path) = self.persist_path {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }

            let stats = self.stats();
            let persisted = PersistedStats {
                cycles: stats.cycles,
                sample_failures: stats.sample_failures,
                alerts_raised: stats.alerts_raised,
                heartbeats: stats.heartbeats,
                notifications: stats.notifications,
                polls: stats.polls,
                button_presses: stats.button_presses,
                signals_coalesced: stats.signals_coalesced,
                last_updated: Utc::now(),
            };

            let json = serde_json::to_string_pretty(&persisted).map_err(std::io::Error::other)?;

            std::fs::write(path, json)?;
        }
        Ok(())
    }

    fn load(&mut self) -> Result<(), std::io::Error> {
        if let Some(ref path) = self.persist_path {
            if path.exists() {
                let content = std::fs::read_to_string(path)?;
                let persisted: PersistedStats =
                    serde_json::from_str(&content).map_err(std::io::Error::other)?;

                self.cycles.store(persisted.cycles, Ordering::Relaxed);
                self.sample_failures
                    .store(persisted.sample_failures, Ordering::Relaxed);
                self.alerts_raised
                    .store(persisted.alerts_raised, Ordering::Relaxed);
                self.heartbeats.store(persisted.heartbeats, Ordering::Relaxed);
                self.notifications
                    .store(persisted.notifications, Ordering::Relaxed);
                self.polls.store(persisted.polls, Ordering::Relaxed);
                self.button_presses
                    .store(persisted.button_presses, Ordering::Relaxed);
                self.signals_coalesced
                    .store(persisted.signals_coalesced, Ordering::Relaxed);
            }
        }
        Ok(())
    }
}

impl Default for ModuleStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of module statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub cycles: u64,
    pub sample_failures: u64,
    pub alerts_raised: u64,
    pub heartbeats: u64,
    pub notifications: u64,
    pub polls: u64,
    pub button_presses: u64,
    pub signals_coalesced: u64,
    pub session_start: DateTime<Utc>,
    pub session_duration_secs: u64,
}

/// On-disk statistics format.
#[derive(Debug, Serialize, Deserialize)]
pub struct PersistedStats {
    pub cycles: u64,
    pub sample_failures: u64,
    pub alerts_raised: u64,
    pub heartbeats: u64,
    pub notifications: u64,
    pub polls: u64,
    pub button_presses: u64,
    pub signals_coalesced: u64,
    pub last_updated: DateTime<Utc>,
}

impl PersistedStats {
    /// Cumulative totals for display.
    pub fn summary(&self) -> String {
        format!(
            "Cumulative Statistics:\n\
             - Cycles run: {}\n\
             - Sample failures: {}\n\
             - Alerts raised: {}\n\
             - Heartbeat re-alerts: {}\n\
             - Notifications sent: {}\n\
             - Polls requested: {}\n\
             - Button presses: {}\n\
             - Wake signals coalesced: {}\n\
             - Last updated: {}",
            self.cycles,
            self.sample_failures,
            self.alerts_raised,
            self.heartbeats,
            self.notifications,
            self.polls,
            self.button_presses,
            self.signals_coalesced,
            self.last_updated.format("%Y-%m-%d %H:%M:%S")
        )
    }
}

/// Thread-safe shared statistics.
pub type SharedModuleStats = Arc<ModuleStats>;

pub fn create_shared_stats() -> SharedModuleStats {
    Arc::new(ModuleStats::new())
}

pub fn create_shared_stats_with_persistence(path: PathBuf) -> SharedModuleStats {
    Arc::new(ModuleStats::with_persistence(path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counting() {
        let stats = ModuleStats::new();

        stats.record_cycle();
        stats.record_cycle();
        stats.record_alert();
        stats.record_notification();

        let snapshot = stats.stats();
        assert_eq!(snapshot.cycles, 2);
        assert_eq!(snapshot.alerts_raised, 1);
        assert_eq!(snapshot.notifications, 1);
        assert_eq!(snapshot.heartbeats, 0);
    }

    #[test]
    fn test_summary_format() {
        let summary = ModuleStats::new().summary();
        assert!(summary.contains("Cycles run"));
        assert!(summary.contains("Alerts raised"));
        assert!(summary.contains("Wake signals coalesced"));
    }

    #[test]
    fn test_persistence_round_trip() {
        let path = std::env::temp_dir()
            .join(format!("tilt-stats-test-{}", std::process::id()))
            .join("stats.json");
        let _ = std::fs::remove_file(&path);

        let stats = ModuleStats::with_persistence(path.clone());
        stats.record_cycle();
        stats.record_poll();
        stats.save().unwrap();

        let resumed = ModuleStats::with_persistence(path.clone());
        assert_eq!(resumed.stats().cycles, 1);
        assert_eq!(resumed.stats().polls, 1);

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_persisted_summary_lists_every_counter() {
        let persisted = PersistedStats {
            cycles: 12,
            sample_failures: 1,
            alerts_raised: 2,
            heartbeats: 0,
            notifications: 3,
            polls: 1,
            button_presses: 4,
            signals_coalesced: 7,
            last_updated: Utc::now(),
        };

        let summary = persisted.summary();
        assert!(summary.contains("Cycles run: 12"));
        assert!(summary.contains("Button presses: 4"));
        assert!(summary.contains("Wake signals coalesced: 7"));
        assert!(summary.contains("Last updated"));
    }
}
