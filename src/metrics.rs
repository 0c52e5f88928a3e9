//! Governor telemetry.
//!
//! Counts decision ticks and level transitions so a host can see how often
//! the governor throttles.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;
use std::time::{Duration, Instant};

/// Number of recent level-change intervals kept for averaging.
const LEVEL_INTERVAL_HISTORY: usize = 100;

/// Point-in-time view of the telemetry counters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetrySnapshot {
    /// Decision ticks evaluated since start.
    pub ticks: u64,
    /// Ticks that produced a decision.
    pub decisions_emitted: u64,
    /// Ticks that produced nothing new.
    pub decisions_suppressed: u64,
    /// Level increases.
    pub escalations: u64,
    /// Level decreases.
    pub deescalations: u64,
    /// Seconds since the last level change, or since start if none.
    pub secs_since_level_change: f64,
    /// Mean time between level changes (seconds).
    pub avg_secs_between_level_changes: f64,
    pub uptime_sec: u64,
}

/// Telemetry collector shared between the decision loop and readers.
pub struct GovernorTelemetry {
    start_time: Instant,
    ticks: AtomicU64,
    decisions_emitted: AtomicU64,
    escalations: AtomicU64,
    deescalations: AtomicU64,
    level_intervals: RwLock<Vec<Duration>>,
    last_level_change: RwLock<Instant>,
}

impl GovernorTelemetry {
    pub fn new() -> Self {
        let now = Instant::now();
        Self {
            start_time: now,
            ticks: AtomicU64::new(0),
            decisions_emitted: AtomicU64::new(0),
            escalations: AtomicU64::new(0),
            deescalations: AtomicU64::new(0),
            level_intervals: RwLock::new(Vec::new()),
            last_level_change: RwLock::new(now),
        }
    }

    /// Record one decision tick and the level before and after it.
    pub fn record_tick(&self, old_level: u8, new_level: u8, emitted: bool) {
        self.ticks.fetch_add(1, Ordering::SeqCst);
        if emitted {
            self.decisions_emitted.fetch_add(1, Ordering::SeqCst);
        }

        if new_level == old_level {
            return;
        }
        if new_level > old_level {
            self.escalations.fetch_add(1, Ordering::SeqCst);
        } else {
            self.deescalations.fetch_add(1, Ordering::SeqCst);
        }

        let now = Instant::now();
        if let Ok(mut last_change) = self.last_level_change.write() {
            if let Ok(mut intervals) = self.level_intervals.write() {
                intervals.push(now.duration_since(*last_change));
                if intervals.len() > LEVEL_INTERVAL_HISTORY {
                    intervals.remove(0);
                }
            }
            *last_change = now;
        }
    }

    pub fn snapshot(&self) -> TelemetrySnapshot {
        let now = Instant::now();
        let ticks = self.ticks.load(Ordering::SeqCst);
        let decisions_emitted = self.decisions_emitted.load(Ordering::SeqCst);

        let secs_since_level_change = self
            .last_level_change
            .read()
            .map(|last| now.duration_since(*last).as_secs_f64())
            .unwrap_or(0.0);

        let avg_secs_between_level_changes = self
            .level_intervals
            .read()
            .map(|intervals| {
                if intervals.is_empty() {
                    0.0
                } else {
                    let total: Duration = intervals.iter().sum();
                    total.as_secs_f64() / intervals.len() as f64
                }
            })
            .unwrap_or(0.0);

        TelemetrySnapshot {
            ticks,
            decisions_emitted,
            decisions_suppressed: ticks.saturating_sub(decisions_emitted),
            escalations: self.escalations.load(Ordering::SeqCst),
            deescalations: self.deescalations.load(Ordering::SeqCst),
            secs_since_level_change,
            avg_secs_between_level_changes,
            uptime_sec: now.duration_since(self.start_time).as_secs(),
        }
    }
}

impl Default for GovernorTelemetry {
    fn default() -> Self {
        Self::new()
    }
}
