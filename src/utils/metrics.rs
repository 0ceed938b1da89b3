//! Metrics collection for the upload pipeline
//! Created: 2025-06-05

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;

pub const RUNS_STARTED: &str = "runs_started";
pub const RUNS_COMPLETED: &str = "runs_completed";
pub const RUNS_FAILED: &str = "runs_failed";
pub const FILES_CLASSIFIED: &str = "files_classified";
pub const CONFLICTS: &str = "conflicts";
pub const FATAL_DIAGNOSTICS: &str = "fatal_diagnostics";
pub const WARNING_DIAGNOSTICS: &str = "warning_diagnostics";

/// Counters and timers shared by all runs of one pipeline
#[derive(Debug, Clone, Default)]
pub struct Metrics {
    counters: Arc<RwLock<HashMap<String, u64>>>,
    timers: Arc<RwLock<HashMap<String, Duration>>>,
    start_times: Arc<RwLock<HashMap<String, Instant>>>,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment_counter(&self, name: &str) {
        self.add(name, 1);
    }

    pub fn add(&self, name: &str, amount: u64) {
        let mut counters = self.counters.write();
        *counters.entry(name.to_string()).or_insert(0) += amount;
    }

    pub fn start_timer(&self, name: &str) {
        self.start_times.write().insert(name.to_string(), Instant::now());
    }

    pub fn end_timer(&self, name: &str) {
        if let Some(start_time) = self.start_times.write().remove(name) {
            self.timers.write().insert(name.to_string(), start_time.elapsed());
        }
    }

    pub fn get_counter(&self, name: &str) -> u64 {
        self.counters.read().get(name).copied().unwrap_or(0)
    }

    pub fn get_timer(&self, name: &str) -> Option<Duration> {
        self.timers.read().get(name).copied()
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            counters: self.counters.read().clone(),
            timers: self.timers.read().clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    pub counters: HashMap<String, u64>,
    pub timers: HashMap<String, Duration>,
}
