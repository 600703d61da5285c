//! Smoothed deadlock risk score.
//!
//! raw      = 0.4 * cpu/100 + 0.3 * mem/100 + 0.3 * min(cycles * 0.2, 0.6)
//! smoothed = 0.7 * raw + 0.3 * previous

use crate::error::MonitorError;
use crate::types::HostMetrics;
use log::{debug, warn};
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

pub const HISTORY_CAPACITY: usize = 100;

const CPU_WEIGHT: f64 = 0.4;
const MEMORY_WEIGHT: f64 = 0.3;
const CYCLE_WEIGHT: f64 = 0.3;
const RISK_PER_CYCLE: f64 = 0.2;
const MAX_CYCLE_RISK: f64 = 0.6;
const CURRENT_WEIGHT: f64 = 0.7;
const PREVIOUS_WEIGHT: f64 = 0.3;

#[derive(Debug, Default)]
struct RiskState {
    last_risk: f64,
    history: VecDeque<HostMetrics>,
}

/// Owns the only state that survives between polls.
#[derive(Debug, Default)]
pub struct RiskScorer {
    state: Mutex<RiskState>,
}

pub fn cycle_risk(cycle_count: usize) -> f64 {
    (cycle_count as f64 * RISK_PER_CYCLE).min(MAX_CYCLE_RISK)
}

pub fn raw_risk(metrics: &HostMetrics, cycle_count: usize) -> f64 {
    let cpu_risk = metrics.cpu_percent / 100.0;
    let memory_risk = metrics.memory_percent / 100.0;
    CPU_WEIGHT * cpu_risk + MEMORY_WEIGHT * memory_risk + CYCLE_WEIGHT * cycle_risk(cycle_count)
}

impl RiskScorer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Score one poll. When the host metrics could not be collected the
    /// previous score is returned and no state changes.
    pub fn score(&self, metrics: Result<HostMetrics, MonitorError>, cycle_count: usize) -> f64 {
        match metrics {
            Ok(metrics) if metrics.is_finite() => self.observe(metrics, cycle_count),
            Ok(metrics) => {
                warn!("[risk] ignoring non-finite sample {metrics:?}");
                self.last_risk()
            }
            Err(err) => {
                warn!("[risk] {err}; keeping previous score");
                self.last_risk()
            }
        }
    }

    /// Record `metrics` and return the new smoothed score.
    pub fn observe(&self, metrics: HostMetrics, cycle_count: usize) -> f64 {
        let mut state = self.lock();

        state.history.push_back(metrics);
        if state.history.len() > HISTORY_CAPACITY {
            state.history.pop_front();
        }

        let raw = raw_risk(&metrics, cycle_count);
        let smoothed = (CURRENT_WEIGHT * raw + PREVIOUS_WEIGHT * state.last_risk).clamp(0.0, 1.0);
        state.last_risk = smoothed;

        debug!(
            "[risk] cpu={:.1} mem={:.1} cycles={} raw={:.4} smoothed={:.4}",
            metrics.cpu_percent, metrics.memory_percent, cycle_count, raw, smoothed
        );
        smoothed
    }

    pub fn last_risk(&self) -> f64 {
        self.lock().last_risk
    }

    /// Oldest-first copy of the retained samples.
    pub fn history(&self) -> Vec<HostMetrics> {
        self.lock().history.iter().copied().collect()
    }

    fn lock(&self) -> MutexGuard<'_, RiskState> {
        // writers never leave the state half updated, so poisoning is ignored
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
