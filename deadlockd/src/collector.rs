//! Host sampling backed by `sysinfo`.
//!
//! CPU figures are deltas between two refreshes, so the first refresh after
//! construction reports 0% for every process. Per-process CPU follows the
//! `sysinfo` convention (100% per core).

use crate::advisor::StatsLookup;
use crate::error::MonitorError;
use crate::types::{HostMetrics, LiveStats, ProcessSnapshot};
use log::debug;
use std::sync::{Mutex, MutexGuard};
use sysinfo::{Pid, Process, ProcessRefreshKind, ProcessesToUpdate, System, UpdateKind, Users};

/// Source of the per-poll sample consumed by the detection core.
pub trait MetricsSampler: StatsLookup + Send + Sync {
    /// Take a fresh reading of the host. Reads below see this reading.
    fn refresh(&self) {}

    fn sample_processes(&self) -> Vec<Result<ProcessSnapshot, MonitorError>>;

    fn host_metrics(&self) -> Result<HostMetrics, MonitorError>;
}

pub struct SysinfoCollector {
    system: Mutex<System>,
    // reloaded once per refresh, not per lookup
    users: Mutex<Users>,
}

impl SysinfoCollector {
    pub fn new() -> Self {
        let mut system = System::new();
        refresh_system(&mut system);
        Self {
            system: Mutex::new(system),
            users: Mutex::new(Users::new_with_refreshed_list()),
        }
    }

    /// Lock order is always `system` before `users`.
    pub(crate) fn lock(&self) -> MutexGuard<'_, System> {
        self.system
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub(crate) fn users(&self) -> MutexGuard<'_, Users> {
        self.users
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for SysinfoCollector {
    fn default() -> Self {
        Self::new()
    }
}

/// Everything a full poll reads per process. Command lines are loaded on
/// demand by `restart`.
fn poll_refresh_kind() -> ProcessRefreshKind {
    ProcessRefreshKind::nothing()
        .with_cpu()
        .with_memory()
        .with_user(UpdateKind::OnlyIfNotSet)
        .with_tasks()
}

fn refresh_system(system: &mut System) {
    system.refresh_cpu_usage();
    system.refresh_memory();
    system.refresh_processes_specifics(ProcessesToUpdate::All, true, poll_refresh_kind());
}

pub(crate) fn memory_percent(process: &Process, total_memory: u64) -> f64 {
    if total_memory == 0 {
        return 0.0;
    }
    process.memory() as f64 / total_memory as f64 * 100.0
}

pub(crate) fn percent_of(used: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        used as f64 / total as f64 * 100.0
    }
}

pub(crate) fn snapshot_of(pid: Pid, process: &Process, total_memory: u64) -> ProcessSnapshot {
    ProcessSnapshot {
        pid: pid.as_u32(),
        name: process.name().to_string_lossy().into_owned(),
        status: process.status().to_string().to_lowercase(),
        cpu_percent: f64::from(process.cpu_usage()),
        memory_percent: memory_percent(process, total_memory),
    }
}

impl StatsLookup for SysinfoCollector {
    /// Re-reads `pid` so processes that exited since the poll sample are
    /// reported as vanished. CPU stays at the last full refresh: a lone
    /// process refresh has no matching system-wide CPU delta.
    fn live_stats(&self, pid: u32) -> Result<LiveStats, MonitorError> {
        let mut system = self.lock();
        let target = Pid::from_u32(pid);
        system.refresh_processes_specifics(
            ProcessesToUpdate::Some(&[target]),
            true,
            ProcessRefreshKind::nothing().with_memory(),
        );
        let process = system
            .process(target)
            .ok_or(MonitorError::ProcessVanished(pid))?;
        Ok(LiveStats {
            name: process.name().to_string_lossy().into_owned(),
            cpu_percent: f64::from(process.cpu_usage()),
            memory_percent: memory_percent(process, system.total_memory()),
        })
    }
}

impl MetricsSampler for SysinfoCollector {
    fn refresh(&self) {
        let mut system = self.lock();
        refresh_system(&mut system);
        self.users().refresh();
        debug!(
            "[collector] refreshed {} processes",
            system.processes().len()
        );
    }

    fn sample_processes(&self) -> Vec<Result<ProcessSnapshot, MonitorError>> {
        let system = self.lock();
        let total_memory = system.total_memory();
        system
            .processes()
            .iter()
            .map(|(pid, process)| Ok(snapshot_of(*pid, process, total_memory)))
            .collect()
    }

    fn host_metrics(&self) -> Result<HostMetrics, MonitorError> {
        let system = self.lock();
        let total_memory = system.total_memory();
        if total_memory == 0 {
            return Err(MonitorError::MetricsUnavailable(
                "total memory reported as zero".to_string(),
            ));
        }
        Ok(HostMetrics {
            cpu_percent: f64::from(system.global_cpu_usage()),
            memory_percent: percent_of(system.used_memory(), total_memory),
            swap_percent: percent_of(system.used_swap(), system.total_swap()),
            process_count: system.processes().len(),
        })
    }
}
