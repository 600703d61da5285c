use crate::error::MonitorError;
use crate::types::{Action, LiveStats, Suggestion};
use log::debug;

pub const KILL_CPU_THRESHOLD: f64 = 80.0;
pub const RESTART_MEMORY_THRESHOLD: f64 = 80.0;

/// Source of per-pid stats read when a cycle is being explained.
pub trait StatsLookup {
    fn live_stats(&self, pid: u32) -> Result<LiveStats, MonitorError>;
}

impl<F> StatsLookup for F
where
    F: Fn(u32) -> Result<LiveStats, MonitorError>,
{
    fn live_stats(&self, pid: u32) -> Result<LiveStats, MonitorError> {
        self(pid)
    }
}

/// First matching rule wins: hot CPU is killed, heavy memory is restarted,
/// anything else is only watched.
pub fn decide(stats: &LiveStats) -> (Action, &'static str) {
    if stats.cpu_percent > KILL_CPU_THRESHOLD {
        (Action::Kill, "High CPU usage")
    } else if stats.memory_percent > RESTART_MEMORY_THRESHOLD {
        (Action::Restart, "High memory usage")
    } else {
        (Action::Monitor, "Part of deadlock cycle")
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ResolutionAdvisor;

impl ResolutionAdvisor {
    pub fn new() -> Self {
        Self
    }

    /// One suggestion per readable member, in cycle order. Members whose stats
    /// cannot be read are left out.
    pub fn suggest<L>(&self, cycle: &[u32], lookup: &L) -> Vec<Suggestion>
    where
        L: StatsLookup + ?Sized,
    {
        cycle
            .iter()
            .filter_map(|&pid| match lookup.live_stats(pid) {
                Ok(stats) => {
                    let (action, reason) = decide(&stats);
                    Some(Suggestion {
                        pid,
                        action,
                        reason: reason.to_string(),
                        process_name: stats.name,
                    })
                }
                Err(err) => {
                    debug!("[advisor] no suggestion for {pid}: {err}");
                    None
                }
            })
            .collect()
    }
}
