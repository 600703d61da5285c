//! The long-lived detector service.
//!
//! One `poll` samples the host, rebuilds the wait-for graph, enumerates its
//! cycles, scores risk and explains every cycle. The graph never outlives the
//! poll; the risk scorer and poll log are the only state kept between polls.

use crate::advisor::ResolutionAdvisor;
use crate::collector::{MetricsSampler, SysinfoCollector};
use crate::config::Config;
use crate::cycles::{Cycle, CycleDetector};
use crate::error::MonitorError;
use crate::graph::WaitForGraph;
use crate::manager::ProcessManager;
use crate::poll_log::PollLog;
use crate::risk::RiskScorer;
use crate::types::{
    ActionOutcome, DeadlockCycle, DeadlockReport, HostMetrics, PollResult, ProcessInfo,
    ProcessSnapshot, SystemStats,
};
use chrono::Local;
use log::{debug, error, info};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;

pub struct DeadlockMonitor {
    sampler: Arc<dyn MetricsSampler>,
    manager: Arc<dyn ProcessManager>,
    detector: CycleDetector,
    advisor: ResolutionAdvisor,
    scorer: RiskScorer,
    log: PollLog,
}

impl DeadlockMonitor {
    pub fn new(
        sampler: Arc<dyn MetricsSampler>,
        manager: Arc<dyn ProcessManager>,
        config: &Config,
    ) -> Self {
        Self {
            sampler,
            manager,
            detector: CycleDetector::new(config.runtime.max_cycles),
            advisor: ResolutionAdvisor::new(),
            scorer: RiskScorer::new(),
            log: PollLog::new(config.output.log_capacity, config.output.log_path.clone()),
        }
    }

    /// Monitor the local host through `sysinfo`.
    pub fn with_sysinfo(config: &Config) -> Self {
        let collector = Arc::new(SysinfoCollector::new());
        Self::new(collector.clone(), collector, config)
    }

    pub fn poll(&self) -> PollResult {
        self.sampler.refresh();

        let graph = WaitForGraph::build(self.sampler.sample_processes());
        let cycles = self.detector.find_cycles(&graph);

        let resources = self.manager.system_resources();
        let metrics = self.sampler.host_metrics();
        let process_count = metrics
            .as_ref()
            .map(|m| m.process_count)
            .unwrap_or_else(|_| graph.node_count());
        let deadlock_risk = self.scorer.score(metrics, cycles.len());
        let processes = self.manager.list_processes();

        let deadlock_cycles: Vec<DeadlockCycle> =
            cycles.into_iter().map(|cycle| self.explain(cycle)).collect();

        let result = PollResult {
            stats: SystemStats {
                resources,
                deadlock_risk,
                process_count,
                processes,
            },
            deadlocks: DeadlockReport {
                deadlocks_found: !deadlock_cycles.is_empty(),
                deadlock_cycles,
                deadlock_risk,
            },
            timestamp: Local::now().to_rfc3339(),
        };

        self.log.record(&result);
        result
    }

    fn explain(&self, cycle: Cycle) -> DeadlockCycle {
        let processes = cycle
            .iter()
            .filter_map(|&pid| match self.manager.process_info(pid) {
                Ok(info) => Some(info),
                Err(err) => {
                    debug!("[monitor] dropping cycle member {pid}: {err}");
                    None
                }
            })
            .collect();
        let suggestions = self.advisor.suggest(&cycle, self.sampler.as_ref());
        DeadlockCycle {
            cycle,
            processes,
            suggestions,
        }
    }

    /// Fresh process listing, sampled outside of a poll.
    pub fn processes(&self) -> Vec<ProcessSnapshot> {
        self.sampler.refresh();
        self.manager.list_processes()
    }

    pub fn process_info(&self, pid: u32) -> Result<ProcessInfo, MonitorError> {
        self.sampler.refresh();
        self.manager.process_info(pid)
    }

    pub fn kill(&self, pid: u32) -> ActionOutcome {
        self.manager.kill(pid)
    }

    pub fn restart(&self, pid: u32) -> ActionOutcome {
        self.manager.restart(pid)
    }

    pub fn last_risk(&self) -> f64 {
        self.scorer.last_risk()
    }

    pub fn risk_history(&self) -> Vec<HostMetrics> {
        self.scorer.history()
    }

    pub fn recent_polls(&self, limit: usize) -> Vec<PollResult> {
        self.log.recent(limit)
    }

    pub fn latest_poll(&self) -> Option<PollResult> {
        self.log.latest()
    }
}

/// One-line summary used by the watch loop.
pub fn summarize(result: &PollResult) -> String {
    format!(
        "risk={:.3} cycles={} processes={} cpu={:.1}% mem={:.1}%",
        result.deadlocks.deadlock_risk,
        result.deadlocks.deadlock_cycles.len(),
        result.stats.process_count,
        result.stats.resources.cpu.percent,
        result.stats.resources.memory.percent,
    )
}

/// Poll every `period` until `shutdown` resolves or `max_polls` is reached.
/// Returns the number of completed polls.
pub async fn watch<F, S>(
    monitor: Arc<DeadlockMonitor>,
    period: Duration,
    max_polls: Option<usize>,
    mut on_poll: F,
    shutdown: S,
) -> usize
where
    F: FnMut(&PollResult),
    S: Future<Output = ()>,
{
    let mut ticker = tokio::time::interval(period.max(Duration::from_millis(1)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    tokio::pin!(shutdown);

    let mut completed = 0usize;
    loop {
        if max_polls.is_some_and(|max| completed >= max) {
            break;
        }
        tokio::select! {
            _ = &mut shutdown => {
                info!("[monitor] shutdown requested after {completed} polls");
                break;
            }
            _ = ticker.tick() => {
                let worker = Arc::clone(&monitor);
                match tokio::task::spawn_blocking(move || worker.poll()).await {
                    Ok(result) => {
                        completed += 1;
                        info!("[monitor] {}", summarize(&result));
                        on_poll(&result);
                    }
                    Err(err) => error!("[monitor] poll task failed: {err}"),
                }
            }
        }
    }
    completed
}
