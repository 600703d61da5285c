use serde::{Deserialize, Serialize};

/// One process as seen by a single sample. Not retained across polls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessSnapshot {
    pub pid: u32,
    pub name: String,
    pub status: String,
    pub cpu_percent: f64,
    pub memory_percent: f64,
}

/// Host-wide load figures fed to the risk scorer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HostMetrics {
    pub cpu_percent: f64,
    pub memory_percent: f64,
    pub swap_percent: f64,
    pub process_count: usize,
}

impl HostMetrics {
    pub fn is_finite(&self) -> bool {
        self.cpu_percent.is_finite()
            && self.memory_percent.is_finite()
            && self.swap_percent.is_finite()
    }
}

/// Per-pid stats read at suggestion time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LiveStats {
    pub name: String,
    pub cpu_percent: f64,
    // resident memory / total system memory * 100
    pub memory_percent: f64,
}

/// Detail view of a single process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessInfo {
    pub pid: u32,
    pub name: String,
    pub status: String,
    pub cpu_percent: f64,
    pub memory_percent: f64,
    pub create_time: u64, // Unix epoch seconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_threads: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Kill,
    Restart,
    Monitor,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suggestion {
    pub pid: u32,
    pub action: Action,
    pub reason: String,
    pub process_name: String,
}

/// Result of an explicit kill/restart request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionOutcome {
    pub success: bool,
    pub message: String,
}

impl ActionOutcome {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CpuSummary {
    pub percent: f64,
    pub count: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemorySummary {
    pub total: u64,
    pub available: u64,
    pub percent: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UsageSummary {
    pub total: u64,
    pub used: u64,
    pub percent: f64,
}

/// Host resource summary reported alongside each poll. All zeros when the
/// host could not be read.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceSummary {
    pub cpu: CpuSummary,
    pub memory: MemorySummary,
    pub swap: UsageSummary,
    pub disk: UsageSummary,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemStats {
    #[serde(flatten)]
    pub resources: ResourceSummary,
    pub deadlock_risk: f64,
    pub process_count: usize,
    pub processes: Vec<ProcessSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeadlockCycle {
    pub cycle: Vec<u32>,
    pub processes: Vec<ProcessInfo>,
    pub suggestions: Vec<Suggestion>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeadlockReport {
    pub deadlocks_found: bool,
    pub deadlock_cycles: Vec<DeadlockCycle>,
    pub deadlock_risk: f64,
}

/// Everything one poll produces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollResult {
    pub stats: SystemStats,
    pub deadlocks: DeadlockReport,
    pub timestamp: String,
}
