pub mod advisor;
pub mod collector;
pub mod config;
pub mod cycles;
pub mod error;
pub mod graph;
pub mod manager;
pub mod monitor;
pub mod poll_log;
pub mod risk;
pub mod types;

pub use advisor::{ResolutionAdvisor, StatsLookup};
pub use collector::{MetricsSampler, SysinfoCollector};
pub use config::{Config, LoggingConfig, OutputConfig, RuntimeConfig};
pub use cycles::{Cycle, CycleDetector};
pub use error::MonitorError;
pub use graph::WaitForGraph;
pub use manager::ProcessManager;
pub use monitor::DeadlockMonitor;
pub use risk::RiskScorer;
