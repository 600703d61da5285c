use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MonitorError {
    #[error("process {0} vanished")]
    ProcessVanished(u32),

    #[error("access denied to process {0}")]
    AccessDenied(u32),

    #[error("host metrics unavailable: {0}")]
    MetricsUnavailable(String),

    #[error("could not determine command line of process {0}")]
    CommandLineUnavailable(u32),

    #[error("process {0} not found")]
    UnknownProcess(u32),
}

impl MonitorError {
    /// Per-item failures that the detection path skips rather than reports.
    pub fn is_skippable(&self) -> bool {
        matches!(
            self,
            MonitorError::ProcessVanished(_)
                | MonitorError::AccessDenied(_)
                | MonitorError::UnknownProcess(_)
        )
    }
}
