//! Wait-for graph inferred from resource co-occurrence.
//!
//! There is no lock ownership information here. Two processes are assumed to
//! contend when both run hot on CPU, or both hold a large share of memory.
//! The predicate is symmetric, so every qualifying pair yields edges in both
//! directions and therefore a 2-cycle.

use crate::error::MonitorError;
use crate::types::ProcessSnapshot;
use log::{debug, warn};
use std::collections::{BTreeMap, BTreeSet};

pub const CONTENTION_THRESHOLD: f64 = 70.0;

/// `true` when `a` is inferred to contend with `b`.
pub fn contends(a: &ProcessSnapshot, b: &ProcessSnapshot) -> bool {
    (a.cpu_percent > CONTENTION_THRESHOLD && b.cpu_percent > CONTENTION_THRESHOLD)
        || (a.memory_percent > CONTENTION_THRESHOLD && b.memory_percent > CONTENTION_THRESHOLD)
}

/// Directed graph over pids. Iteration is in ascending pid order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WaitForGraph {
    adjacency: BTreeMap<u32, BTreeSet<u32>>,
}

impl WaitForGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a fresh graph from one sample.
    ///
    /// Items that failed to sample are dropped from every comparison. A pid
    /// that appears twice keeps its first snapshot.
    pub fn build<I>(samples: I) -> Self
    where
        I: IntoIterator<Item = Result<ProcessSnapshot, MonitorError>>,
    {
        let mut seen = BTreeSet::new();
        let mut snapshots = Vec::new();
        let mut skipped = 0usize;

        for sample in samples {
            match sample {
                Ok(snapshot) => {
                    if seen.insert(snapshot.pid) {
                        snapshots.push(snapshot);
                    }
                }
                Err(err) => {
                    skipped += 1;
                    if err.is_skippable() {
                        debug!("[graph] skipping process: {err}");
                    } else {
                        warn!("[graph] unexpected sampling error: {err}");
                    }
                }
            }
        }

        let mut graph = WaitForGraph::new();
        for snapshot in &snapshots {
            graph.add_node(snapshot.pid);
        }

        for a in &snapshots {
            for b in &snapshots {
                if a.pid != b.pid && contends(a, b) {
                    graph.add_edge(a.pid, b.pid);
                }
            }
        }

        debug!(
            "[graph] built {} nodes, {} edges ({} skipped)",
            graph.node_count(),
            graph.edge_count(),
            skipped
        );
        graph
    }

    pub fn add_node(&mut self, pid: u32) {
        self.adjacency.entry(pid).or_default();
    }

    /// Adds `from -> to`. Self-loops are ignored.
    pub fn add_edge(&mut self, from: u32, to: u32) {
        if from == to {
            return;
        }
        self.add_node(to);
        self.adjacency.entry(from).or_default().insert(to);
    }

    pub fn contains_node(&self, pid: u32) -> bool {
        self.adjacency.contains_key(&pid)
    }

    pub fn has_edge(&self, from: u32, to: u32) -> bool {
        self.adjacency
            .get(&from)
            .is_some_and(|targets| targets.contains(&to))
    }

    pub fn nodes(&self) -> impl Iterator<Item = u32> + '_ {
        self.adjacency.keys().copied()
    }

    pub fn neighbors(&self, pid: u32) -> impl Iterator<Item = u32> + '_ {
        self.adjacency
            .get(&pid)
            .into_iter()
            .flat_map(|targets| targets.iter().copied())
    }

    pub fn edges(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
        self.adjacency
            .iter()
            .flat_map(|(&from, targets)| targets.iter().map(move |&to| (from, to)))
    }

    pub fn node_count(&self) -> usize {
        self.adjacency.len()
    }

    pub fn edge_count(&self) -> usize {
        self.adjacency.values().map(BTreeSet::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.adjacency.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn snap(pid: u32, cpu: f64, mem: f64) -> ProcessSnapshot {
        ProcessSnapshot {
            pid,
            name: format!("proc-{pid}"),
            status: "running".to_string(),
            cpu_percent: cpu,
            memory_percent: mem,
        }
    }

    #[test]
    fn high_cpu_pair_gets_mutual_edges() {
        let graph = WaitForGraph::build(vec![Ok(snap(10, 90.0, 1.0)), Ok(snap(20, 75.0, 2.0))]);
        assert!(graph.has_edge(10, 20));
        assert!(graph.has_edge(20, 10));
        assert_eq!(graph.edge_count(), 2);
    }

    #[test]
    fn high_memory_pair_gets_mutual_edges() {
        let graph = WaitForGraph::build(vec![Ok(snap(1, 5.0, 71.0)), Ok(snap(2, 5.0, 99.0))]);
        assert!(graph.has_edge(1, 2));
        assert!(graph.has_edge(2, 1));
    }

    #[test]
    fn mixed_hot_resources_do_not_contend() {
        // one is CPU-hot, the other memory-hot
        let graph = WaitForGraph::build(vec![Ok(snap(1, 95.0, 10.0)), Ok(snap(2, 10.0, 95.0))]);
        assert_eq!(graph.node_count(), 2);
        assert_eq!(graph.edge_count(), 0);
    }

    #[test]
    fn threshold_is_strict() {
        let graph = WaitForGraph::build(vec![Ok(snap(1, 70.0, 70.0)), Ok(snap(2, 70.0, 70.0))]);
        assert_eq!(graph.edge_count(), 0);
    }

    #[test]
    fn failed_samples_are_skipped() {
        let graph = WaitForGraph::build(vec![
            Ok(snap(1, 90.0, 0.0)),
            Err(MonitorError::ProcessVanished(2)),
            Err(MonitorError::AccessDenied(3)),
            Ok(snap(4, 90.0, 0.0)),
        ]);
        assert_eq!(graph.nodes().collect::<Vec<_>>(), vec![1, 4]);
        assert!(graph.has_edge(1, 4));
        assert!(!graph.contains_node(2));
    }

    #[test]
    fn duplicate_pid_keeps_first_snapshot() {
        let graph = WaitForGraph::build(vec![
            Ok(snap(1, 10.0, 0.0)),
            Ok(snap(1, 90.0, 0.0)),
            Ok(snap(2, 90.0, 0.0)),
        ]);
        assert_eq!(graph.node_count(), 2);
        assert_eq!(graph.edge_count(), 0);
    }

    #[test]
    fn self_loops_are_never_added() {
        let mut graph = WaitForGraph::new();
        graph.add_edge(5, 5);
        assert!(!graph.has_edge(5, 5));
        assert_eq!(graph.edge_count(), 0);
    }

    #[test]
    fn empty_sample_builds_empty_graph() {
        let graph = WaitForGraph::build(Vec::new());
        assert!(graph.is_empty());
    }

    proptest! {
        #[test]
        fn contention_edges_are_always_mutual(
            procs in proptest::collection::vec((0.0f64..100.0, 0.0f64..100.0), 0..12)
        ) {
            let samples: Vec<_> = procs
                .iter()
                .enumerate()
                .map(|(i, (cpu, mem))| Ok(snap(i as u32 + 1, *cpu, *mem)))
                .collect();
            let snapshots: Vec<_> = samples.iter().flatten().cloned().collect();
            let graph = WaitForGraph::build(samples);
            for a in &snapshots {
                for b in &snapshots {
                    if a.pid != b.pid && contends(a, b) {
                        prop_assert!(graph.has_edge(a.pid, b.pid));
                        prop_assert!(graph.has_edge(b.pid, a.pid));
                    }
                }
            }
            for (from, to) in graph.edges() {
                prop_assert!(from != to);
                prop_assert!(graph.has_edge(to, from));
            }
        }
    }
}
