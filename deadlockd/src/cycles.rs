//! Elementary cycle enumeration (Johnson's algorithm).
//!
//! Output order is deterministic: start nodes are taken in ascending pid
//! order, each search only walks pids >= the start, and neighbours are
//! visited in ascending pid order. Every cycle is therefore reported
//! beginning at its smallest pid, in the order the search closes it.
//!
//! A graph built from N mutually contending processes holds a number of
//! cycles exponential in N, so enumeration stops after `max_cycles`.

use crate::graph::WaitForGraph;
use log::warn;
use std::collections::{HashMap, HashSet};

pub const DEFAULT_MAX_CYCLES: usize = 1000;

pub type Cycle = Vec<u32>;

#[derive(Debug, Clone, Copy)]
pub struct CycleDetector {
    max_cycles: usize,
}

impl Default for CycleDetector {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CYCLES)
    }
}

impl CycleDetector {
    pub fn new(max_cycles: usize) -> Self {
        Self { max_cycles }
    }

    pub fn max_cycles(&self) -> usize {
        self.max_cycles
    }

    pub fn find_cycles(&self, graph: &WaitForGraph) -> Vec<Cycle> {
        let mut cycles = Vec::new();
        if self.max_cycles == 0 || graph.edge_count() == 0 {
            return cycles;
        }

        for start in graph.nodes() {
            if cycles.len() >= self.max_cycles {
                break;
            }
            let mut search = Search {
                graph,
                start,
                limit: self.max_cycles,
                stack: Vec::new(),
                blocked: HashSet::new(),
                blocked_by: HashMap::new(),
                cycles: &mut cycles,
            };
            search.circuit(start);
        }

        if cycles.len() >= self.max_cycles {
            warn!(
                "[cycles] enumeration capped at {} cycles; output truncated",
                self.max_cycles
            );
        }
        cycles
    }
}

struct Search<'a> {
    graph: &'a WaitForGraph,
    start: u32,
    limit: usize,
    stack: Vec<u32>,
    blocked: HashSet<u32>,
    blocked_by: HashMap<u32, HashSet<u32>>,
    cycles: &'a mut Vec<Cycle>,
}

impl Search<'_> {
    fn full(&self) -> bool {
        self.cycles.len() >= self.limit
    }

    fn circuit(&mut self, v: u32) -> bool {
        let graph = self.graph;
        let start = self.start;
        let mut found = false;
        self.stack.push(v);
        self.blocked.insert(v);

        for w in graph.neighbors(v).filter(|&w| w >= start) {
            if self.full() {
                break;
            }
            if w == start {
                self.cycles.push(self.stack.clone());
                found = true;
            } else if !self.blocked.contains(&w) && self.circuit(w) {
                found = true;
            }
        }

        if found {
            self.unblock(v);
        } else {
            for w in graph.neighbors(v).filter(|&w| w >= start) {
                self.blocked_by.entry(w).or_default().insert(v);
            }
        }

        self.stack.pop();
        found
    }

    fn unblock(&mut self, u: u32) {
        self.blocked.remove(&u);
        if let Some(waiting) = self.blocked_by.remove(&u) {
            for w in waiting {
                if self.blocked.contains(&w) {
                    self.unblock(w);
                }
            }
        }
    }
}
