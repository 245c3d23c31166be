//! Multipath fetch-bandwidth policies.
//!
//! Every cycle the fetch stage collects the paths that may fetch and asks the
//! policy in what order to serve them; fetch then fills its width from the
//! first path, moving on when that path stops (taken branch, halt, full queue).
//! Policies only reorder: none of them keeps bookkeeping the others depend on.

use std::fmt;

use super::thread::ThreadTable;
use crate::common::ThreadId;
use crate::config::FetchPolicyKind;

/// Orders fetch candidates.
pub trait FetchPolicy: fmt::Debug {
    /// Reorders `candidates` (ascending id on entry) into service order.
    fn order(&mut self, candidates: &mut Vec<ThreadId>, threads: &ThreadTable);
}

/// Rotates the starting path by one position each cycle.
#[derive(Clone, Debug, Default)]
pub struct RoundRobin {
    next: usize,
}

impl FetchPolicy for RoundRobin {
    fn order(&mut self, candidates: &mut Vec<ThreadId>, threads: &ThreadTable) {
        if candidates.is_empty() {
            return;
        }
        let start = candidates
            .iter()
            .position(|t| t.index() >= self.next)
            .unwrap_or(0);
        candidates.rotate_left(start);
        self.next = (candidates[0].index() + 1) % threads.len().max(1);
    }
}

/// Serves paths by fetch priority; forked children rank below their parents.
#[derive(Clone, Copy, Debug, Default)]
pub struct PredictedFirst;

impl FetchPolicy for PredictedFirst {
    fn order(&mut self, candidates: &mut Vec<ThreadId>, threads: &ThreadTable) {
        candidates.sort_by_key(|&t| (threads.get(t).priority, t));
    }
}

/// Serves the path with the fewest in-flight instructions first.
#[derive(Clone, Copy, Debug, Default)]
pub struct ICount;

impl FetchPolicy for ICount {
    fn order(&mut self, candidates: &mut Vec<ThreadId>, threads: &ThreadTable) {
        candidates.sort_by_key(|&t| (threads.get(t).inflight, t));
    }
}

/// Builds the configured policy.
pub fn build(kind: FetchPolicyKind) -> Box<dyn FetchPolicy> {
    match kind {
        FetchPolicyKind::RoundRobin => Box::new(RoundRobin::default()),
        FetchPolicyKind::PredictedFirst => Box::new(PredictedFirst),
        FetchPolicyKind::ICount => Box::new(ICount),
    }
}
