//! Front end: fetch queue and fetch stage.
//!
//! Fetch walks each eligible path along its predicted stream. Every control
//! instruction receives the next fork-ancestry position of its path; a
//! conditional branch the confidence estimator marks low may fork a child path
//! that fetches the other side. The child's ledger and checkpoints are copied
//! later, when the branch itself dispatches.

use serde::Serialize;
use tracing::{debug, trace};

use super::state::{Collaborators, SchedulerState};
use super::thread::{Ancestry, ThreadState, ThreadStatus};
use crate::common::ThreadId;
use crate::common::constants::INST_BYTES;
use crate::core::units::bru::{Confidence, Prediction, RasCheckpoint};
use crate::isa::{Instruction, Opcode};

/// One fetched instruction waiting for dispatch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct FetchEntry {
    /// Instruction.
    pub inst: Instruction,
    /// Address.
    pub pc: u64,
    /// Predicted next address.
    pub pred_pc: u64,
    /// Fetching path.
    pub thread: ThreadId,
    /// Path ancestry including this instruction's own position.
    pub ancestry: Ancestry,
    /// Ancestry position assigned to this instruction.
    pub pos: Option<u64>,
    /// Predictor training token.
    pub update_token: u64,
    /// Return-stack repair token.
    pub recovery_token: RasCheckpoint,
    /// Confidence verdict.
    pub confidence: Confidence,
    /// Path forked to fetch the other side of this branch.
    pub forked_child: Option<ThreadId>,
}

/// True if `inst` needs an ancestry position: any control transfer may be
/// found mispredicted, even when the reference predictors never miss it.
fn needs_position(inst: &Instruction) -> bool {
    inst.op.is_control()
}

/// Executes the fetch stage.
pub fn fetch_stage(state: &mut SchedulerState, collab: &mut Collaborators) {
    let cycle = state.cycle;
    let mut candidates: Vec<ThreadId> = state
        .threads
        .iter()
        .filter(|(_, t)| {
            t.status == ThreadStatus::Valid && !t.fetch_halted && t.fetch_stall_until <= cycle
        })
        .map(|(id, _)| id)
        .collect();
    if candidates.is_empty() {
        return;
    }
    collab.fetch_policy.order(&mut candidates, &state.threads);

    let queue_size = state.config.core.fetch_queue_size;
    let mut budget = state.config.core.fetch_width;
    let mut forks = 0;
    let mut oldest = state.oldest_live_position();

    for tid in candidates {
        while budget > 0 && state.fetch_queue.len() < queue_size {
            let pc = state.threads.get(tid).fetch_pc;
            let Some(inst) = collab.source.fetch(pc) else {
                trace!(thread = %tid, pc, "fetch left the program");
                state.threads.get_mut(tid).fetch_halted = true;
                break;
            };
            let fallthrough = pc.wrapping_add(INST_BYTES);

            if needs_position(&inst) && state.threads.get(tid).ancestry.room(oldest) == 0 {
                state.stats.overflow_window += 1;
                break;
            }

            let prediction = if inst.op.is_control() {
                state.stats.bp_lookups += 1;
                collab.predictor.lookup(pc, &inst, state.threads.ras_mut(tid))
            } else {
                Prediction {
                    predicted_pc: fallthrough,
                    ..Prediction::default()
                }
            };
            let confidence = if inst.op.is_cond_branch() {
                let free = state.threads.count(ThreadStatus::Dead);
                collab.confidence.predict(pc, free)
            } else {
                Confidence::High
            };

            let thread = state.threads.get_mut(tid);
            let pos = needs_position(&inst).then(|| thread.ancestry.push(true));
            if let Some(p) = pos {
                oldest = Some(oldest.map_or(p, |o| o.min(p)));
            }
            let ancestry = thread.ancestry;
            thread.fetch_pc = prediction.predicted_pc;
            thread.inflight += 1;

            let other_side = if prediction.predicted_pc == inst.target {
                fallthrough
            } else {
                inst.target
            };
            let mut forked_child = None;
            if confidence == Confidence::Low && other_side != prediction.predicted_pc {
                if let (Some(p), true) = (pos, forks < state.config.multipath.max_forks_per_cycle) {
                    forked_child = fork(state, tid, p, other_side);
                }
                match forked_child {
                    Some(child) => {
                        forks += 1;
                        state.stats.forks += 1;
                        debug!(parent = %tid, %child, pc, "forked path");
                    }
                    None => {
                        state.stats.forks_refused += 1;
                        debug!(parent = %tid, pc, "fork refused");
                    }
                }
            }

            state.fetch_queue.push_back(FetchEntry {
                inst,
                pc,
                pred_pc: prediction.predicted_pc,
                thread: tid,
                ancestry,
                pos,
                update_token: prediction.update_token,
                recovery_token: prediction.recovery_token,
                confidence,
                forked_child,
            });
            budget -= 1;

            if inst.op == Opcode::Halt {
                state.threads.get_mut(tid).fetch_halted = true;
                break;
            }
            if prediction.predicted_pc != fallthrough {
                break;
            }
        }
        if budget == 0 {
            break;
        }
    }
}

/// Claims a free path record for the other side of the branch at position `pos`.
fn fork(state: &mut SchedulerState, parent: ThreadId, pos: u64, start: u64) -> Option<ThreadId> {
    let child = state.threads.free_record()?;
    let ras = state.threads.ras_for_child(parent);
    let p = state.threads.get(parent);
    let mut ancestry = p.ancestry;
    ancestry.set(pos, false);
    let record = ThreadState {
        status: ThreadStatus::Valid,
        fetch_pc: start,
        dispatch_pc: start,
        level: p.level,
        ancestry,
        ras,
        priority: p.priority + 1,
        fetch_stall_until: state.cycle + state.config.multipath.fork_penalty,
        pending_init: Some(parent),
        fetch_halted: false,
        inflight: 0,
    };
    *state.threads.get_mut(child) = record;
    Some(child)
}
