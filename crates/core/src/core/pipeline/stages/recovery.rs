//! Branch Recovery and path management.
//!
//! A control slot that diverged from its prediction, or that forked a child
//! path, hands itself to [`recover`] when it writes back. Every live path whose
//! ancestry runs through the wrong side of the branch is affected:
//! 1. **Revert:** A path that mispredicted without forking is steered onto the
//!    correct target and keeps running.
//! 2. **Kill:** Every other affected path stops fetching and waits for its
//!    remaining slots to drain; [`reclaim_threads`] then frees the record.
//!
//! Younger slots of affected paths are squashed, their ledger tables and
//! checkpoints are cut back to the branch's level, and their fetch-queue
//! entries are dropped.

use tracing::debug;

use crate::common::{SimError, ThreadId};
use crate::core::pipeline::slot::{Slot, SlotId, SlotRef};
use crate::core::pipeline::state::{Collaborators, SchedulerState};
use crate::core::pipeline::thread::ThreadStatus;

/// Resolves the divergence or fork recorded in the control slot `branch`.
///
/// # Errors
///
/// Returns an invariant violation if the branch carries no ancestry position.
pub fn recover(
    state: &mut SchedulerState,
    collab: &mut Collaborators,
    branch: SlotRef,
) -> Result<(), SimError> {
    let b = state.pool.get(branch.id).clone();
    let cycle = state.cycle;
    let Some(pos) = b.branch_pos else {
        return Err(SimError::invariant(
            cycle,
            format!("{branch} at {:#x} diverged without an ancestry position", b.pc),
        ));
    };
    state.stats.recoveries += 1;

    let matched = matched_threads(state, &b, pos);
    let revert = (b.diverged && b.forked.is_none()).then_some(b.thread);

    for &tid in &matched {
        if Some(tid) == revert {
            continue;
        }
        let thread = state.threads.get_mut(tid);
        if thread.status == ThreadStatus::Valid {
            thread.status = ThreadStatus::SquashPending;
            state.stats.threads_killed += 1;
            debug!(cycle, thread = %tid, pc = b.pc, "path killed");
        }
    }

    squash_younger(state, &b, branch, &matched);

    for &tid in &matched {
        state.ledger.truncate(tid, b.spec_level);
        state.spec.truncate(tid, b.spec_level);
    }

    let mut dropped = vec![0usize; state.threads.len()];
    state.fetch_queue.retain(|e| {
        let keep = !matched.contains(&e.thread);
        if !keep {
            dropped[e.thread.index()] += 1;
        }
        keep
    });
    for (i, n) in dropped.into_iter().enumerate().filter(|&(_, n)| n > 0) {
        let thread = state.threads.get_mut(ThreadId(i as u8));
        thread.inflight = thread.inflight.saturating_sub(n);
    }

    if let Some(tid) = revert {
        revert_thread(state, collab, &b, tid, pos);
    }

    if let (Some(child), true) = (b.forked, b.diverged) {
        state.stats.forks_useful += 1;
        let priority = state.threads.get(b.thread).priority;
        state.threads.get_mut(child).priority = priority;
        debug!(cycle, parent = %b.thread, %child, "forked path was correct");
    }

    if state.config.multipath.squash_remove {
        pop_squashed_tails(state);
    }
    Ok(())
}

/// Live paths whose ancestry takes the wrong side of the branch at `pos`.
fn matched_threads(state: &SchedulerState, b: &Slot, pos: u64) -> Vec<ThreadId> {
    let mut wrong = b.ancestry;
    wrong.set(pos, b.diverged);
    let lo = state.oldest_live_position().map_or(pos, |o| o.min(pos));
    state
        .threads
        .iter()
        .filter(|(_, t)| t.is_live() && t.ancestry.cursor > pos && t.ancestry.agrees(&wrong, lo, pos + 1))
        .map(|(id, _)| id)
        .collect()
}

fn live_general_slots(state: &SchedulerState, tid: ThreadId) -> usize {
    let general = &state.pool.general;
    general
        .indices()
        .filter(|&i| {
            let s = general.get(i);
            s.thread == tid && !s.squashed
        })
        .count()
}

/// Squashes slots of `matched` paths younger than the branch, from the tail down.
fn squash_younger(state: &mut SchedulerState, b: &Slot, branch: SlotRef, matched: &[ThreadId]) {
    let order: Vec<u32> = state.pool.general.indices().rev().collect();
    for index in order {
        if index == branch.id.index {
            break;
        }
        let slot = state.pool.general.get(index);
        if slot.squashed || slot.seq <= b.seq || !matched.contains(&slot.thread) {
            continue;
        }
        let tid = slot.thread;
        let id = SlotId {
            kind: branch.id.kind,
            index,
        };
        let pair = state.pool.pair_of(id);
        squash_slot(state, id);
        if let Some(pair) = pair {
            squash_slot(state, pair);
        }
        let thread = state.threads.get_mut(tid);
        thread.inflight = thread.inflight.saturating_sub(1);
    }
}

fn squash_slot(state: &mut SchedulerState, id: SlotId) {
    let keep = !state.config.multipath.squash_remove;
    let slot = state.pool.get_mut(id);
    slot.squashed = true;
    slot.squashable = keep;
    slot.queued = false;
    slot.tag = slot.tag.wrapping_add(1);
    for chain in &mut slot.odeps {
        state.links.release_list(chain);
    }
    if let (Some(class), true) = (slot.fu_class, slot.quota_held) {
        slot.quota_held = false;
        state.resources.release(class);
    }
    state.stats.squashed += 1;
}

/// Sends the mispredicting path down the correct side of the branch.
fn revert_thread(
    state: &mut SchedulerState,
    collab: &mut Collaborators,
    b: &Slot,
    tid: ThreadId,
    pos: u64,
) {
    let resume_at = state.cycle + state.config.core.mispredict_penalty;
    let thread = state.threads.get_mut(tid);
    thread.status = ThreadStatus::Valid;
    thread.ancestry.set(pos, false);
    thread.ancestry.cursor = pos + 1;
    thread.level = b.spec_level;
    thread.fetch_pc = b.actual_next_pc;
    thread.dispatch_pc = b.actual_next_pc;
    thread.fetch_stall_until = resume_at;
    thread.fetch_halted = false;
    collab.predictor.recover_return_stack(
        state.threads.ras_mut(tid),
        b.pc,
        b.actual_next_pc,
        &b.inst,
        b.recovery_token,
    );
    state.stats.threads_reverted += 1;
    debug!(cycle = state.cycle, thread = %tid, pc = b.pc, target = b.actual_next_pc, "path reverted");
}

/// Frees squashed slots at the young end of the general array, with their
/// memory halves. Squashed slots behind a surviving one wait for commit.
fn pop_squashed_tails(state: &mut SchedulerState) {
    let pool = &mut state.pool;
    while let Some(tail) = pool.general.tail_index() {
        let slot = pool.general.get(tail);
        if !slot.squashed {
            break;
        }
        if slot.pair.is_some() {
            pool.memory.pop_tail();
        }
        pool.general.pop_tail();
    }
}

/// Frees every killed path whose last slot has drained.
pub fn reclaim_threads(state: &mut SchedulerState) {
    for tid in state.threads.ids_with(ThreadStatus::SquashPending) {
        if state.threads.get(tid).inflight > 0 {
            continue;
        }
        let thread = state.threads.get_mut(tid);
        thread.status = ThreadStatus::Dead;
        thread.ras = None;
        thread.pending_init = None;
        thread.level = 0;
        state.ledger.reset(tid);
        state.spec.release(tid);
        state.stats.threads_reclaimed += 1;
        debug!(cycle = state.cycle, thread = %tid, "path reclaimed");
    }
}

/// Cross-checks path bookkeeping against the slot pool and fetch queue.
///
/// # Errors
///
/// Returns an invariant violation if more than one initialised path runs at
/// level 0, or if a path's in-flight count disagrees with what it owns.
pub fn check_consistency(state: &SchedulerState) -> Result<(), SimError> {
    let level_zero = state
        .threads
        .iter()
        .filter(|(_, t)| t.status == ThreadStatus::Valid && t.pending_init.is_none() && t.level == 0)
        .count();
    if level_zero > 1 {
        return Err(SimError::invariant(
            state.cycle,
            format!("{level_zero} paths writing architected state"),
        ));
    }
    for (tid, thread) in state.threads.iter() {
        let queued = state.fetch_queue.iter().filter(|e| e.thread == tid).count();
        let owned = queued + live_general_slots(state, tid);
        if owned != thread.inflight {
            return Err(SimError::invariant(
                state.cycle,
                format!("{tid} counts {} in flight but owns {owned}", thread.inflight),
            ));
        }
    }
    Ok(())
}
