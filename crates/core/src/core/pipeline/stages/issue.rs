//! Issue Stage.
//!
//! Issue drains the whole ready list every cycle and walks it in rank order.
//! Anything that cannot start this cycle goes straight back on the list, so the
//! order is recomputed from current state each time. Because the drain frees
//! every ready-list link first, those re-enqueues cannot run out of links.
//!
//! Latency sources:
//! - stores complete at issue; their write happens at commit
//! - loads take a read port, then either forward from an older store to the
//!   same word on their path or pay the data-cache latency
//! - everything else takes a unit of its class

use tracing::trace;

use crate::common::constants::WORD_BYTES;
use crate::common::{Cycle, SimError};
use crate::core::pipeline::slot::SlotRef;
use crate::core::pipeline::state::{Collaborators, SchedulerState};
use crate::core::units::cache::MemCmd;
use crate::isa::FuClass;

/// Executes the issue stage.
///
/// # Errors
///
/// Returns an invariant violation if the ready list holds an issued slot, or
/// if an event or re-enqueue cannot be placed.
pub fn issue_stage(state: &mut SchedulerState, collab: &mut Collaborators) -> Result<(), SimError> {
    let cycle = state.cycle;
    let core = &state.config.core;
    let (mut total, mut int, mut fp) = (core.issue_width, core.int_issue_width, core.fp_issue_width);
    let extra = core.extra_issue_latency;

    let ready = state.ready.drain(&mut state.links, &mut state.pool);
    let mut retry = Vec::new();

    for r in ready {
        let slot = state.pool.get(r.id);
        if slot.issued || slot.completed {
            return Err(SimError::invariant(cycle, format!("{r} on the ready list after issue")));
        }
        let is_fp = slot.fu_class.is_some_and(FuClass::is_fp);
        let width_left = total > 0 && if is_fp { fp > 0 } else { int > 0 };
        if !width_left {
            retry.push(r);
            continue;
        }

        let Some(latency) = start(state, collab, r) else {
            state.stats.overflow_resource += 1;
            retry.push(r);
            continue;
        };

        total -= 1;
        if is_fp {
            fp -= 1;
        } else {
            int -= 1;
        }
        state.stats.issued += 1;
        state.pool.get_mut(r.id).issued = true;

        if let Some(lat) = latency {
            schedule(state, r, cycle + lat.max(1) + extra)?;
        }
        trace!(cycle, slot = %r, latency = ?latency, "issue");
    }

    for r in retry {
        let slot = state.pool.get_mut(r.id);
        if !state.ready.enqueue(&mut state.links, r, slot) {
            return Err(SimError::invariant(cycle, "link pool exhausted re-queueing ready slots"));
        }
    }
    Ok(())
}

/// Starts `r` on its unit.
///
/// Returns `None` if no unit is free, `Some(None)` if the slot completes at
/// issue, or `Some(Some(latency))`.
fn start(state: &mut SchedulerState, collab: &mut Collaborators, r: SlotRef) -> Option<Option<u64>> {
    let slot = state.pool.get(r.id);
    if slot.is_store() {
        let class = slot.fu_class;
        let quota_held = slot.quota_held;
        let slot = state.pool.get_mut(r.id);
        slot.completed = true;
        slot.quota_held = false;
        if let (Some(c), true) = (class, quota_held) {
            state.resources.release(c);
        }
        return Some(None);
    }

    if slot.is_load() {
        let (addr, ancestry) = (slot.addr, slot.ancestry);
        let _ = state.resources.acquire(FuClass::ReadPort)?;
        let forwarded = state
            .pool
            .memory
            .indices()
            .take_while(|&i| i != r.id.index)
            .filter(|&i| {
                let s = state.pool.memory.get(i);
                s.is_store() && !s.squashed && s.addr == addr && s.ancestry.is_prefix_of(&ancestry)
            })
            .last();
        if forwarded.is_some() {
            state.stats.loads_forwarded += 1;
            return Some(Some(state.config.core.forward_latency));
        }
        let word = addr.unwrap_or_default();
        return Some(Some(collab.memory.access(MemCmd::Read, word, WORD_BYTES, state.cycle)));
    }

    match slot.fu_class {
        Some(class) => state.resources.acquire(class).map(|g| Some(g.op_latency)),
        None => Some(Some(1)),
    }
}

fn schedule(state: &mut SchedulerState, r: SlotRef, when: Cycle) -> Result<(), SimError> {
    let completed = state.pool.get(r.id).completed;
    if state.events.schedule(&mut state.links, r, when, state.cycle, completed)? {
        Ok(())
    } else {
        Err(SimError::invariant(state.cycle, format!("no link left to schedule {r}")))
    }
}
