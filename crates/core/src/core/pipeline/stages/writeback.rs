//! Writeback Stage.
//!
//! Pops every event due this cycle, marks its slot complete and wakes the
//! consumers on each output chain. A control slot that diverged or forked runs
//! recovery first, so consumers squashed by it are never woken.

use tracing::trace;

use crate::common::SimError;
use crate::common::constants::MAX_OUTPUTS;
use crate::config::UpdateStage;
use crate::core::pipeline::link::LinkData;
use crate::core::pipeline::slot::SlotRef;
use crate::core::pipeline::state::{Collaborators, SchedulerState};

use super::recovery;

/// Executes the writeback stage.
///
/// # Errors
///
/// Returns an invariant violation if an event fires for a completed slot or a
/// slot whose inputs never arrived.
pub fn writeback_stage(state: &mut SchedulerState, collab: &mut Collaborators) -> Result<(), SimError> {
    while let Some(r) = state.events.pop_due(&mut state.links, state.cycle, &state.pool) {
        complete(state, collab, r)?;
    }
    Ok(())
}

fn complete(state: &mut SchedulerState, collab: &mut Collaborators, r: SlotRef) -> Result<(), SimError> {
    let cycle = state.cycle;
    let slot = state.pool.get_mut(r.id);
    if slot.completed || !slot.inputs_ready() {
        return Err(SimError::invariant(
            cycle,
            format!("event for {r} fired but it is not waiting on one"),
        ));
    }
    slot.completed = true;
    if let (Some(class), true) = (slot.fu_class, slot.quota_held) {
        slot.quota_held = false;
        state.resources.release(class);
    }
    let control = slot.is_control();
    let resolves = control && (slot.diverged || slot.forked.is_some());
    trace!(cycle, slot = %r, pc = slot.pc, "writeback");

    if resolves {
        recovery::recover(state, collab, r)?;
    }
    if control && state.config.predictor.update == UpdateStage::Writeback {
        let s = state.pool.get(r.id);
        collab
            .predictor
            .update(s.pc, s.actual_next_pc, s.taken, !s.diverged, &s.inst, s.update_token);
    }

    for output in 0..MAX_OUTPUTS {
        broadcast(state, r, output)?;
    }
    Ok(())
}

/// Wakes every live consumer of `output` and retires its ledger entry.
fn broadcast(state: &mut SchedulerState, r: SlotRef, output: usize) -> Result<(), SimError> {
    let producer = state.pool.get_mut(r.id);
    let Some(reg) = producer.out_regs[output] else {
        return Ok(());
    };
    let (thread, level) = (producer.thread, producer.spec_level);
    let mut chain = std::mem::take(&mut producer.odeps[output]);

    while let Some(link) = state.links.pop_front(&mut chain) {
        let Some(consumer) = state.pool.resolve_mut(link.target) else {
            continue;
        };
        let LinkData::Operand(input) = link.data else {
            continue;
        };
        consumer.in_ready[input as usize] = true;
        if consumer.inputs_ready()
            && !consumer.is_load()
            && !consumer.queued
            && !consumer.issued
            && !consumer.squashed
            && !state.ready.enqueue(&mut state.links, link.target, consumer)
        {
            return Err(SimError::invariant(state.cycle, "link pool exhausted waking a consumer"));
        }
    }

    state.ledger.clear_if_current(r, output as u8, reg, thread, level);
    Ok(())
}
