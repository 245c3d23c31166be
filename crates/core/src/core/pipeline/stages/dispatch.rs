//! Dispatch Stage: fetch queue to slot pool.
//!
//! Each instruction is executed functionally as it dispatches, against the view
//! its path has at its current speculative level, so every slot carries its
//! result, effective address and actual next PC from the start. The timing
//! model then decides when those results become visible.
//!
//! Memory operations are split in two: an address slot in the general array
//! that produces the internal `TMP` register, and an access slot in the memory
//! array that consumes it (plus the store data).

use tracing::trace;

use crate::common::constants::MAX_INPUTS;
use crate::common::{Reg, SimError, ThreadId};
use crate::core::pipeline::frontend::FetchEntry;
use crate::core::pipeline::link::LinkData;
use crate::core::pipeline::slot::{Slot, SlotRef, SlotRole};
use crate::core::pipeline::state::SchedulerState;
use crate::core::pipeline::thread::ThreadStatus;
use crate::isa::{FuClass, Outcome, execute};

/// Executes the dispatch stage.
///
/// Dispatches up to `decode_width` instructions from the head of the fetch
/// queue, stopping at the first that cannot be placed this cycle.
///
/// # Errors
///
/// Returns an invariant violation if a queued instruction does not follow its
/// path's dispatch stream or its path was never initialised.
pub fn dispatch_stage(state: &mut SchedulerState) -> Result<(), SimError> {
    for _ in 0..state.config.core.decode_width {
        let Some(&entry) = state.fetch_queue.front() else {
            break;
        };
        if !dispatch_one(state, &entry)? {
            break;
        }
        let _ = state.fetch_queue.pop_front();
    }
    Ok(())
}

fn live_inputs(regs: [Option<Reg>; 2]) -> [Option<Reg>; MAX_INPUTS] {
    [regs[0], regs[1], None]
}

fn input_count(regs: &[Option<Reg>]) -> usize {
    regs.iter().flatten().count()
}

/// Places one instruction; `Ok(false)` means a structural stall.
fn dispatch_one(state: &mut SchedulerState, entry: &FetchEntry) -> Result<bool, SimError> {
    let cycle = state.cycle;
    let tid = entry.thread;
    let thread = state.threads.get(tid);
    if thread.status != ThreadStatus::Valid {
        return Err(SimError::invariant(
            cycle,
            format!("{tid} has queued instructions but is {:?}", thread.status),
        ));
    }
    if let Some(parent) = thread.pending_init {
        return Err(SimError::invariant(
            cycle,
            format!("{tid} reached dispatch before its fork from {parent} was initialised"),
        ));
    }
    if entry.pc != thread.dispatch_pc {
        return Err(SimError::invariant(
            cycle,
            format!(
                "{tid} dispatching {:#x}, expected {:#x}",
                entry.pc, thread.dispatch_pc
            ),
        ));
    }
    let level = thread.level;
    let inst = entry.inst;
    let is_mem = inst.op.is_mem();

    if state.pool.general.is_full() {
        state.stats.overflow_ruu += 1;
        return Ok(false);
    }
    if is_mem && state.pool.memory.is_full() {
        state.stats.overflow_lsq += 1;
        return Ok(false);
    }
    let links_needed = if is_mem {
        input_count(&inst.address_sources()) + input_count(&inst.access_sources()) + 2
    } else {
        input_count(&inst.sources()) + 1
    };
    if state.links.available() < links_needed {
        state.stats.overflow_links += 1;
        return Ok(false);
    }

    let outcome = execute(&inst, entry.pc, &state.spec.view(tid, level));
    let diverged = entry.pred_pc != outcome.next_pc;
    let new_level = diverged || entry.forked_child.is_some();
    if new_level && level + 1 > state.config.multipath.max_spec_levels {
        state.stats.overflow_spec_depth += 1;
        return Ok(false);
    }
    let class = inst.op.fu_class();
    if let Some(c) = class {
        if !state.resources.try_reserve(c) {
            state.stats.overflow_quota += 1;
            return Ok(false);
        }
    }

    if let Some((reg, value)) = outcome.result {
        state.spec.write_reg(tid, level, reg, value);
    }
    if let (Some(addr), Some(value)) = (outcome.addr, outcome.store_value) {
        state.spec.write_mem(tid, level, addr, value);
    }

    let mut primary = Slot::new(inst, SlotRole::Single, entry.pc, tid);
    primary.pred_pc = entry.pred_pc;
    primary.actual_next_pc = outcome.next_pc;
    primary.spec_level = level;
    primary.ancestry = entry.ancestry;
    primary.branch_pos = entry.pos;
    primary.taken = outcome.taken;
    primary.update_token = entry.update_token;
    primary.recovery_token = entry.recovery_token;
    primary.confidence = entry.confidence;
    primary.diverged = diverged;
    primary.forked = entry.forked_child;

    if is_mem {
        primary.role = SlotRole::Address;
        primary.in_regs = live_inputs(inst.address_sources());
        primary.out_regs = [Some(Reg::TMP), None];
        primary.fu_class = Some(FuClass::IntAlu);
        let access = access_slot(&primary, &outcome, class);
        let addr_ref = place(state, primary, level)?;
        let access_ref = place(state, access, level)?;
        state.pool.general.get_mut(addr_ref.id.index).pair = Some(access_ref.id.index);
        state.pool.memory.get_mut(access_ref.id.index).pair = Some(addr_ref.id.index);
        state.stats.dispatched += 2;
    } else {
        primary.in_regs = live_inputs(inst.sources());
        primary.out_regs = [inst.dest(), None];
        primary.result = outcome.result;
        primary.fu_class = class;
        primary.quota_held = class.is_some();
        let _ = place(state, primary, level)?;
        state.stats.dispatched += 1;
    }

    if let Some(child) = entry.forked_child {
        init_fork(state, tid, child, level, diverged);
    } else if diverged {
        enter_level(state, tid, level + 1);
    }
    state.threads.get_mut(tid).dispatch_pc = entry.pred_pc;

    trace!(
        cycle,
        thread = %tid,
        pc = entry.pc,
        inst = %inst,
        level,
        diverged,
        "dispatch"
    );
    Ok(true)
}

/// Access half of a memory op.
fn access_slot(address: &Slot, outcome: &Outcome, class: Option<FuClass>) -> Slot {
    let inst = address.inst;
    let mut slot = Slot::new(inst, SlotRole::Access, address.pc, address.thread);
    slot.pred_pc = address.pred_pc;
    slot.actual_next_pc = address.actual_next_pc;
    slot.spec_level = address.spec_level;
    slot.ancestry = address.ancestry;
    slot.in_regs = live_inputs(inst.access_sources());
    slot.out_regs = [inst.dest(), None];
    slot.addr = outcome.addr;
    slot.result = outcome.result;
    slot.store_value = outcome.store_value;
    slot.fu_class = class;
    slot.quota_held = class.is_some();
    slot
}

/// Allocates `slot`, wires its inputs, registers its outputs and queues it if
/// it is already ready.
fn place(state: &mut SchedulerState, mut slot: Slot, level: usize) -> Result<SlotRef, SimError> {
    let cycle = state.cycle;
    let tid = slot.thread;
    slot.seq = state.take_seq();
    let full = || SimError::invariant(cycle, "slot array filled after capacity check");
    let r = match slot.role {
        SlotRole::Access => state.pool.memory.allocate(slot).ok_or_else(full)?,
        SlotRole::Single | SlotRole::Address => state.pool.general.allocate(slot).ok_or_else(full)?,
    };

    wire_inputs(state, r, tid, level)?;

    let outputs = state.pool.get(r.id).out_regs;
    for (o, reg) in outputs.iter().enumerate() {
        if let Some(reg) = *reg {
            state.ledger.register_producer(r, o as u8, reg, tid, level);
        }
    }

    let slot = state.pool.get_mut(r.id);
    if slot.inputs_ready() && !slot.is_load() && !state.ready.enqueue(&mut state.links, r, slot) {
        return Err(SimError::invariant(cycle, "link pool exhausted after capacity check"));
    }
    Ok(r)
}

/// Links each input of `r` to its in-flight producer, or marks it ready.
fn wire_inputs(
    state: &mut SchedulerState,
    r: SlotRef,
    tid: ThreadId,
    level: usize,
) -> Result<(), SimError> {
    let in_regs = state.pool.get(r.id).in_regs;
    for (i, reg) in in_regs.iter().enumerate() {
        let producer = reg
            .and_then(|reg| state.ledger.lookup_producer(reg, tid, level))
            .filter(|(p, _)| state.pool.resolve(*p).is_some_and(|s| !s.completed));
        let ready = match producer {
            Some((p, output)) => {
                let chain = &mut state.pool.get_mut(p.id).odeps[output as usize];
                if !state.links.push_front(chain, r, LinkData::Operand(i as u8)) {
                    return Err(SimError::invariant(
                        state.cycle,
                        "link pool exhausted after capacity check",
                    ));
                }
                false
            }
            None => true,
        };
        state.pool.get_mut(r.id).in_ready[i] = ready;
    }
    Ok(())
}

/// Moves `thread` to a fresh speculative level.
fn enter_level(state: &mut SchedulerState, thread: ThreadId, level: usize) {
    state.ledger.enter_level(thread, level);
    state.spec.enter_level(thread, level);
    state.threads.get_mut(thread).level = level;
}

/// Gives a forked child its parent's ledger and checkpoints through `level`,
/// then moves whichever side disagrees with the actual outcome to `level + 1`.
fn init_fork(state: &mut SchedulerState, parent: ThreadId, child: ThreadId, level: usize, diverged: bool) {
    state.ledger.fork(parent, child, level);
    state.spec.fork(parent, child, level);
    let record = state.threads.get_mut(child);
    record.pending_init = None;
    record.level = level;
    let wrong_side = if diverged { parent } else { child };
    enter_level(state, wrong_side, level + 1);
    trace!(%parent, %child, level, %wrong_side, "fork initialised");
}
