//! Commit Stage.
//!
//! Retires from the head of the general array in program order. A memory op
//! retires its address slot together with the paired access slot, which must be
//! at the head of the memory array. Squashed heads are reclaimed here when
//! recovery left them in place.
//!
//! Architected state was written at dispatch by the level-0 path, so commit
//! performs no register or memory writes of its own; it trains the predictors,
//! charges the store's cache write and counts the instruction mix.

use tracing::{debug, trace};

use crate::common::SimError;
use crate::common::constants::WORD_BYTES;
use crate::config::UpdateStage;
use crate::core::arch::CommitRecord;
use crate::core::pipeline::slot::Slot;
use crate::core::pipeline::state::{Collaborators, SchedulerState};
use crate::core::units::bru::Confidence;
use crate::core::units::cache::MemCmd;
use crate::isa::{FuClass, Opcode};

/// Executes the commit stage.
///
/// # Errors
///
/// Returns an invariant violation if a memory op's halves are out of step, or
/// if a retiring slot still has consumers or was dispatched speculatively.
pub fn commit_stage(state: &mut SchedulerState, collab: &mut Collaborators) -> Result<(), SimError> {
    let cycle = state.cycle;
    for _ in 0..state.config.core.commit_width {
        let Some(head) = state.pool.general.head_index() else {
            break;
        };
        let slot = state.pool.general.get(head);
        let pair = slot.pair;
        if pair.is_some() && pair != state.pool.memory.head_index() {
            return Err(SimError::invariant(
                cycle,
                format!("ruu[{head}] pairs with lsq[{pair:?}], not the memory head"),
            ));
        }

        if slot.squashed {
            state.pool.general.pop_head();
            if pair.is_some() {
                state.pool.memory.pop_head();
            }
            state.stats.squashed_reclaimed += 1;
            continue;
        }

        let access = pair.map(|i| state.pool.memory.get(i));
        if !slot.completed || access.is_some_and(|a| !a.completed) {
            break;
        }
        if slot.spec_level > 0 {
            return Err(SimError::invariant(
                cycle,
                format!("ruu[{head}] at {:#x} retiring from level {}", slot.pc, slot.spec_level),
            ));
        }
        if slot.odeps.iter().chain(access.iter().flat_map(|a| a.odeps.iter())).any(|c| !c.is_empty()) {
            return Err(SimError::invariant(
                cycle,
                format!("ruu[{head}] retiring with unwoken consumers"),
            ));
        }

        let record = CommitRecord {
            pc: slot.pc,
            reg_write: access.map_or(slot.result, |a| a.result),
            mem_write: access.and_then(|a| a.addr.zip(a.store_value)),
        };
        let inst = slot.inst;
        let slot = slot.clone();

        if inst.op.is_store() {
            if state.resources.acquire(FuClass::WritePort).is_none() {
                state.stats.overflow_write_port += 1;
                break;
            }
            if let Some((addr, _)) = record.mem_write {
                let _ = collab.memory.access(MemCmd::Write, addr, WORD_BYTES, cycle);
            }
        }
        if slot.is_control() {
            train(state, collab, &slot);
        }
        count_mix(state, &slot);
        if state.config.general.commit_log {
            state.commit_log.push(record);
        }

        retire(state, head, pair);
        trace!(cycle, pc = slot.pc, inst = %inst, "commit");

        if inst.op == Opcode::Halt {
            state.halted = true;
            debug!(cycle, pc = slot.pc, "halt committed");
            break;
        }
    }
    Ok(())
}

fn train(state: &mut SchedulerState, collab: &mut Collaborators, slot: &Slot) {
    let correct = !slot.diverged;
    if state.config.predictor.update == UpdateStage::Commit {
        collab.predictor.update(
            slot.pc,
            slot.actual_next_pc,
            slot.taken,
            correct,
            &slot.inst,
            slot.update_token,
        );
    }
    if slot.inst.op.is_cond_branch() {
        collab.confidence.update(slot.pc, slot.taken, correct, slot.confidence);
        if slot.confidence == Confidence::Low {
            state.stats.conf_low += 1;
            if !correct {
                state.stats.conf_low_mispredicts += 1;
            }
        }
    }
    if correct {
        state.stats.bp_correct += 1;
    } else {
        state.stats.bp_mispredicts += 1;
    }
}

fn count_mix(state: &mut SchedulerState, slot: &Slot) {
    let op = slot.inst.op;
    let stats = &mut state.stats;
    let counter = if op.is_load() {
        &mut stats.inst_load
    } else if op.is_store() {
        &mut stats.inst_store
    } else if op.is_control() {
        &mut stats.inst_control
    } else if op.is_fp() {
        &mut stats.inst_fp
    } else if op.is_long_latency() {
        &mut stats.inst_long_latency
    } else {
        &mut stats.inst_alu
    };
    *counter += 1;
}

/// Bumps tags and frees the head slot and its pair.
fn retire(state: &mut SchedulerState, head: u32, pair: Option<u32>) {
    let slot = state.pool.general.get_mut(head);
    slot.tag = slot.tag.wrapping_add(1);
    let thread = slot.thread;
    state.pool.general.pop_head();
    if let Some(i) = pair {
        let access = state.pool.memory.get_mut(i);
        access.tag = access.tag.wrapping_add(1);
        state.pool.memory.pop_head();
    }
    let t = state.threads.get_mut(thread);
    t.inflight = t.inflight.saturating_sub(1);
    state.stats.committed += 1;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::{Reg, ThreadId};
    use crate::config::Config;
    use crate::core::pipeline::slot::SlotRole;
    use crate::isa::Instruction;
    use crate::sim::program::Program;

    fn setup(config: Config) -> (SchedulerState, Collaborators) {
        let program = Program::default();
        let collab = Collaborators::from_config(&config, &program);
        (SchedulerState::new(config, &program), collab)
    }

    fn done(inst: Instruction, pc: u64) -> Slot {
        let mut slot = Slot::new(inst, SlotRole::Single, pc, ThreadId(0));
        slot.completed = true;
        slot
    }

    #[test]
    fn test_retires_in_order_and_stops_at_incomplete() {
        let (mut s, mut c) = setup(Config::default());
        s.threads.get_mut(ThreadId(0)).inflight = 3;
        let first = s.pool.general.allocate(done(Instruction::nop(), 0)).unwrap();
        let mut pending = done(Instruction::nop(), 4);
        pending.completed = false;
        s.pool.general.allocate(pending).unwrap();
        s.pool.general.allocate(done(Instruction::nop(), 8)).unwrap();

        commit_stage(&mut s, &mut c).unwrap();
        assert_eq!(s.stats.committed, 1);
        assert!(!s.pool.is_live(first));
        assert_eq!(s.pool.general.len(), 2);
        assert_eq!(s.threads.get(ThreadId(0)).inflight, 2);
    }

    #[test]
    fn test_squashed_head_reclaimed_without_commit() {
        let (mut s, mut c) = setup(Config::default());
        let mut dead = done(Instruction::nop(), 0);
        dead.squashed = true;
        s.pool.general.allocate(dead).unwrap();
        commit_stage(&mut s, &mut c).unwrap();
        assert_eq!(s.stats.committed, 0);
        assert_eq!(s.stats.squashed_reclaimed, 1);
        assert!(s.pool.general.is_empty());
    }

    #[test]
    fn test_store_retires_with_pair_and_logs() {
        let mut config = Config::default();
        config.general.commit_log = true;
        let (mut s, mut c) = setup(config);
        s.threads.get_mut(ThreadId(0)).inflight = 1;
        let inst = Instruction::store(Reg::int(2), Reg::int(1), 0);
        let mut addr = done(inst, 0);
        addr.role = SlotRole::Address;
        addr.pair = Some(0);
        let mut access = done(inst, 0);
        access.role = SlotRole::Access;
        access.pair = Some(0);
        access.addr = Some(0x80);
        access.store_value = Some(7);
        s.pool.general.allocate(addr).unwrap();
        s.pool.memory.allocate(access).unwrap();

        commit_stage(&mut s, &mut c).unwrap();
        assert!(s.pool.memory.is_empty());
        assert_eq!(s.stats.inst_store, 1);
        assert_eq!(s.commit_log[0].mem_write, Some((0x80, 7)));
    }

    #[test]
    fn test_halt_stops_commit() {
        let (mut s, mut c) = setup(Config::default());
        s.threads.get_mut(ThreadId(0)).inflight = 2;
        s.pool.general.allocate(done(Instruction::halt(), 0)).unwrap();
        s.pool.general.allocate(done(Instruction::nop(), 4)).unwrap();
        commit_stage(&mut s, &mut c).unwrap();
        assert!(s.halted);
        assert_eq!(s.stats.committed, 1);
    }

    #[test]
    fn test_speculative_retire_is_invariant_error() {
        let (mut s, mut c) = setup(Config::default());
        let mut slot = done(Instruction::nop(), 0);
        slot.spec_level = 1;
        s.pool.general.allocate(slot).unwrap();
        assert!(commit_stage(&mut s, &mut c).unwrap_err().is_invariant());
    }
}
