//! Machine-state snapshots.
//!
//! A [`MachineDump`] captures every live structure of the engine at one cycle:
//! slots, the ledger, both scheduler lists, path records and checkpoints. It
//! serialises to JSON and has a human-readable `Display` for terminal output.

use std::fmt;

use serde::Serialize;

use super::frontend::FetchEntry;
use super::ledger::LedgerEntry;
use super::link::LinkData;
use super::slot::{SlotArray, SlotRef, SlotRole};
use super::state::SchedulerState;
use super::thread::{Ancestry, ThreadState};
use crate::common::{Cycle, Reg, ThreadId};
use crate::core::arch::spec_state::CheckpointSummary;
use crate::isa::Instruction;

/// One occupied slot.
#[derive(Clone, Debug, Serialize)]
pub struct SlotDump {
    /// Reference with the current tag.
    pub slot: SlotRef,
    /// Program sequence number.
    pub seq: u64,
    /// Instruction address.
    pub pc: u64,
    /// Instruction.
    pub inst: Instruction,
    /// Which half of the instruction the slot carries.
    pub role: SlotRole,
    /// Owning path.
    pub thread: ThreadId,
    /// Speculative level.
    pub level: usize,
    /// Fork ancestry.
    pub ancestry: Ancestry,
    /// Lifecycle flags, e.g. `QIC`.
    pub flags: String,
    /// Per-input readiness.
    pub inputs_ready: Vec<bool>,
    /// Consumers still linked to each output.
    pub consumers: Vec<usize>,
}

/// One non-empty ledger entry.
#[derive(Clone, Copy, Debug, Serialize)]
pub struct LedgerDump {
    /// Path.
    pub thread: ThreadId,
    /// Speculative level.
    pub level: usize,
    /// Register.
    pub reg: Reg,
    /// Producer or architected marker.
    pub entry: LedgerEntry,
}

/// One pending completion.
#[derive(Clone, Copy, Debug, Serialize)]
pub struct EventDump {
    /// Slot that completes.
    pub slot: SlotRef,
    /// Completion cycle.
    pub when: Cycle,
}

/// Snapshot of the whole engine.
#[derive(Clone, Debug, Serialize)]
pub struct MachineDump {
    /// Cycle the snapshot was taken at.
    pub cycle: Cycle,
    /// Path records by id.
    pub threads: Vec<(ThreadId, ThreadState)>,
    /// General array, head first.
    pub general: Vec<SlotDump>,
    /// Memory array, head first.
    pub memory: Vec<SlotDump>,
    /// Ledger entries.
    pub ledger: Vec<LedgerDump>,
    /// Ready list in issue order.
    pub ready: Vec<SlotRef>,
    /// Event list in time order.
    pub events: Vec<EventDump>,
    /// Live checkpoints.
    pub checkpoints: Vec<CheckpointSummary>,
    /// Fetch queue, oldest first.
    pub fetch_queue: Vec<FetchEntry>,
    /// Free links.
    pub links_available: usize,
    /// Busy functional-unit instances.
    pub units_busy: usize,
}

fn flags(slot: &super::slot::Slot) -> String {
    [
        (slot.queued, 'Q'),
        (slot.issued, 'I'),
        (slot.completed, 'C'),
        (slot.squashed, 'S'),
        (slot.squashable, 'R'),
        (slot.diverged, 'D'),
        (slot.forked.is_some(), 'F'),
    ]
    .iter()
    .filter_map(|&(set, c)| set.then_some(c))
    .collect()
}

fn dump_array(array: &SlotArray) -> Vec<SlotDump> {
    array
        .indices()
        .map(|i| {
            let s = array.get(i);
            SlotDump {
                slot: array.slot_ref(i),
                seq: s.seq,
                pc: s.pc,
                inst: s.inst,
                role: s.role,
                thread: s.thread,
                level: s.spec_level,
                ancestry: s.ancestry,
                flags: flags(s),
                inputs_ready: s.in_ready.to_vec(),
                consumers: s.odeps.iter().map(|c| c.len()).collect(),
            }
        })
        .collect()
}

impl MachineDump {
    /// Captures `state`.
    pub fn capture(state: &SchedulerState) -> Self {
        let ledger = state
            .threads
            .iter()
            .filter(|(_, t)| t.is_live())
            .flat_map(|(thread, _)| {
                state
                    .ledger
                    .tables(thread)
                    .iter()
                    .enumerate()
                    .flat_map(move |(level, table)| {
                        table.iter().enumerate().filter_map(move |(r, e)| {
                            e.map(|entry| LedgerDump {
                                thread,
                                level,
                                reg: Reg(r as u8),
                                entry,
                            })
                        })
                    })
            })
            .collect();
        let events = state
            .events
            .entries(&state.links)
            .filter_map(|l| match l.data {
                LinkData::When(when) => Some(EventDump { slot: l.target, when }),
                _ => None,
            })
            .collect();
        Self {
            cycle: state.cycle,
            threads: state
                .threads
                .iter()
                .map(|(id, t)| (id, t.clone()))
                .collect(),
            general: dump_array(&state.pool.general),
            memory: dump_array(&state.pool.memory),
            ledger,
            ready: state.ready.entries(&state.links).collect(),
            events,
            checkpoints: state.spec.summaries(),
            fetch_queue: state.fetch_queue.iter().copied().collect(),
            links_available: state.links.available(),
            units_busy: state.resources.busy_count(),
        }
    }

    /// Pretty JSON.
    ///
    /// # Errors
    ///
    /// Propagates serialisation failures.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

fn write_slots(f: &mut fmt::Formatter<'_>, name: &str, slots: &[SlotDump]) -> fmt::Result {
    writeln!(f, "{name} ({} occupied):", slots.len())?;
    for s in slots {
        writeln!(
            f,
            "  {:<10} seq={:<6} {} pc={:#06x} {:<24} L{} anc={:#x}/{} [{}] in={:?} deps={:?}",
            s.slot.to_string(),
            s.seq,
            s.thread,
            s.pc,
            s.inst.to_string(),
            s.level,
            s.ancestry.bits,
            s.ancestry.cursor,
            s.flags,
            s.inputs_ready,
            s.consumers
        )?;
    }
    Ok(())
}

impl fmt::Display for MachineDump {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "==== machine state at cycle {} ====", self.cycle)?;
        writeln!(f, "threads:")?;
        for (id, t) in self.threads.iter().filter(|(_, t)| t.is_live()) {
            writeln!(
                f,
                "  {id}: {:?} fetch={:#x} dispatch={:#x} L{} anc={:#x}/{} prio={} inflight={}",
                t.status,
                t.fetch_pc,
                t.dispatch_pc,
                t.level,
                t.ancestry.bits,
                t.ancestry.cursor,
                t.priority,
                t.inflight
            )?;
        }
        write_slots(f, "general", &self.general)?;
        write_slots(f, "memory", &self.memory)?;
        writeln!(f, "ledger:")?;
        for e in &self.ledger {
            let entry = match e.entry {
                LedgerEntry::Producer { slot, output } => format!("{slot}.{output}"),
                LedgerEntry::Architected => "arch".to_string(),
            };
            writeln!(f, "  {} L{} {} -> {entry}", e.thread, e.level, e.reg)?;
        }
        let ready: Vec<String> = self.ready.iter().map(ToString::to_string).collect();
        writeln!(f, "ready: [{}]", ready.join(", "))?;
        let events: Vec<String> = self
            .events
            .iter()
            .map(|e| format!("{}@{}", e.slot, e.when))
            .collect();
        writeln!(f, "events: [{}]", events.join(", "))?;
        writeln!(f, "checkpoints:")?;
        for c in &self.checkpoints {
            writeln!(f, "  {} L{} overlay={}", c.thread, c.level, c.overlay_words)?;
        }
        writeln!(f, "fetch queue: {} entries", self.fetch_queue.len())?;
        write!(
            f,
            "links free: {}, units busy: {}",
            self.links_available, self.units_busy
        )
    }
}
