//! Dependency ledger (the create vector).
//!
//! Maps each logical register to the slot output that will produce its next
//! value, separately for every path and speculative level. A lookup at level
//! `l` consults level `l` first and falls back level by level to level 0, so a
//! speculative path sees its own producers shadowing those of the levels below.
//!
//! Entries are cleared back to "architected" only by the producer that wrote
//! them (`clear_if_current`), so a younger writer of the same register is never
//! clobbered by an older one completing.

use serde::Serialize;

use super::slot::SlotRef;
use crate::common::constants::NUM_REGS;
use crate::common::{Reg, ThreadId};

/// One ledger entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum LedgerEntry {
    /// Value will come from output `output` of `slot`.
    Producer {
        /// Producing slot.
        slot: SlotRef,
        /// Output index within the producer.
        output: u8,
    },
    /// Value is already available.
    Architected,
}

/// One level's table; `None` defers to the level below.
pub type LevelTable = [Option<LedgerEntry>; NUM_REGS];

/// Per-path, per-level producer tables.
#[derive(Clone, Debug)]
pub struct Ledger {
    threads: Vec<Vec<LevelTable>>,
}

impl Ledger {
    /// Creates a ledger for `threads` paths, each with an empty level 0.
    pub fn new(threads: usize) -> Self {
        Self {
            threads: vec![vec![[None; NUM_REGS]]; threads],
        }
    }

    /// Producer of `reg` as seen by `thread` at `level`.
    pub fn lookup_producer(&self, reg: Reg, thread: ThreadId, level: usize) -> Option<(SlotRef, u8)> {
        if reg.is_zero() {
            return None;
        }
        let tables = &self.threads[thread.index()];
        let top = level.min(tables.len().saturating_sub(1));
        for table in tables[..=top].iter().rev() {
            match table[reg.index()] {
                Some(LedgerEntry::Producer { slot, output }) => return Some((slot, output)),
                Some(LedgerEntry::Architected) => return None,
                None => {}
            }
        }
        None
    }

    /// Records `slot`'s output `output` as the producer of `reg`.
    pub fn register_producer(
        &mut self,
        slot: SlotRef,
        output: u8,
        reg: Reg,
        thread: ThreadId,
        level: usize,
    ) {
        if reg.is_zero() {
            return;
        }
        let tables = &mut self.threads[thread.index()];
        if tables.len() <= level {
            tables.resize(level + 1, [None; NUM_REGS]);
        }
        tables[level][reg.index()] = Some(LedgerEntry::Producer { slot, output });
    }

    /// Marks `reg` architected if the entry still names `slot`'s output `output`.
    pub fn clear_if_current(
        &mut self,
        slot: SlotRef,
        output: u8,
        reg: Reg,
        thread: ThreadId,
        level: usize,
    ) {
        let Some(table) = self.threads[thread.index()].get_mut(level) else {
            return;
        };
        let entry = &mut table[reg.index()];
        if *entry == Some(LedgerEntry::Producer { slot, output }) {
            *entry = Some(LedgerEntry::Architected);
        }
    }

    /// Opens an empty table at `level` for `thread`, dropping anything at or above it.
    pub fn enter_level(&mut self, thread: ThreadId, level: usize) {
        let tables = &mut self.threads[thread.index()];
        tables.truncate(level);
        tables.resize(level + 1, [None; NUM_REGS]);
    }

    /// Drops every table of `thread` deeper than `level`.
    pub fn truncate(&mut self, thread: ThreadId, level: usize) {
        self.threads[thread.index()].truncate(level + 1);
    }

    /// Gives `to` a copy of `from`'s tables for levels `0..=through`.
    pub fn fork(&mut self, from: ThreadId, to: ThreadId, through: usize) {
        let src = &self.threads[from.index()];
        let copy = src[..(through + 1).min(src.len())].to_vec();
        self.threads[to.index()] = copy;
    }

    /// Forgets every producer of `thread`.
    pub fn reset(&mut self, thread: ThreadId) {
        self.threads[thread.index()] = vec![[None; NUM_REGS]];
    }

    /// Tables of `thread`, level 0 first.
    pub fn tables(&self, thread: ThreadId) -> &[LevelTable] {
        &self.threads[thread.index()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::pipeline::slot::{PoolKind, SlotId};

    const T0: ThreadId = ThreadId(0);
    const T1: ThreadId = ThreadId(1);

    fn sref(index: u32, tag: u32) -> SlotRef {
        SlotRef {
            id: SlotId {
                kind: PoolKind::General,
                index,
            },
            tag,
        }
    }

    #[test]
    fn test_levels_shadow_and_fall_back() {
        let mut ledger = Ledger::new(2);
        let r1 = Reg::int(1);
        ledger.register_producer(sref(0, 0), 0, r1, T0, 0);
        assert_eq!(ledger.lookup_producer(r1, T0, 0), Some((sref(0, 0), 0)));

        ledger.enter_level(T0, 1);
        assert_eq!(ledger.lookup_producer(r1, T0, 1), Some((sref(0, 0), 0)));
        ledger.register_producer(sref(3, 0), 0, r1, T0, 1);
        assert_eq!(ledger.lookup_producer(r1, T0, 1), Some((sref(3, 0), 0)));
        assert_eq!(ledger.lookup_producer(r1, T0, 0), Some((sref(0, 0), 0)));

        ledger.truncate(T0, 0);
        assert_eq!(ledger.lookup_producer(r1, T0, 1), Some((sref(0, 0), 0)));
    }

    #[test]
    fn test_clear_only_if_current() {
        let mut ledger = Ledger::new(1);
        let r2 = Reg::int(2);
        ledger.register_producer(sref(1, 0), 0, r2, T0, 0);
        ledger.register_producer(sref(2, 0), 0, r2, T0, 0);
        ledger.clear_if_current(sref(1, 0), 0, r2, T0, 0);
        assert_eq!(ledger.lookup_producer(r2, T0, 0), Some((sref(2, 0), 0)));
        ledger.clear_if_current(sref(2, 0), 0, r2, T0, 0);
        assert_eq!(ledger.lookup_producer(r2, T0, 0), None);
        assert_eq!(ledger.tables(T0)[0][r2.index()], Some(LedgerEntry::Architected));
    }

    #[test]
    fn test_architected_entry_hides_lower_producer() {
        let mut ledger = Ledger::new(1);
        let r3 = Reg::int(3);
        ledger.register_producer(sref(0, 0), 0, r3, T0, 0);
        ledger.enter_level(T0, 1);
        ledger.register_producer(sref(5, 0), 0, r3, T0, 1);
        ledger.clear_if_current(sref(5, 0), 0, r3, T0, 1);
        assert_eq!(ledger.lookup_producer(r3, T0, 1), None);
    }

    #[test]
    fn test_fork_copies_tables() {
        let mut ledger = Ledger::new(2);
        ledger.register_producer(sref(4, 1), 1, Reg::int(7), T0, 0);
        ledger.enter_level(T0, 1);
        ledger.fork(T0, T1, 0);
        assert_eq!(ledger.tables(T1).len(), 1);
        assert_eq!(ledger.lookup_producer(Reg::int(7), T1, 3), Some((sref(4, 1), 1)));
        ledger.reset(T1);
        assert_eq!(ledger.lookup_producer(Reg::int(7), T1, 0), None);
        assert_eq!(ledger.lookup_producer(Reg::ZERO, T0, 0), None);
    }
}
