//! Speculative register and memory state.
//!
//! Level 0 is architected state. Each path additionally owns a stack of
//! checkpoints, one per speculative level it has entered: level `l` (for
//! `l >= 1`) holds a full copy of the register file taken when the path entered
//! that level, and an overlay of the memory words written while at that level.
//!
//! Register reads at level `l` hit that level's copy. Memory reads walk the
//! overlays from level `l` down to level 1 and then fall back to architected
//! memory. Recovery discards whole levels by truncating the stack.

use std::collections::HashMap;

use serde::Serialize;

use crate::common::constants::MAX_THREADS;
use crate::common::{Reg, RegisterFile, ThreadId};
use crate::isa::ExecContext;

/// Snapshot for one speculative level of one path.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Checkpoint {
    /// Register file as seen at this level.
    pub regs: RegisterFile,
    /// Memory words written at this level.
    pub overlay: HashMap<u64, u64>,
}

/// Summary of one checkpoint, for machine dumps.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CheckpointSummary {
    /// Owning path.
    pub thread: ThreadId,
    /// Speculative level (1-based).
    pub level: usize,
    /// Number of overlaid memory words.
    pub overlay_words: usize,
}

/// Architected state plus every path's checkpoint stack.
#[derive(Clone, Debug)]
pub struct SpecState {
    arch_regs: RegisterFile,
    arch_mem: HashMap<u64, u64>,
    /// `levels[t][l - 1]` is level `l` of path `t`.
    levels: Vec<Vec<Checkpoint>>,
}

/// Read-only view of one path at one level.
#[derive(Clone, Copy, Debug)]
pub struct SpecView<'a> {
    state: &'a SpecState,
    thread: ThreadId,
    level: usize,
}

impl ExecContext for SpecView<'_> {
    fn reg(&self, reg: Reg) -> u64 {
        if self.level == 0 {
            return self.state.arch_regs.read(reg);
        }
        self.state.levels[self.thread.index()]
            .get(self.level - 1)
            .map_or_else(|| self.state.arch_regs.read(reg), |cp| cp.regs.read(reg))
    }

    fn load(&self, addr: u64) -> u64 {
        let stack = &self.state.levels[self.thread.index()];
        let depth = self.level.min(stack.len());
        stack[..depth]
            .iter()
            .rev()
            .find_map(|cp| cp.overlay.get(&addr).copied())
            .or_else(|| self.state.arch_mem.get(&addr).copied())
            .unwrap_or(0)
    }
}

impl SpecState {
    /// Creates architected state from initial register and memory images.
    pub fn new(
        regs: impl IntoIterator<Item = (Reg, u64)>,
        mem: impl IntoIterator<Item = (u64, u64)>,
    ) -> Self {
        let mut arch_regs = RegisterFile::new();
        for (r, v) in regs {
            arch_regs.write(r, v);
        }
        Self {
            arch_regs,
            arch_mem: mem.into_iter().collect(),
            levels: vec![Vec::new(); MAX_THREADS],
        }
    }

    /// View of `thread` at `level`.
    pub fn view(&self, thread: ThreadId, level: usize) -> SpecView<'_> {
        SpecView {
            state: self,
            thread,
            level,
        }
    }

    /// Writes a register as seen by `thread` at `level`.
    pub fn write_reg(&mut self, thread: ThreadId, level: usize, reg: Reg, value: u64) {
        if level == 0 {
            self.arch_regs.write(reg, value);
        } else if let Some(cp) = self.levels[thread.index()].get_mut(level - 1) {
            cp.regs.write(reg, value);
        }
    }

    /// Writes a memory word as seen by `thread` at `level`.
    pub fn write_mem(&mut self, thread: ThreadId, level: usize, addr: u64, value: u64) {
        if level == 0 {
            let _ = self.arch_mem.insert(addr, value);
        } else if let Some(cp) = self.levels[thread.index()].get_mut(level - 1) {
            let _ = cp.overlay.insert(addr, value);
        }
    }

    /// Opens level `level` for `thread` (discarding anything at or above it),
    /// snapshotting the registers of `level - 1`.
    pub fn enter_level(&mut self, thread: ThreadId, level: usize) {
        debug_assert!(level >= 1);
        let regs = if level <= 1 {
            self.arch_regs.clone()
        } else {
            self.levels[thread.index()]
                .get(level - 2)
                .map_or_else(|| self.arch_regs.clone(), |cp| cp.regs.clone())
        };
        let stack = &mut self.levels[thread.index()];
        stack.truncate(level - 1);
        stack.push(Checkpoint {
            regs,
            overlay: HashMap::new(),
        });
    }

    /// Discards every level of `thread` deeper than `level`.
    pub fn truncate(&mut self, thread: ThreadId, level: usize) {
        self.levels[thread.index()].truncate(level);
    }

    /// Gives `to` a copy of `from`'s checkpoints through `through`.
    pub fn fork(&mut self, from: ThreadId, to: ThreadId, through: usize) {
        let src = &self.levels[from.index()];
        let copy = src[..through.min(src.len())].to_vec();
        self.levels[to.index()] = copy;
    }

    /// Releases every checkpoint of `thread`.
    pub fn release(&mut self, thread: ThreadId) {
        self.levels[thread.index()].clear();
    }

    /// Checkpoint stack of `thread`, level 1 first.
    pub fn levels(&self, thread: ThreadId) -> &[Checkpoint] {
        &self.levels[thread.index()]
    }

    /// Architected register file.
    pub fn arch_regs(&self) -> &RegisterFile {
        &self.arch_regs
    }

    /// Architected memory.
    pub fn arch_mem(&self) -> &HashMap<u64, u64> {
        &self.arch_mem
    }

    /// One summary per live checkpoint.
    pub fn summaries(&self) -> Vec<CheckpointSummary> {
        self.levels
            .iter()
            .enumerate()
            .flat_map(|(t, stack)| {
                stack.iter().enumerate().map(move |(l, cp)| CheckpointSummary {
                    thread: ThreadId(t as u8),
                    level: l + 1,
                    overlay_words: cp.overlay.len(),
                })
            })
            .collect()
    }
}
