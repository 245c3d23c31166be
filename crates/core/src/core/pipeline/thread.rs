//! Thread/path records and fork ancestry.
//!
//! A "thread" is one speculatively fetched control-flow path, not a host thread.
//! Each path carries a fork-ancestry bitmap: every conditional branch (and every
//! return, whose target may also be mispredicted) is given the next position in
//! the path's cursor, and the bit at that position records which side of the
//! branch the path follows (1 for the predicted side, 0 for the other one).
//! Two paths that agree on every live position share all their unresolved
//! branches; a resolving branch finds its wrong-path descendants this way.
//!
//! The bitmap is a 64-bit ring indexed by position modulo 64, so at most 64
//! positions may be unresolved at once; fetch stalls instead of wrapping.

use serde::Serialize;

use crate::common::constants::ANCESTRY_BITS;
use crate::common::{Cycle, ThreadId};
use crate::core::units::bru::Ras;

/// Fork-ancestry bitmap plus the next free position.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Ancestry {
    /// Side bits, indexed by position modulo 64.
    pub bits: u64,
    /// Next position to assign.
    pub cursor: u64,
}

/// Bits of positions `[lo, hi)` in the ring; the range spans at most 64 positions.
fn window_mask(lo: u64, hi: u64) -> u64 {
    let width = hi.saturating_sub(lo);
    if width == 0 {
        0
    } else if width >= ANCESTRY_BITS {
        u64::MAX
    } else {
        ((1u64 << width) - 1).rotate_left((lo % ANCESTRY_BITS) as u32)
    }
}

impl Ancestry {
    /// Side recorded at `pos`.
    #[inline]
    pub const fn bit(&self, pos: u64) -> bool {
        self.bits >> (pos % ANCESTRY_BITS) & 1 == 1
    }

    /// Overwrites the side at `pos`.
    pub fn set(&mut self, pos: u64, side: bool) {
        let mask = 1u64 << (pos % ANCESTRY_BITS);
        if side {
            self.bits |= mask;
        } else {
            self.bits &= !mask;
        }
    }

    /// Assigns the next position, recording `side`, and returns it.
    pub fn push(&mut self, side: bool) -> u64 {
        let pos = self.cursor;
        self.set(pos, side);
        self.cursor += 1;
        pos
    }

    /// True if both bitmaps agree on every position in `[lo, hi)`.
    pub fn agrees(&self, other: &Self, lo: u64, hi: u64) -> bool {
        (self.bits ^ other.bits) & window_mask(lo, hi) == 0
    }

    /// True if a slot stamped with `self` lies on the path `other` describes:
    /// `other` extends `self` and agrees with it on every live position.
    pub fn is_prefix_of(&self, other: &Self) -> bool {
        if self.cursor > other.cursor {
            return false;
        }
        let lo = other.cursor.saturating_sub(ANCESTRY_BITS);
        self.agrees(other, lo, self.cursor)
    }

    /// Positions still allocatable when the oldest live position is `oldest`.
    pub fn room(&self, oldest: Option<u64>) -> u64 {
        let used = oldest.map_or(0, |o| self.cursor.saturating_sub(o));
        ANCESTRY_BITS.saturating_sub(used)
    }
}

/// Liveness of a path record.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub enum ThreadStatus {
    /// Fetching and dispatching.
    Valid,
    /// On a wrong path; waiting for its last slots to drain.
    SquashPending,
    /// Free for reuse.
    #[default]
    Dead,
}

/// One path record.
#[derive(Clone, Debug, Default, Serialize)]
pub struct ThreadState {
    /// Liveness.
    pub status: ThreadStatus,
    /// Next address to fetch.
    pub fetch_pc: u64,
    /// Address the next dispatched instruction of this path should have.
    pub dispatch_pc: u64,
    /// Speculative level of the next dispatched instruction.
    pub level: usize,
    /// Fetch-side ancestry.
    pub ancestry: Ancestry,
    /// Private return-address stack.
    #[serde(skip)]
    pub ras: Option<Ras>,
    /// Fetch priority; lower fetches first.
    pub priority: u32,
    /// No fetch before this cycle.
    pub fetch_stall_until: Cycle,
    /// Forked at fetch; ledger and checkpoints are copied from this parent when
    /// the forking branch dispatches.
    pub pending_init: Option<ThreadId>,
    /// Fetch ran into `halt` or past the program.
    pub fetch_halted: bool,
    /// Fetched instructions not yet committed or squashed.
    pub inflight: usize,
}

impl ThreadState {
    /// Returns true if the record is in use.
    #[inline]
    pub fn is_live(&self) -> bool {
        self.status != ThreadStatus::Dead
    }
}

/// Every path record plus the shared return-address stack.
#[derive(Clone, Debug)]
pub struct ThreadTable {
    threads: Vec<ThreadState>,
    shared_ras: Ras,
    per_thread_ras: bool,
    ras_size: usize,
}

impl ThreadTable {
    /// Creates `count` dead records, then makes record 0 the initial path at `pc`.
    pub fn new(count: usize, pc: u64, ras_size: usize, per_thread_ras: bool) -> Self {
        let mut table = Self {
            threads: vec![ThreadState::default(); count.max(1)],
            shared_ras: Ras::new(ras_size),
            per_thread_ras,
            ras_size,
        };
        let main = &mut table.threads[0];
        main.status = ThreadStatus::Valid;
        main.fetch_pc = pc;
        main.dispatch_pc = pc;
        if per_thread_ras {
            main.ras = Some(Ras::new(ras_size));
        }
        table
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.threads.len()
    }

    /// Returns true if there are no records.
    pub fn is_empty(&self) -> bool {
        self.threads.is_empty()
    }

    /// Record `id`.
    #[inline]
    pub fn get(&self, id: ThreadId) -> &ThreadState {
        &self.threads[id.index()]
    }

    /// Mutable record `id`.
    #[inline]
    pub fn get_mut(&mut self, id: ThreadId) -> &mut ThreadState {
        &mut self.threads[id.index()]
    }

    /// Every record with its id.
    pub fn iter(&self) -> impl Iterator<Item = (ThreadId, &ThreadState)> {
        self.threads
            .iter()
            .enumerate()
            .map(|(i, t)| (ThreadId(i as u8), t))
    }

    /// Ids of records with `status`.
    pub fn ids_with(&self, status: ThreadStatus) -> Vec<ThreadId> {
        self.iter()
            .filter(|(_, t)| t.status == status)
            .map(|(id, _)| id)
            .collect()
    }

    /// Number of records with `status`.
    pub fn count(&self, status: ThreadStatus) -> usize {
        self.threads.iter().filter(|t| t.status == status).count()
    }

    /// First dead record.
    pub fn free_record(&self) -> Option<ThreadId> {
        self.threads
            .iter()
            .position(|t| t.status == ThreadStatus::Dead)
            .map(|i| ThreadId(i as u8))
    }

    /// Return-address stack used by path `id`.
    pub fn ras_mut(&mut self, id: ThreadId) -> &mut Ras {
        if self.per_thread_ras {
            self.threads[id.index()]
                .ras
                .get_or_insert_with(|| Ras::new(self.ras_size))
        } else {
            &mut self.shared_ras
        }
    }

    /// Copy of the stack a fork child should start from.
    pub fn ras_for_child(&self, parent: ThreadId) -> Option<Ras> {
        if self.per_thread_ras {
            Some(
                self.threads[parent.index()]
                    .ras
                    .clone()
                    .unwrap_or_else(|| Ras::new(self.ras_size)),
            )
        } else {
            None
        }
    }
}
