//! Slot pool: the unified reservation-station / reorder-buffer storage.
//!
//! In-flight instructions live in two circular arrays, both in program order:
//! 1. **General array:** Every instruction, with memory accesses represented by
//!    their address-computation half.
//! 2. **Memory array:** The access half of each load and store, paired with its
//!    address slot in the general array.
//!
//! Slots are never referenced by pointer. A [`SlotRef`] remembers the slot's
//! generation tag at the time the reference was made; the tag is bumped exactly
//! once when the slot is squashed or committed, turning every outstanding
//! reference stale.

use std::fmt;

use serde::Serialize;

use super::link::LinkList;
use super::thread::Ancestry;
use crate::common::constants::{INST_BYTES, MAX_INPUTS, MAX_OUTPUTS};
use crate::common::{Reg, ThreadId};
use crate::core::units::bru::{Confidence, RasCheckpoint};
use crate::isa::{FuClass, Instruction};

/// Which array a slot lives in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum PoolKind {
    /// General array.
    General,
    /// Memory-op array.
    Memory,
}

/// Position of a slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct SlotId {
    /// Array.
    pub kind: PoolKind,
    /// Index within the array.
    pub index: u32,
}

/// Generation-tagged reference to a slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct SlotRef {
    /// Position.
    pub id: SlotId,
    /// Tag the slot had when the reference was made.
    pub tag: u32,
}

impl fmt::Display for SlotRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.id.kind {
            PoolKind::General => "ruu",
            PoolKind::Memory => "lsq",
        };
        write!(f, "{kind}[{}]#{}", self.id.index, self.tag)
    }
}

/// What part of an instruction a slot carries.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub enum SlotRole {
    /// A whole non-memory instruction.
    #[default]
    Single,
    /// Address computation of a load or store (general array).
    Address,
    /// The access itself (memory array).
    Access,
}

/// One in-flight instruction, or one half of a memory access.
#[derive(Clone, Debug, Default)]
pub struct Slot {
    /// Decoded instruction.
    pub inst: Instruction,
    /// Which half of the instruction this slot carries.
    pub role: SlotRole,
    /// Instruction address.
    pub pc: u64,
    /// Address of the next sequential instruction.
    pub fallthrough: u64,
    /// Next PC the front end predicted.
    pub pred_pc: u64,
    /// Next PC computed by functional execution.
    pub actual_next_pc: u64,
    /// Generation tag; survives reallocation.
    pub tag: u32,
    /// Program sequence number.
    pub seq: u64,

    /// Occupied.
    pub valid: bool,
    /// On the ready list.
    pub queued: bool,
    /// Executing.
    pub issued: bool,
    /// Result available.
    pub completed: bool,
    /// Cancelled by recovery.
    pub squashed: bool,
    /// Squashed but still occupying the array until commit reclaims it.
    pub squashable: bool,

    /// Consumers of each output, as operand links.
    pub odeps: [LinkList; MAX_OUTPUTS],
    /// Input registers.
    pub in_regs: [Option<Reg>; MAX_INPUTS],
    /// Per-input readiness.
    pub in_ready: [bool; MAX_INPUTS],
    /// Output registers.
    pub out_regs: [Option<Reg>; MAX_OUTPUTS],

    /// Speculative level at dispatch.
    pub spec_level: usize,
    /// Owning path.
    pub thread: ThreadId,
    /// Fork ancestry stamped at fetch.
    pub ancestry: Ancestry,
    /// Ancestry position assigned to this control instruction.
    pub branch_pos: Option<u64>,

    /// Word address of a memory access.
    pub addr: Option<u64>,
    /// Index of the paired slot in the other array.
    pub pair: Option<u32>,
    /// Register result computed at dispatch.
    pub result: Option<(Reg, u64)>,
    /// Value written by a store.
    pub store_value: Option<u64>,
    /// Resolved branch direction.
    pub taken: bool,

    /// Predictor training token.
    pub update_token: u64,
    /// Return-stack repair token.
    pub recovery_token: RasCheckpoint,
    /// Confidence verdict at fetch.
    pub confidence: Confidence,
    /// Predicted PC differs from the actual next PC.
    pub diverged: bool,
    /// Path forked at this branch.
    pub forked: Option<ThreadId>,

    /// Functional-unit class.
    pub fu_class: Option<FuClass>,
    /// Holds an in-flight quota unit of `fu_class`.
    pub quota_held: bool,
}

impl Slot {
    /// True if dispatched under unresolved divergence.
    #[inline]
    pub const fn is_speculative(&self) -> bool {
        self.spec_level > 0
    }

    /// Every input operand is available.
    #[inline]
    pub fn inputs_ready(&self) -> bool {
        self.in_ready.iter().all(|&r| r)
    }

    /// The access half of a load.
    #[inline]
    pub fn is_load(&self) -> bool {
        self.role == SlotRole::Access && self.inst.op.is_load()
    }

    /// The access half of a store.
    #[inline]
    pub fn is_store(&self) -> bool {
        self.role == SlotRole::Access && self.inst.op.is_store()
    }

    /// Carries the control-flow outcome of its instruction.
    #[inline]
    pub fn is_control(&self) -> bool {
        self.role == SlotRole::Single && self.inst.op.is_control()
    }

    /// Address known: the access half's address input has arrived.
    #[inline]
    pub fn address_ready(&self) -> bool {
        self.in_ready[0]
    }

    /// Store data has arrived.
    #[inline]
    pub fn data_ready(&self) -> bool {
        self.in_ready[1]
    }

    /// Prepares a fresh slot for `inst` at `pc`.
    pub fn new(inst: Instruction, role: SlotRole, pc: u64, thread: ThreadId) -> Self {
        Self {
            inst,
            role,
            pc,
            fallthrough: pc.wrapping_add(INST_BYTES),
            valid: true,
            in_ready: [true; MAX_INPUTS],
            thread,
            ..Self::default()
        }
    }
}

/// One circular array of slots.
#[derive(Clone, Debug)]
pub struct SlotArray {
    kind: PoolKind,
    slots: Vec<Slot>,
    /// Index of the oldest slot.
    head: usize,
    /// Index where the next slot will be allocated.
    tail: usize,
    /// Occupied slots.
    count: usize,
}

impl SlotArray {
    /// Creates an empty array.
    pub fn new(kind: PoolKind, capacity: usize) -> Self {
        let mut slots = Vec::with_capacity(capacity);
        slots.resize_with(capacity, Slot::default);
        Self {
            kind,
            slots,
            head: 0,
            tail: 0,
            count: 0,
        }
    }

    /// Array capacity.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Occupied slots.
    #[inline]
    pub fn len(&self) -> usize {
        self.count
    }

    /// Returns true if no slot is occupied.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Returns true if every slot is occupied.
    #[inline]
    pub fn is_full(&self) -> bool {
        self.count == self.slots.len()
    }

    /// Unoccupied slots.
    #[inline]
    pub fn free(&self) -> usize {
        self.slots.len() - self.count
    }

    /// Places `slot` at the tail, keeping the tag the index already carries.
    pub fn allocate(&mut self, mut slot: Slot) -> Option<SlotRef> {
        if self.is_full() {
            return None;
        }
        let index = self.tail;
        slot.tag = self.slots[index].tag;
        slot.valid = true;
        self.slots[index] = slot;
        self.tail = (self.tail + 1) % self.slots.len();
        self.count += 1;
        Some(SlotRef {
            id: SlotId {
                kind: self.kind,
                index: index as u32,
            },
            tag: self.slots[index].tag,
        })
    }

    /// Index of the oldest slot.
    pub fn head_index(&self) -> Option<u32> {
        (self.count > 0).then_some(self.head as u32)
    }

    /// Index of the youngest slot.
    pub fn tail_index(&self) -> Option<u32> {
        (self.count > 0).then(|| ((self.tail + self.slots.len() - 1) % self.slots.len()) as u32)
    }

    /// Frees the head slot. The caller has already bumped its tag.
    pub fn pop_head(&mut self) {
        if self.count == 0 {
            return;
        }
        self.slots[self.head].valid = false;
        self.head = (self.head + 1) % self.slots.len();
        self.count -= 1;
    }

    /// Frees the tail slot. The caller has already bumped its tag.
    pub fn pop_tail(&mut self) {
        if self.count == 0 {
            return;
        }
        self.tail = (self.tail + self.slots.len() - 1) % self.slots.len();
        self.slots[self.tail].valid = false;
        self.count -= 1;
    }

    /// Occupied indices from head to tail.
    pub fn indices(&self) -> impl DoubleEndedIterator<Item = u32> + use<> {
        let (head, cap) = (self.head, self.slots.len());
        (0..self.count).map(move |i| ((head + i) % cap) as u32)
    }

    /// Distance of `index` from the head, for program-order comparisons.
    pub fn offset(&self, index: u32) -> usize {
        (index as usize + self.slots.len() - self.head) % self.slots.len()
    }

    /// Reference to the slot at `index` with its current tag.
    pub fn slot_ref(&self, index: u32) -> SlotRef {
        SlotRef {
            id: SlotId {
                kind: self.kind,
                index,
            },
            tag: self.slots[index as usize].tag,
        }
    }

    /// Slot at `index`.
    #[inline]
    pub fn get(&self, index: u32) -> &Slot {
        &self.slots[index as usize]
    }

    /// Mutable slot at `index`.
    #[inline]
    pub fn get_mut(&mut self, index: u32) -> &mut Slot {
        &mut self.slots[index as usize]
    }
}

/// Both slot arrays.
#[derive(Clone, Debug)]
pub struct SlotPool {
    /// General array.
    pub general: SlotArray,
    /// Memory-op array.
    pub memory: SlotArray,
}

impl SlotPool {
    /// Creates both arrays.
    pub fn new(general: usize, memory: usize) -> Self {
        Self {
            general: SlotArray::new(PoolKind::General, general),
            memory: SlotArray::new(PoolKind::Memory, memory),
        }
    }

    /// Array of `kind`.
    #[inline]
    pub fn array(&self, kind: PoolKind) -> &SlotArray {
        match kind {
            PoolKind::General => &self.general,
            PoolKind::Memory => &self.memory,
        }
    }

    /// Mutable array of `kind`.
    #[inline]
    pub fn array_mut(&mut self, kind: PoolKind) -> &mut SlotArray {
        match kind {
            PoolKind::General => &mut self.general,
            PoolKind::Memory => &mut self.memory,
        }
    }

    /// Slot at `id`, live or not.
    #[inline]
    pub fn get(&self, id: SlotId) -> &Slot {
        self.array(id.kind).get(id.index)
    }

    /// Mutable slot at `id`, live or not.
    #[inline]
    pub fn get_mut(&mut self, id: SlotId) -> &mut Slot {
        self.array_mut(id.kind).get_mut(id.index)
    }

    /// Returns true if `r` still names the slot it was made for.
    #[inline]
    pub fn is_live(&self, r: SlotRef) -> bool {
        let slot = self.get(r.id);
        slot.valid && slot.tag == r.tag
    }

    /// The slot `r` names, unless the reference is stale.
    pub fn resolve(&self, r: SlotRef) -> Option<&Slot> {
        self.is_live(r).then(|| self.get(r.id))
    }

    /// Mutable slot `r` names, unless the reference is stale.
    pub fn resolve_mut(&mut self, r: SlotRef) -> Option<&mut Slot> {
        if self.is_live(r) {
            Some(self.get_mut(r.id))
        } else {
            None
        }
    }

    /// Paired slot of a memory access half.
    pub fn pair_of(&self, id: SlotId) -> Option<SlotId> {
        let pair = self.get(id).pair?;
        let kind = match id.kind {
            PoolKind::General => PoolKind::Memory,
            PoolKind::Memory => PoolKind::General,
        };
        Some(SlotId { kind, index: pair })
    }

    /// Occupied slots across both arrays.
    pub fn occupancy(&self) -> usize {
        self.general.len() + self.memory.len()
    }
}
