//! Ready scheduler.
//!
//! Slots whose inputs have all arrived wait here, sorted by (rank, sequence).
//! Issue drains the whole list every cycle and re-enqueues whatever it could
//! not start, so the order is recomputed each cycle and never reshuffled by
//! issue itself.

use super::link::{LinkData, LinkList, LinkPool};
use super::slot::{Slot, SlotPool, SlotRef, SlotRole};
use crate::config::IssuePolicy;

/// Priority-ordered list of issuable slots.
#[derive(Clone, Debug)]
pub struct ReadyList {
    list: LinkList,
    policy: IssuePolicy,
}

/// Issue rank of `slot` under `policy`; lower issues first.
pub fn rank(policy: IssuePolicy, slot: &Slot) -> u8 {
    match policy {
        IssuePolicy::ProgramOrder => 0,
        IssuePolicy::Aggressive => {
            let urgent = slot.role == SlotRole::Access
                || slot.is_control()
                || slot.inst.op.is_long_latency();
            u8::from(!urgent)
        }
    }
}

impl ReadyList {
    /// Creates an empty list ordered by `policy`.
    pub fn new(policy: IssuePolicy) -> Self {
        Self {
            list: LinkList::default(),
            policy,
        }
    }

    /// Entries, stale ones included.
    pub fn len(&self) -> usize {
        self.list.len()
    }

    /// Returns true if nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }

    /// Queues `slot`; false if the link pool is exhausted.
    pub fn enqueue(&mut self, links: &mut LinkPool, r: SlotRef, slot: &mut Slot) -> bool {
        let data = LinkData::Seq {
            rank: rank(self.policy, slot),
            seq: slot.seq,
        };
        if !links.insert_sorted(&mut self.list, r, data) {
            return false;
        }
        slot.queued = true;
        true
    }

    /// Empties the list, returning the live entries in order.
    pub fn drain(&mut self, links: &mut LinkPool, pool: &mut SlotPool) -> Vec<SlotRef> {
        let mut out = Vec::with_capacity(self.list.len());
        while let Some(link) = links.pop_front(&mut self.list) {
            if let Some(slot) = pool.resolve_mut(link.target) {
                slot.queued = false;
                out.push(link.target);
            }
        }
        out
    }

    /// Live entries without removing them.
    pub fn entries<'a>(&self, links: &'a LinkPool) -> impl Iterator<Item = SlotRef> + use<'a> {
        links.iter(&self.list).map(|l| l.target)
    }
}
