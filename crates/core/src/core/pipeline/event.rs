//! Event scheduler: pending completions in ascending time order.

use super::link::{Link, LinkData, LinkList, LinkPool};
use super::slot::{SlotPool, SlotRef};
use crate::common::{Cycle, SimError};

/// Time-ordered list of pending writebacks.
#[derive(Clone, Debug, Default)]
pub struct EventList {
    list: LinkList,
}

impl EventList {
    /// Creates an empty list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Pending events, stale ones included.
    pub fn len(&self) -> usize {
        self.list.len()
    }

    /// Returns true if nothing is pending.
    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }

    /// Schedules `target` to write back at `when`.
    ///
    /// Returns `Ok(false)` if the link pool is exhausted.
    ///
    /// # Errors
    ///
    /// Scheduling into the past or present, or scheduling an already completed
    /// slot, is an invariant violation.
    pub fn schedule(
        &mut self,
        links: &mut LinkPool,
        target: SlotRef,
        when: Cycle,
        now: Cycle,
        completed: bool,
    ) -> Result<bool, SimError> {
        if when <= now {
            return Err(SimError::invariant(
                now,
                format!("event for {target} scheduled at {when}, not after {now}"),
            ));
        }
        if completed {
            return Err(SimError::invariant(
                now,
                format!("event scheduled for completed slot {target}"),
            ));
        }
        Ok(links.insert_sorted(&mut self.list, target, LinkData::When(when)))
    }

    /// Removes the earliest live event due at or before `now`, dropping stale
    /// events on the way.
    pub fn pop_due(&mut self, links: &mut LinkPool, now: Cycle, pool: &SlotPool) -> Option<SlotRef> {
        loop {
            let front = *links.front(&self.list)?;
            let LinkData::When(when) = front.data else {
                let _ = links.pop_front(&mut self.list);
                continue;
            };
            if !pool.is_live(front.target) {
                let _ = links.pop_front(&mut self.list);
                continue;
            }
            if when > now {
                return None;
            }
            let _ = links.pop_front(&mut self.list);
            return Some(front.target);
        }
    }

    /// Pending events in time order.
    pub fn entries<'a>(&self, links: &'a LinkPool) -> impl Iterator<Item = &'a Link> + use<'a> {
        links.iter(&self.list)
    }
}
