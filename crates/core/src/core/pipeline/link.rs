//! Link pool.
//!
//! Every cross-reference between in-flight slots is a generation-tagged link
//! drawn from one capacity-bounded arena: output-dependency chains, the ready
//! list and the event list all thread their nodes through it. A link names its
//! target by [`SlotRef`]; once the target's tag moves on the link is stale and is
//! dropped wherever it is next visited, so squashing never walks foreign lists.

use serde::Serialize;

use super::slot::SlotRef;
use crate::common::Cycle;

/// Index of a node in the link pool.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct LinkId(u32);

/// Payload carried by a link.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum LinkData {
    /// Event list: completion cycle.
    When(Cycle),
    /// Ready list: priority rank, then program sequence.
    Seq {
        /// Lower ranks issue first.
        rank: u8,
        /// Program sequence number.
        seq: u64,
    },
    /// Output chain: input operand index of the consumer.
    Operand(u8),
}

impl LinkData {
    /// Ordering key for sorted lists.
    fn key(self) -> (u64, u64) {
        match self {
            Self::When(t) => (t, 0),
            Self::Seq { rank, seq } => (u64::from(rank), seq),
            Self::Operand(i) => (u64::from(i), 0),
        }
    }
}

/// A tagged reference to a slot with its payload.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Link {
    /// Slot the link refers to, with the tag it had when linked.
    pub target: SlotRef,
    /// Payload.
    pub data: LinkData,
    next: Option<LinkId>,
}

/// Head of a singly linked list of pool nodes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LinkList {
    head: Option<LinkId>,
    len: usize,
}

impl LinkList {
    /// Number of nodes, stale ones included.
    #[inline]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Returns true if the list holds no nodes.
    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// Capacity-bounded arena of links.
#[derive(Clone, Debug)]
pub struct LinkPool {
    nodes: Vec<Option<Link>>,
    free: Vec<LinkId>,
}

impl LinkPool {
    /// Creates a pool of `capacity` links.
    pub fn new(capacity: usize) -> Self {
        Self {
            nodes: vec![None; capacity],
            free: (0..capacity as u32).rev().map(LinkId).collect(),
        }
    }

    /// Total number of links.
    pub fn capacity(&self) -> usize {
        self.nodes.len()
    }

    /// Links not currently on any list.
    pub fn available(&self) -> usize {
        self.free.len()
    }

    fn acquire(&mut self, target: SlotRef, data: LinkData) -> Option<LinkId> {
        let id = self.free.pop()?;
        self.nodes[id.0 as usize] = Some(Link {
            target,
            data,
            next: None,
        });
        Some(id)
    }

    fn release(&mut self, id: LinkId) -> Option<Link> {
        let link = self.nodes[id.0 as usize].take()?;
        self.free.push(id);
        Some(link)
    }

    fn next_of(&self, id: LinkId) -> Option<LinkId> {
        self.nodes[id.0 as usize].and_then(|l| l.next)
    }

    fn set_next(&mut self, id: LinkId, next: Option<LinkId>) {
        if let Some(link) = self.nodes[id.0 as usize].as_mut() {
            link.next = next;
        }
    }

    /// Prepends a link; false if the pool is exhausted.
    pub fn push_front(&mut self, list: &mut LinkList, target: SlotRef, data: LinkData) -> bool {
        let Some(id) = self.acquire(target, data) else {
            return false;
        };
        self.set_next(id, list.head);
        list.head = Some(id);
        list.len += 1;
        true
    }

    /// Inserts a link after every node whose key is not greater, keeping equal
    /// keys in insertion order; false if the pool is exhausted.
    pub fn insert_sorted(&mut self, list: &mut LinkList, target: SlotRef, data: LinkData) -> bool {
        let Some(id) = self.acquire(target, data) else {
            return false;
        };
        let key = data.key();
        let mut prev: Option<LinkId> = None;
        let mut cur = list.head;
        while let Some(c) = cur {
            let Some(node) = self.nodes[c.0 as usize] else {
                break;
            };
            if node.data.key() > key {
                break;
            }
            prev = Some(c);
            cur = node.next;
        }
        self.set_next(id, cur);
        match prev {
            Some(p) => self.set_next(p, Some(id)),
            None => list.head = Some(id),
        }
        list.len += 1;
        true
    }

    /// Removes and returns the first link, returning its node to the pool.
    pub fn pop_front(&mut self, list: &mut LinkList) -> Option<Link> {
        let id = list.head?;
        list.head = self.next_of(id);
        list.len -= 1;
        self.release(id)
    }

    /// First link without removing it.
    pub fn front(&self, list: &LinkList) -> Option<&Link> {
        list.head.and_then(|id| self.nodes[id.0 as usize].as_ref())
    }

    /// Returns every node of `list` to the pool.
    pub fn release_list(&mut self, list: &mut LinkList) {
        while self.pop_front(list).is_some() {}
    }

    /// Iterates the links of `list` in order.
    pub fn iter<'a>(&'a self, list: &LinkList) -> impl Iterator<Item = &'a Link> + use<'a> {
        let mut cur = list.head;
        std::iter::from_fn(move || {
            let link = self.nodes[cur?.0 as usize].as_ref()?;
            cur = link.next;
            Some(link)
        })
    }
}
