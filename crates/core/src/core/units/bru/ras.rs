//! Return Address Stack (RAS).
//!
//! The RAS is a specialized predictor for function return addresses. It is a
//! circular stack: pushes overwrite the oldest entry when full, and a wrong-path
//! push or pop can be undone from a small checkpoint taken at prediction time
//! (top-of-stack index plus the entry it points at).

use serde::Serialize;

/// State needed to undo any single wrong-path push or pop.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct RasCheckpoint {
    /// Top-of-stack index.
    pub tos: usize,
    /// Number of valid entries.
    pub depth: usize,
    /// Entry at `tos`.
    pub value: u64,
}

/// Return Address Stack structure.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Ras {
    /// The stack storage.
    stack: Vec<u64>,
    /// Index of the current top entry.
    tos: usize,
    /// Valid entries, saturating at capacity.
    depth: usize,
}

impl Ras {
    /// Creates a new Return Address Stack with the specified capacity.
    pub fn new(capacity: usize) -> Self {
        Self {
            stack: vec![0; capacity],
            tos: 0,
            depth: 0,
        }
    }

    /// Maximum number of entries.
    pub fn capacity(&self) -> usize {
        self.stack.len()
    }

    /// Pushes a return address, overwriting the oldest entry when full.
    pub fn push(&mut self, addr: u64) {
        let cap = self.capacity();
        if cap == 0 {
            return;
        }
        self.tos = (self.tos + 1) % cap;
        self.stack[self.tos] = addr;
        self.depth = (self.depth + 1).min(cap);
    }

    /// Pops a return address, or `None` if the stack is empty.
    pub fn pop(&mut self) -> Option<u64> {
        if self.depth == 0 {
            return None;
        }
        let addr = self.stack[self.tos];
        self.tos = (self.tos + self.capacity() - 1) % self.capacity();
        self.depth -= 1;
        Some(addr)
    }

    /// Peeks at the top of the stack.
    pub fn top(&self) -> Option<u64> {
        (self.depth > 0).then(|| self.stack[self.tos])
    }

    /// Captures the state needed to undo the next push or pop.
    pub fn checkpoint(&self) -> RasCheckpoint {
        RasCheckpoint {
            tos: self.tos,
            depth: self.depth,
            value: self.stack.get(self.tos).copied().unwrap_or(0),
        }
    }

    /// Rolls back to a checkpoint.
    pub fn restore(&mut self, cp: RasCheckpoint) {
        if let Some(slot) = self.stack.get_mut(cp.tos) {
            *slot = cp.value;
            self.tos = cp.tos;
            self.depth = cp.depth;
        }
    }
}
