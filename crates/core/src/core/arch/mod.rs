//! Architected and speculative register/memory state.
//!
//! Instructions are executed functionally when they are dispatched. The path that
//! owns speculative level 0 writes architected state directly; every other path
//! writes into its own checkpoint chain, which recovery discards.

use serde::Serialize;

use crate::common::Reg;

/// Architected and per-path checkpointed state.
pub mod spec_state;

pub use spec_state::{Checkpoint, SpecState, SpecView};

/// Architectural effect of one committed instruction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct CommitRecord {
    /// Address of the instruction.
    pub pc: u64,
    /// Register written and its value.
    pub reg_write: Option<(Reg, u64)>,
    /// Memory word written and its value.
    pub mem_write: Option<(u64, u64)>,
}
