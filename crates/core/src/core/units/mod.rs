//! Collaborator units.
//!
//! The engine consumes these through narrow interfaces:
//! 1. **BRU:** Branch direction/target prediction, return-address stacks, and
//!    branch confidence estimation.
//! 2. **Cache:** Data-cache timing in front of a fixed-latency memory.
//! 3. **Resource pool:** Functional-unit instances, issue occupancy and per-class
//!    in-flight quotas.

use crate::isa::Instruction;

/// Branch prediction and confidence estimation.
pub mod bru;

/// Data-cache timing model.
pub mod cache;

/// Functional-unit resource pool.
pub mod resource;

/// Supplies decoded instructions to the front end.
pub trait InstructionSource {
    /// Instruction at `pc`, or `None` if the address holds no instruction.
    fn fetch(&self, pc: u64) -> Option<Instruction>;
}
