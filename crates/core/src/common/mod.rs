//! Common utilities and types used throughout the simulator.
//!
//! This module provides building blocks shared by every component:
//! 1. **Constants:** Register counts, capacities, and architectural limits.
//! 2. **Error Handling:** Invariant, configuration, and program-loading errors.
//! 3. **Register Management:** Register names and the flat register file.

/// Common constants used throughout the simulator.
pub mod constants;

/// Error types for the engine, configuration, and program loader.
pub mod error;

/// Register names and register file.
pub mod reg;

pub use error::{ConfigError, ProgramError, SimError};
pub use reg::{Reg, RegisterFile};

/// A simulated clock cycle.
pub type Cycle = u64;

/// Identifier of a simulated thread/path record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default, serde::Serialize)]
pub struct ThreadId(pub u8);

impl ThreadId {
    /// Index of this thread in per-thread tables.
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Display for ThreadId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "t{}", self.0)
    }
}
