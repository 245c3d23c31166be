//! Core model.
//!
//! 1. **Architectural state:** Architected registers and memory plus per-path
//!    speculative checkpoints.
//! 2. **Pipeline:** The scheduling and recovery engine and its data structures.
//! 3. **Units:** Collaborators consumed through narrow interfaces (branch and
//!    confidence prediction, cache timing, functional-unit pool).

/// Architected and speculative register/memory state.
pub mod arch;

/// Scheduling and recovery engine.
pub mod pipeline;

/// Collaborator units.
pub mod units;
