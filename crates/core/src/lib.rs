//! Multipath out-of-order core simulator library.
//!
//! This crate simulates, cycle by cycle, an out-of-order superscalar core that can
//! follow both outcomes of low-confidence branches at once:
//! 1. **Engine:** Slot pool, dependency ledger, link pool, ready/event scheduling,
//!    dispatch, issue, writeback, commit, and the recovery/fork manager.
//! 2. **Collaborators:** Branch and confidence predictors, cache timing, and the
//!    functional-unit resource pool, each behind a narrow interface.
//! 3. **ISA:** A compact load/store instruction set with an assembler and a reference
//!    interpreter.
//! 4. **Simulation:** Configuration, statistics collection, and the run driver.

/// Common types and constants (registers, errors).
pub mod common;
/// Simulator configuration (defaults, enums, hierarchical config structures).
pub mod config;
/// Core model: speculative state, pipeline engine, and collaborator units.
pub mod core;
/// Instruction set (opcodes, operands, functional semantics, assembler).
pub mod isa;
/// Program loading and the top-level run driver.
pub mod sim;
/// Simulation statistics collection and reporting.
pub mod stats;

/// Root configuration type; use `Config::default()` or deserialize from JSON.
pub use crate::config::Config;
/// The per-cycle engine.
pub use crate::core::pipeline::engine::Engine;
/// Program image consumed by the front end.
pub use crate::sim::program::Program;
/// Top-level simulator; construct with `Simulator::new`.
pub use crate::sim::simulator::Simulator;
