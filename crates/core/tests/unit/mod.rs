//! # Engine Units
//!
//! Tests grouped by concern: end-to-end scenarios, commit-order properties,
//! recovery bookkeeping, collaborator interaction, and configuration and
//! program loading.

/// Concrete dispatch, recovery, memory-ordering, resource and fork scenarios.
pub mod scenarios;

/// Commit order against the in-order interpreter over generated programs.
pub mod commit_order;

/// Recovery idempotence and generation-tag soundness.
pub mod recovery;

/// Engine interaction with mocked collaborators.
pub mod collaborators;

/// Configuration parsing and validation.
pub mod config;

/// Program files, the assembler and the command surface of the simulator.
pub mod program;
