//! Multipath scheduling and recovery engine.
//!
//! This module contains the out-of-order engine and the structures it runs on:
//! 1. **Storage:** The slot pool, the link arena and the per-path dependency ledger.
//! 2. **Scheduling:** Ready and event lists built from links.
//! 3. **Paths:** Thread records with fork ancestry, and the fetch policies that
//!    share fetch bandwidth between them.
//! 4. **Stages:** Fetch, dispatch, issue, writeback, recovery and commit.
//! 5. **Engine:** Per-cycle stage ordering, statistics sampling and state dumps.

/// Machine-state snapshots.
pub mod dump;

/// Per-cycle driver.
pub mod engine;

/// Pending-completion list.
pub mod event;

/// Fetch-bandwidth policies.
pub mod fetch_policy;

/// Fetch queue and fetch stage.
pub mod frontend;

/// Register producer tables per path and level.
pub mod ledger;

/// Link arena shared by every list in the engine.
pub mod link;

/// Issue-ordered ready list.
pub mod ready;

/// General and memory slot arrays.
pub mod slot;

/// Stage implementations.
pub mod stages;

/// Engine-wide mutable state and collaborators.
pub mod state;

/// Path records and fork ancestry.
pub mod thread;
