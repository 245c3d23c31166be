//! Per-cycle stage implementations.
//!
//! The engine calls these from tail to head each cycle, so a slot moves through
//! at most one stage per cycle:
//! 1. **Commit:** Retires completed slots in program order; reclaims squashed ones.
//! 2. **Writeback:** Completes due events, runs recovery, wakes consumers.
//! 3. **Recovery:** Squashes wrong paths, reverts or kills paths, reclaims records.
//! 4. **Refresh:** Releases loads whose older stores no longer block them.
//! 5. **Issue:** Starts ready slots on free functional units.
//! 6. **Dispatch:** Executes fetched instructions and allocates their slots.

/// In-order commit.
pub mod commit;

/// Dispatch with functional execution and checkpointing.
pub mod dispatch;

/// Issue with store-to-load forwarding.
pub mod issue;

/// Branch recovery and path management.
pub mod recovery;

/// Memory-dependence refresh.
pub mod refresh;

/// Event completion and wakeup.
pub mod writeback;

pub use commit::commit_stage;
pub use dispatch::dispatch_stage;
pub use issue::issue_stage;
pub use recovery::{check_consistency, reclaim_threads};
pub use refresh::refresh_stage;
pub use writeback::writeback_stage;
