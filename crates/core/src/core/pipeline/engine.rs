//! Per-cycle engine.
//!
//! The engine owns the scheduler state and its collaborators and runs the
//! stages once per cycle, from the tail of the pipeline to the head, so that
//! nothing a stage produces is visible to an earlier stage in the same cycle:
//!
//! Commit → unit release → Writeback (→ Recovery) → path reclamation →
//! memory refresh → Issue → Dispatch → Fetch → statistics sampling.

use tracing::trace;

use super::dump::MachineDump;
use super::frontend::fetch_stage;
use super::stages::{
    commit_stage, dispatch_stage, issue_stage, reclaim_threads, refresh_stage, writeback_stage,
};
use super::state::{Collaborators, SchedulerState};
use super::thread::ThreadStatus;
use crate::common::SimError;
use crate::config::Config;
use crate::sim::program::Program;
use crate::stats::SimStats;

/// Scheduler state plus collaborators, advanced one cycle at a time.
#[derive(Debug)]
pub struct Engine {
    state: SchedulerState,
    collab: Collaborators,
}

impl Engine {
    /// Builds an engine with the reference collaborators selected by `config`.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::Config`] if the configuration does not validate.
    pub fn new(config: Config, program: &Program) -> Result<Self, SimError> {
        let collab = Collaborators::from_config(&config, program);
        Self::with_collaborators(config, program, collab)
    }

    /// Builds an engine around caller-supplied collaborators.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::Config`] if the configuration does not validate.
    pub fn with_collaborators(
        config: Config,
        program: &Program,
        collab: Collaborators,
    ) -> Result<Self, SimError> {
        config.validate()?;
        Ok(Self {
            state: SchedulerState::new(config, program),
            collab,
        })
    }

    /// Advances the machine by one cycle.
    ///
    /// # Errors
    ///
    /// Returns the first invariant violation any stage detects. The state is
    /// left as the failing stage found it, for [`Self::dump`].
    pub fn tick(&mut self) -> Result<(), SimError> {
        let state = &mut self.state;
        let collab = &mut self.collab;

        commit_stage(state, collab)?;
        state.resources.tick();
        writeback_stage(state, collab)?;
        reclaim_threads(state);
        #[cfg(any(debug_assertions, feature = "consistency-checks"))]
        super::stages::check_consistency(state)?;
        refresh_stage(state);
        issue_stage(state, collab)?;
        dispatch_stage(state)?;
        fetch_stage(state, collab);

        sample(state, collab);
        trace!(
            cycle = state.cycle,
            committed = state.stats.committed,
            ruu = state.pool.general.len(),
            lsq = state.pool.memory.len(),
            "cycle"
        );
        state.cycle += 1;
        Ok(())
    }

    /// True once `halt` has committed, or nothing is left to fetch or retire.
    pub fn is_done(&self) -> bool {
        let s = &self.state;
        s.halted
            || (s.pool.general.is_empty()
                && s.fetch_queue.is_empty()
                && s.threads
                    .iter()
                    .all(|(_, t)| t.status != ThreadStatus::Valid || t.fetch_halted))
    }

    /// Scheduler state.
    pub fn state(&self) -> &SchedulerState {
        &self.state
    }

    /// Mutable scheduler state, for tests and tools that poke the machine.
    pub fn state_mut(&mut self) -> &mut SchedulerState {
        &mut self.state
    }

    /// Counters so far.
    pub fn stats(&self) -> &SimStats {
        &self.state.stats
    }

    /// Snapshot of the current machine state.
    pub fn dump(&self) -> MachineDump {
        MachineDump::capture(&self.state)
    }
}

/// Accumulates per-cycle occupancy and copies the cache counters.
fn sample(state: &mut SchedulerState, collab: &Collaborators) {
    let live = state.threads.iter().filter(|(_, t)| t.is_live()).count();
    let stats = &mut state.stats;
    stats.cycles += 1;
    stats.ruu_occupancy += state.pool.general.len() as u64;
    stats.lsq_occupancy += state.pool.memory.len() as u64;
    stats.ready_occupancy += state.ready.len() as u64;
    stats.fetch_queue_occupancy += state.fetch_queue.len() as u64;
    stats.thread_occupancy += live as u64;
    if let Some((accesses, misses)) = collab.memory.counters() {
        stats.cache_accesses = accesses;
        stats.cache_misses = misses;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::isa::asm::assemble;

    fn run(src: &str, config: Config) -> Engine {
        let program = assemble(src).unwrap();
        let mut engine = Engine::new(config, &program).unwrap();
        for _ in 0..10_000 {
            if engine.is_done() {
                break;
            }
            engine.tick().unwrap();
        }
        assert!(engine.is_done());
        engine
    }

    #[test]
    fn test_straight_line_program_commits_everything() {
        let engine = run(
            "addi r1, r0, 3\naddi r2, r1, 4\nadd r3, r1, r2\nhalt\n",
            Config::default(),
        );
        let s = engine.state();
        assert_eq!(s.stats.committed, 4);
        assert_eq!(s.spec.arch_regs().read(crate::common::Reg::int(3)), 10);
        assert!(s.halted);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = Config::default();
        config.core.issue_width = 0;
        let program = assemble("halt\n").unwrap();
        assert!(matches!(
            Engine::new(config, &program),
            Err(SimError::Config(_))
        ));
    }

    #[test]
    fn test_dump_lists_live_slots() {
        let program = assemble("addi r1, r0, 1\nmul r2, r1, r1\nhalt\n").unwrap();
        let mut engine = Engine::new(Config::default(), &program).unwrap();
        for _ in 0..3 {
            engine.tick().unwrap();
        }
        let dump = engine.dump();
        assert_eq!(dump.cycle, 3);
        assert_eq!(dump.general.len(), engine.state().pool.general.len());
        assert!(dump.to_json().unwrap().contains("\"general\""));
        assert!(dump.to_string().contains("machine state at cycle 3"));
    }
}
