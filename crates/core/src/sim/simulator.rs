//! Simulator: the engine plus run limits.
//!
//! The simulator owns an [`Engine`] and drives it until the program halts, the
//! machine drains, or a configured limit is hit. An invariant violation stops
//! the run; the error is logged and returned together with a snapshot of the
//! machine as the failing stage left it.

use std::fmt;

use thiserror::Error;
use tracing::{error, info};

use crate::common::SimError;
use crate::config::Config;
use crate::core::pipeline::dump::MachineDump;
use crate::core::pipeline::engine::Engine;
use crate::core::pipeline::state::Collaborators;
use crate::sim::program::Program;
use crate::stats::SimStats;

/// Why a run stopped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExitReason {
    /// A `halt` committed.
    Halted,
    /// Every path left the program and the pipeline drained.
    Drained,
    /// `general.max_cycles` reached.
    CycleLimit,
    /// `general.max_insts` reached.
    InstructionLimit,
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Halted => "halt committed",
            Self::Drained => "pipeline drained",
            Self::CycleLimit => "cycle limit reached",
            Self::InstructionLimit => "instruction limit reached",
        };
        f.write_str(s)
    }
}

/// A run that stopped on an error, with the machine state at that point.
#[derive(Debug, Error)]
#[error("{error}")]
pub struct RunFailure {
    /// The error.
    pub error: SimError,
    /// Machine state when the error was detected.
    pub dump: Box<MachineDump>,
}

/// Top-level simulator.
#[derive(Debug)]
pub struct Simulator {
    engine: Engine,
    max_cycles: u64,
    max_insts: u64,
}

impl Simulator {
    /// Creates a simulator for `program` with the reference collaborators.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::Config`] if the configuration does not validate.
    pub fn new(config: Config, program: &Program) -> Result<Self, SimError> {
        let (max_cycles, max_insts) = (config.general.max_cycles, config.general.max_insts);
        Ok(Self {
            engine: Engine::new(config, program)?,
            max_cycles,
            max_insts,
        })
    }

    /// Creates a simulator around caller-supplied collaborators.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::Config`] if the configuration does not validate.
    pub fn with_collaborators(
        config: Config,
        program: &Program,
        collab: Collaborators,
    ) -> Result<Self, SimError> {
        let (max_cycles, max_insts) = (config.general.max_cycles, config.general.max_insts);
        Ok(Self {
            engine: Engine::with_collaborators(config, program, collab)?,
            max_cycles,
            max_insts,
        })
    }

    /// Advances one cycle.
    ///
    /// # Errors
    ///
    /// Propagates the engine's invariant violations.
    pub fn tick(&mut self) -> Result<(), SimError> {
        self.engine.tick()
    }

    /// Runs until the program halts, the machine drains or a limit is hit.
    ///
    /// # Errors
    ///
    /// Returns a [`RunFailure`] carrying the first invariant violation and a
    /// machine dump.
    pub fn run(&mut self) -> Result<ExitReason, RunFailure> {
        loop {
            if let Some(reason) = self.exit_reason() {
                let stats = self.engine.stats();
                info!(
                    %reason,
                    cycles = stats.cycles,
                    committed = stats.committed,
                    "simulation finished"
                );
                return Ok(reason);
            }
            if let Err(e) = self.engine.tick() {
                error!(error = %e, "simulation aborted");
                return Err(RunFailure {
                    error: e,
                    dump: Box::new(self.engine.dump()),
                });
            }
        }
    }

    fn exit_reason(&self) -> Option<ExitReason> {
        let state = self.engine.state();
        if state.halted {
            Some(ExitReason::Halted)
        } else if self.engine.is_done() {
            Some(ExitReason::Drained)
        } else if self.max_cycles > 0 && state.cycle >= self.max_cycles {
            Some(ExitReason::CycleLimit)
        } else if self.max_insts > 0 && state.stats.committed >= self.max_insts {
            Some(ExitReason::InstructionLimit)
        } else {
            None
        }
    }

    /// The engine.
    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// Mutable engine.
    pub fn engine_mut(&mut self) -> &mut Engine {
        &mut self.engine
    }

    /// Counters so far.
    pub fn stats(&self) -> &SimStats {
        self.engine.stats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cycle_limit_stops_run() {
        let mut config = Config::default();
        config.general.max_cycles = 5;
        let program = Program::from_asm("loop: j loop\n").unwrap();
        let mut sim = Simulator::new(config, &program).unwrap();
        assert_eq!(sim.run().unwrap(), ExitReason::CycleLimit);
        assert_eq!(sim.stats().cycles, 5);
    }

    #[test]
    fn test_leaving_program_drains() {
        let program = Program::from_asm("addi r1, r0, 1\nnop\n").unwrap();
        let mut sim = Simulator::new(Config::default(), &program).unwrap();
        assert_eq!(sim.run().unwrap(), ExitReason::Drained);
        assert_eq!(sim.stats().committed, 2);
    }

    #[test]
    fn test_invariant_failure_carries_dump() {
        let program = Program::from_asm("nop\nhalt\n").unwrap();
        let mut sim = Simulator::new(Config::default(), &program).unwrap();
        sim.engine_mut().state_mut().threads.get_mut(crate::common::ThreadId(0)).inflight = 9;
        let failure = sim.run().unwrap_err();
        assert!(failure.error.is_invariant());
        assert_eq!(failure.dump.cycle, 0);
    }
}
