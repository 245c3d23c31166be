//! Scheduler state and collaborators.
//!
//! All mutable machine state lives in one [`SchedulerState`] owned by the
//! engine; stages are free functions that borrow it exclusively for their
//! share of the cycle. Collaborators sit in a separate struct so a stage can
//! hold the state and a collaborator mutably at the same time.

use std::collections::VecDeque;
use std::fmt;

use super::event::EventList;
use super::fetch_policy::{self, FetchPolicy};
use super::frontend::FetchEntry;
use super::ledger::Ledger;
use super::link::LinkPool;
use super::ready::ReadyList;
use super::slot::SlotPool;
use super::thread::ThreadTable;
use crate::common::constants::word_addr;
use crate::common::{Cycle, Reg};
use crate::config::Config;
use crate::core::arch::{CommitRecord, SpecState};
use crate::core::units::InstructionSource;
use crate::core::units::bru::{BranchPredictor, ConfidencePredictor, ConfidenceWrapper, PredictorWrapper};
use crate::core::units::cache::{CacheSim, MemoryHierarchy};
use crate::core::units::resource::ResourcePool;
use crate::sim::program::Program;
use crate::stats::SimStats;

/// Every piece of mutable machine state.
#[derive(Debug)]
pub struct SchedulerState {
    /// Current cycle.
    pub cycle: Cycle,
    /// Validated configuration.
    pub config: Config,
    /// General and memory-op slot arrays.
    pub pool: SlotPool,
    /// Shared link arena.
    pub links: LinkPool,
    /// Producer tables.
    pub ledger: Ledger,
    /// Issuable slots.
    pub ready: ReadyList,
    /// Pending completions.
    pub events: EventList,
    /// Path records.
    pub threads: ThreadTable,
    /// Architected state and checkpoints.
    pub spec: SpecState,
    /// Fetched, not yet dispatched.
    pub fetch_queue: VecDeque<FetchEntry>,
    /// Functional units and class quotas.
    pub resources: ResourcePool,
    /// Counters.
    pub stats: SimStats,
    /// Next program sequence number.
    pub next_seq: u64,
    /// A `halt` has committed.
    pub halted: bool,
    /// Architectural writes in commit order, when enabled.
    pub commit_log: Vec<CommitRecord>,
}

impl SchedulerState {
    /// Builds the initial state for `program`.
    pub fn new(config: Config, program: &Program) -> Self {
        let core = &config.core;
        let mp = &config.multipath;
        let regs = program.registers.iter().map(|(&r, &v)| (Reg(r), v));
        let mem = program.memory.iter().map(|(&a, &v)| (word_addr(a), v));
        Self {
            cycle: 0,
            pool: SlotPool::new(core.ruu_size, core.lsq_size),
            links: LinkPool::new(core.link_pool_size),
            ledger: Ledger::new(mp.max_threads),
            ready: ReadyList::new(core.issue_policy),
            events: EventList::new(),
            threads: ThreadTable::new(
                mp.max_threads,
                program.base,
                config.predictor.ras_size,
                mp.per_thread_ras,
            ),
            spec: SpecState::new(regs, mem),
            fetch_queue: VecDeque::with_capacity(core.fetch_queue_size),
            resources: ResourcePool::new(&config.resources),
            stats: SimStats::default(),
            next_seq: 0,
            halted: false,
            commit_log: Vec::new(),
            config,
        }
    }

    /// Oldest ancestry position still unresolved: unresolved control slots in
    /// the general array plus branches waiting in the fetch queue.
    pub fn oldest_live_position(&self) -> Option<u64> {
        let general = &self.pool.general;
        let in_flight = general.indices().filter_map(|i| {
            let s = general.get(i);
            if s.completed || s.squashed {
                None
            } else {
                s.branch_pos
            }
        });
        let queued = self.fetch_queue.iter().filter_map(|e| e.pos);
        in_flight.chain(queued).min()
    }

    /// Assigns the next program sequence number.
    pub fn take_seq(&mut self) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        seq
    }
}

/// Collaborators the engine consumes through narrow interfaces.
pub struct Collaborators {
    /// Direction and target prediction.
    pub predictor: Box<dyn BranchPredictor>,
    /// Branch confidence estimation.
    pub confidence: Box<dyn ConfidencePredictor>,
    /// Data-cache timing.
    pub memory: Box<dyn MemoryHierarchy>,
    /// Instruction supply.
    pub source: Box<dyn InstructionSource>,
    /// Fetch ordering among paths.
    pub fetch_policy: Box<dyn FetchPolicy>,
}

impl Collaborators {
    /// The reference collaborators selected by `config`, fetching from `program`.
    pub fn from_config(config: &Config, program: &Program) -> Self {
        Self {
            predictor: Box::new(PredictorWrapper::new(&config.predictor)),
            confidence: Box::new(ConfidenceWrapper::new(&config.confidence)),
            memory: Box::new(CacheSim::new(&config.memory)),
            source: Box::new(program.clone()),
            fetch_policy: fetch_policy::build(config.multipath.fetch_policy),
        }
    }
}

impl fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collaborators")
            .field("fetch_policy", &self.fetch_policy)
            .finish_non_exhaustive()
    }
}
