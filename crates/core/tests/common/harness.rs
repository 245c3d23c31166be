use mpsim_core::common::{Reg, ThreadId};
use mpsim_core::config::{Config, ConfidenceKind, PredictorKind};
use mpsim_core::core::pipeline::state::{Collaborators, SchedulerState};
use mpsim_core::core::pipeline::thread::{ThreadState, ThreadStatus};
use mpsim_core::sim::program::Program;
use mpsim_core::sim::simulator::{ExitReason, Simulator};
use mpsim_core::stats::SimStats;
use pretty_assertions::assert_eq;
use tracing_subscriber::EnvFilter;

/// Cycle cap applied when a test leaves `general.max_cycles` unset.
pub const DEFAULT_CYCLE_CAP: u64 = 20_000;

pub struct TestContext {
    pub sim: Simulator,
    pub program: Program,
}

/// Installs a test-writer subscriber once; `RUST_LOG` picks the level.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter(EnvFilter::from_default_env())
        .try_init();
}

/// Single-path configuration with the static not-taken predictor.
pub fn static_config() -> Config {
    let mut config = Config::default();
    config.predictor.kind = PredictorKind::Static;
    config
}

/// Multipath configuration that forks at every conditional branch.
pub fn forking_config(threads: usize) -> Config {
    let mut config = static_config();
    config.multipath.max_threads = threads;
    config.confidence.kind = ConfidenceKind::Naive;
    config
}

impl TestContext {
    pub fn new(src: &str, config: Config) -> Self {
        let program = Program::from_asm(src).expect("test program assembles");
        Self::with_program(program, config)
    }

    pub fn with_program(program: Program, config: Config) -> Self {
        init_tracing();
        let config = prepare(config);
        let sim = Simulator::new(config, &program).expect("test config validates");
        Self { sim, program }
    }

    pub fn with_collaborators(src: &str, config: Config, build: impl FnOnce(&mut Collaborators)) -> Self {
        init_tracing();
        let program = Program::from_asm(src).expect("test program assembles");
        let config = prepare(config);
        let mut collab = Collaborators::from_config(&config, &program);
        build(&mut collab);
        let sim = Simulator::with_collaborators(config, &program, collab)
            .expect("test config validates");
        Self { sim, program }
    }

    pub fn state(&self) -> &SchedulerState {
        self.sim.engine().state()
    }

    pub fn stats(&self) -> &SimStats {
        self.sim.stats()
    }

    pub fn thread(&self, id: u8) -> &ThreadState {
        self.state().threads.get(ThreadId(id))
    }

    pub fn reg(&self, n: u8) -> u64 {
        self.state().spec.arch_regs().read(Reg::int(n))
    }

    /// One cycle; panics with a machine dump on an invariant violation.
    pub fn tick(&mut self) {
        if let Err(e) = self.sim.tick() {
            panic!("{e}\n{}", self.sim.engine().dump());
        }
    }

    pub fn ticks(&mut self, n: usize) {
        for _ in 0..n {
            self.tick();
        }
    }

    /// Ticks until `done` holds, at most `limit` cycles.
    pub fn tick_until(&mut self, limit: usize, mut done: impl FnMut(&Self) -> bool) {
        for _ in 0..limit {
            if done(self) {
                return;
            }
            self.tick();
        }
        assert!(done(self), "condition not reached within {limit} cycles");
    }

    pub fn run(&mut self) -> ExitReason {
        match self.sim.run() {
            Ok(reason) => reason,
            Err(failure) => panic!("{}\n{}", failure.error, failure.dump),
        }
    }

    /// Number of initialised paths writing architected state.
    pub fn level_zero_paths(&self) -> usize {
        self.state()
            .threads
            .iter()
            .filter(|(_, t)| t.status == ThreadStatus::Valid && t.pending_init.is_none() && t.level == 0)
            .count()
    }

    /// Checks the commit log and final architected state against the in-order interpreter.
    pub fn assert_matches_interpreter(&self) {
        let state = self.state();
        let trace = self.program.interpret(state.commit_log.len());
        assert_eq!(state.commit_log, trace.commits);
        assert_eq!(state.spec.arch_regs(), &trace.regs);
        assert_eq!(state.spec.arch_mem(), &trace.memory);
    }
}

fn prepare(mut config: Config) -> Config {
    config.general.commit_log = true;
    if config.general.max_cycles == 0 {
        config.general.max_cycles = DEFAULT_CYCLE_CAP;
    }
    config
}
