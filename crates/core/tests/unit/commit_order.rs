//! Program-order Commit Properties.
//!
//! Random straight-line programs with forward branches and word-sized memory
//! traffic are run on randomly configured machines. Whatever the machine does
//! speculatively, the commit log must equal the in-order interpreter's trace.

use mpsim_core::common::Reg;
use mpsim_core::common::constants::INST_BYTES;
use mpsim_core::config::{Config, ConfidenceKind, FetchPolicyKind, IssuePolicy, PredictorKind};
use mpsim_core::isa::{Instruction, Opcode};
use mpsim_core::sim::program::Program;
use mpsim_core::sim::simulator::ExitReason;
use proptest::prelude::*;

use crate::common::harness::TestContext;

const DATA_BASE: i64 = 0x200;

#[derive(Clone, Debug)]
enum Op {
    Alu(Opcode, u8, u8, u8),
    Addi(u8, u8, i64),
    Load(u8, i64),
    Store(u8, i64),
    Branch(Opcode, u8, u8, usize),
}

fn reg() -> impl Strategy<Value = u8> {
    0..8u8
}

fn word() -> impl Strategy<Value = i64> {
    (0..4i64).prop_map(|k| DATA_BASE + 8 * k)
}

fn op() -> impl Strategy<Value = Op> {
    let alu = prop_oneof![
        Just(Opcode::Add),
        Just(Opcode::Sub),
        Just(Opcode::Xor),
        Just(Opcode::Slt),
        Just(Opcode::Mul),
    ];
    let branch = prop_oneof![
        Just(Opcode::Beq),
        Just(Opcode::Bne),
        Just(Opcode::Blt),
        Just(Opcode::Bge),
    ];
    prop_oneof![
        3 => (alu, 1..8u8, reg(), reg()).prop_map(|(o, d, a, b)| Op::Alu(o, d, a, b)),
        3 => (1..8u8, reg(), -4..5i64).prop_map(|(d, a, i)| Op::Addi(d, a, i)),
        2 => (1..8u8, word()).prop_map(|(d, w)| Op::Load(d, w)),
        2 => (reg(), word()).prop_map(|(s, w)| Op::Store(s, w)),
        2 => (branch, reg(), reg(), 1..4usize).prop_map(|(o, a, b, s)| Op::Branch(o, a, b, s)),
    ]
}

/// Lays the ops out from address 0 with a trailing `halt`; branches only jump forward.
fn build(ops: &[Op], init: &[u64]) -> Program {
    let halt_at = ops.len();
    let mut instructions: Vec<Instruction> = ops
        .iter()
        .enumerate()
        .map(|(i, op)| match *op {
            Op::Alu(o, d, a, b) => Instruction::reg3(o, Reg::int(d), Reg::int(a), Reg::int(b)),
            Op::Addi(d, a, imm) => Instruction::addi(Reg::int(d), Reg::int(a), imm),
            Op::Load(d, w) => Instruction::load(Reg::int(d), Reg::ZERO, w),
            Op::Store(s, w) => Instruction::store(Reg::int(s), Reg::ZERO, w),
            Op::Branch(o, a, b, skip) => {
                let target = (i + 1 + skip).min(halt_at) as u64 * INST_BYTES;
                Instruction::branch(o, Reg::int(a), Reg::int(b), target)
            }
        })
        .collect();
    instructions.push(Instruction::halt());
    Program {
        registers: (1..).zip(init.iter().copied()).collect(),
        instructions,
        ..Program::default()
    }
}

fn machine() -> impl Strategy<Value = Config> {
    let predictor = prop_oneof![
        Just(PredictorKind::Static),
        Just(PredictorKind::Taken),
        Just(PredictorKind::GShare),
    ];
    let policy = prop_oneof![
        Just(FetchPolicyKind::RoundRobin),
        Just(FetchPolicyKind::PredictedFirst),
        Just(FetchPolicyKind::ICount),
    ];
    let issue = prop_oneof![Just(IssuePolicy::Aggressive), Just(IssuePolicy::ProgramOrder)];
    (1..=4usize, any::<bool>(), predictor, policy, issue, any::<bool>(), 2..=6usize).prop_map(
        |(threads, fork, predictor, policy, issue, squash_remove, ruu)| {
            let mut config = Config::default();
            config.multipath.max_threads = threads;
            config.multipath.fetch_policy = policy;
            config.multipath.squash_remove = squash_remove && threads == 1;
            config.confidence.kind = if fork {
                ConfidenceKind::Naive
            } else {
                ConfidenceKind::Never
            };
            config.predictor.kind = predictor;
            config.core.issue_policy = issue;
            config.core.ruu_size = ruu * 2;
            config.core.lsq_size = ruu;
            config
        },
    )
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(96))]

    #[test]
    fn commit_log_matches_interpreter(
        ops in prop::collection::vec(op(), 1..24),
        init in prop::collection::vec(0..16u64, 7),
        config in machine(),
    ) {
        let program = build(&ops, &init);
        let mut ctx = TestContext::with_program(program, config);
        prop_assert_eq!(ctx.run(), ExitReason::Halted);
        ctx.assert_matches_interpreter();
        let s = ctx.state();
        prop_assert_eq!(s.stats.committed, s.commit_log.len() as u64);
    }

    #[test]
    fn at_most_one_path_writes_architected_state(
        ops in prop::collection::vec(op(), 1..16),
        init in prop::collection::vec(0..4u64, 7),
        threads in 2..=4usize,
    ) {
        let mut config = Config::default();
        config.multipath.max_threads = threads;
        config.confidence.kind = ConfidenceKind::Naive;
        let mut ctx = TestContext::with_program(build(&ops, &init), config);
        while !ctx.sim.engine().is_done() {
            prop_assert!(ctx.level_zero_paths() <= 1);
            prop_assert!(ctx.state().cycle < 5_000);
            ctx.tick();
        }
        ctx.assert_matches_interpreter();
    }
}
