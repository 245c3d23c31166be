//! Collaborator Interaction.
//!
//! The engine talks to the predictor, the confidence estimator and the memory
//! hierarchy only through their traits. These tests replace each with a mock
//! and check when and how often the engine calls it.

use mockall::predicate::eq;
use mpsim_core::config::{Config, UpdateStage};
use mpsim_core::core::units::bru::Confidence;
use mpsim_core::core::units::cache::MemCmd;
use mpsim_core::sim::simulator::ExitReason;

use crate::common::harness::{TestContext, forking_config, static_config};
use crate::common::mocks::{MockEstimator, MockMemory, MockPredictor, taken_prediction};

const LOOP: &str = "
    .reg r1 3
    loop: addi r1, r1, -1
          bne  r1, r0, loop
          halt
";

#[test]
fn predictor_trained_once_per_committed_branch() {
    let mut predictor = MockPredictor::new();
    predictor.expect_lookup().returning(taken_prediction);
    predictor
        .expect_update()
        .withf(|_, _, taken, correct, _, _| *taken && *correct)
        .times(2)
        .return_const(());
    predictor
        .expect_update()
        .withf(|_, next, taken, correct, _, _| *next == 0x8 && !*taken && !*correct)
        .times(1)
        .return_const(());

    let mut ctx = TestContext::with_collaborators(LOOP, Config::default(), |c| {
        c.predictor = Box::new(predictor);
    });
    assert_eq!(ctx.run(), ExitReason::Halted);
    assert_eq!(ctx.stats().bp_correct, 2);
    assert_eq!(ctx.stats().bp_mispredicts, 1);
    ctx.assert_matches_interpreter();
}

#[test]
fn writeback_training_sees_every_resolved_branch() {
    let mut config = Config::default();
    config.predictor.update = UpdateStage::Writeback;
    let mut predictor = MockPredictor::new();
    predictor.expect_lookup().returning(taken_prediction);
    predictor.expect_update().times(3..).return_const(());

    let mut ctx = TestContext::with_collaborators(LOOP, config, |c| {
        c.predictor = Box::new(predictor);
    });
    assert_eq!(ctx.run(), ExitReason::Halted);
    ctx.assert_matches_interpreter();
}

#[test]
fn confidence_consulted_for_conditional_branches_only() {
    let mut estimator = MockEstimator::new();
    estimator
        .expect_predict()
        .with(eq(0x4), mockall::predicate::always())
        .returning(|_, _| Confidence::High);
    estimator
        .expect_update()
        .with(eq(0x4), mockall::predicate::always(), mockall::predicate::always(), eq(Confidence::High))
        .times(3)
        .return_const(());

    let src = "
        .reg r1 3
        loop: addi r1, r1, -1
              bne  r1, r0, loop
              call f
              halt
        f:    ret
    ";
    let mut ctx = TestContext::with_collaborators(src, forking_config(2), |c| {
        c.confidence = Box::new(estimator);
    });
    assert_eq!(ctx.run(), ExitReason::Halted);
    assert_eq!(ctx.stats().forks, 0);
    assert_eq!(ctx.stats().conf_low, 0);
    ctx.assert_matches_interpreter();
}

#[test]
fn low_confidence_from_estimator_forks() {
    let mut estimator = MockEstimator::new();
    estimator.expect_predict().return_const(Confidence::Low);
    estimator.expect_update().return_const(());

    let mut ctx = TestContext::with_collaborators(LOOP, forking_config(2), |c| {
        c.confidence = Box::new(estimator);
    });
    assert_eq!(ctx.run(), ExitReason::Halted);
    assert!(ctx.stats().forks >= 1);
    assert_eq!(ctx.stats().conf_low, 3);
    ctx.assert_matches_interpreter();
}

#[test]
fn store_written_to_memory_once_at_commit() {
    let mut memory = MockMemory::new();
    memory
        .expect_access()
        .with(eq(MemCmd::Write), eq(0x100), eq(8), mockall::predicate::always())
        .times(1)
        .return_const(4u64);
    memory
        .expect_access()
        .with(eq(MemCmd::Read), eq(0x100), eq(8), mockall::predicate::always())
        .return_const(4u64);

    let src = "
        .reg r1 9
              st r1, 0x100(r0)
              ld r2, 0x100(r0)
              halt
    ";
    let mut ctx = TestContext::with_collaborators(src, static_config(), |c| {
        c.memory = Box::new(memory);
    });
    assert_eq!(ctx.run(), ExitReason::Halted);
    assert_eq!(ctx.reg(2), 9);
    ctx.assert_matches_interpreter();
}

#[test]
fn load_latency_comes_from_memory_hierarchy() {
    let run = |latency: u64| {
        let mut memory = MockMemory::new();
        memory.expect_access().return_const(latency);
        let mut ctx = TestContext::with_collaborators(
            ".word 0x80 5\nld r1, 0x80(r0)\nhalt\n",
            static_config(),
            |c| c.memory = Box::new(memory),
        );
        assert_eq!(ctx.run(), ExitReason::Halted);
        assert_eq!(ctx.reg(1), 5);
        ctx.stats().cycles
    };
    assert_eq!(run(40) - run(1), 39);
}
