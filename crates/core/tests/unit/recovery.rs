//! Recovery Bookkeeping.
//!
//! Verifies that squashing a wrong path leaves no trace in the ledger or the
//! checkpoints, and that stale references left behind by a squash are never
//! treated as live.

use mpsim_core::common::ThreadId;
use mpsim_core::config::{Config, PredictorKind};
use mpsim_core::core::pipeline::ledger::LedgerEntry;
use mpsim_core::core::pipeline::thread::ThreadStatus;
use mpsim_core::sim::simulator::ExitReason;
use pretty_assertions::assert_eq;
use rstest::rstest;

use crate::common::harness::{TestContext, forking_config, static_config};

const T0: ThreadId = ThreadId(0);

/// The branch is taken; the fall-through block clobbers r2, r3 and memory.
const DETOUR: &str = "
    .reg r1 1
          addi r2, r0, 5
          bne  r1, r0, skip
          addi r3, r0, 7
          addi r2, r2, 100
          st   r2, 0x40(r0)
    skip: add  r4, r2, r1
          st   r4, 0x48(r0)
          halt
";

fn run_with(predictor: PredictorKind) -> TestContext {
    let mut config = Config::default();
    config.predictor.kind = predictor;
    let mut ctx = TestContext::new(DETOUR, config);
    assert_eq!(ctx.run(), ExitReason::Halted);
    ctx
}

#[test]
fn recovery_leaves_state_of_a_run_without_the_wrong_path() {
    let recovered = run_with(PredictorKind::Static);
    let clean = run_with(PredictorKind::Taken);
    assert_eq!(recovered.stats().recoveries, 1);
    assert_eq!(clean.stats().recoveries, 0);

    let (a, b) = (recovered.state(), clean.state());
    assert_eq!(a.ledger.tables(T0), b.ledger.tables(T0));
    assert_eq!(a.spec.summaries(), b.spec.summaries());
    assert_eq!(a.spec.arch_regs(), b.spec.arch_regs());
    assert_eq!(a.spec.arch_mem(), b.spec.arch_mem());
    assert_eq!(a.commit_log, b.commit_log);
    assert!(!a.spec.arch_mem().contains_key(&0x40));
    recovered.assert_matches_interpreter();
}

#[test]
fn ledger_drains_to_architected_entries() {
    let ctx = run_with(PredictorKind::Static);
    let tables = ctx.state().ledger.tables(T0);
    assert_eq!(tables.len(), 1);
    assert!(
        tables[0]
            .iter()
            .flatten()
            .all(|e| *e == LedgerEntry::Architected)
    );
}

const COUNTDOWN: &str = "
    .reg r1 6
    loop: addi r1, r1, -1
          st   r1, 0x100(r0)
          ld   r2, 0x100(r0)
          add  r3, r3, r2
          bne  r1, r0, loop
          halt
";

/// Every reference that still resolves must name a slot in a state that
/// reference kind allows.
fn assert_live_references_sound(ctx: &TestContext) {
    let s = ctx.state();
    for r in s.ready.entries(&s.links) {
        if let Some(slot) = s.pool.resolve(r) {
            assert!(!slot.squashed && !slot.issued, "ready list names {r}");
        }
    }
    for link in s.events.entries(&s.links) {
        if let Some(slot) = s.pool.resolve(link.target) {
            assert!(!slot.squashed && slot.issued, "event list names {}", link.target);
        }
    }
    for array in [&s.pool.general, &s.pool.memory] {
        for i in array.indices() {
            for chain in &array.get(i).odeps {
                for link in s.links.iter(chain) {
                    if let Some(consumer) = s.pool.resolve(link.target) {
                        assert!(!consumer.squashed, "output chain names {}", link.target);
                    }
                }
            }
        }
    }
    let initialised = s
        .threads
        .iter()
        .filter(|(_, t)| t.status == ThreadStatus::Valid && t.pending_init.is_none());
    for (tid, thread) in initialised {
        for table in s.ledger.tables(tid).iter().take(thread.level + 1) {
            for entry in table.iter().flatten() {
                if let LedgerEntry::Producer { slot, .. } = *entry {
                    if let Some(producer) = s.pool.resolve(slot) {
                        assert!(!producer.squashed, "ledger of {tid} names {slot}");
                    }
                }
            }
        }
    }
}

#[rstest]
#[case::squash_in_place(false)]
#[case::squash_remove(true)]
fn stale_references_never_resolve(#[case] squash_remove: bool) {
    let mut config = static_config();
    config.multipath.squash_remove = squash_remove;
    let mut ctx = TestContext::new(COUNTDOWN, config);
    while !ctx.state().halted {
        assert_live_references_sound(&ctx);
        assert!(ctx.state().cycle < 2_000);
        ctx.tick();
    }
    assert_eq!(ctx.stats().recoveries, 5);
    assert!(ctx.stats().squashed > 0);
    assert_eq!(ctx.reg(3), 15);
    ctx.assert_matches_interpreter();
}

#[test]
fn forked_paths_keep_references_sound() {
    let mut ctx = TestContext::new(COUNTDOWN, forking_config(4));
    while !ctx.state().halted {
        assert_live_references_sound(&ctx);
        assert!(ctx.level_zero_paths() <= 1);
        assert!(ctx.state().cycle < 2_000);
        ctx.tick();
    }
    assert!(ctx.stats().forks > 0);
    ctx.assert_matches_interpreter();
}

#[test]
fn killed_paths_are_reclaimed_after_draining() {
    let mut ctx = TestContext::new(COUNTDOWN, forking_config(4));
    assert_eq!(ctx.run(), ExitReason::Halted);
    // Drain whatever the halting cycle left behind.
    ctx.ticks(64);
    let s = ctx.state();
    assert_eq!(s.threads.count(ThreadStatus::SquashPending), 0);
    assert_eq!(s.stats.threads_killed, s.stats.threads_reclaimed);
    for (tid, t) in s.threads.iter().filter(|(_, t)| t.status == ThreadStatus::Dead) {
        assert!(s.spec.levels(tid).is_empty());
        assert_eq!(t.inflight, 0);
    }
}
