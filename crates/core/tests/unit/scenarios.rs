//! End-to-end Scenarios.
//!
//! Each test drives the whole engine cycle by cycle on a short program and
//! inspects the scheduler state at the interesting moment.

use mpsim_core::common::ThreadId;
use mpsim_core::config::{FetchPolicyKind, UnitConfig};
use mpsim_core::core::pipeline::slot::{PoolKind, SlotRole};
use mpsim_core::core::pipeline::thread::ThreadStatus;
use mpsim_core::isa::Opcode;
use mpsim_core::sim::simulator::ExitReason;
use rstest::rstest;

use crate::common::harness::{TestContext, forking_config, static_config};

// ══════════════════════════════════════════════════════════
// 1. Four-wide dispatch with a split load
// ══════════════════════════════════════════════════════════

const DECODE_GROUP: &str = "
    .reg r2 0x100
    .reg r3 0x8
          add r1, r2, r3
          ld  r4, 0(r1)
          beq r2, r0, target
          add r5, r4, r1
    target: halt
";

#[test]
fn four_wide_decode_allocates_five_slots() {
    let mut ctx = TestContext::new(DECODE_GROUP, static_config());
    // Cycle 0 fetches the group, cycle 1 dispatches it.
    ctx.ticks(2);

    let s = ctx.state();
    assert_eq!(s.pool.general.len(), 4);
    assert_eq!(s.pool.memory.len(), 1);
    assert_eq!(s.pool.occupancy(), 5);
    assert_eq!(s.stats.dispatched, 5);

    let general: Vec<u32> = s.pool.general.indices().collect();
    let load_addr = s.pool.general.get(general[1]);
    assert_eq!(load_addr.role, SlotRole::Address);
    let access_index = s.pool.memory.head_index().expect("load access slot");
    let access = s.pool.memory.get(access_index);
    assert!(access.is_load());

    // r5 = r4 + r1: the r4 input hangs off the load's memory-access slot.
    let consumer = s.pool.general.slot_ref(general[3]);
    let linked: Vec<_> = s.links.iter(&access.odeps[0]).map(|l| l.target).collect();
    assert_eq!(linked, vec![consumer]);

    // The add and the branch have no in-flight producers and are ready at once.
    let ready: Vec<u32> = s
        .ready
        .entries(&s.links)
        .filter(|r| r.id.kind == PoolKind::General)
        .map(|r| r.id.index)
        .collect();
    assert!(ready.contains(&general[0]));
    assert!(ready.contains(&general[2]));
    assert!(!ready.contains(&general[3]));
}

// ══════════════════════════════════════════════════════════
// 2. Misprediction recovery
// ══════════════════════════════════════════════════════════

const MISPREDICT: &str = "
    .reg r1 1
          bne  r1, r0, target
          addi r2, r0, 1
          addi r3, r0, 2
          addi r4, r0, 3
    target: addi r5, r0, 4
          halt
";

#[test]
fn mispredicted_branch_squashes_and_redirects() {
    let mut ctx = TestContext::new(MISPREDICT, static_config());
    ctx.tick_until(50, |c| c.stats().recoveries == 1);

    let s = ctx.state();
    let recovered_at = s.cycle - 1;
    let t0 = ctx.thread(0);
    assert_eq!(t0.status, ThreadStatus::Valid);
    assert_eq!(t0.level, 0);
    assert_eq!(t0.fetch_pc, 0x10);
    assert_eq!(
        t0.fetch_stall_until,
        recovered_at + s.config.core.mispredict_penalty
    );
    assert!(s.spec.levels(ThreadId(0)).is_empty());
    assert_eq!(s.ledger.tables(ThreadId(0)).len(), 1);
    assert!(s.stats.squashed >= 3);

    assert_eq!(ctx.run(), ExitReason::Halted);
    let stats = ctx.stats();
    assert_eq!(stats.squashed, stats.squashed_reclaimed);
    assert_eq!(stats.bp_mispredicts, 1);
    assert_eq!(ctx.reg(5), 4);
    assert_eq!(ctx.reg(2), 0);
    ctx.assert_matches_interpreter();
}

// ══════════════════════════════════════════════════════════
// 3. Load waits for an older store with an unknown address
// ══════════════════════════════════════════════════════════

const STORE_ORDERING: &str = "
    .reg r1 0x1000
    .reg r5 7
    .reg r6 1
          div r2, r1, r6
          st  r5, 0(r2)
          st  r6, 0(r1)
          ld  r7, 0(r1)
          halt
";

#[test]
fn load_waits_for_unresolved_store_address() {
    let mut ctx = TestContext::new(STORE_ORDERING, static_config());
    ctx.tick_until(20, |c| c.state().pool.memory.len() == 3);

    let memory: Vec<u32> = ctx.state().pool.memory.indices().collect();
    let (store_a, store_b, load) = (memory[0], memory[1], memory[2]);
    assert!(ctx.state().pool.memory.get(store_a).is_store());
    assert!(ctx.state().pool.memory.get(store_b).is_store());
    assert!(ctx.state().pool.memory.get(load).is_load());

    let mut blocked_cycles = 0;
    while !ctx.state().pool.memory.get(store_a).address_ready() {
        let mem = &ctx.state().pool.memory;
        assert!(!mem.get(load).issued, "load issued past an unresolved store");
        blocked_cycles += 1;
        assert!(blocked_cycles < 100);
        ctx.tick();
    }
    assert!(blocked_cycles > 0);

    assert_eq!(ctx.run(), ExitReason::Halted);
    assert_eq!(ctx.reg(7), 1);
    assert_eq!(ctx.stats().loads_forwarded, 1);
    ctx.assert_matches_interpreter();
}

// ══════════════════════════════════════════════════════════
// 4. Contention for a single multiplier
// ══════════════════════════════════════════════════════════

const TWO_MULS: &str = "
    .reg r1 6
    .reg r2 7
          mul r3, r1, r2
          mul r4, r1, r2
          halt
";

#[rstest]
#[case::one_unit(1, 1)]
#[case::two_units(2, 0)]
fn multiplier_contention(#[case] units: usize, #[case] overflows: u64) {
    let mut config = static_config();
    let unit: UnitConfig = serde_json::from_str(&format!(
        r#"{{"name": "mult", "quantity": {units},
             "templates": [{{"class": "IntMult", "op_latency": 3, "issue_latency": 1}}]}}"#
    ))
    .unwrap();
    config.resources.units.retain(|u| u.name != "integer-MULT/DIV");
    config.resources.units.push(unit);

    let mut ctx = TestContext::new(TWO_MULS, config);
    ctx.ticks(3);

    let s = ctx.state();
    let issued_muls = s
        .pool
        .general
        .indices()
        .map(|i| s.pool.general.get(i))
        .filter(|slot| slot.inst.op == Opcode::Mul && slot.issued)
        .count();
    assert_eq!(issued_muls, 2 - overflows as usize);
    assert_eq!(s.stats.overflow_resource, overflows);
    assert_eq!(s.ready.len(), overflows as usize);

    assert_eq!(ctx.run(), ExitReason::Halted);
    assert_eq!(ctx.reg(3), 42);
    assert_eq!(ctx.reg(4), 42);
}

// ══════════════════════════════════════════════════════════
// 5. Forking at a low-confidence branch
// ══════════════════════════════════════════════════════════

const FORK: &str = "
    .reg r1 1
          bne  r1, r0, skip
          addi r2, r0, 1
          addi r3, r0, 2
    skip: addi r4, r0, 3
          halt
";

#[rstest]
#[case::predicted_first(FetchPolicyKind::PredictedFirst)]
#[case::round_robin(FetchPolicyKind::RoundRobin)]
#[case::icount(FetchPolicyKind::ICount)]
fn low_confidence_branch_forks(#[case] policy: FetchPolicyKind) {
    let mut config = forking_config(3);
    config.multipath.fetch_policy = policy;
    let mut ctx = TestContext::new(FORK, config);
    ctx.tick();

    let (parent, child) = (ctx.thread(0), ctx.thread(1));
    assert_eq!(ctx.stats().forks, 1);
    assert_eq!(child.status, ThreadStatus::Valid);
    assert_eq!(child.pending_init, Some(ThreadId(0)));
    assert_eq!(child.fetch_pc, 0xc);
    assert_eq!(child.ancestry.cursor, parent.ancestry.cursor);
    assert!(parent.ancestry.bit(0));
    assert!(!child.ancestry.bit(0));
    assert_eq!(ctx.thread(2).status, ThreadStatus::Dead);

    let mut child_fetched = false;
    while ctx.stats().recoveries == 0 {
        assert!(ctx.level_zero_paths() <= 1);
        child_fetched |= ctx.thread(1).inflight > 0;
        assert!(ctx.state().cycle < 50);
        ctx.tick();
    }
    assert!(child_fetched);
    assert_eq!(ctx.thread(0).status, ThreadStatus::SquashPending);

    assert_eq!(ctx.run(), ExitReason::Halted);
    let paths = [ctx.thread(0).status, ctx.thread(1).status];
    assert_eq!(paths, [ThreadStatus::Dead, ThreadStatus::Valid]);
    assert_eq!(ctx.stats().forks_useful, 1);
    assert_eq!(ctx.stats().threads_reclaimed, 1);
    assert_eq!(ctx.reg(4), 3);
    ctx.assert_matches_interpreter();
}

#[test]
fn fork_refused_without_free_record() {
    let mut ctx = TestContext::new(FORK, forking_config(1));
    assert_eq!(ctx.run(), ExitReason::Halted);
    assert_eq!(ctx.stats().forks, 0);
    assert!(ctx.stats().forks_refused >= 1);
    assert_eq!(ctx.stats().threads_reverted, 1);
    ctx.assert_matches_interpreter();
}
