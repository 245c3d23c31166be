//! Simulation statistics collection and reporting.
//!
//! This module tracks performance metrics for the multipath core. It provides:
//! 1. **Cycle and IPC:** Total cycles, committed instructions, and derived metrics.
//! 2. **Instruction mix:** Committed counts by category.
//! 3. **Branch prediction:** Lookups, mispredictions, recoveries, and confidence.
//! 4. **Multipath:** Forks, refused forks, killed and reverted paths.
//! 5. **Overflow:** Per-cause dispatch, issue and fetch back-pressure counters.
//! 6. **Occupancy:** Cumulative queue depths sampled every cycle, with averages.

use std::io::{self, Write};
use std::time::Instant;

use serde::Serialize;

/// Simulation statistics structure tracking all performance metrics.
#[derive(Clone, Debug, Serialize)]
pub struct SimStats {
    #[serde(skip)]
    start_time: Instant,
    /// Total simulated cycles.
    pub cycles: u64,
    /// Instructions committed.
    pub committed: u64,
    /// Slots allocated by dispatch (memory ops count twice).
    pub dispatched: u64,
    /// Slots issued.
    pub issued: u64,
    /// Slots squashed by recovery.
    pub squashed: u64,
    /// Squashed slots reclaimed at the commit head.
    pub squashed_reclaimed: u64,

    /// Committed integer ALU operations.
    pub inst_alu: u64,
    /// Committed multiply and divide operations.
    pub inst_long_latency: u64,
    /// Committed floating-point operations.
    pub inst_fp: u64,
    /// Committed loads.
    pub inst_load: u64,
    /// Committed stores.
    pub inst_store: u64,
    /// Committed control instructions.
    pub inst_control: u64,

    /// Predictor lookups at fetch.
    pub bp_lookups: u64,
    /// Committed control instructions whose prediction was correct.
    pub bp_correct: u64,
    /// Committed control instructions whose prediction was wrong.
    pub bp_mispredicts: u64,
    /// Recovery invocations (divergent or forked branches resolving).
    pub recoveries: u64,
    /// Committed conditional branches estimated low confidence.
    pub conf_low: u64,
    /// Committed low-confidence branches that were in fact mispredicted.
    pub conf_low_mispredicts: u64,

    /// Paths forked.
    pub forks: u64,
    /// Fork requests refused for lack of a free path record.
    pub forks_refused: u64,
    /// Forks whose child turned out to be on the correct path.
    pub forks_useful: u64,
    /// Paths marked squash-pending.
    pub threads_killed: u64,
    /// Paths reverted in place at a mispredicted branch.
    pub threads_reverted: u64,
    /// Paths reclaimed to the free pool.
    pub threads_reclaimed: u64,

    /// Dispatch stalls: general array full.
    pub overflow_ruu: u64,
    /// Dispatch stalls: memory array full.
    pub overflow_lsq: u64,
    /// Dispatch stalls: class in-flight quota full.
    pub overflow_quota: u64,
    /// Dispatch or refresh stalls: link pool exhausted.
    pub overflow_links: u64,
    /// Dispatch stalls: speculative depth exhausted.
    pub overflow_spec_depth: u64,
    /// Issue re-enqueues: no free functional unit.
    pub overflow_resource: u64,
    /// Fetch stalls: fork-ancestry window full.
    pub overflow_window: u64,
    /// Commit stalls: no free write port.
    pub overflow_write_port: u64,

    /// Loads satisfied by store-to-load forwarding.
    pub loads_forwarded: u64,
    /// Data cache accesses.
    pub cache_accesses: u64,
    /// Data cache misses.
    pub cache_misses: u64,

    /// Cumulative general-array occupancy.
    pub ruu_occupancy: u64,
    /// Cumulative memory-array occupancy.
    pub lsq_occupancy: u64,
    /// Cumulative ready-list length.
    pub ready_occupancy: u64,
    /// Cumulative fetch-queue length.
    pub fetch_queue_occupancy: u64,
    /// Cumulative count of valid paths.
    pub thread_occupancy: u64,
}

impl Default for SimStats {
    fn default() -> Self {
        Self {
            start_time: Instant::now(),
            cycles: 0,
            committed: 0,
            dispatched: 0,
            issued: 0,
            squashed: 0,
            squashed_reclaimed: 0,
            inst_alu: 0,
            inst_long_latency: 0,
            inst_fp: 0,
            inst_load: 0,
            inst_store: 0,
            inst_control: 0,
            bp_lookups: 0,
            bp_correct: 0,
            bp_mispredicts: 0,
            recoveries: 0,
            conf_low: 0,
            conf_low_mispredicts: 0,
            forks: 0,
            forks_refused: 0,
            forks_useful: 0,
            threads_killed: 0,
            threads_reverted: 0,
            threads_reclaimed: 0,
            overflow_ruu: 0,
            overflow_lsq: 0,
            overflow_quota: 0,
            overflow_links: 0,
            overflow_spec_depth: 0,
            overflow_resource: 0,
            overflow_window: 0,
            overflow_write_port: 0,
            loads_forwarded: 0,
            cache_accesses: 0,
            cache_misses: 0,
            ruu_occupancy: 0,
            lsq_occupancy: 0,
            ready_occupancy: 0,
            fetch_queue_occupancy: 0,
            thread_occupancy: 0,
        }
    }
}

/// Section names for selective stats output.
///
/// Pass an empty slice to `print_sections` to print all sections.
pub const STATS_SECTIONS: &[&str] = &[
    "summary",
    "pipeline",
    "instruction_mix",
    "branch",
    "multipath",
    "overflow",
    "memory",
];

fn pct(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}

fn avg(total: u64, cycles: u64) -> f64 {
    total as f64 / cycles.max(1) as f64
}

impl SimStats {
    /// Instructions committed per cycle.
    pub fn ipc(&self) -> f64 {
        self.committed as f64 / self.cycles.max(1) as f64
    }

    /// Serialises every counter as pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Propagates serialisation failures from `serde_json`.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Writes the requested sections in the plain-text report format.
    ///
    /// # Errors
    ///
    /// Propagates write failures.
    pub fn write_sections(&self, out: &mut impl Write, sections: &[String]) -> io::Result<()> {
        let want = |s: &str| sections.is_empty() || sections.iter().any(|x| x == s);
        let cyc = self.cycles;
        let insts = self.committed;
        const RULE: &str = "----------------------------------------------------------";

        writeln!(out, "\n==========================================================")?;
        writeln!(out, "MULTIPATH CORE SIMULATION STATISTICS")?;
        writeln!(out, "==========================================================")?;
        if want("summary") {
            let seconds = self.start_time.elapsed().as_secs_f64();
            writeln!(out, "host_seconds             {seconds:.4} s")?;
            writeln!(out, "sim_cycles               {cyc}")?;
            writeln!(out, "sim_insts                {insts}")?;
            writeln!(out, "sim_ipc                  {:.4}", self.ipc())?;
            writeln!(out, "sim_cpi                  {:.4}", cyc as f64 / insts.max(1) as f64)?;
            writeln!(out, "{RULE}")?;
        }
        if want("pipeline") {
            writeln!(out, "PIPELINE")?;
            writeln!(out, "  slots.dispatched       {}", self.dispatched)?;
            writeln!(out, "  slots.issued           {}", self.issued)?;
            writeln!(
                out,
                "  slots.squashed         {} ({:.2}%)",
                self.squashed,
                pct(self.squashed, self.dispatched)
            )?;
            writeln!(out, "  squash.reclaimed       {}", self.squashed_reclaimed)?;
            writeln!(out, "  ruu.avg_occupancy      {:.2}", avg(self.ruu_occupancy, cyc))?;
            writeln!(out, "  lsq.avg_occupancy      {:.2}", avg(self.lsq_occupancy, cyc))?;
            writeln!(out, "  ready.avg_length       {:.2}", avg(self.ready_occupancy, cyc))?;
            writeln!(
                out,
                "  ifq.avg_length         {:.2}",
                avg(self.fetch_queue_occupancy, cyc)
            )?;
            writeln!(out, "{RULE}")?;
        }
        if want("instruction_mix") {
            writeln!(out, "INSTRUCTION MIX")?;
            for (name, count) in [
                ("op.alu", self.inst_alu),
                ("op.long_latency", self.inst_long_latency),
                ("op.fp", self.inst_fp),
                ("op.load", self.inst_load),
                ("op.store", self.inst_store),
                ("op.control", self.inst_control),
            ] {
                writeln!(out, "  {name:<22} {count} ({:.2}%)", pct(count, insts))?;
            }
            writeln!(out, "{RULE}")?;
        }
        if want("branch") {
            let resolved = self.bp_correct + self.bp_mispredicts;
            writeln!(out, "BRANCH PREDICTION")?;
            writeln!(out, "  bp.lookups             {}", self.bp_lookups)?;
            writeln!(out, "  bp.committed           {resolved}")?;
            writeln!(out, "  bp.mispredicts         {}", self.bp_mispredicts)?;
            writeln!(out, "  bp.accuracy            {:.2}%", pct(self.bp_correct, resolved))?;
            writeln!(out, "  bp.recoveries          {}", self.recoveries)?;
            writeln!(out, "  conf.low               {}", self.conf_low)?;
            writeln!(
                out,
                "  conf.low_accuracy      {:.2}%",
                pct(self.conf_low_mispredicts, self.conf_low)
            )?;
            writeln!(out, "{RULE}")?;
        }
        if want("multipath") {
            writeln!(out, "MULTIPATH")?;
            writeln!(out, "  fork.count             {}", self.forks)?;
            writeln!(out, "  fork.refused           {}", self.forks_refused)?;
            writeln!(
                out,
                "  fork.useful            {} ({:.2}%)",
                self.forks_useful,
                pct(self.forks_useful, self.forks)
            )?;
            writeln!(out, "  path.killed            {}", self.threads_killed)?;
            writeln!(out, "  path.reverted          {}", self.threads_reverted)?;
            writeln!(out, "  path.reclaimed         {}", self.threads_reclaimed)?;
            writeln!(out, "  path.avg_live          {:.2}", avg(self.thread_occupancy, cyc))?;
            writeln!(out, "{RULE}")?;
        }
        if want("overflow") {
            writeln!(out, "OVERFLOW")?;
            for (name, count) in [
                ("ruu_full", self.overflow_ruu),
                ("lsq_full", self.overflow_lsq),
                ("class_quota", self.overflow_quota),
                ("link_pool", self.overflow_links),
                ("spec_depth", self.overflow_spec_depth),
                ("resource_busy", self.overflow_resource),
                ("fork_window", self.overflow_window),
                ("write_port", self.overflow_write_port),
            ] {
                writeln!(out, "  {name:<22} {count}")?;
            }
            writeln!(out, "{RULE}")?;
        }
        if want("memory") {
            let hits = self.cache_accesses.saturating_sub(self.cache_misses);
            writeln!(out, "MEMORY HIERARCHY")?;
            writeln!(
                out,
                "  {:<6} accesses: {:<10} | hits: {:<10} | miss_rate: {:.2}%",
                "L1-D",
                self.cache_accesses,
                hits,
                pct(self.cache_misses, self.cache_accesses)
            )?;
            writeln!(out, "  loads.forwarded        {}", self.loads_forwarded)?;
        }
        writeln!(out, "==========================================================")
    }

    /// Prints only the requested statistics sections to stdout.
    pub fn print_sections(&self, sections: &[String]) {
        let stdout = io::stdout();
        let mut lock = stdout.lock();
        if let Err(e) = self.write_sections(&mut lock, sections) {
            tracing::warn!("failed to write statistics: {e}");
        }
    }

    /// Prints all statistics sections to stdout.
    pub fn print(&self) {
        self.print_sections(&[]);
    }
}
