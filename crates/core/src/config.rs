//! Configuration system for the multipath simulator.
//!
//! This module defines all configuration structures and enums used to parameterize
//! the simulator. It provides:
//! 1. **Defaults:** Baseline machine constants (queue sizes, widths, latencies).
//! 2. **Structures:** Hierarchical config for general, core, multipath, predictor,
//!    confidence, memory, and functional-unit resources.
//! 3. **Enums:** Issue policy, fetch policy, predictor, confidence, and update stage.
//! 4. **Validation:** `Config::validate` rejects configurations the engine cannot run.
//!
//! Configuration is supplied as JSON (`Config::from_json`, `Config::from_file`) or
//! built with `Config::default()`. Every field is optional in JSON.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::common::ConfigError;
use crate::common::constants::{MAX_SPEC_LEVELS, MAX_THREADS};
use crate::isa::FuClass;

/// Default configuration constants for the simulator.
mod defaults {
    /// General (RUU) slot array capacity.
    pub const RUU_SIZE: usize = 16;

    /// Memory-op (LSQ) slot array capacity.
    pub const LSQ_SIZE: usize = 8;

    /// Fetch queue capacity.
    pub const FETCH_QUEUE_SIZE: usize = 8;

    /// Default pipeline width for fetch, decode, issue and commit.
    pub const WIDTH: usize = 4;

    /// Floating-point issue width.
    pub const FP_ISSUE_WIDTH: usize = 2;

    /// Link pool capacity.
    ///
    /// Every in-flight slot may hold a ready-list or event link plus one link per
    /// input operand, so the pool is sized well above `RUU_SIZE + LSQ_SIZE`.
    pub const LINK_POOL_SIZE: usize = 512;

    /// Store-to-load forwarding latency in cycles.
    pub const FORWARD_LATENCY: u64 = 1;

    /// Fetch redirect penalty after a misprediction, in cycles.
    pub const MISPREDICT_PENALTY: u64 = 3;

    /// Statically provisioned paths actually used (1 disables forking).
    pub const MAX_THREADS: usize = 1;

    /// Speculative levels per path.
    pub const MAX_SPEC_LEVELS: usize = 8;

    /// Fetch delay charged to a newly forked path, in cycles.
    pub const FORK_PENALTY: u64 = 1;

    /// Forks accepted per cycle.
    pub const MAX_FORKS_PER_CYCLE: usize = 1;

    /// Branch predictor global history length in bits.
    pub const HISTORY_BITS: usize = 10;

    /// Branch predictor pattern table size (log2).
    pub const TABLE_BITS: usize = 12;

    /// Return address stack depth.
    pub const RAS_SIZE: usize = 8;

    /// Confidence table entries.
    pub const CONF_TABLE_SIZE: usize = 1024;

    /// Bits per confidence table entry.
    pub const CONF_ENTRY_BITS: u32 = 4;

    /// Confidence threshold (entries below it are low confidence).
    pub const CONF_THRESHOLD: i32 = 4;

    /// Data cache size in bytes.
    pub const CACHE_SIZE: usize = 16 * 1024;

    /// Data cache line size in bytes.
    pub const CACHE_LINE: usize = 32;

    /// Data cache associativity.
    pub const CACHE_WAYS: usize = 4;

    /// Data cache hit latency in cycles.
    pub const CACHE_LATENCY: u64 = 1;

    /// Main memory latency in cycles.
    pub const MEMORY_LATENCY: u64 = 18;

    /// In-flight operations allowed per functional-unit class.
    pub const CLASS_QUOTA: usize = 16;
}

/// Ready-list ordering policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum IssuePolicy {
    /// Memory ops, control instructions and long-latency ops first, each in
    /// program order, then everything else in program order.
    #[default]
    Aggressive,
    /// Strict program order.
    ProgramOrder,
}

/// Multipath fetch-bandwidth policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum FetchPolicyKind {
    /// Rotate the starting path each cycle.
    RoundRobin,
    /// Fetch the highest-priority path (the predicted path first).
    #[default]
    PredictedFirst,
    /// Fetch the path with the fewest in-flight instructions.
    ICount,
}

/// Branch direction predictor implementation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum PredictorKind {
    /// Always predict not-taken.
    Static,
    /// Always predict taken.
    Taken,
    /// Global history XOR PC into 2-bit counters.
    #[default]
    #[serde(alias = "Gshare")]
    GShare,
}

/// Stage at which the branch predictor is trained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum UpdateStage {
    /// Train when the branch commits (non-speculative).
    #[default]
    Commit,
    /// Train when the branch writes back (speculative).
    Writeback,
}

/// Branch confidence estimator implementation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum ConfidenceKind {
    /// Every branch is high confidence; never fork.
    #[default]
    Never,
    /// Every conditional branch is low confidence; fork whenever possible.
    Naive,
    /// Shift register of recent outcomes; confidence is its population count.
    Ones,
    /// Saturating up/down counter.
    Saturating,
    /// Counter that resets to zero on a misprediction.
    Resetting,
}

/// Which threshold of a multi-threshold confidence table applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum ThresholdSelector {
    /// Always the first threshold.
    #[default]
    None,
    /// Chosen by the number of free path contexts.
    Hardware,
}

/// Root configuration structure containing all simulator settings.
///
/// # Examples
///
/// ```
/// use mpsim_core::config::{Config, ConfidenceKind, FetchPolicyKind};
///
/// let json = r#"{
///     "core": { "ruu_size": 32, "lsq_size": 16 },
///     "multipath": { "max_threads": 4, "fetch_policy": "ICount" },
///     "confidence": { "kind": "Resetting", "thresholds": [3] }
/// }"#;
///
/// let config = Config::from_json(json).unwrap();
/// assert_eq!(config.core.ruu_size, 32);
/// assert_eq!(config.multipath.fetch_policy, FetchPolicyKind::ICount);
/// assert_eq!(config.confidence.kind, ConfidenceKind::Resetting);
/// assert_eq!(config.core.decode_width, 4);
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Run limits and logging.
    pub general: GeneralConfig,
    /// Queue sizes, widths and latencies.
    pub core: CoreConfig,
    /// Forking and path management.
    pub multipath: MultipathConfig,
    /// Branch predictor.
    pub predictor: PredictorConfig,
    /// Branch confidence estimator.
    pub confidence: ConfidenceConfig,
    /// Data cache and memory timing.
    pub memory: MemoryConfig,
    /// Functional-unit pool.
    pub resources: ResourcesConfig,
}

/// Run limits and logging options.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Stop after this many cycles (0 = unlimited).
    #[serde(default)]
    pub max_cycles: u64,

    /// Stop after this many committed instructions (0 = unlimited).
    #[serde(default)]
    pub max_insts: u64,

    /// Record every architectural write at commit.
    #[serde(default)]
    pub commit_log: bool,
}

/// Core queue sizes, widths, and latencies.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoreConfig {
    /// General slot array capacity.
    #[serde(default = "CoreConfig::default_ruu_size")]
    pub ruu_size: usize,

    /// Memory-op slot array capacity.
    #[serde(default = "CoreConfig::default_lsq_size")]
    pub lsq_size: usize,

    /// Fetch queue capacity.
    #[serde(default = "CoreConfig::default_fetch_queue_size")]
    pub fetch_queue_size: usize,

    /// Instructions fetched per cycle.
    #[serde(default = "CoreConfig::default_width")]
    pub fetch_width: usize,

    /// Instructions dispatched per cycle.
    #[serde(default = "CoreConfig::default_width")]
    pub decode_width: usize,

    /// Total instructions issued per cycle.
    #[serde(default = "CoreConfig::default_width")]
    pub issue_width: usize,

    /// Integer and memory instructions issued per cycle.
    #[serde(default = "CoreConfig::default_width")]
    pub int_issue_width: usize,

    /// Floating-point instructions issued per cycle.
    #[serde(default = "CoreConfig::default_fp_issue_width")]
    pub fp_issue_width: usize,

    /// Instructions committed per cycle.
    #[serde(default = "CoreConfig::default_width")]
    pub commit_width: usize,

    /// Link pool capacity shared by output chains, ready list and event list.
    #[serde(default = "CoreConfig::default_link_pool_size")]
    pub link_pool_size: usize,

    /// Ready-list ordering.
    #[serde(default)]
    pub issue_policy: IssuePolicy,

    /// Extra cycles added to every issued operation's completion time.
    #[serde(default)]
    pub extra_issue_latency: u64,

    /// Store-to-load forwarding latency.
    #[serde(default = "CoreConfig::default_forward_latency")]
    pub forward_latency: u64,

    /// Fetch redirect penalty charged on a misprediction.
    #[serde(default = "CoreConfig::default_mispredict_penalty")]
    pub mispredict_penalty: u64,
}

impl CoreConfig {
    fn default_ruu_size() -> usize {
        defaults::RUU_SIZE
    }

    fn default_lsq_size() -> usize {
        defaults::LSQ_SIZE
    }

    fn default_fetch_queue_size() -> usize {
        defaults::FETCH_QUEUE_SIZE
    }

    fn default_width() -> usize {
        defaults::WIDTH
    }

    fn default_fp_issue_width() -> usize {
        defaults::FP_ISSUE_WIDTH
    }

    fn default_link_pool_size() -> usize {
        defaults::LINK_POOL_SIZE
    }

    fn default_forward_latency() -> u64 {
        defaults::FORWARD_LATENCY
    }

    fn default_mispredict_penalty() -> u64 {
        defaults::MISPREDICT_PENALTY
    }
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            ruu_size: defaults::RUU_SIZE,
            lsq_size: defaults::LSQ_SIZE,
            fetch_queue_size: defaults::FETCH_QUEUE_SIZE,
            fetch_width: defaults::WIDTH,
            decode_width: defaults::WIDTH,
            issue_width: defaults::WIDTH,
            int_issue_width: defaults::WIDTH,
            fp_issue_width: defaults::FP_ISSUE_WIDTH,
            commit_width: defaults::WIDTH,
            link_pool_size: defaults::LINK_POOL_SIZE,
            issue_policy: IssuePolicy::default(),
            extra_issue_latency: 0,
            forward_latency: defaults::FORWARD_LATENCY,
            mispredict_penalty: defaults::MISPREDICT_PENALTY,
        }
    }
}

/// Multipath forking and path management.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MultipathConfig {
    /// Path records in use; 1 runs a conventional single-path core.
    #[serde(default = "MultipathConfig::default_max_threads")]
    pub max_threads: usize,

    /// Speculative levels per path.
    #[serde(default = "MultipathConfig::default_max_spec_levels")]
    pub max_spec_levels: usize,

    /// Fetch delay charged to a freshly forked path.
    #[serde(default = "MultipathConfig::default_fork_penalty")]
    pub fork_penalty: u64,

    /// Forks accepted per cycle.
    #[serde(default = "MultipathConfig::default_max_forks_per_cycle")]
    pub max_forks_per_cycle: usize,

    /// Fetch bandwidth policy.
    #[serde(default)]
    pub fetch_policy: FetchPolicyKind,

    /// Remove squashed slots immediately instead of letting commit reclaim them.
    /// Only valid with a single path.
    #[serde(default)]
    pub squash_remove: bool,

    /// Give each forked path a private copy of the return-address stack.
    #[serde(default = "MultipathConfig::default_per_thread_ras")]
    pub per_thread_ras: bool,
}

impl MultipathConfig {
    fn default_max_threads() -> usize {
        defaults::MAX_THREADS
    }

    fn default_max_spec_levels() -> usize {
        defaults::MAX_SPEC_LEVELS
    }

    fn default_fork_penalty() -> u64 {
        defaults::FORK_PENALTY
    }

    fn default_max_forks_per_cycle() -> usize {
        defaults::MAX_FORKS_PER_CYCLE
    }

    fn default_per_thread_ras() -> bool {
        true
    }
}

impl Default for MultipathConfig {
    fn default() -> Self {
        Self {
            max_threads: defaults::MAX_THREADS,
            max_spec_levels: defaults::MAX_SPEC_LEVELS,
            fork_penalty: defaults::FORK_PENALTY,
            max_forks_per_cycle: defaults::MAX_FORKS_PER_CYCLE,
            fetch_policy: FetchPolicyKind::default(),
            squash_remove: false,
            per_thread_ras: true,
        }
    }
}

/// Branch predictor configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictorConfig {
    /// Direction predictor.
    #[serde(default)]
    pub kind: PredictorKind,

    /// Global history length (gshare).
    #[serde(default = "PredictorConfig::default_history_bits")]
    pub history_bits: usize,

    /// Pattern table size, log2 (gshare).
    #[serde(default = "PredictorConfig::default_table_bits")]
    pub table_bits: usize,

    /// Return-address stack depth.
    #[serde(default = "PredictorConfig::default_ras_size")]
    pub ras_size: usize,

    /// When to train.
    #[serde(default)]
    pub update: UpdateStage,
}

impl PredictorConfig {
    fn default_history_bits() -> usize {
        defaults::HISTORY_BITS
    }

    fn default_table_bits() -> usize {
        defaults::TABLE_BITS
    }

    fn default_ras_size() -> usize {
        defaults::RAS_SIZE
    }
}

impl Default for PredictorConfig {
    fn default() -> Self {
        Self {
            kind: PredictorKind::default(),
            history_bits: defaults::HISTORY_BITS,
            table_bits: defaults::TABLE_BITS,
            ras_size: defaults::RAS_SIZE,
            update: UpdateStage::default(),
        }
    }
}

/// Branch confidence estimator configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfidenceConfig {
    /// Estimator implementation.
    #[serde(default)]
    pub kind: ConfidenceKind,

    /// Table entries.
    #[serde(default = "ConfidenceConfig::default_table_size")]
    pub table_size: usize,

    /// Bits per entry.
    #[serde(default = "ConfidenceConfig::default_entry_bits")]
    pub entry_bits: u32,

    /// Confidence thresholds; an entry value below the selected one is low confidence.
    #[serde(default = "ConfidenceConfig::default_thresholds")]
    pub thresholds: Vec<i32>,

    /// Threshold selection.
    #[serde(default)]
    pub selector: ThresholdSelector,

    /// Index the table with PC XOR global history.
    #[serde(default)]
    pub gshare: bool,
}

impl ConfidenceConfig {
    fn default_table_size() -> usize {
        defaults::CONF_TABLE_SIZE
    }

    fn default_entry_bits() -> u32 {
        defaults::CONF_ENTRY_BITS
    }

    fn default_thresholds() -> Vec<i32> {
        vec![defaults::CONF_THRESHOLD]
    }
}

impl Default for ConfidenceConfig {
    fn default() -> Self {
        Self {
            kind: ConfidenceKind::default(),
            table_size: defaults::CONF_TABLE_SIZE,
            entry_bits: defaults::CONF_ENTRY_BITS,
            thresholds: Self::default_thresholds(),
            selector: ThresholdSelector::default(),
            gshare: false,
        }
    }
}

/// Data cache and memory timing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// Model a data cache; when false every access costs `memory_latency`.
    #[serde(default = "MemoryConfig::default_cache_enabled")]
    pub cache_enabled: bool,

    /// Cache size in bytes.
    #[serde(default = "MemoryConfig::default_size")]
    pub size_bytes: usize,

    /// Cache line size in bytes.
    #[serde(default = "MemoryConfig::default_line")]
    pub line_bytes: usize,

    /// Associativity.
    #[serde(default = "MemoryConfig::default_ways")]
    pub ways: usize,

    /// Hit latency.
    #[serde(default = "MemoryConfig::default_hit_latency")]
    pub hit_latency: u64,

    /// Latency of a miss serviced by memory.
    #[serde(default = "MemoryConfig::default_memory_latency")]
    pub memory_latency: u64,
}

impl MemoryConfig {
    fn default_cache_enabled() -> bool {
        true
    }

    fn default_size() -> usize {
        defaults::CACHE_SIZE
    }

    fn default_line() -> usize {
        defaults::CACHE_LINE
    }

    fn default_ways() -> usize {
        defaults::CACHE_WAYS
    }

    fn default_hit_latency() -> u64 {
        defaults::CACHE_LATENCY
    }

    fn default_memory_latency() -> u64 {
        defaults::MEMORY_LATENCY
    }
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            cache_enabled: true,
            size_bytes: defaults::CACHE_SIZE,
            line_bytes: defaults::CACHE_LINE,
            ways: defaults::CACHE_WAYS,
            hit_latency: defaults::CACHE_LATENCY,
            memory_latency: defaults::MEMORY_LATENCY,
        }
    }
}

/// Operation template served by a functional unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateConfig {
    /// Class of operations this template executes.
    pub class: FuClass,
    /// Cycles until the result is available.
    pub op_latency: u64,
    /// Cycles before the unit accepts another operation.
    pub issue_latency: u64,
}

/// A group of identical functional units.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitConfig {
    /// Display name.
    pub name: String,
    /// Number of instances.
    pub quantity: usize,
    /// Operation classes served.
    pub templates: Vec<TemplateConfig>,
}

impl UnitConfig {
    fn new(name: &str, quantity: usize, templates: &[(FuClass, u64, u64)]) -> Self {
        Self {
            name: name.to_string(),
            quantity,
            templates: templates
                .iter()
                .map(|&(class, op_latency, issue_latency)| TemplateConfig {
                    class,
                    op_latency,
                    issue_latency,
                })
                .collect(),
        }
    }
}

/// Functional-unit pool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourcesConfig {
    /// Unit groups.
    #[serde(default = "ResourcesConfig::default_units")]
    pub units: Vec<UnitConfig>,

    /// Dispatched-but-not-completed operations allowed per class.
    #[serde(default = "ResourcesConfig::default_class_quota")]
    pub class_quota: usize,
}

impl ResourcesConfig {
    /// The classic four-wide out-of-order unit mix.
    fn default_units() -> Vec<UnitConfig> {
        vec![
            UnitConfig::new("integer-ALU", 4, &[(FuClass::IntAlu, 1, 1)]),
            UnitConfig::new(
                "integer-MULT/DIV",
                1,
                &[(FuClass::IntMult, 3, 1), (FuClass::IntDiv, 20, 19)],
            ),
            UnitConfig::new(
                "memory-port",
                2,
                &[(FuClass::ReadPort, 1, 1), (FuClass::WritePort, 1, 1)],
            ),
            UnitConfig::new("FP-adder", 4, &[(FuClass::FpAdd, 2, 1)]),
            UnitConfig::new(
                "FP-MULT/DIV",
                1,
                &[(FuClass::FpMult, 4, 1), (FuClass::FpDiv, 12, 12)],
            ),
        ]
    }

    fn default_class_quota() -> usize {
        defaults::CLASS_QUOTA
    }
}

impl Default for ResourcesConfig {
    fn default() -> Self {
        Self {
            units: Self::default_units(),
            class_quota: defaults::CLASS_QUOTA,
        }
    }
}

fn nonzero(field: &'static str, value: usize) -> Result<(), ConfigError> {
    if value == 0 {
        Err(ConfigError::invalid(field, "must be non-zero"))
    } else {
        Ok(())
    }
}

impl Config {
    /// Parses a JSON configuration; absent fields take their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Json`] if the text is not a valid configuration.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Reads and parses a JSON configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, or
    /// [`ConfigError::Json`] if it does not parse.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text)
    }

    /// Checks every constraint the engine relies on.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let c = &self.core;
        nonzero("core.ruu_size", c.ruu_size)?;
        nonzero("core.lsq_size", c.lsq_size)?;
        nonzero("core.fetch_queue_size", c.fetch_queue_size)?;
        nonzero("core.fetch_width", c.fetch_width)?;
        nonzero("core.decode_width", c.decode_width)?;
        nonzero("core.issue_width", c.issue_width)?;
        nonzero("core.int_issue_width", c.int_issue_width)?;
        nonzero("core.fp_issue_width", c.fp_issue_width)?;
        nonzero("core.commit_width", c.commit_width)?;
        if c.link_pool_size < c.ruu_size + c.lsq_size {
            return Err(ConfigError::invalid(
                "core.link_pool_size",
                "must cover at least one link per slot",
            ));
        }

        let m = &self.multipath;
        if !(1..=MAX_THREADS).contains(&m.max_threads) {
            return Err(ConfigError::invalid(
                "multipath.max_threads",
                format!("must be in 1..={MAX_THREADS}"),
            ));
        }
        if !(1..=MAX_SPEC_LEVELS).contains(&m.max_spec_levels) {
            return Err(ConfigError::invalid(
                "multipath.max_spec_levels",
                format!("must be in 1..={MAX_SPEC_LEVELS}"),
            ));
        }
        if m.squash_remove && m.max_threads > 1 {
            return Err(ConfigError::invalid(
                "multipath.squash_remove",
                "compaction would reorder other paths; requires max_threads = 1",
            ));
        }
        nonzero("multipath.max_forks_per_cycle", m.max_forks_per_cycle)?;

        let p = &self.predictor;
        if p.kind == PredictorKind::GShare && !(1..=24).contains(&p.table_bits) {
            return Err(ConfigError::invalid("predictor.table_bits", "must be in 1..=24"));
        }
        if p.history_bits > 63 {
            return Err(ConfigError::invalid("predictor.history_bits", "must be below 64"));
        }

        let conf = &self.confidence;
        if matches!(
            conf.kind,
            ConfidenceKind::Ones | ConfidenceKind::Saturating | ConfidenceKind::Resetting
        ) {
            nonzero("confidence.table_size", conf.table_size)?;
            if !(1..=16).contains(&conf.entry_bits) {
                return Err(ConfigError::invalid("confidence.entry_bits", "must be in 1..=16"));
            }
            if conf.thresholds.is_empty() {
                return Err(ConfigError::invalid(
                    "confidence.thresholds",
                    "counter estimators need at least one threshold",
                ));
            }
            if conf.thresholds.len() > 1 && conf.selector == ThresholdSelector::None {
                return Err(ConfigError::invalid(
                    "confidence.selector",
                    "more than one threshold requires a threshold selector",
                ));
            }
        }

        let mem = &self.memory;
        if mem.cache_enabled {
            nonzero("memory.line_bytes", mem.line_bytes)?;
            nonzero("memory.ways", mem.ways)?;
            if !mem.line_bytes.is_power_of_two() {
                return Err(ConfigError::invalid("memory.line_bytes", "must be a power of two"));
            }
            let set_bytes = mem.line_bytes * mem.ways;
            if mem.size_bytes < set_bytes || mem.size_bytes % set_bytes != 0 {
                return Err(ConfigError::invalid(
                    "memory.size_bytes",
                    "must be a non-zero multiple of line_bytes * ways",
                ));
            }
        }

        let r = &self.resources;
        nonzero("resources.class_quota", r.class_quota)?;
        for class in FuClass::ALL {
            let served = r.units.iter().any(|u| {
                u.quantity > 0 && u.templates.iter().any(|t| t.class == class)
            });
            if !served {
                return Err(ConfigError::invalid(
                    "resources.units",
                    format!("no unit serves class {class}"),
                ));
            }
        }
        for unit in &r.units {
            if unit.templates.iter().any(|t| t.op_latency == 0 || t.issue_latency == 0) {
                return Err(ConfigError::invalid(
                    "resources.units",
                    format!("unit '{}' has a zero latency", unit.name),
                ));
            }
        }
        Ok(())
    }
}
