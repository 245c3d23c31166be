//! Set-Associative Cache Timing Model.
//!
//! This module implements the memory-hierarchy collaborator: a set-associative
//! write-back data cache with LRU replacement in front of a fixed-latency memory.
//! It models timing only; data values live in the engine's architectural state.
//!
//! Latencies returned by [`MemoryHierarchy::access`]:
//! - hit: `hit_latency`
//! - miss: `hit_latency + memory_latency`, plus another `memory_latency` when the
//!   victim line is dirty
//! - cache disabled: `memory_latency`

use crate::common::Cycle;
use crate::config::MemoryConfig;

/// Direction of a memory access.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MemCmd {
    /// Load.
    Read,
    /// Store.
    Write,
}

/// Cache/TLB hierarchy interface consumed by the engine.
pub trait MemoryHierarchy {
    /// Performs a timing access and returns its latency in cycles.
    fn access(&mut self, cmd: MemCmd, addr: u64, size: u64, now: Cycle) -> u64;

    /// Accesses and misses seen so far, if the model counts them.
    fn counters(&self) -> Option<(u64, u64)> {
        None
    }
}

/// Cache line entry containing tag, validity, and dirty bits.
#[derive(Clone, Copy, Debug, Default)]
struct CacheLine {
    tag: u64,
    valid: bool,
    dirty: bool,
}

/// Cache simulator implementing a set-associative cache with LRU replacement.
#[derive(Clone, Debug)]
pub struct CacheSim {
    enabled: bool,
    hit_latency: u64,
    memory_latency: u64,
    lines: Vec<CacheLine>,
    /// One usage stack per set; index 0 is MRU, the last index is LRU.
    usage: Vec<Vec<usize>>,
    num_sets: usize,
    ways: usize,
    line_bytes: usize,
    /// Accesses seen.
    pub accesses: u64,
    /// Accesses that missed.
    pub misses: u64,
}

impl CacheSim {
    /// Creates a new cache simulator with the specified configuration.
    pub fn new(config: &MemoryConfig) -> Self {
        let ways = config.ways.max(1);
        let line_bytes = config.line_bytes.max(1);
        let num_sets = (config.size_bytes / line_bytes / ways).max(1);

        Self {
            enabled: config.cache_enabled,
            hit_latency: config.hit_latency,
            memory_latency: config.memory_latency,
            lines: vec![CacheLine::default(); num_sets * ways],
            usage: (0..num_sets).map(|_| (0..ways).collect()).collect(),
            num_sets,
            ways,
            line_bytes,
            accesses: 0,
            misses: 0,
        }
    }

    fn locate(&self, addr: u64) -> (usize, u64) {
        let line = addr / self.line_bytes as u64;
        let set = (line % self.num_sets as u64) as usize;
        (set, line / self.num_sets as u64)
    }

    /// Moves `way` to the MRU position of `set`.
    fn touch(&mut self, set: usize, way: usize) {
        let stack = &mut self.usage[set];
        if let Some(pos) = stack.iter().position(|&x| x == way) {
            stack.remove(pos);
        }
        stack.insert(0, way);
    }

    /// Checks if the cache contains the specified address.
    pub fn contains(&self, addr: u64) -> bool {
        if !self.enabled {
            return false;
        }
        let (set, tag) = self.locate(addr);
        let base = set * self.ways;
        self.lines[base..base + self.ways]
            .iter()
            .any(|l| l.valid && l.tag == tag)
    }

    /// Installs the line for `addr`, returning the dirty-victim write-back penalty.
    fn install_line(&mut self, addr: u64, is_write: bool) -> u64 {
        let (set, tag) = self.locate(addr);
        let victim_way = self.usage[set].last().copied().unwrap_or(0);
        let victim = &mut self.lines[set * self.ways + victim_way];
        let penalty = if victim.valid && victim.dirty {
            self.memory_latency
        } else {
            0
        };
        *victim = CacheLine {
            tag,
            valid: true,
            dirty: is_write,
        };
        self.touch(set, victim_way);
        penalty
    }
}

impl MemoryHierarchy for CacheSim {
    fn access(&mut self, cmd: MemCmd, addr: u64, _size: u64, _now: Cycle) -> u64 {
        self.accesses += 1;
        if !self.enabled {
            self.misses += 1;
            return self.memory_latency;
        }

        let is_write = cmd == MemCmd::Write;
        let (set, tag) = self.locate(addr);
        let base = set * self.ways;
        let hit_way = (0..self.ways).find(|&w| {
            let line = &self.lines[base + w];
            line.valid && line.tag == tag
        });

        match hit_way {
            Some(way) => {
                if is_write {
                    self.lines[base + way].dirty = true;
                }
                self.touch(set, way);
                self.hit_latency
            }
            None => {
                self.misses += 1;
                let writeback = self.install_line(addr, is_write);
                self.hit_latency + self.memory_latency + writeback
            }
        }
    }

    fn counters(&self) -> Option<(u64, u64)> {
        Some((self.accesses, self.misses))
    }
}
