//! Branch confidence estimation.
//!
//! A confidence estimator decides, per conditional branch, whether the direction
//! prediction is trustworthy. Low-confidence branches are the candidates for
//! forking a second path. Implementations:
//! 1. **Never:** Always high confidence; the core never forks.
//! 2. **Naive:** Always low confidence; the core forks whenever it can.
//! 3. **Ones:** Per-entry shift register of recent correct/incorrect outcomes;
//!    confidence is its population count.
//! 4. **Saturating:** Signed up/down counter.
//! 5. **Resetting:** Counter incremented on a correct prediction and cleared on
//!    a misprediction.
//!
//! Table-based estimators optionally XOR global branch history into the index and
//! may pick their threshold from the number of free path contexts.

use serde::Serialize;

use crate::config::{ConfidenceConfig, ConfidenceKind, ThresholdSelector};

/// Confidence verdict for one branch.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize)]
pub enum Confidence {
    /// Trust the prediction.
    #[default]
    High,
    /// Consider following both sides.
    Low,
}

/// Trait for branch confidence estimators.
pub trait ConfidencePredictor {
    /// Estimates confidence for the branch at `pc`.
    ///
    /// `free_contexts` is the number of unused path records; estimators with a
    /// hardware threshold selector grow more eager as it rises.
    fn predict(&mut self, pc: u64, free_contexts: usize) -> Confidence;

    /// Trains the estimator with a resolved branch.
    fn update(&mut self, pc: u64, taken: bool, correct: bool, predicted: Confidence);
}

/// Always high confidence.
#[derive(Clone, Copy, Debug, Default)]
pub struct NeverConfidence;

impl ConfidencePredictor for NeverConfidence {
    fn predict(&mut self, _: u64, _: usize) -> Confidence {
        Confidence::High
    }

    fn update(&mut self, _: u64, _: bool, _: bool, _: Confidence) {}
}

/// Always low confidence.
#[derive(Clone, Copy, Debug, Default)]
pub struct NaiveConfidence;

impl ConfidencePredictor for NaiveConfidence {
    fn predict(&mut self, _: u64, _: usize) -> Confidence {
        Confidence::Low
    }

    fn update(&mut self, _: u64, _: bool, _: bool, _: Confidence) {}
}

/// Entry interpretation of a table-based estimator.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Counter {
    Ones { mask: u32 },
    Saturating { min: i32, max: i32 },
    Resetting { max: i32 },
}

/// Table of per-branch confidence entries.
#[derive(Clone, Debug)]
pub struct TableConfidence {
    counter: Counter,
    table: Vec<i32>,
    thresholds: Vec<i32>,
    selector: ThresholdSelector,
    gshare: bool,
    ghr: u64,
}

impl TableConfidence {
    /// Builds a table estimator; `kind` must be a counter kind.
    pub fn new(config: &ConfidenceConfig) -> Self {
        let bits = config.entry_bits.clamp(1, 16);
        let counter = match config.kind {
            ConfidenceKind::Ones => Counter::Ones {
                mask: (1u32 << bits) - 1,
            },
            ConfidenceKind::Saturating => {
                let min = -(1i32 << (bits - 1));
                Counter::Saturating { min, max: -(1 + min) }
            }
            _ => Counter::Resetting {
                max: (1i32 << bits) - 1,
            },
        };
        Self {
            counter,
            table: vec![0; config.table_size.max(1)],
            thresholds: config.thresholds.clone(),
            selector: config.selector,
            gshare: config.gshare,
            ghr: 0,
        }
    }

    fn index(&self, pc: u64) -> usize {
        let key = if self.gshare { (pc >> 2) ^ self.ghr } else { pc >> 2 };
        (key % self.table.len() as u64) as usize
    }

    fn value(&self, idx: usize) -> i32 {
        match self.counter {
            Counter::Ones { mask } => (self.table[idx] as u32 & mask).count_ones() as i32,
            _ => self.table[idx],
        }
    }

    /// Threshold in force, or `None` when no context is free to fork into.
    fn threshold(&self, free_contexts: usize) -> Option<i32> {
        match self.selector {
            ThresholdSelector::None => self.thresholds.first().copied(),
            ThresholdSelector::Hardware => {
                let pick = free_contexts.checked_sub(1)?;
                let last = self.thresholds.len().checked_sub(1)?;
                self.thresholds.get(pick.min(last)).copied()
            }
        }
    }
}

impl ConfidencePredictor for TableConfidence {
    fn predict(&mut self, pc: u64, free_contexts: usize) -> Confidence {
        let val = self.value(self.index(pc));
        match self.threshold(free_contexts) {
            Some(thresh) if val < thresh => Confidence::Low,
            _ => Confidence::High,
        }
    }

    fn update(&mut self, pc: u64, taken: bool, correct: bool, _predicted: Confidence) {
        let idx = self.index(pc);
        let entry = &mut self.table[idx];
        *entry = match self.counter {
            Counter::Ones { mask } => ((((*entry as u32) << 1) | u32::from(correct)) & mask) as i32,
            Counter::Saturating { min, max } => {
                if correct {
                    (*entry + 1).min(max)
                } else {
                    (*entry - 1).max(min)
                }
            }
            Counter::Resetting { max } => {
                if correct {
                    (*entry + 1).min(max)
                } else {
                    0
                }
            }
        };
        if self.gshare {
            self.ghr = (self.ghr << 1) | u64::from(taken);
        }
    }
}

/// Enum wrapper for static dispatch of confidence estimators.
#[derive(Clone, Debug)]
pub enum ConfidenceWrapper {
    /// Always high confidence.
    Never(NeverConfidence),
    /// Always low confidence.
    Naive(NaiveConfidence),
    /// Table-based counter estimator.
    Table(TableConfidence),
}

impl ConfidenceWrapper {
    /// Creates the estimator selected by the configuration.
    pub fn new(config: &ConfidenceConfig) -> Self {
        match config.kind {
            ConfidenceKind::Never => Self::Never(NeverConfidence),
            ConfidenceKind::Naive => Self::Naive(NaiveConfidence),
            ConfidenceKind::Ones | ConfidenceKind::Saturating | ConfidenceKind::Resetting => {
                Self::Table(TableConfidence::new(config))
            }
        }
    }
}

impl ConfidencePredictor for ConfidenceWrapper {
    #[inline]
    fn predict(&mut self, pc: u64, free_contexts: usize) -> Confidence {
        match self {
            Self::Never(c) => c.predict(pc, free_contexts),
            Self::Naive(c) => c.predict(pc, free_contexts),
            Self::Table(c) => c.predict(pc, free_contexts),
        }
    }

    #[inline]
    fn update(&mut self, pc: u64, taken: bool, correct: bool, predicted: Confidence) {
        match self {
            Self::Never(c) => c.update(pc, taken, correct, predicted),
            Self::Naive(c) => c.update(pc, taken, correct, predicted),
            Self::Table(c) => c.update(pc, taken, correct, predicted),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(kind: ConfidenceKind, bits: u32, thresholds: Vec<i32>) -> ConfidenceWrapper {
        ConfidenceWrapper::new(&ConfidenceConfig {
            kind,
            table_size: 16,
            entry_bits: bits,
            thresholds,
            ..ConfidenceConfig::default()
        })
    }

    #[test]
    fn test_resetting_clears_on_mispredict() {
        let mut c = table(ConfidenceKind::Resetting, 3, vec![2]);
        assert_eq!(c.predict(0x40, 1), Confidence::Low);
        c.update(0x40, true, true, Confidence::Low);
        c.update(0x40, true, true, Confidence::Low);
        assert_eq!(c.predict(0x40, 1), Confidence::High);
        c.update(0x40, true, false, Confidence::High);
        assert_eq!(c.predict(0x40, 1), Confidence::Low);
    }

    #[test]
    fn test_ones_counts_recent_hits() {
        let mut c = table(ConfidenceKind::Ones, 4, vec![3]);
        for correct in [true, true, false, true] {
            c.update(0x80, true, correct, Confidence::High);
        }
        assert_eq!(c.predict(0x80, 1), Confidence::High);
        c.update(0x80, true, false, Confidence::High);
        assert_eq!(c.predict(0x80, 1), Confidence::Low);
    }

    #[test]
    fn test_saturating_bounds() {
        let mut c = table(ConfidenceKind::Saturating, 2, vec![1]);
        for _ in 0..10 {
            c.update(0x10, false, true, Confidence::High);
        }
        assert_eq!(c.predict(0x10, 1), Confidence::High);
        // Counter saturates at 1; two misses bring it to -1.
        c.update(0x10, false, false, Confidence::High);
        c.update(0x10, false, false, Confidence::High);
        assert_eq!(c.predict(0x10, 1), Confidence::Low);
    }

    #[test]
    fn test_hardware_selector_uses_free_contexts() {
        let mut c = ConfidenceWrapper::new(&ConfidenceConfig {
            kind: ConfidenceKind::Resetting,
            table_size: 16,
            entry_bits: 4,
            thresholds: vec![1, 4],
            selector: ThresholdSelector::Hardware,
            gshare: false,
        });
        c.update(0x20, true, true, Confidence::High);
        c.update(0x20, true, true, Confidence::High);
        assert_eq!(c.predict(0x20, 0), Confidence::High);
        assert_eq!(c.predict(0x20, 1), Confidence::High);
        assert_eq!(c.predict(0x20, 3), Confidence::Low);
    }

    #[test]
    fn test_fixed_estimators() {
        assert_eq!(NeverConfidence.predict(0, 8), Confidence::High);
        assert_eq!(NaiveConfidence.predict(0, 0), Confidence::Low);
    }
}
