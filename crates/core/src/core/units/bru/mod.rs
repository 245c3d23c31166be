//! Branch prediction unit (BRU) implementations.
//!
//! This module contains the branch direction predictors (static, always-taken,
//! gshare), the return address stack (RAS) they share, and the branch confidence
//! estimators that drive multipath forking.

pub use self::branch_predictor::{BranchPredictor, Prediction};
pub use self::confidence::{Confidence, ConfidencePredictor, ConfidenceWrapper};
pub use self::ras::{Ras, RasCheckpoint};

/// Branch predictor trait and common functionality.
pub mod branch_predictor;

/// Branch confidence estimators.
pub mod confidence;

/// Global history branch predictor (gshare algorithm).
pub mod gshare;

/// Return Address Stack for predicting return addresses.
pub mod ras;

/// Static branch predictors (always not-taken, always taken).
pub mod static_bp;

use self::gshare::GSharePredictor;
use self::static_bp::{StaticPredictor, TakenPredictor};
use crate::config::{PredictorConfig, PredictorKind};
use crate::isa::Instruction;

/// Enum wrapper for static dispatch of Branch Predictors.
/// This avoids vtable lookups in the critical fetch loop.
#[derive(Clone, Debug)]
pub enum PredictorWrapper {
    /// Always not-taken.
    Static(StaticPredictor),
    /// Always taken.
    Taken(TakenPredictor),
    /// Global-history predictor.
    GShare(GSharePredictor),
}

impl PredictorWrapper {
    /// Creates a new branch predictor wrapper based on configuration.
    pub fn new(config: &PredictorConfig) -> Self {
        match config.kind {
            PredictorKind::Static => Self::Static(StaticPredictor),
            PredictorKind::Taken => Self::Taken(TakenPredictor),
            PredictorKind::GShare => Self::GShare(GSharePredictor::new(config)),
        }
    }
}

impl BranchPredictor for PredictorWrapper {
    #[inline]
    fn lookup(&mut self, pc: u64, inst: &Instruction, ras: &mut Ras) -> Prediction {
        match self {
            Self::Static(bp) => bp.lookup(pc, inst, ras),
            Self::Taken(bp) => bp.lookup(pc, inst, ras),
            Self::GShare(bp) => bp.lookup(pc, inst, ras),
        }
    }

    #[inline]
    fn update(
        &mut self,
        pc: u64,
        actual_next_pc: u64,
        taken: bool,
        correct: bool,
        inst: &Instruction,
        update_token: u64,
    ) {
        match self {
            Self::Static(bp) => bp.update(pc, actual_next_pc, taken, correct, inst, update_token),
            Self::Taken(bp) => bp.update(pc, actual_next_pc, taken, correct, inst, update_token),
            Self::GShare(bp) => bp.update(pc, actual_next_pc, taken, correct, inst, update_token),
        }
    }

    #[inline]
    fn recover_return_stack(
        &mut self,
        ras: &mut Ras,
        pc: u64,
        actual_next_pc: u64,
        inst: &Instruction,
        recovery_token: RasCheckpoint,
    ) {
        match self {
            Self::Static(bp) => {
                bp.recover_return_stack(ras, pc, actual_next_pc, inst, recovery_token);
            }
            Self::Taken(bp) => {
                bp.recover_return_stack(ras, pc, actual_next_pc, inst, recovery_token);
            }
            Self::GShare(bp) => {
                bp.recover_return_stack(ras, pc, actual_next_pc, inst, recovery_token);
            }
        }
    }
}
