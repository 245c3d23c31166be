//! Static Branch Predictors.
//!
//! Fixed-direction policies for conditional branches. Direct jumps and calls
//! always go to their encoded target and returns use the return-address stack,
//! so only conditional branches can be mispredicted by direction.

use super::BranchPredictor;
use super::branch_predictor::{Prediction, predict_target};
use super::ras::Ras;
use crate::isa::Instruction;

/// Always predicts conditional branches not taken.
#[derive(Clone, Copy, Debug, Default)]
pub struct StaticPredictor;

/// Always predicts conditional branches taken.
#[derive(Clone, Copy, Debug, Default)]
pub struct TakenPredictor;

impl BranchPredictor for StaticPredictor {
    fn lookup(&mut self, pc: u64, inst: &Instruction, ras: &mut Ras) -> Prediction {
        let recovery_token = ras.checkpoint();
        Prediction {
            predicted_pc: predict_target(pc, inst, false, ras),
            update_token: 0,
            recovery_token,
        }
    }

    fn update(&mut self, _: u64, _: u64, _: bool, _: bool, _: &Instruction, _: u64) {}
}

impl BranchPredictor for TakenPredictor {
    fn lookup(&mut self, pc: u64, inst: &Instruction, ras: &mut Ras) -> Prediction {
        let recovery_token = ras.checkpoint();
        Prediction {
            predicted_pc: predict_target(pc, inst, true, ras),
            update_token: 0,
            recovery_token,
        }
    }

    fn update(&mut self, _: u64, _: u64, _: bool, _: bool, _: &Instruction, _: u64) {}
}
