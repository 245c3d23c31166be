//! GShare Branch Predictor.
//!
//! GShare correlates global branch history with the program counter using an XOR
//! hash. This allows the predictor to distinguish the same branch instruction
//! in different execution contexts.
//!
//! The history register is shifted when a branch is trained, not when it is
//! predicted, so wrong-path branches never pollute it. The table index computed
//! at lookup travels with the branch as its update token, so training hits the
//! counter that made the prediction even if history moved in between.

use super::BranchPredictor;
use super::branch_predictor::{Prediction, predict_target};
use super::ras::Ras;
use crate::config::PredictorConfig;
use crate::isa::Instruction;

/// GShare Predictor structure.
#[derive(Clone, Debug)]
pub struct GSharePredictor {
    /// Global History Register storing recent branch outcomes.
    ghr: u64,
    /// Mask keeping `history_bits` of history.
    history_mask: u64,
    /// Pattern History Table containing 2-bit saturating counters.
    pht: Vec<u8>,
}

impl GSharePredictor {
    /// Creates a new GShare Predictor from its configuration.
    pub fn new(config: &PredictorConfig) -> Self {
        Self {
            ghr: 0,
            history_mask: (1u64 << config.history_bits) - 1,
            pht: vec![1; 1 << config.table_bits],
        }
    }

    /// Calculates the index into the Pattern History Table.
    ///
    /// Computes the XOR of the PC (shifted) and the Global History Register.
    fn index(&self, pc: u64) -> usize {
        let mask = self.pht.len() as u64 - 1;
        (((pc >> 2) ^ self.ghr) & mask) as usize
    }

    /// Current global history, for tests and dumps.
    pub fn history(&self) -> u64 {
        self.ghr
    }
}

impl BranchPredictor for GSharePredictor {
    /// Predicts taken if the 2-bit counter at the hashed index is 2 or 3.
    fn lookup(&mut self, pc: u64, inst: &Instruction, ras: &mut Ras) -> Prediction {
        let idx = self.index(pc);
        let taken = self.pht[idx] >= 2;
        let recovery_token = ras.checkpoint();
        Prediction {
            predicted_pc: predict_target(pc, inst, taken, ras),
            update_token: idx as u64,
            recovery_token,
        }
    }

    /// Updates the counter chosen at lookup and shifts the outcome into history.
    fn update(
        &mut self,
        _pc: u64,
        _actual_next_pc: u64,
        taken: bool,
        _correct: bool,
        inst: &Instruction,
        update_token: u64,
    ) {
        if !inst.op.is_cond_branch() {
            return;
        }
        if let Some(counter) = self.pht.get_mut(update_token as usize) {
            if taken && *counter < 3 {
                *counter += 1;
            } else if !taken && *counter > 0 {
                *counter -= 1;
            }
        }
        self.ghr = ((self.ghr << 1) | u64::from(taken)) & self.history_mask;
    }
}
