//! Branch Predictor Interface.
//!
//! This module defines the `BranchPredictor` trait that all branch prediction
//! implementations must adhere to. A lookup returns the predicted next PC together
//! with two opaque tokens: one the predictor wants back when it is trained, and a
//! return-stack checkpoint used to repair the RAS after a misprediction.

use serde::Serialize;

use super::ras::{Ras, RasCheckpoint};
use crate::common::constants::INST_BYTES;
use crate::isa::{Instruction, Opcode};

/// Result of a predictor lookup.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Prediction {
    /// Predicted address of the next instruction.
    pub predicted_pc: u64,
    /// Handed back to [`BranchPredictor::update`].
    pub update_token: u64,
    /// Handed back to [`BranchPredictor::recover_return_stack`].
    pub recovery_token: RasCheckpoint,
}

/// Trait for branch prediction algorithms.
///
/// The return-address stack is owned by the caller (one per path, or one shared)
/// and lent to the predictor for each lookup and repair.
pub trait BranchPredictor {
    /// Predicts the next PC after `inst` at `pc`.
    ///
    /// Calls push onto `ras` and returns pop from it; the returned recovery token
    /// undoes that.
    fn lookup(&mut self, pc: u64, inst: &Instruction, ras: &mut Ras) -> Prediction;

    /// Trains the predictor with a resolved outcome.
    ///
    /// # Arguments
    ///
    /// * `pc` - Program counter of the control instruction
    /// * `actual_next_pc` - Address actually executed next
    /// * `taken` - Resolved direction (always true for unconditional transfers)
    /// * `correct` - Whether the lookup predicted `actual_next_pc`
    /// * `inst` - The instruction
    /// * `update_token` - Token returned by the matching lookup
    fn update(
        &mut self,
        pc: u64,
        actual_next_pc: u64,
        taken: bool,
        correct: bool,
        inst: &Instruction,
        update_token: u64,
    );

    /// Repairs `ras` after the control instruction at `pc` resolved.
    ///
    /// Rolls back to the state before the lookup, then re-applies the
    /// instruction's own push or pop so the stack matches the correct path.
    fn recover_return_stack(
        &mut self,
        ras: &mut Ras,
        pc: u64,
        _actual_next_pc: u64,
        inst: &Instruction,
        recovery_token: RasCheckpoint,
    ) {
        ras.restore(recovery_token);
        match inst.op {
            Opcode::Call => ras.push(pc.wrapping_add(INST_BYTES)),
            Opcode::Ret => {
                let _ = ras.pop();
            }
            _ => {}
        }
    }
}

/// Predicted next PC given a direction guess for conditional branches.
///
/// Direct jumps and calls go to their target, returns to the top of `ras`
/// (falling through when it is empty). Updates `ras` for calls and returns.
pub fn predict_target(pc: u64, inst: &Instruction, taken: bool, ras: &mut Ras) -> u64 {
    let fallthrough = pc.wrapping_add(INST_BYTES);
    match inst.op {
        op if op.is_cond_branch() => {
            if taken {
                inst.target
            } else {
                fallthrough
            }
        }
        Opcode::J => inst.target,
        Opcode::Call => {
            ras.push(fallthrough);
            inst.target
        }
        Opcode::Ret => ras.pop().unwrap_or(fallthrough),
        _ => fallthrough,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::Reg;

    #[test]
    fn test_predict_target_by_kind() {
        let mut ras = Ras::new(4);
        let beq = Instruction::branch(Opcode::Beq, Reg::int(1), Reg::ZERO, 0x80);
        assert_eq!(predict_target(0x10, &beq, false, &mut ras), 0x14);
        assert_eq!(predict_target(0x10, &beq, true, &mut ras), 0x80);

        let call = Instruction::jump(Opcode::Call, 0x200);
        assert_eq!(predict_target(0x20, &call, true, &mut ras), 0x200);
        assert_eq!(predict_target(0x204, &Instruction::ret(), true, &mut ras), 0x24);
        assert_eq!(predict_target(0x208, &Instruction::ret(), true, &mut ras), 0x20c);
    }
}
