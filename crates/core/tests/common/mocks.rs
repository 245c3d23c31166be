use mockall::mock;
use mpsim_core::common::Cycle;
use mpsim_core::common::constants::INST_BYTES;
use mpsim_core::core::units::bru::{BranchPredictor, Confidence, ConfidencePredictor, Prediction, Ras};
use mpsim_core::core::units::cache::{MemCmd, MemoryHierarchy};
use mpsim_core::isa::Instruction;

mock! {
    pub Predictor {}
    impl BranchPredictor for Predictor {
        fn lookup(&mut self, pc: u64, inst: &Instruction, ras: &mut Ras) -> Prediction;
        fn update(
            &mut self,
            pc: u64,
            actual_next_pc: u64,
            taken: bool,
            correct: bool,
            inst: &Instruction,
            update_token: u64,
        );
    }
}

mock! {
    pub Estimator {}
    impl ConfidencePredictor for Estimator {
        fn predict(&mut self, pc: u64, free_contexts: usize) -> Confidence;
        fn update(&mut self, pc: u64, taken: bool, correct: bool, predicted: Confidence);
    }
}

mock! {
    pub Memory {}
    impl MemoryHierarchy for Memory {
        fn access(&mut self, cmd: MemCmd, addr: u64, size: u64, now: Cycle) -> u64;
    }
}

/// Predicts every conditional branch taken and everything else falling through.
pub fn taken_prediction(pc: u64, inst: &Instruction, _ras: &mut Ras) -> Prediction {
    let predicted_pc = if inst.op.is_cond_branch() {
        inst.target
    } else {
        pc + INST_BYTES
    };
    Prediction {
        predicted_pc,
        ..Prediction::default()
    }
}
