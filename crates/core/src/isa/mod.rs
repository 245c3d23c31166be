//! Toy instruction set.
//!
//! A compact load/store ISA sufficient to exercise the scheduling engine:
//! 1. **Opcodes:** Static behaviour tables (unit class, memory shape, control kind).
//! 2. **Instructions:** Decoded operands and the memory-op operand split.
//! 3. **Semantics:** Pure functional execution against a register/memory view.
//! 4. **Assembler:** Text source with labels and data directives.

/// Text assembler.
pub mod asm;

/// Functional semantics.
pub mod exec;

/// Decoded instruction representation.
pub mod instruction;

/// Opcodes and functional-unit classes.
pub mod opcode;

pub use exec::{ExecContext, Outcome, execute};
pub use instruction::Instruction;
pub use opcode::{FuClass, Opcode};
