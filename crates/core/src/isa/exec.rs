//! Functional semantics.
//!
//! `execute` is pure: it reads registers and memory through an [`ExecContext`] and
//! reports what the instruction would write. Dispatch applies the outcome to the
//! owning path's speculative view; the reference interpreter applies it to flat
//! architectural state.

use super::instruction::Instruction;
use super::opcode::Opcode;
use crate::common::Reg;
use crate::common::constants::{INST_BYTES, LINK_REG, word_addr};

/// Read access to one path's register and memory state.
pub trait ExecContext {
    /// Current value of a register.
    fn reg(&self, reg: Reg) -> u64;
    /// Current value of the memory word containing `addr`.
    fn load(&self, addr: u64) -> u64;
}

/// Result of functionally executing one instruction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct Outcome {
    /// Address of the next instruction on the architecturally correct path.
    pub next_pc: u64,
    /// Conditional branch direction; `true` for unconditional transfers.
    pub taken: bool,
    /// Register write, if any.
    pub result: Option<(Reg, u64)>,
    /// Word-aligned effective address of a memory op.
    pub addr: Option<u64>,
    /// Value written by a store.
    pub store_value: Option<u64>,
}

#[inline]
fn fp(bits: u64) -> f64 {
    f64::from_bits(bits)
}

/// Executes `inst` at `pc` against `ctx`.
pub fn execute(inst: &Instruction, pc: u64, ctx: &impl ExecContext) -> Outcome {
    let fallthrough = pc.wrapping_add(INST_BYTES);
    let a = ctx.reg(inst.rs1);
    let b = ctx.reg(inst.rs2);
    let mut out = Outcome {
        next_pc: fallthrough,
        ..Outcome::default()
    };

    let value = match inst.op {
        Opcode::Nop | Opcode::Halt => None,
        Opcode::Add => Some(a.wrapping_add(b)),
        Opcode::Sub => Some(a.wrapping_sub(b)),
        Opcode::And => Some(a & b),
        Opcode::Or => Some(a | b),
        Opcode::Xor => Some(a ^ b),
        Opcode::Slt => Some(u64::from((a as i64) < (b as i64))),
        Opcode::Addi => Some(a.wrapping_add_signed(inst.imm)),
        Opcode::Mul => Some(a.wrapping_mul(b)),
        Opcode::Div => Some(if b == 0 {
            0
        } else {
            (a as i64).wrapping_div(b as i64) as u64
        }),
        Opcode::Fadd => Some((fp(a) + fp(b)).to_bits()),
        Opcode::Fmul => Some((fp(a) * fp(b)).to_bits()),
        Opcode::Fdiv => Some((fp(a) / fp(b)).to_bits()),
        Opcode::Ld => {
            let addr = word_addr(a.wrapping_add_signed(inst.imm));
            out.addr = Some(addr);
            Some(ctx.load(addr))
        }
        Opcode::St => {
            out.addr = Some(word_addr(a.wrapping_add_signed(inst.imm)));
            out.store_value = Some(b);
            None
        }
        Opcode::Beq | Opcode::Bne | Opcode::Blt | Opcode::Bge => {
            let taken = match inst.op {
                Opcode::Beq => a == b,
                Opcode::Bne => a != b,
                Opcode::Blt => (a as i64) < (b as i64),
                _ => (a as i64) >= (b as i64),
            };
            out.taken = taken;
            if taken {
                out.next_pc = inst.target;
            }
            None
        }
        Opcode::J => {
            out.taken = true;
            out.next_pc = inst.target;
            None
        }
        Opcode::Call => {
            out.taken = true;
            out.next_pc = inst.target;
            Some(fallthrough)
        }
        Opcode::Ret => {
            out.taken = true;
            out.next_pc = ctx.reg(Reg(LINK_REG as u8));
            None
        }
    };

    out.result = match (inst.dest(), value) {
        (Some(rd), Some(v)) => Some((rd, v)),
        _ => None,
    };
    out
}
