//! Decoded instruction representation.
//!
//! Instructions are stored already decoded; there is no binary encoding. The
//! operand accessors here are what dispatch uses to wire the dependency ledger,
//! including the split of memory accesses into an address half and an access half.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::opcode::{Format, Opcode};
use crate::common::Reg;
use crate::common::constants::LINK_REG;

/// A decoded toy-ISA instruction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Instruction {
    /// Operation.
    pub op: Opcode,
    /// Destination register.
    #[serde(default)]
    pub rd: Reg,
    /// First source (base register for memory ops).
    #[serde(default)]
    pub rs1: Reg,
    /// Second source (data register for stores).
    #[serde(default)]
    pub rs2: Reg,
    /// Immediate or memory offset.
    #[serde(default)]
    pub imm: i64,
    /// Absolute target address for branches, jumps and calls.
    #[serde(default)]
    pub target: u64,
}

/// Link register as a [`Reg`].
const LINK: Reg = Reg(LINK_REG as u8);

/// Drops the zero register: it never has a producer.
const fn live(r: Reg) -> Option<Reg> {
    if r.is_zero() { None } else { Some(r) }
}

impl Instruction {
    /// A `nop`.
    pub const fn nop() -> Self {
        Self::with_op(Opcode::Nop)
    }

    /// A `halt`.
    pub const fn halt() -> Self {
        Self::with_op(Opcode::Halt)
    }

    /// A `ret`.
    pub const fn ret() -> Self {
        Self::with_op(Opcode::Ret)
    }

    const fn with_op(op: Opcode) -> Self {
        Self {
            op,
            rd: Reg::ZERO,
            rs1: Reg::ZERO,
            rs2: Reg::ZERO,
            imm: 0,
            target: 0,
        }
    }

    /// Three-register arithmetic.
    pub const fn reg3(op: Opcode, rd: Reg, rs1: Reg, rs2: Reg) -> Self {
        Self {
            rd,
            rs1,
            rs2,
            ..Self::with_op(op)
        }
    }

    /// `addi rd, rs1, imm`
    pub const fn addi(rd: Reg, rs1: Reg, imm: i64) -> Self {
        Self {
            rd,
            rs1,
            imm,
            ..Self::with_op(Opcode::Addi)
        }
    }

    /// `ld rd, offset(base)`
    pub const fn load(rd: Reg, base: Reg, offset: i64) -> Self {
        Self {
            rd,
            rs1: base,
            imm: offset,
            ..Self::with_op(Opcode::Ld)
        }
    }

    /// `st src, offset(base)`
    pub const fn store(src: Reg, base: Reg, offset: i64) -> Self {
        Self {
            rs1: base,
            rs2: src,
            imm: offset,
            ..Self::with_op(Opcode::St)
        }
    }

    /// Conditional branch to an absolute target.
    pub const fn branch(op: Opcode, rs1: Reg, rs2: Reg, target: u64) -> Self {
        Self {
            rs1,
            rs2,
            target,
            ..Self::with_op(op)
        }
    }

    /// `j target` or `call target`.
    pub const fn jump(op: Opcode, target: u64) -> Self {
        Self {
            target,
            ..Self::with_op(op)
        }
    }

    /// Register inputs of the whole instruction, excluding `r0`.
    ///
    /// For memory operations this is what the reference interpreter reads; the
    /// engine instead uses [`Self::address_sources`] and [`Self::access_sources`].
    pub fn sources(&self) -> [Option<Reg>; 2] {
        match self.op.format() {
            Format::Reg3 | Format::Branch | Format::Store => [live(self.rs1), live(self.rs2)],
            Format::RegImm | Format::Load => [live(self.rs1), None],
            Format::None if self.op == Opcode::Ret => [Some(LINK), None],
            Format::None | Format::Jump => [None, None],
        }
    }

    /// Inputs of the address-computation half of a memory op.
    pub fn address_sources(&self) -> [Option<Reg>; 2] {
        [live(self.rs1), None]
    }

    /// Inputs of the access half of a memory op: the address, then store data.
    pub fn access_sources(&self) -> [Option<Reg>; 2] {
        if self.op.is_store() {
            [Some(Reg::TMP), live(self.rs2)]
        } else {
            [Some(Reg::TMP), None]
        }
    }

    /// Architectural register written, if any.
    pub fn dest(&self) -> Option<Reg> {
        match self.op.format() {
            Format::Reg3 | Format::RegImm | Format::Load => live(self.rd),
            Format::Jump if self.op == Opcode::Call => Some(LINK),
            _ => None,
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let m = self.op.mnemonic();
        match self.op.format() {
            Format::None => write!(f, "{m}"),
            Format::Reg3 => write!(f, "{m} {}, {}, {}", self.rd, self.rs1, self.rs2),
            Format::RegImm => write!(f, "{m} {}, {}, {}", self.rd, self.rs1, self.imm),
            Format::Load => write!(f, "{m} {}, {}({})", self.rd, self.imm, self.rs1),
            Format::Store => write!(f, "{m} {}, {}({})", self.rs2, self.imm, self.rs1),
            Format::Branch => write!(f, "{m} {}, {}, {:#x}", self.rs1, self.rs2, self.target),
            Format::Jump => write!(f, "{m} {:#x}", self.target),
        }
    }
}
