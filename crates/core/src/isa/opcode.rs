//! Opcodes and their static behaviour tables.
//!
//! Every per-opcode property the engine needs (functional-unit class, latency
//! class, memory-access shape, control-flow kind) is looked up here once at
//! decode time instead of being re-derived from flag bits in each stage.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Functional-unit class an operation executes on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum FuClass {
    /// Integer ALU (also resolves conditional branches and calls).
    IntAlu,
    /// Integer multiplier.
    IntMult,
    /// Integer divider.
    IntDiv,
    /// Floating-point adder.
    FpAdd,
    /// Floating-point multiplier.
    FpMult,
    /// Floating-point divider.
    FpDiv,
    /// Memory read port, used by loads at issue.
    ReadPort,
    /// Memory write port, used by stores at commit.
    WritePort,
}

impl FuClass {
    /// Every class, in table order.
    pub const ALL: [Self; 8] = [
        Self::IntAlu,
        Self::IntMult,
        Self::IntDiv,
        Self::FpAdd,
        Self::FpMult,
        Self::FpDiv,
        Self::ReadPort,
        Self::WritePort,
    ];

    /// Number of classes.
    pub const COUNT: usize = Self::ALL.len();

    /// Dense index for per-class tables.
    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// True for floating-point classes (counted against the FP issue width).
    pub const fn is_fp(self) -> bool {
        matches!(self, Self::FpAdd | Self::FpMult | Self::FpDiv)
    }
}

impl fmt::Display for FuClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::IntAlu => "int-alu",
            Self::IntMult => "int-mult",
            Self::IntDiv => "int-div",
            Self::FpAdd => "fp-add",
            Self::FpMult => "fp-mult",
            Self::FpDiv => "fp-div",
            Self::ReadPort => "read-port",
            Self::WritePort => "write-port",
        };
        f.write_str(name)
    }
}

/// Toy ISA opcodes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Opcode {
    /// No operation.
    #[default]
    Nop,
    /// `rd = rs1 + rs2`
    Add,
    /// `rd = rs1 - rs2`
    Sub,
    /// `rd = rs1 & rs2`
    And,
    /// `rd = rs1 | rs2`
    Or,
    /// `rd = rs1 ^ rs2`
    Xor,
    /// `rd = (rs1 < rs2) as signed`
    Slt,
    /// `rd = rs1 + imm`
    Addi,
    /// `rd = rs1 * rs2`
    Mul,
    /// `rd = rs1 / rs2` (signed; division by zero yields zero)
    Div,
    /// `fd = fs1 + fs2`
    Fadd,
    /// `fd = fs1 * fs2`
    Fmul,
    /// `fd = fs1 / fs2`
    Fdiv,
    /// `rd = mem[rs1 + imm]`
    Ld,
    /// `mem[rs1 + imm] = rs2`
    St,
    /// Branch if `rs1 == rs2`.
    Beq,
    /// Branch if `rs1 != rs2`.
    Bne,
    /// Branch if `rs1 < rs2` (signed).
    Blt,
    /// Branch if `rs1 >= rs2` (signed).
    Bge,
    /// Unconditional direct jump.
    J,
    /// Direct call; links the return address through `r31`.
    Call,
    /// Return through `r31`.
    Ret,
    /// Stops the run when committed.
    Halt,
}

/// Operand shape of an opcode, used by the assembler and disassembler.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Format {
    /// No operands.
    None,
    /// `rd, rs1, rs2`
    Reg3,
    /// `rd, rs1, imm`
    RegImm,
    /// `rd, imm(rs1)`
    Load,
    /// `rs2, imm(rs1)`
    Store,
    /// `rs1, rs2, target`
    Branch,
    /// `target`
    Jump,
}

impl Opcode {
    /// Every opcode, for table-driven tests.
    pub const ALL: [Self; 23] = [
        Self::Nop,
        Self::Add,
        Self::Sub,
        Self::And,
        Self::Or,
        Self::Xor,
        Self::Slt,
        Self::Addi,
        Self::Mul,
        Self::Div,
        Self::Fadd,
        Self::Fmul,
        Self::Fdiv,
        Self::Ld,
        Self::St,
        Self::Beq,
        Self::Bne,
        Self::Blt,
        Self::Bge,
        Self::J,
        Self::Call,
        Self::Ret,
        Self::Halt,
    ];

    /// Assembly mnemonic.
    pub const fn mnemonic(self) -> &'static str {
        match self {
            Self::Nop => "nop",
            Self::Add => "add",
            Self::Sub => "sub",
            Self::And => "and",
            Self::Or => "or",
            Self::Xor => "xor",
            Self::Slt => "slt",
            Self::Addi => "addi",
            Self::Mul => "mul",
            Self::Div => "div",
            Self::Fadd => "fadd",
            Self::Fmul => "fmul",
            Self::Fdiv => "fdiv",
            Self::Ld => "ld",
            Self::St => "st",
            Self::Beq => "beq",
            Self::Bne => "bne",
            Self::Blt => "blt",
            Self::Bge => "bge",
            Self::J => "j",
            Self::Call => "call",
            Self::Ret => "ret",
            Self::Halt => "halt",
        }
    }

    /// Operand shape.
    pub const fn format(self) -> Format {
        match self {
            Self::Nop | Self::Ret | Self::Halt => Format::None,
            Self::Add
            | Self::Sub
            | Self::And
            | Self::Or
            | Self::Xor
            | Self::Slt
            | Self::Mul
            | Self::Div
            | Self::Fadd
            | Self::Fmul
            | Self::Fdiv => Format::Reg3,
            Self::Addi => Format::RegImm,
            Self::Ld => Format::Load,
            Self::St => Format::Store,
            Self::Beq | Self::Bne | Self::Blt | Self::Bge => Format::Branch,
            Self::J | Self::Call => Format::Jump,
        }
    }

    /// Functional-unit class, or `None` for operations that need no unit.
    pub const fn fu_class(self) -> Option<FuClass> {
        match self {
            Self::Nop | Self::J | Self::Halt => None,
            Self::Add
            | Self::Sub
            | Self::And
            | Self::Or
            | Self::Xor
            | Self::Slt
            | Self::Addi
            | Self::Beq
            | Self::Bne
            | Self::Blt
            | Self::Bge
            | Self::Call
            | Self::Ret => Some(FuClass::IntAlu),
            Self::Mul => Some(FuClass::IntMult),
            Self::Div => Some(FuClass::IntDiv),
            Self::Fadd => Some(FuClass::FpAdd),
            Self::Fmul => Some(FuClass::FpMult),
            Self::Fdiv => Some(FuClass::FpDiv),
            Self::Ld => Some(FuClass::ReadPort),
            Self::St => Some(FuClass::WritePort),
        }
    }

    /// Load or store.
    pub const fn is_mem(self) -> bool {
        matches!(self, Self::Ld | Self::St)
    }

    /// Load.
    pub const fn is_load(self) -> bool {
        matches!(self, Self::Ld)
    }

    /// Store.
    pub const fn is_store(self) -> bool {
        matches!(self, Self::St)
    }

    /// Any instruction that may redirect control flow.
    pub const fn is_control(self) -> bool {
        matches!(
            self,
            Self::Beq | Self::Bne | Self::Blt | Self::Bge | Self::J | Self::Call | Self::Ret
        )
    }

    /// Conditional branch; the only kind that may fork.
    pub const fn is_cond_branch(self) -> bool {
        matches!(self, Self::Beq | Self::Bne | Self::Blt | Self::Bge)
    }

    /// Multi-cycle arithmetic, prioritised by the aggressive ready policy.
    pub const fn is_long_latency(self) -> bool {
        matches!(self, Self::Mul | Self::Div | Self::Fmul | Self::Fdiv)
    }

    /// Floating-point arithmetic.
    pub const fn is_fp(self) -> bool {
        matches!(self, Self::Fadd | Self::Fmul | Self::Fdiv)
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mnemonic())
    }
}

impl FromStr for Opcode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_ascii_lowercase();
        Self::ALL
            .iter()
            .copied()
            .find(|op| op.mnemonic() == lower)
            .ok_or_else(|| format!("unknown mnemonic '{s}'"))
    }
}
