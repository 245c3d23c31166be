//! Program images.
//!
//! A [`Program`] is a flat list of decoded instructions placed at `base + 4·i`,
//! plus the initial register and memory contents. It is the engine's
//! [`InstructionSource`] and also carries the reference interpreter, which runs
//! the program in order with no timing and records every architectural write.
//! The engine's commit log must match that trace.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::common::constants::{INST_BYTES, word_addr};
use crate::common::{ProgramError, Reg, RegisterFile};
use crate::core::arch::CommitRecord;
use crate::core::units::InstructionSource;
use crate::isa::{ExecContext, Instruction, Opcode, asm, execute};

/// A loaded program.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Program {
    /// Address of the first instruction.
    #[serde(default)]
    pub base: u64,
    /// Initial register values by register number.
    #[serde(default)]
    pub registers: BTreeMap<u8, u64>,
    /// Initial memory words by byte address.
    #[serde(default)]
    pub memory: BTreeMap<u64, u64>,
    /// Instructions in address order.
    pub instructions: Vec<Instruction>,
}

/// Architectural behaviour of a program run to completion.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Trace {
    /// One record per executed instruction, in order.
    pub commits: Vec<CommitRecord>,
    /// Execution ended at `halt` rather than by leaving the program or the step limit.
    pub halted: bool,
    /// Final registers.
    pub regs: RegisterFile,
    /// Final memory, by word address.
    pub memory: HashMap<u64, u64>,
}

/// Flat state for the interpreter.
struct Flat<'a> {
    regs: &'a RegisterFile,
    memory: &'a HashMap<u64, u64>,
}

impl ExecContext for Flat<'_> {
    fn reg(&self, reg: Reg) -> u64 {
        self.regs.read(reg)
    }

    fn load(&self, addr: u64) -> u64 {
        self.memory.get(&addr).copied().unwrap_or(0)
    }
}

impl Program {
    /// Assembles a text program.
    ///
    /// # Errors
    ///
    /// Returns the assembler's error for malformed source.
    pub fn from_asm(source: &str) -> Result<Self, ProgramError> {
        asm::assemble(source)
    }

    /// Parses a JSON program image.
    ///
    /// # Errors
    ///
    /// Returns [`ProgramError::Json`] if the text does not parse, or
    /// [`ProgramError::Empty`] if it holds no instructions.
    pub fn from_json(json: &str) -> Result<Self, ProgramError> {
        let program: Self = serde_json::from_str(json)?;
        if program.instructions.is_empty() {
            return Err(ProgramError::Empty);
        }
        Ok(program)
    }

    /// Loads a program file: `.json` images are parsed, anything else is assembled.
    ///
    /// # Errors
    ///
    /// Returns [`ProgramError::Io`] if the file cannot be read, otherwise the
    /// parser's error.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ProgramError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ProgramError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        if path.extension().is_some_and(|e| e.eq_ignore_ascii_case("json")) {
            Self::from_json(&text)
        } else {
            Self::from_asm(&text)
        }
    }

    /// Instruction at `pc`.
    pub fn get(&self, pc: u64) -> Option<Instruction> {
        let offset = pc.checked_sub(self.base)?;
        if offset % INST_BYTES != 0 {
            return None;
        }
        self.instructions.get((offset / INST_BYTES) as usize).copied()
    }

    /// Address one past the last instruction.
    pub fn end(&self) -> u64 {
        self.base + self.instructions.len() as u64 * INST_BYTES
    }

    /// Runs the program in order for at most `max_steps` instructions.
    pub fn interpret(&self, max_steps: usize) -> Trace {
        let mut regs = RegisterFile::new();
        for (&r, &v) in &self.registers {
            regs.write(Reg(r), v);
        }
        let mut memory: HashMap<u64, u64> = self
            .memory
            .iter()
            .map(|(&a, &v)| (word_addr(a), v))
            .collect();

        let mut trace = Trace::default();
        let mut pc = self.base;
        for _ in 0..max_steps {
            let Some(inst) = self.get(pc) else {
                break;
            };
            let out = execute(
                &inst,
                pc,
                &Flat {
                    regs: &regs,
                    memory: &memory,
                },
            );
            if let Some((reg, value)) = out.result {
                regs.write(reg, value);
            }
            let mem_write = out.addr.zip(out.store_value);
            if let Some((addr, value)) = mem_write {
                let _ = memory.insert(addr, value);
            }
            trace.commits.push(CommitRecord {
                pc,
                reg_write: out.result,
                mem_write,
            });
            if inst.op == Opcode::Halt {
                trace.halted = true;
                break;
            }
            pc = out.next_pc;
        }
        trace.regs = regs;
        trace.memory = memory;
        trace
    }
}

impl InstructionSource for Program {
    fn fetch(&self, pc: u64) -> Option<Instruction> {
        self.get(pc)
    }
}
