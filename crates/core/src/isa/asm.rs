//! Two-pass assembler for the toy ISA.
//!
//! Source format, one statement per line:
//!
//! ```text
//! # comment
//! .base 0x100          # address of the first instruction (default 0)
//! .reg  r2 5           # initial register value (floats accepted for fN)
//! .word 0x1000 42      # initial memory word
//! loop: addi r1, r1, -1
//!       ld   r4, 8(r1)
//!       bne  r1, r0, loop
//!       halt
//! ```
//!
//! Branch, jump and call targets may be labels or absolute addresses.

use std::collections::HashMap;

use super::instruction::Instruction;
use super::opcode::{Format, Opcode};
use crate::common::constants::INST_BYTES;
use crate::common::{ProgramError, Reg};
use crate::sim::program::Program;

fn syntax(line: usize, message: impl Into<String>) -> ProgramError {
    ProgramError::Syntax {
        line,
        message: message.into(),
    }
}

fn parse_int(text: &str) -> Option<i64> {
    let (neg, digits) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text),
    };
    let magnitude = if let Some(hex) = digits
        .strip_prefix("0x")
        .or_else(|| digits.strip_prefix("0X"))
    {
        i64::from_str_radix(hex, 16).ok()?
    } else {
        digits.parse::<i64>().ok()?
    };
    Some(if neg { -magnitude } else { magnitude })
}

/// Register value literal: integers as-is, decimals as `f64` bits.
fn parse_value(text: &str) -> Option<u64> {
    if text.contains('.') && !text.starts_with("0x") {
        text.parse::<f64>().ok().map(f64::to_bits)
    } else {
        parse_int(text).map(|v| v as u64)
    }
}

fn parse_reg(line: usize, text: &str) -> Result<Reg, ProgramError> {
    text.parse::<Reg>().map_err(|e| syntax(line, e))
}

/// `imm(reg)` memory operand.
fn parse_mem(line: usize, text: &str) -> Result<(i64, Reg), ProgramError> {
    let open = text
        .find('(')
        .ok_or_else(|| syntax(line, format!("expected offset(base), got '{text}'")))?;
    let close = text
        .rfind(')')
        .filter(|&c| c > open)
        .ok_or_else(|| syntax(line, format!("unbalanced parentheses in '{text}'")))?;
    let offset_text = text[..open].trim();
    let offset = if offset_text.is_empty() {
        0
    } else {
        parse_int(offset_text)
            .ok_or_else(|| syntax(line, format!("invalid offset '{offset_text}'")))?
    };
    Ok((offset, parse_reg(line, &text[open + 1..close])?))
}

/// Statement left after the label pass; targets are resolved in the second pass.
struct Pending<'a> {
    line: usize,
    op: Opcode,
    operands: Vec<&'a str>,
}

fn resolve_target(
    line: usize,
    text: &str,
    labels: &HashMap<&str, u64>,
) -> Result<u64, ProgramError> {
    if let Some(&addr) = labels.get(text) {
        return Ok(addr);
    }
    match parse_int(text) {
        Some(addr) => Ok(addr as u64),
        None if text.chars().all(|c| c.is_alphanumeric() || c == '_') => {
            Err(ProgramError::UndefinedLabel(text.to_string()))
        }
        None => Err(syntax(line, format!("invalid target '{text}'"))),
    }
}

fn expect_operands(p: &Pending<'_>, n: usize) -> Result<(), ProgramError> {
    if p.operands.len() == n {
        Ok(())
    } else {
        Err(syntax(
            p.line,
            format!(
                "'{}' takes {n} operand(s), got {}",
                p.op,
                p.operands.len()
            ),
        ))
    }
}

fn encode(p: &Pending<'_>, labels: &HashMap<&str, u64>) -> Result<Instruction, ProgramError> {
    let line = p.line;
    let ops = &p.operands;
    let inst = match p.op.format() {
        Format::None => {
            expect_operands(p, 0)?;
            match p.op {
                Opcode::Ret => Instruction::ret(),
                Opcode::Halt => Instruction::halt(),
                _ => Instruction::nop(),
            }
        }
        Format::Reg3 => {
            expect_operands(p, 3)?;
            Instruction::reg3(
                p.op,
                parse_reg(line, ops[0])?,
                parse_reg(line, ops[1])?,
                parse_reg(line, ops[2])?,
            )
        }
        Format::RegImm => {
            expect_operands(p, 3)?;
            let imm = parse_int(ops[2])
                .ok_or_else(|| syntax(line, format!("invalid immediate '{}'", ops[2])))?;
            Instruction::addi(parse_reg(line, ops[0])?, parse_reg(line, ops[1])?, imm)
        }
        Format::Load => {
            expect_operands(p, 2)?;
            let (offset, base) = parse_mem(line, ops[1])?;
            Instruction::load(parse_reg(line, ops[0])?, base, offset)
        }
        Format::Store => {
            expect_operands(p, 2)?;
            let (offset, base) = parse_mem(line, ops[1])?;
            Instruction::store(parse_reg(line, ops[0])?, base, offset)
        }
        Format::Branch => {
            expect_operands(p, 3)?;
            Instruction::branch(
                p.op,
                parse_reg(line, ops[0])?,
                parse_reg(line, ops[1])?,
                resolve_target(line, ops[2], labels)?,
            )
        }
        Format::Jump => {
            expect_operands(p, 1)?;
            Instruction::jump(p.op, resolve_target(line, ops[0], labels)?)
        }
    };
    Ok(inst)
}

/// Assembles `source` into a program image.
///
/// # Errors
///
/// Returns [`ProgramError::Syntax`] for malformed lines,
/// [`ProgramError::UndefinedLabel`] for unresolved targets and
/// [`ProgramError::Empty`] if no instruction is present.
pub fn assemble(source: &str) -> Result<Program, ProgramError> {
    let mut program = Program::default();
    let mut labels: HashMap<&str, u64> = HashMap::new();
    let mut pending: Vec<Pending<'_>> = Vec::new();

    for (idx, raw) in source.lines().enumerate() {
        let line = idx + 1;
        let mut text = raw.split('#').next().unwrap_or("").trim();

        while let Some(colon) = text.find(':') {
            let label = text[..colon].trim();
            if label.is_empty() || label.contains(char::is_whitespace) {
                return Err(syntax(line, format!("invalid label '{label}'")));
            }
            let addr = program.base + pending.len() as u64 * INST_BYTES;
            if labels.insert(label, addr).is_some() {
                return Err(syntax(line, format!("duplicate label '{label}'")));
            }
            text = text[colon + 1..].trim();
        }
        if text.is_empty() {
            continue;
        }

        let (head, rest) = text.split_once(char::is_whitespace).unwrap_or((text, ""));
        let operands: Vec<&str> = rest
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect();

        if let Some(directive) = head.strip_prefix('.') {
            let args: Vec<&str> = rest.split_whitespace().collect();
            match (directive, args.as_slice()) {
                ("base", [addr]) => {
                    if !pending.is_empty() {
                        return Err(syntax(line, ".base must precede all instructions"));
                    }
                    program.base = parse_int(addr)
                        .ok_or_else(|| syntax(line, format!("invalid address '{addr}'")))?
                        as u64;
                }
                ("reg", [reg, value]) => {
                    let reg = parse_reg(line, reg)?;
                    let value = parse_value(value)
                        .ok_or_else(|| syntax(line, format!("invalid value '{value}'")))?;
                    program.registers.insert(reg.0, value);
                }
                ("word", [addr, value]) => {
                    let addr = parse_int(addr)
                        .ok_or_else(|| syntax(line, format!("invalid address '{addr}'")))?;
                    let value = parse_value(value)
                        .ok_or_else(|| syntax(line, format!("invalid value '{value}'")))?;
                    program.memory.insert(addr as u64, value);
                }
                _ => return Err(syntax(line, format!("malformed directive '{text}'"))),
            }
            continue;
        }

        let op = head.parse::<Opcode>().map_err(|e| syntax(line, e))?;
        pending.push(Pending { line, op, operands });
    }

    if pending.is_empty() {
        return Err(ProgramError::Empty);
    }
    program.instructions = pending
        .iter()
        .map(|p| encode(p, &labels))
        .collect::<Result<_, _>>()?;
    Ok(program)
}
