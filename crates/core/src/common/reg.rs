//! Register names and the flat register file.
//!
//! Integer and floating-point registers share one namespace so that the ledger,
//! checkpoints and slots can index them uniformly. Floating-point values are stored
//! as raw `f64` bits.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::constants::{FP_REG_BASE, NUM_ARCH_REGS, NUM_REGS, REG_TMP};

/// A register in the unified namespace.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct Reg(pub u8);

impl Reg {
    /// The hardwired zero register.
    pub const ZERO: Self = Self(0);
    /// The internal address register.
    pub const TMP: Self = Self(REG_TMP as u8);

    /// Integer register `rN`.
    pub const fn int(n: u8) -> Self {
        Self(n)
    }

    /// Floating-point register `fN`.
    pub const fn fp(n: u8) -> Self {
        Self(FP_REG_BASE as u8 + n)
    }

    /// Index into register tables.
    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// Returns true for the hardwired zero register.
    #[inline]
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for Reg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let idx = self.index();
        if idx == REG_TMP {
            write!(f, "tmp")
        } else if idx >= FP_REG_BASE {
            write!(f, "f{}", idx - FP_REG_BASE)
        } else {
            write!(f, "r{idx}")
        }
    }
}

impl FromStr for Reg {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let mut chars = s.chars();
        let prefix = chars.next();
        let n: u8 = chars
            .as_str()
            .parse()
            .map_err(|_| format!("invalid register '{s}'"))?;
        if n as usize >= FP_REG_BASE {
            return Err(format!("register '{s}' out of range"));
        }
        match prefix {
            Some('r' | 'R' | 'x') => Ok(Self::int(n)),
            Some('f' | 'F') => Ok(Self::fp(n)),
            _ => Err(format!("invalid register '{s}'")),
        }
    }
}

/// Flat register file covering every register in the namespace.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RegisterFile {
    regs: [u64; NUM_REGS],
}

impl Default for RegisterFile {
    fn default() -> Self {
        Self::new()
    }
}

impl RegisterFile {
    /// Creates a register file with every register zero.
    pub const fn new() -> Self {
        Self {
            regs: [0; NUM_REGS],
        }
    }

    /// Reads a register. `r0` always reads zero.
    #[inline]
    pub fn read(&self, reg: Reg) -> u64 {
        if reg.is_zero() { 0 } else { self.regs[reg.index()] }
    }

    /// Writes a register. Writes to `r0` are ignored.
    #[inline]
    pub fn write(&mut self, reg: Reg, val: u64) {
        if !reg.is_zero() {
            self.regs[reg.index()] = val;
        }
    }

    /// Architectural registers only, for dumps and comparisons.
    pub fn arch(&self) -> &[u64] {
        &self.regs[..NUM_ARCH_REGS]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_register_ignores_writes() {
        let mut rf = RegisterFile::new();
        rf.write(Reg::ZERO, 99);
        assert_eq!(rf.read(Reg::ZERO), 0);
    }

    #[test]
    fn test_parse_and_display() {
        assert_eq!("r5".parse::<Reg>(), Ok(Reg::int(5)));
        assert_eq!("f2".parse::<Reg>(), Ok(Reg::fp(2)));
        assert!("r32".parse::<Reg>().is_err());
        assert!("q1".parse::<Reg>().is_err());
        assert_eq!(Reg::fp(3).to_string(), "f3");
        assert_eq!(Reg::TMP.to_string(), "tmp");
    }
}
