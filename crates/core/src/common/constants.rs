//! Global simulator constants.
//!
//! Architectural register counts, internal register numbering, and the static
//! limits that configuration is validated against.

/// Number of architectural registers (`r0`-`r31` followed by `f0`-`f31`).
pub const NUM_ARCH_REGS: usize = 64;

/// Index of the first floating-point register.
pub const FP_REG_BASE: usize = 32;

/// Internal register carrying an effective address from an address slot to its
/// memory-op slot. Never visible to programs.
pub const REG_TMP: usize = NUM_ARCH_REGS;

/// Total register namespace tracked by the ledger and register files.
pub const NUM_REGS: usize = NUM_ARCH_REGS + 1;

/// Link register written by `call` and read by `ret`.
pub const LINK_REG: usize = 31;

/// Size of one instruction in bytes.
pub const INST_BYTES: u64 = 4;

/// Size of one memory word in bytes; all loads and stores move one word.
pub const WORD_BYTES: u64 = 8;

/// Maximum input operands of one slot.
pub const MAX_INPUTS: usize = 3;

/// Maximum output operands of one slot.
pub const MAX_OUTPUTS: usize = 2;

/// Width of a fork-ancestry bitmap; bounds the live branch window of one path.
pub const ANCESTRY_BITS: u64 = 64;

/// Statically provisioned thread/path records.
pub const MAX_THREADS: usize = 64;

/// Statically provisioned speculative levels per thread.
pub const MAX_SPEC_LEVELS: usize = 32;

/// Aligns a byte address down to its memory word.
#[inline]
pub const fn word_addr(addr: u64) -> u64 {
    addr & !(WORD_BYTES - 1)
}
