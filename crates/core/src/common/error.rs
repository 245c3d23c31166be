//! Error definitions.
//!
//! Three classes of failure exist in the simulator:
//! 1. **Invariant violations:** corrupted scheduling state. Fatal; the run stops and
//!    the driver prints a machine-state dump.
//! 2. **Configuration errors:** rejected before the first cycle.
//! 3. **Program errors:** the input program could not be read or assembled.
//!
//! Capacity exhaustion (full pools, busy units, no free thread record) is not an
//! error at all: stages count it and retry on the next cycle.

use std::path::PathBuf;

use thiserror::Error;

use super::Cycle;

/// Top-level simulator error.
#[derive(Debug, Error)]
pub enum SimError {
    /// Scheduling state is inconsistent; indicates a logic defect.
    #[error("invariant violation at cycle {cycle}: {detail}")]
    Invariant {
        /// Cycle at which the violation was detected.
        cycle: Cycle,
        /// Human-readable description.
        detail: String,
    },

    /// The configuration was rejected.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The program could not be loaded.
    #[error(transparent)]
    Program(#[from] ProgramError),
}

impl SimError {
    /// Builds an invariant violation.
    pub fn invariant(cycle: Cycle, detail: impl Into<String>) -> Self {
        Self::Invariant {
            cycle,
            detail: detail.into(),
        }
    }

    /// Returns true if this error is an invariant violation.
    pub fn is_invariant(&self) -> bool {
        matches!(self, Self::Invariant { .. })
    }
}

/// Configuration rejected at setup time.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A field holds a value outside its permitted range.
    #[error("invalid value for `{field}`: {reason}")]
    Invalid {
        /// Dotted path of the offending field.
        field: &'static str,
        /// Why the value was rejected.
        reason: String,
    },

    /// Configuration file could not be read.
    #[error("cannot read config {path}: {source}")]
    Io {
        /// File path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Configuration JSON is malformed.
    #[error("malformed config: {0}")]
    Json(#[from] serde_json::Error),
}

impl ConfigError {
    /// Builds an `Invalid` error.
    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field,
            reason: reason.into(),
        }
    }
}

/// Program loading or assembly failure.
#[derive(Debug, Error)]
pub enum ProgramError {
    /// Program file could not be read.
    #[error("cannot read program {path}: {source}")]
    Io {
        /// File path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// JSON program image is malformed.
    #[error("malformed program image: {0}")]
    Json(#[from] serde_json::Error),

    /// Assembly source line could not be parsed.
    #[error("line {line}: {message}")]
    Syntax {
        /// 1-based source line.
        line: usize,
        /// What went wrong.
        message: String,
    },

    /// A branch or call names a label that is never defined.
    #[error("undefined label `{0}`")]
    UndefinedLabel(String),

    /// The program contains no instructions.
    #[error("program is empty")]
    Empty,
}
