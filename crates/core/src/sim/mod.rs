//! Simulation harness.
//!
//! This module ties the engine to its inputs and run limits:
//! 1. **Program:** Program images, loaded from assembly or JSON, plus the
//!    reference interpreter that defines their architectural behaviour.
//! 2. **Simulator:** The run loop with cycle and instruction limits.

/// Program images and the reference interpreter.
pub mod program;

/// Top-level run driver.
pub mod simulator;
