//! # Engine Testing Library
//!
//! Central entry point for the engine test suite. Shared utilities live in
//! `common`; the tests themselves are grouped by concern under `unit`.

/// Shared test infrastructure.
///
/// - **Harness**: A `TestContext` that assembles a program, builds a simulator
///   with the commit log enabled, and checks runs against the interpreter.
/// - **Mocks**: `mockall` stand-ins for the predictor, confidence estimator and
///   memory hierarchy.
pub mod common;

/// Unit and scenario tests for the engine.
pub mod unit;
