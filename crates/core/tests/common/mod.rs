/// Simulator harness.
pub mod harness;

/// Collaborator mocks.
pub mod mocks;
