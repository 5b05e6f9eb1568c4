//! Umbrella package for workspace-level integration tests.

pub use textserve_embedding as embedding;
pub use textserve_loader as loader;
