//! # Textserve Loader
//!
//! Once-per-instance setup for the textserve serving core: compute kind and
//! device/precision resolution, plus resolution of pretrained artifact
//! identifiers (HuggingFace repositories or local folders) to files on disk.

pub mod error;
pub mod huggingface;
pub mod loader;
pub mod retry;
pub mod types;

// Re-export main types for convenience
pub use error::LoaderError;
pub use loader::ArtifactLoader;
pub use types::{
    ArtifactSource, ComputeKind, Device, ExecutionTarget, InstanceConfig, Precision,
    ResolvedArtifact, RetryConfig,
};
