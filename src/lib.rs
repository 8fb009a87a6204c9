//! pipegen - CI/CD pipeline generator for GitHub Actions, GitLab CI, bash and CodeCatalyst

pub mod cli;
pub mod codegen;
pub mod core;
pub mod error;
pub mod pipelines;
pub mod project;
pub mod steps;
pub mod versioning;
pub mod workflow;

// Re-export commonly used types
pub use crate::core::{ProjectConfig, Target};
pub use error::{Result, SynthError, ValidationError};
pub use pipelines::{synthesize, PipelineGenerator};
pub use project::{FsOutput, InMemoryOutput, OutputBackend, Project};
pub use steps::{PipelineStep, StepSequence};
pub use versioning::{GitInfo, VersionInfo, VersioningStrategy};
