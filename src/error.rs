//! Error types shared across the generator

use crate::core::permissions::PermissionError;
use crate::core::target::Target;
use crate::steps::StepError;
use crate::versioning::VersionError;
use thiserror::Error;

/// Construction-time validation failures; these abort synthesis before any file is written
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("At least one stage must be defined")]
    NoStages,

    #[error("Stage '{0}' must define at least one registry")]
    NoRegistries(String),

    #[error("ECR registry in stage '{0}' must specify a region")]
    EcrMissingRegion(String),

    #[error("Harbor registry in stage '{0}' must specify a url")]
    HarborMissingUrl(String),

    #[error("{registry} registry in stage '{stage}' must specify usernameSecret and passwordSecret")]
    MissingCredentials { registry: String, stage: String },

    #[error("Stage '{0}' requires manual approval, which needs pkgNamespace to publish the cloud assembly")]
    MissingPackageNamespace(String),

    #[error("Duplicate stage name: {0}")]
    DuplicateStage(String),

    #[error("Stage names '{first}' and '{second}' both map to the identifier '{identifier}'")]
    IdentifierCollision {
        first: String,
        second: String,
        identifier: String,
    },

    #[error("Stage name '{0}' contains no alphanumeric characters")]
    EmptyStageIdentifier(String),

    #[error("Job '{job}' needs unknown job '{needs}'")]
    UnknownNeed { job: String, needs: String },

    #[error("Duplicate job id: {0}")]
    DuplicateJob(String),

    #[error("Cycle detected in job graph involving '{0}'")]
    JobCycle(String),

    #[error("Drift detection stage '{0}' must list at least one stack")]
    NoDriftStacks(String),

    #[error("Invalid option '{option}': {reason}")]
    InvalidOption { option: String, reason: String },

    #[error(transparent)]
    Permission(#[from] PermissionError),
}

/// Everything that can stop a synthesis run
#[derive(Debug, Error)]
pub enum SynthError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Step(#[from] StepError),

    #[error(transparent)]
    Version(#[from] VersionError),

    #[error("{pipeline} pipeline cannot be generated for target {target}")]
    UnsupportedPipeline {
        pipeline: &'static str,
        target: Target,
    },

    #[error("File '{0}' is generated twice")]
    DuplicateFile(String),

    #[error("Task '{0}' is registered twice")]
    DuplicateTask(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, SynthError>;
