//! Core domain models
//!
//! Project configuration, stages, registries, targets and the permission
//! model shared by every pipeline.

pub mod config;
pub mod permissions;
pub mod registry;
pub mod stage;
pub mod target;

pub use config::{Defaults, PackageManager, ProjectConfig, StepConfig};
pub use permissions::{merge_job_permissions, PermissionLevel, PermissionMap};
pub use registry::Registry;
pub use stage::{Environment, IamRoleConfig, ResolvedStage, Runner, StageConfig, StageKind};
pub use target::Target;
