//! Target document shapes
//!
//! Steps render into per-target step records; the types here assemble those
//! records into whole files: GitHub workflows, the GitLab pipeline, bash
//! scripts and CodeCatalyst workflows.

pub mod bash;
pub mod codecatalyst;
pub mod github;
pub mod gitlab;

pub use bash::BashScript;
pub use codecatalyst::{Action, CodeCatalystWorkflow, Trigger};
pub use github::{Job, Triggers, Workflow};
pub use gitlab::{GitlabCi, GitlabImage, GitlabJob};
