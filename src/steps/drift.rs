//! Drift detection and stack resource counting
//!
//! Both steps call helper binaries shipped alongside the generated project;
//! the generator only assembles their command lines.

use crate::steps::output::{
    BashStepConfig, CodeCatalystStepConfig, GithubStepConfig, GitlabStepConfig, JobStep,
};

pub const DEFAULT_DRIFT_TIMEOUT_MINUTES: u32 = 30;
pub const DEFAULT_RESOURCE_WARNING_THRESHOLD: u32 = 450;

/// Run `detect-drift` against a set of CloudFormation stacks
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriftDetectionStep {
    pub region: String,
    pub stacks: Vec<String>,
    pub timeout_minutes: u32,
    pub fail_on_drift: bool,
}

impl DriftDetectionStep {
    pub fn new<I, S>(region: impl Into<String>, stacks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            region: region.into(),
            stacks: stacks.into_iter().map(Into::into).collect(),
            timeout_minutes: DEFAULT_DRIFT_TIMEOUT_MINUTES,
            fail_on_drift: true,
        }
    }

    pub fn command(&self) -> String {
        let mut command = format!(
            "npx detect-drift --region {} --stacks {} --timeout {}",
            self.region,
            self.stacks.join(","),
            self.timeout_minutes
        );
        if !self.fail_on_drift {
            command.push_str(" --no-fail-on-drift");
        }
        command
    }

    pub(crate) fn to_github(&self) -> GithubStepConfig {
        GithubStepConfig {
            steps: vec![JobStep::run(
                Some(format!("Detect drift in {}", self.region)),
                self.command(),
            )],
            ..Default::default()
        }
    }

    pub(crate) fn to_gitlab(&self) -> GitlabStepConfig {
        GitlabStepConfig {
            commands: vec![self.command()],
            ..Default::default()
        }
    }

    pub(crate) fn to_bash(&self) -> BashStepConfig {
        BashStepConfig {
            commands: vec![self.command()],
        }
    }

    pub(crate) fn to_codecatalyst(&self) -> CodeCatalystStepConfig {
        CodeCatalystStepConfig {
            commands: vec![self.command()],
            ..Default::default()
        }
    }
}

/// Run `count-resources` and warn when stacks approach the CloudFormation limit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceCountStep {
    pub region: String,
    pub stacks: Vec<String>,
    pub warning_threshold: u32,
    pub output_file: Option<String>,
}

impl ResourceCountStep {
    pub fn new<I, S>(region: impl Into<String>, stacks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            region: region.into(),
            stacks: stacks.into_iter().map(Into::into).collect(),
            warning_threshold: DEFAULT_RESOURCE_WARNING_THRESHOLD,
            output_file: None,
        }
    }

    fn command(&self, github_summary: bool) -> String {
        let mut command = format!(
            "npx count-resources --region {} --stacks {} --warning-threshold {}",
            self.region,
            self.stacks.join(","),
            self.warning_threshold
        );
        if let Some(file) = &self.output_file {
            command.push_str(&format!(" --output-file {}", file));
        }
        if github_summary {
            command.push_str(" --github-summary");
        }
        command
    }

    pub(crate) fn to_github(&self) -> GithubStepConfig {
        GithubStepConfig {
            steps: vec![JobStep::run(
                Some("Count stack resources".to_string()),
                self.command(true),
            )],
            ..Default::default()
        }
    }

    pub(crate) fn to_gitlab(&self) -> GitlabStepConfig {
        let mut config = GitlabStepConfig {
            commands: vec![self.command(false)],
            ..Default::default()
        };
        config.artifacts.extend(self.output_file.clone());
        config
    }

    pub(crate) fn to_bash(&self) -> BashStepConfig {
        BashStepConfig {
            commands: vec![self.command(false)],
        }
    }

    pub(crate) fn to_codecatalyst(&self) -> CodeCatalystStepConfig {
        CodeCatalystStepConfig {
            commands: vec![self.command(false)],
            ..Default::default()
        }
    }
}
