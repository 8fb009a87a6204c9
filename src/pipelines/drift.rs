//! Scheduled CloudFormation drift detection
//!
//! Each stage gets one job that assumes the stage role, runs `detect-drift`
//! over its stacks and optionally counts stack resources afterwards. The
//! helper binaries come from the `projen-pipelines` dev dependency.

use crate::core::stage::{job_slug, Runner};
use crate::error::{Result, ValidationError};
use crate::pipelines::{JobGraph, PipelineGenerator, ProjectSettings};
use crate::project::{Project, Task};
use crate::steps::drift::{DEFAULT_DRIFT_TIMEOUT_MINUTES, DEFAULT_RESOURCE_WARNING_THRESHOLD};
use crate::steps::{AssumeRoleStep, DriftDetectionStep, ResourceCountStep, StepSequence};
use crate::workflow::github::node_preamble;
use crate::workflow::gitlab::ON_SCHEDULE;
use crate::workflow::{GitlabCi, GitlabJob, Job, Triggers, Workflow};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, info};

pub const GITHUB_WORKFLOW: &str = ".github/workflows/drift-detection.yml";
pub const HELPER_PACKAGE: &str = "projen-pipelines";

const GITLAB_STAGE: &str = "drift";

fn default_schedule() -> String {
    "0 0 * * *".to_string()
}

fn default_timeout() -> u32 {
    DEFAULT_DRIFT_TIMEOUT_MINUTES
}

fn default_threshold() -> u32 {
    DEFAULT_RESOURCE_WARNING_THRESHOLD
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriftStageConfig {
    pub name: String,
    pub region: String,

    #[serde(default)]
    pub stacks: Vec<String>,

    #[serde(default)]
    pub role_arn: Option<String>,

    #[serde(default = "default_timeout")]
    pub timeout_minutes: u32,

    #[serde(default = "default_true")]
    pub fail_on_drift: bool,

    /// Also report stacks approaching the CloudFormation resource limit
    #[serde(default)]
    pub count_resources: bool,

    #[serde(default = "default_threshold")]
    pub warning_threshold: u32,

    #[serde(default)]
    pub runner: Option<Runner>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriftDetectionOptions {
    /// Cron expression, UTC
    #[serde(default = "default_schedule")]
    pub schedule: String,

    #[serde(default)]
    pub runner: Option<Runner>,

    #[serde(default)]
    pub stages: Vec<DriftStageConfig>,
}

#[derive(Debug, Clone)]
pub struct DriftDetectionPipeline {
    options: DriftDetectionOptions,
    settings: ProjectSettings,
}

impl DriftDetectionPipeline {
    pub fn new(options: DriftDetectionOptions, settings: ProjectSettings) -> std::result::Result<Self, ValidationError> {
        if options.stages.is_empty() {
            return Err(ValidationError::NoStages);
        }
        if options.schedule.split_whitespace().count() != 5 {
            return Err(ValidationError::InvalidOption {
                option: "driftDetection.schedule".to_string(),
                reason: format!("'{}' is not a five-field cron expression", options.schedule),
            });
        }

        let mut seen = HashSet::new();
        for stage in &options.stages {
            if !seen.insert(job_slug(&stage.name)) {
                return Err(ValidationError::DuplicateStage(stage.name.clone()));
            }
            if stage.stacks.is_empty() {
                return Err(ValidationError::NoDriftStacks(stage.name.clone()));
            }
        }

        debug!("Drift detection on '{}' for {} stage(s)", options.schedule, options.stages.len());
        Ok(Self { options, settings })
    }

    fn job_id(stage: &DriftStageConfig) -> String {
        format!("drift-{}", job_slug(&stage.name))
    }

    fn detection(stage: &DriftStageConfig) -> DriftDetectionStep {
        let mut step = DriftDetectionStep::new(stage.region.as_str(), stage.stacks.iter().cloned());
        step.timeout_minutes = stage.timeout_minutes;
        step.fail_on_drift = stage.fail_on_drift;
        step
    }

    pub fn stage_steps(&self, stage: &DriftStageConfig) -> StepSequence {
        let mut steps = StepSequence::new();
        if let Some(role) = &stage.role_arn {
            steps.push(AssumeRoleStep::new(role.as_str(), stage.region.as_str()).with_session_name("drift-detection"));
        }
        steps.push(Self::detection(stage));

        if stage.count_resources {
            let mut count = ResourceCountStep::new(stage.region.as_str(), stage.stacks.iter().cloned());
            count.warning_threshold = stage.warning_threshold;
            count.output_file = Some(format!("resource-count-{}.json", job_slug(&stage.name)));
            steps.push(count);
        }
        steps
    }

    fn graph(&self) -> std::result::Result<JobGraph, ValidationError> {
        let mut graph = JobGraph::new();
        for stage in &self.options.stages {
            graph.add(Self::job_id(stage), Vec::<String>::new())?;
        }
        graph.validate()?;
        Ok(graph)
    }
}

impl PipelineGenerator for DriftDetectionPipeline {
    fn name(&self) -> &'static str {
        "drift detection"
    }

    fn register(&self, project: &mut Project) -> Result<()> {
        project.add_dev_dependency(HELPER_PACKAGE);
        for stage in &self.options.stages {
            project.add_task(
                Task::new(format!("drift:{}", job_slug(&stage.name)))
                    .describe(format!("Detect drift in the {} stage", stage.name))
                    .exec(Self::detection(stage).command()),
            )?;
        }
        Ok(())
    }

    fn github(&self, project: &mut Project) -> Result<()> {
        let graph = self.graph()?;
        let mut workflow = Workflow::new("drift-detection", Triggers::scheduled(&self.options.schedule));

        for stage in &self.options.stages {
            let runner = stage
                .runner
                .as_ref()
                .or(self.options.runner.as_ref())
                .unwrap_or(&self.settings.defaults.runner)
                .labels();
            let job = Job::from_steps(
                &runner,
                node_preamble(&self.settings.defaults.node_version),
                self.stage_steps(stage).to_github()?,
                Vec::<String>::new(),
            )?
            .named(format!("Drift detection {}", stage.name));
            workflow.add_job(Self::job_id(stage), job);
        }

        info!("Drift detection workflow with {} jobs", graph.len());
        project.add_yaml_file(GITHUB_WORKFLOW, &workflow)
    }

    fn gitlab(&self, ci: &mut GitlabCi) -> Result<()> {
        let graph = self.graph()?;
        for stage in &self.options.stages {
            let tags = stage.runner.as_ref().map(Runner::labels).unwrap_or_default();
            let job = GitlabJob::from_steps(GITLAB_STAGE, self.stage_steps(stage).to_gitlab()?, Vec::<String>::new())
                .with_tags(&tags)
                .only_if(ON_SCHEDULE);
            ci.add_job(Self::job_id(stage), job)?;
        }
        info!("Drift detection GitLab jobs: {}", graph.len());
        Ok(())
    }
}
