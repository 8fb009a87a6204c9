//! Terraform plan and apply pipeline
//!
//! One `validate` job gates everything. Each stage then gets a `plan-<stage>`
//! job, whose plan file is uploaded, and an `apply-<stage>` job that applies
//! exactly that plan after the previous stage has been applied.

use crate::core::stage::{job_slug, Runner};
use crate::error::{Result, ValidationError};
use crate::pipelines::{JobGraph, PipelineGenerator, ProjectSettings};
use crate::project::{Project, Task};
use crate::steps::{
    AssumeRoleStep, CommandStep, DownloadArtifactStep, JobStep, StepSequence, UploadArtifactStep,
};
use crate::workflow::github::{checkout, SETUP_TERRAFORM};
use crate::workflow::gitlab::on_branch;
use crate::workflow::{BashScript, GitlabCi, GitlabImage, GitlabJob, Job, Triggers, Workflow};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, info};

pub const VALIDATE_JOB: &str = "validate";
pub const GITHUB_WORKFLOW: &str = ".github/workflows/terraform.yml";
pub const BASH_SCRIPT: &str = "terraform.sh";

const GITLAB_IMAGE: &str = "hashicorp/terraform";

fn default_working_directory() -> String {
    ".".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TerraformStageConfig {
    pub name: String,

    /// Defaults to `<stage>.tfvars`
    #[serde(default)]
    pub var_file: Option<String>,

    #[serde(default)]
    pub workspace: Option<String>,

    #[serde(default)]
    pub region: Option<String>,

    #[serde(default)]
    pub role_arn: Option<String>,

    #[serde(default)]
    pub manual_approval: bool,

    #[serde(default)]
    pub runner: Option<Runner>,
}

impl TerraformStageConfig {
    fn var_file(&self) -> String {
        self.var_file
            .clone()
            .unwrap_or_else(|| format!("{}.tfvars", job_slug(&self.name)))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TerraformPipelineOptions {
    #[serde(default = "default_working_directory")]
    pub working_directory: String,

    /// Pinned CLI version; latest when unset
    #[serde(default)]
    pub terraform_version: Option<String>,

    #[serde(default)]
    pub runner: Option<Runner>,

    #[serde(default)]
    pub stages: Vec<TerraformStageConfig>,
}

#[derive(Debug, Clone)]
pub struct TerraformPipeline {
    options: TerraformPipelineOptions,
    settings: ProjectSettings,
}

impl TerraformPipeline {
    pub fn new(options: TerraformPipelineOptions, settings: ProjectSettings) -> std::result::Result<Self, ValidationError> {
        if options.stages.is_empty() {
            return Err(ValidationError::NoStages);
        }
        let mut seen = HashSet::new();
        for stage in &options.stages {
            if !seen.insert(job_slug(&stage.name)) {
                return Err(ValidationError::DuplicateStage(stage.name.clone()));
            }
            if stage.role_arn.is_some() && stage.region.is_none() {
                return Err(ValidationError::InvalidOption {
                    option: format!("terraform.stages.{}.region", stage.name),
                    reason: "required when roleArn is set".to_string(),
                });
            }
        }

        debug!("Terraform pipeline in {}: {} stage(s)", options.working_directory, options.stages.len());
        Ok(Self { options, settings })
    }

    fn terraform(&self, args: &str) -> String {
        format!("terraform -chdir={} {}", self.options.working_directory, args)
    }

    fn plan_file(stage: &TerraformStageConfig) -> String {
        format!("{}.tfplan", job_slug(&stage.name))
    }

    /// Plan file location relative to the repository root
    fn plan_path(&self, stage: &TerraformStageConfig) -> String {
        match self.options.working_directory.trim_end_matches('/') {
            "." | "" => Self::plan_file(stage),
            dir => format!("{}/{}", dir, Self::plan_file(stage)),
        }
    }

    fn runner(&self, stage: Option<&TerraformStageConfig>) -> Vec<String> {
        stage
            .and_then(|s| s.runner.as_ref())
            .or(self.options.runner.as_ref())
            .unwrap_or(&self.settings.defaults.runner)
            .labels()
    }

    pub fn validate_steps(&self) -> StepSequence {
        StepSequence::new().then(
            CommandStep::new([
                self.terraform("init -backend=false"),
                self.terraform("fmt -check -recursive"),
                self.terraform("validate"),
            ])
            .named("Validate"),
        )
    }

    /// Credentials, backend init and workspace selection shared by plan and apply
    fn prepare(&self, stage: &TerraformStageConfig) -> StepSequence {
        let mut steps = StepSequence::new();
        if let (Some(role), Some(region)) = (&stage.role_arn, &stage.region) {
            steps.push(AssumeRoleStep::new(role.as_str(), region.as_str()));
        }
        let mut init = vec![self.terraform("init -input=false")];
        if let Some(workspace) = &stage.workspace {
            init.push(self.terraform(&format!("workspace select -or-create {}", workspace)));
        }
        steps.push(CommandStep::new(init).named("Init"));
        steps
    }

    pub fn plan_steps(&self, stage: &TerraformStageConfig) -> StepSequence {
        let mut steps = self.prepare(stage);
        steps.push(
            CommandStep::new([self.terraform(&format!(
                "plan -input=false -var-file={} -out={}",
                stage.var_file(),
                Self::plan_file(stage)
            ))])
            .named(format!("Plan {}", stage.name)),
        );
        steps.push(UploadArtifactStep::new(plan_job(stage), self.plan_path(stage)));
        steps
    }

    pub fn apply_steps(&self, stage: &TerraformStageConfig) -> StepSequence {
        let mut steps = StepSequence::new().then(
            DownloadArtifactStep::new(plan_job(stage), self.options.working_directory.as_str())
                .from_job(plan_job(stage)),
        );
        steps.extend(self.prepare(stage).steps().iter().cloned());
        steps.push(
            CommandStep::new([self.terraform(&format!("apply -input=false {}", Self::plan_file(stage)))])
                .named(format!("Apply {}", stage.name)),
        );
        steps
    }

    /// Plan and apply job ids per stage, in stage order
    fn stage_jobs(&self) -> Vec<StageJobs<'_>> {
        let mut previous: Option<String> = None;
        self.options
            .stages
            .iter()
            .map(|stage| {
                let plan = plan_job(stage);
                let apply = format!("apply-{}", job_slug(&stage.name));
                let mut apply_needs = vec![plan.clone()];
                apply_needs.extend(previous.replace(apply.clone()));
                StageJobs {
                    plan,
                    apply,
                    apply_needs,
                    stage,
                }
            })
            .collect()
    }

    fn graph(&self) -> std::result::Result<JobGraph, ValidationError> {
        let mut graph = JobGraph::new();
        graph.add(VALIDATE_JOB, Vec::<String>::new())?;
        for jobs in self.stage_jobs() {
            graph.add(jobs.plan.clone(), [VALIDATE_JOB])?;
            graph.add(jobs.apply.clone(), jobs.apply_needs.clone())?;
        }
        graph.validate()?;
        Ok(graph)
    }

    fn github_preamble(&self) -> Vec<JobStep> {
        let mut setup = JobStep::uses("Setup Terraform", SETUP_TERRAFORM);
        if let Some(version) = &self.options.terraform_version {
            setup = setup.with("terraform_version", version.as_str());
        }
        vec![checkout(), setup]
    }

    fn gitlab_image(&self) -> GitlabImage {
        GitlabImage::WithEntrypoint {
            name: format!(
                "{}:{}",
                GITLAB_IMAGE,
                self.options.terraform_version.as_deref().unwrap_or("latest")
            ),
            entrypoint: vec![String::new()],
        }
    }
}

struct StageJobs<'a> {
    plan: String,
    apply: String,
    apply_needs: Vec<String>,
    stage: &'a TerraformStageConfig,
}

fn plan_job(stage: &TerraformStageConfig) -> String {
    format!("plan-{}", job_slug(&stage.name))
}

impl PipelineGenerator for TerraformPipeline {
    fn name(&self) -> &'static str {
        "terraform"
    }

    fn register(&self, project: &mut Project) -> Result<()> {
        let mut validate = Task::new("terraform:validate").describe("Validate the terraform configuration");
        for command in [
            self.terraform("init -backend=false"),
            self.terraform("fmt -check -recursive"),
            self.terraform("validate"),
        ] {
            validate = validate.exec(command);
        }
        project.add_task(validate)?;

        for stage in &self.options.stages {
            project.add_task(
                Task::new(format!("terraform:plan:{}", job_slug(&stage.name)))
                    .describe(format!("Plan the {} stage", stage.name))
                    .exec(self.terraform("init -input=false"))
                    .exec(self.terraform(&format!("plan -var-file={}", stage.var_file()))),
            )?;
        }
        Ok(())
    }

    fn github(&self, project: &mut Project) -> Result<()> {
        let graph = self.graph()?;
        let mut workflow =
            Workflow::new("terraform", Triggers::push_to(&self.settings.defaults.branch)).with_concurrency("terraform");

        workflow.add_job(
            VALIDATE_JOB,
            Job::from_steps(
                &self.runner(None),
                self.github_preamble(),
                self.validate_steps().to_github()?,
                Vec::<String>::new(),
            )?
            .named("Validate"),
        );

        for jobs in self.stage_jobs() {
            let runner = self.runner(Some(jobs.stage));
            let plan = Job::from_steps(
                &runner,
                self.github_preamble(),
                self.plan_steps(jobs.stage).to_github()?,
                [VALIDATE_JOB],
            )?
            .named(format!("Plan {}", jobs.stage.name));
            workflow.add_job(jobs.plan.clone(), plan);

            let mut apply = Job::from_steps(
                &runner,
                self.github_preamble(),
                self.apply_steps(jobs.stage).to_github()?,
                jobs.apply_needs.clone(),
            )?
            .named(format!("Apply {}", jobs.stage.name));
            if jobs.stage.manual_approval {
                apply = apply.in_environment(jobs.stage.name.as_str());
            }
            workflow.add_job(jobs.apply, apply);
        }

        info!("Terraform workflow with {} jobs", graph.len());
        project.add_yaml_file(GITHUB_WORKFLOW, &workflow)
    }

    fn gitlab(&self, ci: &mut GitlabCi) -> Result<()> {
        let graph = self.graph()?;
        let rule = on_branch(&self.settings.defaults.branch);

        let validate = GitlabJob::from_steps("validate", self.validate_steps().to_gitlab()?, Vec::<String>::new())
            .with_image(self.gitlab_image())
            .only_if(&rule);
        ci.add_job(VALIDATE_JOB, validate)?;

        for jobs in self.stage_jobs() {
            let tags = jobs.stage.runner.as_ref().map(Runner::labels).unwrap_or_default();
            let plan = GitlabJob::from_steps("plan", self.plan_steps(jobs.stage).to_gitlab()?, [VALIDATE_JOB])
                .with_image(self.gitlab_image())
                .with_tags(&tags)
                .only_if(&rule);
            ci.add_job(jobs.plan.clone(), plan)?;

            let mut apply = GitlabJob::from_steps("apply", self.apply_steps(jobs.stage).to_gitlab()?, jobs.apply_needs)
                .with_image(self.gitlab_image())
                .with_tags(&tags)
                .in_environment(jobs.stage.name.as_str());
            if jobs.stage.manual_approval {
                apply = apply.manual();
            }
            ci.add_job(jobs.apply, apply.only_if(&rule))?;
        }

        info!("Terraform GitLab jobs: {}", graph.len());
        Ok(())
    }

    fn bash(&self, project: &mut Project) -> Result<()> {
        let graph = self.graph()?;
        let mut script = BashScript::new("Terraform pipeline");

        script.add_job(VALIDATE_JOB, self.validate_steps().to_bash()?, true);
        for jobs in self.stage_jobs() {
            script.add_job(jobs.plan, self.plan_steps(jobs.stage).to_bash()?, true);
            script.add_job(
                jobs.apply,
                self.apply_steps(jobs.stage).to_bash()?,
                !jobs.stage.manual_approval,
            );
        }
        script.set_default_order(&graph.execution_order()?);

        project.add_executable(BASH_SCRIPT, script.render())
    }
}
