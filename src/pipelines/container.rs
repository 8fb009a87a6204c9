//! Container image build and promotion pipeline
//!
//! `build` produces the image once (optionally scanned and described by an
//! SBOM) and hands it on as a tarball; `push-<stage>` jobs load it, tag it
//! for every registry of the stage and push, one stage after the other.

use crate::core::registry::Registry;
use crate::core::stage::Runner;
use crate::core::target::Target;
use crate::error::{Result, ValidationError};
use crate::pipelines::{JobGraph, PipelineGenerator, ProjectSettings};
use crate::project::{Project, Task};
use crate::steps::{
    AssumeRoleStep, CommandStep, DockerBuildStep, DockerPushStep, DockerTagStep,
    DownloadArtifactStep, EnvMap, ImageScanStep, RegistryLoginStep, SbomFormat, SbomStep,
    StepSequence, UploadArtifactStep,
};
use crate::workflow::github::checkout;
use crate::workflow::gitlab::on_branch;
use crate::workflow::{BashScript, GitlabCi, GitlabJob, Job, Triggers, Workflow};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, info};

pub const BUILD_JOB: &str = "build";
pub const GITHUB_WORKFLOW: &str = ".github/workflows/container.yml";
pub const BASH_SCRIPT: &str = "container.sh";

const IMAGE_ARTIFACT: &str = "container-image";
const IMAGE_TARBALL: &str = "image.tar";
const SBOM_ARTIFACT: &str = "sbom";

fn default_context() -> String {
    ".".to_string()
}

fn default_severities() -> Vec<String> {
    vec!["CRITICAL".to_string(), "HIGH".to_string()]
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanOptions {
    #[serde(default = "default_severities")]
    pub severities: Vec<String>,

    #[serde(default = "default_true")]
    pub fail_on_findings: bool,

    #[serde(default = "default_true")]
    pub ignore_unfixed: bool,

    /// Publish findings to GitHub code scanning
    #[serde(default)]
    pub upload_sarif: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerStageConfig {
    pub name: String,

    #[serde(default)]
    pub registries: Vec<Registry>,

    #[serde(default)]
    pub manual_approval: bool,

    /// Role assumed before logging in to ECR registries
    #[serde(default)]
    pub role_arn: Option<String>,

    #[serde(default)]
    pub runner: Option<Runner>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerPipelineOptions {
    pub image_name: String,

    #[serde(default = "default_context")]
    pub context: String,

    #[serde(default)]
    pub dockerfile: Option<String>,

    #[serde(default)]
    pub build_args: EnvMap,

    #[serde(default)]
    pub scan: Option<ScanOptions>,

    #[serde(default)]
    pub sbom: Option<SbomFormat>,

    #[serde(default)]
    pub runner: Option<Runner>,

    #[serde(default)]
    pub stages: Vec<ContainerStageConfig>,
}

#[derive(Debug, Clone)]
pub struct ContainerPipeline {
    options: ContainerPipelineOptions,
    settings: ProjectSettings,
}

impl ContainerPipeline {
    pub fn new(options: ContainerPipelineOptions, settings: ProjectSettings) -> std::result::Result<Self, ValidationError> {
        if options.stages.is_empty() {
            return Err(ValidationError::NoStages);
        }
        let mut seen = HashSet::new();
        for stage in &options.stages {
            if !seen.insert(stage.name.as_str()) {
                return Err(ValidationError::DuplicateStage(stage.name.clone()));
            }
            if stage.registries.is_empty() {
                return Err(ValidationError::NoRegistries(stage.name.clone()));
            }
            for registry in &stage.registries {
                registry.validate(&stage.name)?;
            }
        }

        debug!("Container pipeline for {}: {} stage(s)", options.image_name, options.stages.len());
        Ok(Self { options, settings })
    }

    /// Image tag expression of a target
    pub fn image_tag(target: Target) -> &'static str {
        match target {
            Target::Github => "${{ github.sha }}",
            Target::Gitlab => "$CI_COMMIT_SHA",
            Target::Bash | Target::CodeCatalyst => "$IMAGE_TAG",
        }
    }

    fn local_image(&self, tag: &str) -> String {
        format!("{}:{}", self.options.image_name, tag)
    }

    fn runner(&self, stage: Option<&ContainerStageConfig>) -> Vec<String> {
        stage
            .and_then(|s| s.runner.as_ref())
            .or(self.options.runner.as_ref())
            .unwrap_or(&self.settings.defaults.runner)
            .labels()
    }

    fn build_step(&self, tag: &str) -> DockerBuildStep {
        let mut build = DockerBuildStep::new(self.local_image(tag), self.options.context.as_str());
        build.dockerfile = self.options.dockerfile.clone();
        build.build_args = self.options.build_args.clone();
        build
    }

    pub fn build_steps(&self, tag: &str) -> StepSequence {
        let image = self.local_image(tag);
        let mut steps = StepSequence::new().then(self.build_step(tag));

        if let Some(scan) = &self.options.scan {
            let mut step = ImageScanStep::new(image.as_str());
            step.severities = scan.severities.clone();
            step.fail_on_findings = scan.fail_on_findings;
            step.ignore_unfixed = scan.ignore_unfixed;
            step.upload_sarif = scan.upload_sarif;
            steps.push(step);
        }
        if let Some(format) = self.options.sbom {
            let sbom = SbomStep::new(image.as_str(), format);
            let output = sbom.output_file.clone();
            steps.push(sbom);
            steps.push(UploadArtifactStep::new(SBOM_ARTIFACT, output));
        }

        steps.push(CommandStep::new([format!("docker save -o {} {}", IMAGE_TARBALL, image)]).named("Save image"));
        steps.push(UploadArtifactStep::new(IMAGE_ARTIFACT, IMAGE_TARBALL));
        steps
    }

    pub fn push_steps(&self, stage: &ContainerStageConfig, tag: &str) -> StepSequence {
        let local = self.local_image(tag);
        let mut steps = StepSequence::new()
            .then(DownloadArtifactStep::new(IMAGE_ARTIFACT, ".").from_job(BUILD_JOB))
            .then(CommandStep::new([format!("docker load -i {}", IMAGE_TARBALL)]).named("Load image"));

        let mut assumed = false;
        for registry in &stage.registries {
            if let (Some(role), Some(region), false) = (&stage.role_arn, registry.region(), assumed) {
                steps.push(AssumeRoleStep::new(role.as_str(), region));
                assumed = true;
            }
            let remote = registry.image_ref(tag);
            steps.push(RegistryLoginStep::new(registry.clone()));
            steps.push(DockerTagStep::new(local.as_str(), remote.as_str()));
            steps.push(DockerPushStep::new(remote));
        }
        steps
    }

    /// Push jobs in order, each needing the build and the previous push
    fn push_jobs(&self) -> Vec<(String, Vec<String>, &ContainerStageConfig)> {
        let mut previous: Option<String> = None;
        self.options
            .stages
            .iter()
            .map(|stage| {
                let id = format!("push-{}", crate::core::stage::job_slug(&stage.name));
                let mut needs = vec![BUILD_JOB.to_string()];
                needs.extend(previous.replace(id.clone()));
                (id, needs, stage)
            })
            .collect()
    }

    fn graph(&self) -> std::result::Result<JobGraph, ValidationError> {
        let mut graph = JobGraph::new();
        graph.add(BUILD_JOB, Vec::<String>::new())?;
        for (id, needs, _) in self.push_jobs() {
            graph.add(id, needs)?;
        }
        graph.validate()?;
        Ok(graph)
    }
}

impl PipelineGenerator for ContainerPipeline {
    fn name(&self) -> &'static str {
        "container"
    }

    fn register(&self, project: &mut Project) -> Result<()> {
        project.add_task(
            Task::new("container:build")
                .describe("Build the container image locally")
                .exec(self.build_step("local").command()),
        )
    }

    fn github(&self, project: &mut Project) -> Result<()> {
        let tag = Self::image_tag(Target::Github);
        let graph = self.graph()?;
        let mut workflow = Workflow::new("container", Triggers::push_to(&self.settings.defaults.branch));

        let build = Job::from_steps(
            &self.runner(None),
            vec![checkout()],
            self.build_steps(tag).to_github()?,
            Vec::<String>::new(),
        )?
        .named("Build image");
        workflow.add_job(BUILD_JOB, build);

        for (id, needs, stage) in self.push_jobs() {
            let mut job = Job::from_steps(&self.runner(Some(stage)), vec![], self.push_steps(stage, tag).to_github()?, needs)?
                .named(format!("Push to {}", stage.name));
            if stage.manual_approval {
                job = job.in_environment(stage.name.as_str());
            }
            workflow.add_job(id, job);
        }

        info!("Container workflow with {} jobs", graph.len());
        project.add_yaml_file(GITHUB_WORKFLOW, &workflow)
    }

    fn gitlab(&self, ci: &mut GitlabCi) -> Result<()> {
        let tag = Self::image_tag(Target::Gitlab);
        let graph = self.graph()?;
        let rule = on_branch(&self.settings.defaults.branch);

        let build =
            GitlabJob::from_steps("build", self.build_steps(tag).to_gitlab()?, Vec::<String>::new()).only_if(&rule);
        ci.add_job(BUILD_JOB, build)?;

        for (id, needs, stage) in self.push_jobs() {
            let mut job = GitlabJob::from_steps("push", self.push_steps(stage, tag).to_gitlab()?, needs)
                .in_environment(stage.name.as_str());
            if let Some(runner) = &stage.runner {
                job = job.with_tags(&runner.labels());
            }
            if stage.manual_approval {
                job = job.manual();
            }
            ci.add_job(id, job.only_if(&rule))?;
        }

        info!("Container GitLab jobs: {}", graph.len());
        Ok(())
    }

    fn bash(&self, project: &mut Project) -> Result<()> {
        let tag = Self::image_tag(Target::Bash);
        let graph = self.graph()?;
        let mut script = BashScript::new(format!("Container pipeline for {}", self.options.image_name));
        script
            .preamble
            .push("export IMAGE_TAG=\"${IMAGE_TAG:-$(git rev-parse --short HEAD)}\"".to_string());

        script.add_job(BUILD_JOB, self.build_steps(tag).to_bash()?, true);
        for (id, _, stage) in self.push_jobs() {
            script.add_job(id, self.push_steps(stage, tag).to_bash()?, !stage.manual_approval);
        }
        script.set_default_order(&graph.execution_order()?);

        project.add_executable(BASH_SCRIPT, script.render())
    }
}
