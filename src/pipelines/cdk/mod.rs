//! AWS CDK deployment pipeline
//!
//! Jobs: `synth` → `assetUpload` → one `deploy-<stage>` per automatic stage,
//! chained in declaration order. Stages with manual approval deploy from a
//! published cloud-assembly package in a separate release workflow.
//! Independent stages synthesize and deploy on their own, and the personal
//! and feature stages are ephemeral copies driven by `USER` and `BRANCH`.

mod app;
mod bash;
mod codecatalyst;
mod github;
mod gitlab;

use crate::core::config::StepConfig;
use crate::core::stage::{
    ensure_unique_identifiers, job_slug, steps_from_config, Environment, IamRoleConfig, ResolvedStage,
    Runner, StageConfig, StageKind,
};
use crate::error::{Result, ValidationError};
use crate::pipelines::{PipelineGenerator, ProjectSettings};
use crate::project::{Project, Task};
use crate::steps::{
    AssumeRoleStep, CommandStep, DownloadArtifactStep, ExportEnvStep, ScriptStep, StepSequence,
    UploadArtifactStep,
};
use crate::versioning::{GIT_FACT_EXPORTS, VERSION_FILE};
use crate::workflow::GitlabCi;
use serde::{Deserialize, Serialize};
use tracing::debug;

pub const SYNTH_JOB: &str = "synth";
pub const ASSET_JOB: &str = "assetUpload";
pub const ASSEMBLY_JOB: &str = "assemblyUpload";
pub const FEATURE_JOB: &str = "deploy-feature";

/// Artifact carrying the synthesized cloud assembly between jobs
pub const ASSEMBLY_ARTIFACT: &str = "cloud-assembly";

const SYNTH_TASK: &str = "synth:silent";
const PUBLISH_ASSETS_TASK: &str = "publish:assets";
const PUBLISH_ASSEMBLY_TASK: &str = "publish:assembly";
const FETCH_ASSEMBLY_TASK: &str = "assembly:fetch";
const VERSION_TASK: &str = "version:compute";

fn default_true() -> bool {
    true
}

/// Shape shared by the personal and feature stages
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EphemeralStageConfig {
    pub env: Environment,

    #[serde(default)]
    pub runner: Option<Runner>,

    #[serde(default)]
    pub deploy_role_arn: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CdkPipelineOptions {
    /// Prefix of every stack name, defaults to the project name
    #[serde(default)]
    pub stack_prefix: Option<String>,

    /// npm scope the cloud assembly is published under, e.g. `@acme`
    #[serde(default)]
    pub pkg_namespace: Option<String>,

    #[serde(default)]
    pub iam_role_arns: IamRoleConfig,

    #[serde(default)]
    pub stages: Vec<StageConfig>,

    #[serde(default)]
    pub independent_stages: Vec<StageConfig>,

    #[serde(default)]
    pub personal_stage: Option<EphemeralStageConfig>,

    #[serde(default)]
    pub feature_stages: Option<EphemeralStageConfig>,

    /// Runner of the jobs not tied to a stage
    #[serde(default)]
    pub runner: Option<Runner>,

    #[serde(default)]
    pub pre_install_steps: Vec<StepConfig>,

    #[serde(default)]
    pub pre_synth_steps: Vec<StepConfig>,

    #[serde(default)]
    pub post_synth_steps: Vec<StepConfig>,

    /// Generate `<srcDir>/app.ts`
    #[serde(default = "default_true")]
    pub app_entrypoint: bool,
}

#[derive(Debug, Clone)]
pub struct CdkPipeline {
    options: CdkPipelineOptions,
    settings: ProjectSettings,
    stack_prefix: String,
    stages: Vec<ResolvedStage>,
    independent: Vec<ResolvedStage>,
    personal: Option<ResolvedStage>,
    feature: Option<ResolvedStage>,
    pre_install: StepSequence,
    pre_synth: StepSequence,
    post_synth: StepSequence,
}

impl CdkPipeline {
    pub fn new(options: CdkPipelineOptions, settings: ProjectSettings) -> std::result::Result<Self, ValidationError> {
        let roles = &options.iam_role_arns;
        let defaults = &settings.defaults;
        let resolve = |configs: &[StageConfig], kind| -> std::result::Result<Vec<ResolvedStage>, ValidationError> {
            configs
                .iter()
                .map(|config| ResolvedStage::resolve(config, kind, roles, defaults))
                .collect()
        };

        let stages = resolve(&options.stages, StageKind::Pipeline)?;
        let independent = resolve(&options.independent_stages, StageKind::Independent)?;
        let personal = options
            .personal_stage
            .as_ref()
            .map(|c| ResolvedStage::resolve(&ephemeral("personal", c), StageKind::Personal, roles, defaults))
            .transpose()?;
        let feature = options
            .feature_stages
            .as_ref()
            .map(|c| ResolvedStage::resolve(&ephemeral("feature", c), StageKind::Feature, roles, defaults))
            .transpose()?;

        if options.pkg_namespace.is_none() {
            if let Some(stage) = stages.iter().find(|s| s.manual_approval) {
                return Err(ValidationError::MissingPackageNamespace(stage.name.clone()));
            }
        }
        ensure_unique_identifiers(
            stages
                .iter()
                .chain(&independent)
                .chain(personal.as_ref())
                .chain(feature.as_ref()),
        )?;

        let stack_prefix = options
            .stack_prefix
            .clone()
            .unwrap_or_else(|| settings.project_name.clone());

        debug!(
            "CDK pipeline '{}': {} stage(s), {} independent",
            stack_prefix,
            stages.len(),
            independent.len()
        );

        Ok(Self {
            pre_install: steps_from_config(&options.pre_install_steps, defaults),
            pre_synth: steps_from_config(&options.pre_synth_steps, defaults),
            post_synth: steps_from_config(&options.post_synth_steps, defaults),
            options,
            settings,
            stack_prefix,
            stages,
            independent,
            personal,
            feature,
        })
    }

    pub fn stack_name(&self, stage: &str) -> String {
        format!("{}-{}", self.stack_prefix, job_slug(stage))
    }

    /// Stages deployed by the main workflow, in order
    pub fn automatic_stages(&self) -> impl Iterator<Item = &ResolvedStage> {
        self.stages.iter().filter(|s| !s.manual_approval)
    }

    pub fn manual_stages(&self) -> impl Iterator<Item = &ResolvedStage> {
        self.stages.iter().filter(|s| s.manual_approval)
    }

    fn runner(&self) -> Vec<String> {
        self.options
            .runner
            .as_ref()
            .unwrap_or(&self.settings.defaults.runner)
            .labels()
    }

    fn has_manual_stages(&self) -> bool {
        self.stages.iter().any(|s| s.manual_approval)
    }

    /// Package name of the published cloud assembly
    fn assembly_package(&self) -> Option<String> {
        self.options
            .pkg_namespace
            .as_ref()
            .map(|ns| format!("{}/{}-cdk-assembly", ns, self.settings.project_name))
    }

    fn assembly_dir(&self) -> &str {
        &self.settings.defaults.cloud_assembly_dir
    }

    /// Region for jobs not tied to a stage
    fn pipeline_region(&self) -> String {
        self.stages
            .first()
            .or_else(|| self.independent.first())
            .map(|s| s.env.region.clone())
            .unwrap_or_else(|| "us-east-1".to_string())
    }

    fn script(&self, task: &str) -> ScriptStep {
        ScriptStep::new(self.settings.defaults.task_runner.as_str(), task)
    }

    fn assume_role(&self, role: Option<&String>, region: &str) -> Option<AssumeRoleStep> {
        let role = role?;
        let step = AssumeRoleStep::new(role.as_str(), region);
        Some(match &self.options.iam_role_arns.jump_role {
            Some(jump) => step.via_jump_role(jump.as_str()),
            None => step,
        })
    }

    fn install(&self) -> StepSequence {
        self.pre_install.clone().then(
            CommandStep::new([self.settings.package_manager.install_command()]).named("Install dependencies"),
        )
    }

    fn download_assembly(&self) -> DownloadArtifactStep {
        DownloadArtifactStep::new(ASSEMBLY_ARTIFACT, self.assembly_dir()).from_job(SYNTH_JOB)
    }

    /// `PIPELINE_VERSION` read back from the version record of the assembly
    fn export_version(&self) -> Option<ExportEnvStep> {
        if !self.settings.versioning_enabled() {
            return None;
        }
        Some(ExportEnvStep::new([(
            "PIPELINE_VERSION",
            format!(
                "$(node -p \"require('./{}/{}').version\")",
                self.assembly_dir(),
                VERSION_FILE
            ),
        )]))
    }

    /// `transport` adds artifact upload/download; CodeCatalyst moves
    /// artifacts through action inputs and outputs instead
    pub fn synth_steps(&self, transport: bool) -> StepSequence {
        let mut steps = self.install();
        steps.extend(self.pre_synth.steps().iter().cloned());
        if let Some(role) = self.assume_role(self.options.iam_role_arns.synth_role().as_ref(), &self.pipeline_region()) {
            steps.push(role);
        }
        steps.push(self.script(SYNTH_TASK));
        if let Some(versioning) = self.settings.versioning.as_ref().filter(|v| v.enabled) {
            steps.push(CommandStep::new([versioning.install_command.clone()]).named("Install pipegen"));
            steps.push(ExportEnvStep::new(GIT_FACT_EXPORTS));
            steps.push(self.script(VERSION_TASK));
        }
        steps.extend(self.post_synth.steps().iter().cloned());
        if transport {
            steps.push(UploadArtifactStep::new(ASSEMBLY_ARTIFACT, self.assembly_dir()));
        }
        steps
    }

    pub fn asset_steps(&self, transport: bool) -> StepSequence {
        let mut steps = StepSequence::new();
        if transport {
            steps.push(self.download_assembly());
        }
        steps.extend(self.install().steps().iter().cloned());
        for stage in &self.stages {
            if let Some(role) = self.assume_role(stage.asset_role.as_ref(), &stage.env.region) {
                steps.push(role);
            }
            steps.push(self.script(&stage_task(PUBLISH_ASSETS_TASK, stage)));
        }
        steps
    }

    pub fn deploy_steps(&self, stage: &ResolvedStage, transport: bool) -> StepSequence {
        let mut steps = StepSequence::new();
        if transport {
            steps.push(self.download_assembly());
        }
        steps.extend(self.install().steps().iter().cloned());
        if let Some(export) = self.export_version() {
            steps.push(export);
        }
        self.push_stage_deploy(&mut steps, stage);
        steps
    }

    pub fn assembly_steps(&self, transport: bool) -> StepSequence {
        let mut steps = StepSequence::new();
        if transport {
            steps.push(self.download_assembly());
        }
        steps.extend(self.install().steps().iter().cloned());
        if let Some(export) = self.export_version() {
            steps.push(export);
        }
        steps.push(self.script(PUBLISH_ASSEMBLY_TASK));
        steps
    }

    /// Deploy a manual stage from the published assembly `version`
    pub fn release_steps(&self, stage: &ResolvedStage, version: &str) -> StepSequence {
        let mut steps = self.install();
        steps.push(self.script(FETCH_ASSEMBLY_TASK).with_env("ASSEMBLY_VERSION", version));
        self.push_stage_deploy(&mut steps, stage);
        steps
    }

    pub fn independent_steps(&self, stage: &ResolvedStage) -> StepSequence {
        let mut steps = self.install();
        steps.extend(self.pre_synth.steps().iter().cloned());
        if let Some(role) = self.assume_role(stage.deploy_role.as_ref(), &stage.env.region) {
            steps.push(role);
        }
        steps.push(self.script(SYNTH_TASK));
        steps.extend(self.post_synth.steps().iter().cloned());
        steps.extend(stage.pre_deploy.steps().iter().cloned());
        steps.push(self.script(&stage_task("diff", stage)));
        steps.push(self.script(&stage_task("deploy", stage)));
        steps.extend(stage.post_deploy.steps().iter().cloned());
        steps
    }

    /// Feature deployment for the branch in `branch`
    pub fn feature_steps(&self, stage: &ResolvedStage, branch: &str) -> StepSequence {
        let mut steps = self.install();
        if let Some(role) = self.assume_role(stage.deploy_role.as_ref(), &stage.env.region) {
            steps.push(role);
        }
        steps.push(self.script("deploy:feature").with_env("BRANCH", branch));
        steps
    }

    fn push_stage_deploy(&self, steps: &mut StepSequence, stage: &ResolvedStage) {
        if let Some(role) = self.assume_role(stage.deploy_role.as_ref(), &stage.env.region) {
            steps.push(role);
        }
        steps.extend(stage.pre_deploy.steps().iter().cloned());
        steps.push(self.script(&stage_task("deploy", stage)));
        steps.extend(stage.post_deploy.steps().iter().cloned());
    }

    /// GitLab runner tags, only when the stage names a runner explicitly
    fn gitlab_tags(&self, stage: &ResolvedStage) -> Vec<String> {
        self.options
            .stages
            .iter()
            .chain(&self.options.independent_stages)
            .find(|c| c.name == stage.name)
            .and_then(|c| c.runner.as_ref())
            .map(Runner::labels)
            .unwrap_or_default()
    }

    fn cdk(&self, args: &str) -> String {
        format!("npx cdk {}", args)
    }

    fn stage_tasks(&self, stage: &ResolvedStage) -> Vec<Task> {
        let stack = self.stack_name(&stage.name);
        vec![
            Task::new(stage_task("deploy", stage))
                .describe(format!("Deploy stage {}", stage.name))
                .exec(self.cdk(&format!(
                    "--app {} --outputs-file cdk-outputs-{}.json --progress events --require-approval never deploy {}",
                    self.assembly_dir(),
                    job_slug(&stage.name),
                    stack
                ))),
            Task::new(stage_task("diff", stage))
                .describe(format!("Diff stage {}", stage.name))
                .exec(self.cdk(&format!("--app {} diff {}", self.assembly_dir(), stack))),
        ]
    }

    fn ephemeral_tasks(&self, stage: &ResolvedStage) -> Vec<Task> {
        let pattern = format!("'{}-{}-*'", self.stack_prefix, stage.name);
        let mut tasks = vec![
            Task::new(stage_task("deploy", stage))
                .describe(format!("Deploy the {} stage", stage.name))
                .exec(self.cdk(&format!("deploy --require-approval never {}", pattern))),
            Task::new(stage_task("diff", stage))
                .describe(format!("Diff the {} stage", stage.name))
                .exec(self.cdk(&format!("diff {}", pattern))),
            Task::new(stage_task("destroy", stage))
                .describe(format!("Destroy the {} stage", stage.name))
                .exec(self.cdk(&format!("destroy --force {}", pattern))),
        ];
        if stage.kind == StageKind::Personal {
            tasks.push(
                Task::new("watch:personal")
                    .describe("Hotswap the personal stage on every change")
                    .exec(self.cdk(&format!("deploy --watch --hotswap {}", pattern))),
            );
        }
        tasks
    }

    fn assembly_tasks(&self, package: &str) -> Vec<Task> {
        let dir = self.assembly_dir();
        vec![
            Task::new(PUBLISH_ASSEMBLY_TASK)
                .describe("Publish the cloud assembly as a versioned package")
                .exec(format!("echo '{{}}' > {}/package.json", dir))
                .exec(format!(
                    "cd {} && npm pkg set name={} version=${{PIPELINE_VERSION:-0.0.${{BUILD_NUMBER:-0}}}}",
                    dir, package
                ))
                .exec(format!("cd {} && npm publish", dir)),
            Task::new(FETCH_ASSEMBLY_TASK)
                .describe("Fetch a published cloud assembly into the assembly directory")
                .exec(format!("npm install --no-save {}@${{ASSEMBLY_VERSION}}", package))
                .exec(format!("rm -rf {} && cp -r node_modules/{} {}", dir, package, dir)),
        ]
    }

    fn tasks(&self) -> Vec<Task> {
        let mut tasks = vec![Task::new(SYNTH_TASK)
            .describe("Synthesize the cloud assembly without printing templates")
            .exec(self.cdk(&format!("synth -q -o {}", self.assembly_dir())))];

        let mut publish_all = Task::new(PUBLISH_ASSETS_TASK).describe("Publish assets of every stage");
        for stage in &self.stages {
            let command = format!(
                "npx cdk-assets -p {}/{}.assets.json publish",
                self.assembly_dir(),
                self.stack_name(&stage.name)
            );
            publish_all = publish_all.exec(command.clone());
            tasks.push(
                Task::new(stage_task(PUBLISH_ASSETS_TASK, stage))
                    .describe(format!("Publish assets of stage {}", stage.name))
                    .exec(command),
            );
        }
        tasks.push(publish_all);

        for stage in self.stages.iter().chain(&self.independent) {
            tasks.extend(self.stage_tasks(stage));
        }
        for stage in self.personal.iter().chain(&self.feature) {
            tasks.extend(self.ephemeral_tasks(stage));
        }
        if self.has_manual_stages() {
            if let Some(package) = self.assembly_package() {
                tasks.extend(self.assembly_tasks(&package));
            }
        }
        if self.settings.versioning_enabled() {
            tasks.push(
                Task::new(VERSION_TASK)
                    .describe("Record the pipeline version in the cloud assembly")
                    .exec(format!(
                        "pipegen version --source env --output-file {}/{}",
                        self.assembly_dir(),
                        VERSION_FILE
                    )),
            );
        }
        tasks
    }
}

/// `deploy:prod-eu` for stage `prod eu`
fn stage_task(action: &str, stage: &ResolvedStage) -> String {
    format!("{}:{}", action, job_slug(&stage.name))
}

fn ephemeral(name: &str, config: &EphemeralStageConfig) -> StageConfig {
    StageConfig {
        name: name.to_string(),
        env: config.env.clone(),
        manual_approval: false,
        deploy_on_push: false,
        runner: config.runner.clone(),
        deploy_role_arn: config.deploy_role_arn.clone(),
        pre_deploy_steps: vec![],
        post_deploy_steps: vec![],
    }
}

impl PipelineGenerator for CdkPipeline {
    fn name(&self) -> &'static str {
        "cdk"
    }

    fn register(&self, project: &mut Project) -> Result<()> {
        for task in self.tasks() {
            project.add_task(task)?;
        }
        project.add_dev_dependency("aws-cdk");
        project.add_dev_dependency("cdk-assets");
        if self.options.app_entrypoint {
            let path = format!("{}/app.ts", self.settings.src_dir);
            project.add_file(path, app::render(self))?;
        }
        Ok(())
    }

    fn github(&self, project: &mut Project) -> Result<()> {
        github::generate(self, project)
    }

    fn gitlab(&self, ci: &mut GitlabCi) -> Result<()> {
        gitlab::generate(self, ci)
    }

    fn bash(&self, project: &mut Project) -> Result<()> {
        bash::generate(self, project)
    }

    fn codecatalyst(&self, project: &mut Project) -> Result<()> {
        codecatalyst::generate(self, project)
    }
}
