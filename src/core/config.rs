//! Project configuration from YAML

use crate::core::stage::Runner;
use crate::core::target::Target;
use crate::pipelines::cdk::CdkPipelineOptions;
use crate::pipelines::container::ContainerPipelineOptions;
use crate::pipelines::drift::DriftDetectionOptions;
use crate::pipelines::terraform::TerraformPipelineOptions;
use crate::project::TASK_RUNNER;
use crate::steps::{
    AmplifyDeployStep, AssumeRoleStep, CommandStep, DownloadArtifactStep, DriftDetectionStep,
    EnvMap, ExportEnvStep, PipelineStep, ResourceCountStep, ScriptStep, UploadArtifactStep,
};
use crate::versioning::VersioningConfig;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Package manager of the generated project
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PackageManager {
    #[default]
    Npm,
    Yarn,
    Pnpm,
}

impl PackageManager {
    /// Command installing dependencies from the lockfile
    pub fn install_command(&self) -> &'static str {
        match self {
            PackageManager::Npm => "npm ci",
            PackageManager::Yarn => "yarn install --frozen-lockfile",
            PackageManager::Pnpm => "pnpm install --frozen-lockfile",
        }
    }
}

/// Settings every pipeline falls back to
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Defaults {
    #[serde(default)]
    pub runner: Runner,

    /// Branch whose pushes trigger the main pipeline
    #[serde(default = "default_branch")]
    pub branch: String,

    #[serde(default = "default_node_version")]
    pub node_version: String,

    /// Image used by GitLab jobs
    #[serde(default = "default_gitlab_image")]
    pub gitlab_image: String,

    /// Command prefix that executes project tasks
    #[serde(default = "default_task_runner")]
    pub task_runner: String,

    /// Where `cdk synth` writes the cloud assembly
    #[serde(default = "default_cloud_assembly_dir")]
    pub cloud_assembly_dir: String,
}

fn default_branch() -> String {
    "main".to_string()
}

fn default_node_version() -> String {
    "20".to_string()
}

fn default_gitlab_image() -> String {
    "jsii/superchain:1-bookworm-slim-node20".to_string()
}

fn default_task_runner() -> String {
    TASK_RUNNER.to_string()
}

fn default_cloud_assembly_dir() -> String {
    "cdk.out".to_string()
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            runner: Runner::default(),
            branch: default_branch(),
            node_version: default_node_version(),
            gitlab_image: default_gitlab_image(),
            task_runner: default_task_runner(),
            cloud_assembly_dir: default_cloud_assembly_dir(),
        }
    }
}

/// Top-level project configuration loaded from YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectConfig {
    /// Project name, also the default stack prefix
    pub name: String,

    /// CI backend to generate for
    #[serde(default = "default_target")]
    pub target: Target,

    #[serde(default)]
    pub package_manager: PackageManager,

    #[serde(default = "default_src_dir")]
    pub src_dir: String,

    #[serde(default)]
    pub defaults: Defaults,

    #[serde(default)]
    pub cdk: Option<CdkPipelineOptions>,

    #[serde(default)]
    pub container: Option<ContainerPipelineOptions>,

    #[serde(default)]
    pub terraform: Option<TerraformPipelineOptions>,

    #[serde(default)]
    pub drift_detection: Option<DriftDetectionOptions>,

    #[serde(default)]
    pub versioning: Option<VersioningConfig>,
}

fn default_target() -> Target {
    Target::Github
}

fn default_src_dir() -> String {
    "src".to_string()
}

/// A step hook as declared in YAML
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum StepConfig {
    Command {
        #[serde(default)]
        name: Option<String>,
        commands: Vec<String>,
        #[serde(default)]
        env: EnvMap,
    },
    Script {
        task: String,
        #[serde(default)]
        env: EnvMap,
    },
    ExportEnv {
        vars: EnvMap,
    },
    AssumeRole {
        role_arn: String,
        region: String,
        #[serde(default)]
        session_name: Option<String>,
        #[serde(default)]
        jump_role_arn: Option<String>,
    },
    UploadArtifact {
        name: String,
        path: String,
    },
    DownloadArtifact {
        name: String,
        path: String,
        #[serde(default)]
        from_job: Option<String>,
    },
    DriftDetection {
        region: String,
        stacks: Vec<String>,
        #[serde(default)]
        timeout_minutes: Option<u32>,
        #[serde(default)]
        fail_on_drift: Option<bool>,
    },
    ResourceCount {
        region: String,
        stacks: Vec<String>,
        #[serde(default)]
        warning_threshold: Option<u32>,
        #[serde(default)]
        output_file: Option<String>,
    },
    AmplifyDeploy {
        app_id: String,
        branch_name: String,
        region: String,
        artifact: String,
    },
}

impl StepConfig {
    /// Build the step this hook declares
    pub fn to_step(&self, defaults: &Defaults) -> PipelineStep {
        match self {
            StepConfig::Command {
                name,
                commands,
                env,
            } => PipelineStep::Command(CommandStep {
                name: name.clone(),
                commands: commands.clone(),
                env: env.clone(),
            }),
            StepConfig::Script { task, env } => PipelineStep::Script(ScriptStep {
                task: task.clone(),
                runner: defaults.task_runner.clone(),
                env: env.clone(),
            }),
            StepConfig::ExportEnv { vars } => PipelineStep::ExportEnv(ExportEnvStep {
                vars: vars.clone(),
            }),
            StepConfig::AssumeRole {
                role_arn,
                region,
                session_name,
                jump_role_arn,
            } => PipelineStep::AssumeRole(AssumeRoleStep {
                role_arn: role_arn.clone(),
                region: region.clone(),
                session_name: session_name.clone(),
                jump_role_arn: jump_role_arn.clone(),
            }),
            StepConfig::UploadArtifact { name, path } => {
                UploadArtifactStep::new(name.as_str(), path.as_str()).into()
            }
            StepConfig::DownloadArtifact {
                name,
                path,
                from_job,
            } => PipelineStep::DownloadArtifact(DownloadArtifactStep {
                name: name.clone(),
                path: path.clone(),
                from_job: from_job.clone(),
            }),
            StepConfig::DriftDetection {
                region,
                stacks,
                timeout_minutes,
                fail_on_drift,
            } => {
                let mut step = DriftDetectionStep::new(region.as_str(), stacks.iter().cloned());
                if let Some(timeout) = timeout_minutes {
                    step.timeout_minutes = *timeout;
                }
                if let Some(fail) = fail_on_drift {
                    step.fail_on_drift = *fail;
                }
                step.into()
            }
            StepConfig::ResourceCount {
                region,
                stacks,
                warning_threshold,
                output_file,
            } => {
                let mut step = ResourceCountStep::new(region.as_str(), stacks.iter().cloned());
                if let Some(threshold) = warning_threshold {
                    step.warning_threshold = *threshold;
                }
                step.output_file = output_file.clone();
                step.into()
            }
            StepConfig::AmplifyDeploy {
                app_id,
                branch_name,
                region,
                artifact,
            } => AmplifyDeployStep::new(
                app_id.as_str(),
                branch_name.as_str(),
                region.as_str(),
                artifact.as_str(),
            )
            .into(),
        }
    }
}

impl ProjectConfig {
    /// Load project configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse project configuration from a YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: ProjectConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration by constructing every declared pipeline
    pub fn validate(&self) -> Result<()> {
        if self.cdk.is_none()
            && self.container.is_none()
            && self.terraform.is_none()
            && self.drift_detection.is_none()
        {
            anyhow::bail!(
                "Project '{}' declares no pipeline: add one of cdk, container, terraform or driftDetection",
                self.name
            );
        }

        crate::pipelines::generators(self)?;
        Ok(())
    }

    /// Number of stages across all declared pipelines
    pub fn stage_count(&self) -> usize {
        self.cdk
            .as_ref()
            .map(|c| c.stages.len() + c.independent_stages.len())
            .unwrap_or(0)
            + self.container.as_ref().map(|c| c.stages.len()).unwrap_or(0)
            + self.terraform.as_ref().map(|c| c.stages.len()).unwrap_or(0)
            + self
                .drift_detection
                .as_ref()
                .map(|c| c.stages.len())
                .unwrap_or(0)
    }
}
