//! Pipeline orchestrators
//!
//! Each orchestrator validates its options when constructed, registers its
//! tasks on the [`Project`] and then renders jobs for the selected target.
//! Files are only written by [`Project::synth`], after every orchestrator has
//! rendered, so a failure leaves nothing half-generated.

pub mod cdk;
pub mod container;
pub mod drift;
pub mod graph;
pub mod terraform;

pub use graph::JobGraph;

use crate::core::config::{Defaults, PackageManager, ProjectConfig};
use crate::core::target::Target;
use crate::error::{Result, SynthError, ValidationError};
use crate::project::Project;
use crate::versioning::VersioningConfig;
use crate::workflow::GitlabCi;
use tracing::{debug, info};

pub const GITLAB_CI_FILE: &str = ".gitlab-ci.yml";

/// Project-wide settings every orchestrator reads
#[derive(Debug, Clone)]
pub struct ProjectSettings {
    pub project_name: String,
    pub package_manager: PackageManager,
    pub src_dir: String,
    pub defaults: Defaults,
    pub versioning: Option<VersioningConfig>,
}

impl ProjectSettings {
    pub fn from_config(config: &ProjectConfig) -> Self {
        Self {
            project_name: config.name.clone(),
            package_manager: config.package_manager,
            src_dir: config.src_dir.clone(),
            defaults: config.defaults.clone(),
            versioning: config.versioning.clone(),
        }
    }

    pub fn versioning_enabled(&self) -> bool {
        self.versioning.as_ref().map_or(false, |v| v.enabled)
    }

    /// Command running a registered project task
    pub fn task_command(&self, task: &str) -> String {
        format!("{} {}", self.defaults.task_runner, task)
    }
}

/// One kind of pipeline (CDK, container, terraform, drift detection)
///
/// Targets an orchestrator cannot express keep the default implementation,
/// which fails with [`SynthError::UnsupportedPipeline`].
pub trait PipelineGenerator {
    fn name(&self) -> &'static str;

    /// Tasks and dev dependencies, independent of the target
    fn register(&self, project: &mut Project) -> Result<()>;

    fn github(&self, _project: &mut Project) -> Result<()> {
        Err(self.unsupported(Target::Github))
    }

    /// GitLab jobs go into the one shared `.gitlab-ci.yml`
    fn gitlab(&self, _ci: &mut GitlabCi) -> Result<()> {
        Err(self.unsupported(Target::Gitlab))
    }

    fn bash(&self, _project: &mut Project) -> Result<()> {
        Err(self.unsupported(Target::Bash))
    }

    fn codecatalyst(&self, _project: &mut Project) -> Result<()> {
        Err(self.unsupported(Target::CodeCatalyst))
    }

    fn unsupported(&self, target: Target) -> SynthError {
        SynthError::UnsupportedPipeline {
            pipeline: self.name(),
            target,
        }
    }
}

/// Construct (and thereby validate) every pipeline the project declares
pub fn generators(config: &ProjectConfig) -> std::result::Result<Vec<Box<dyn PipelineGenerator>>, ValidationError> {
    let settings = ProjectSettings::from_config(config);
    let mut generators: Vec<Box<dyn PipelineGenerator>> = Vec::new();

    if let Some(options) = &config.cdk {
        generators.push(Box::new(cdk::CdkPipeline::new(options.clone(), settings.clone())?));
    }
    if let Some(options) = &config.container {
        generators.push(Box::new(container::ContainerPipeline::new(
            options.clone(),
            settings.clone(),
        )?));
    }
    if let Some(options) = &config.terraform {
        generators.push(Box::new(terraform::TerraformPipeline::new(
            options.clone(),
            settings.clone(),
        )?));
    }
    if let Some(options) = &config.drift_detection {
        generators.push(Box::new(drift::DriftDetectionPipeline::new(
            options.clone(),
            settings,
        )?));
    }

    debug!("Constructed {} pipeline(s)", generators.len());
    Ok(generators)
}

/// Render every declared pipeline for `target` into a project
pub fn synthesize(config: &ProjectConfig, target: Target) -> Result<Project> {
    let generators = generators(config)?;
    let mut project = Project::from_config(config);
    let mut gitlab = GitlabCi::new();

    for generator in &generators {
        info!("Generating {} pipeline for {}", generator.name(), target);
        generator.register(&mut project)?;
        match target {
            Target::Github => generator.github(&mut project)?,
            Target::Gitlab => generator.gitlab(&mut gitlab)?,
            Target::Bash => generator.bash(&mut project)?,
            Target::CodeCatalyst => generator.codecatalyst(&mut project)?,
        }
    }

    if !gitlab.is_empty() {
        gitlab.set_default_image(&config.defaults.gitlab_image);
        project.add_yaml_file(GITLAB_CI_FILE, &gitlab)?;
    }

    Ok(project)
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONTAINER_ONLY: &str = r#"
name: svc
container:
  imageName: svc
  stages:
    - name: prod
      registries:
        - type: ecr
          repository: svc
          region: eu-west-1
"#;

    #[test]
    fn test_unsupported_target_is_reported_by_pipeline() {
        let config = ProjectConfig::from_yaml(CONTAINER_ONLY).unwrap();
        let err = synthesize(&config, Target::CodeCatalyst).unwrap_err();
        assert_eq!(
            err.to_string(),
            "container pipeline cannot be generated for target codecatalyst"
        );
    }

    #[test]
    fn test_gitlab_document_written_once() {
        let config = ProjectConfig::from_yaml(CONTAINER_ONLY).unwrap();
        let project = synthesize(&config, Target::Gitlab).unwrap();
        let file = project.file(GITLAB_CI_FILE).unwrap();
        assert!(file.content.starts_with("# ~~ Generated by pipegen"));
    }

    #[test]
    fn test_settings_task_command() {
        let config = ProjectConfig::from_yaml(CONTAINER_ONLY).unwrap();
        let settings = ProjectSettings::from_config(&config);
        assert_eq!(settings.task_command("deploy:dev"), ".pipegen/run deploy:dev");
        assert!(!settings.versioning_enabled());
    }
}
