//! Pipeline step IR
//!
//! A [`PipelineStep`] is one declared unit of CI behaviour. Each variant owns
//! an immutable configuration struct and knows how to render itself for every
//! [`Target`]. The full target × step matrix lives in the `match` blocks below,
//! so a variant that cannot be expressed on a target is visible in one place
//! and fails with [`StepError::UnsupportedTarget`] at generation time.

pub mod amplify;
pub mod artifact;
pub mod aws;
pub mod command;
pub mod container;
pub mod drift;
pub mod output;
pub mod security;
pub mod sequence;

pub use amplify::AmplifyDeployStep;
pub use artifact::{DownloadArtifactStep, UploadArtifactStep};
pub use aws::AssumeRoleStep;
pub use command::{CommandStep, ExportEnvStep, ScriptStep};
pub use container::{DockerBuildStep, DockerPushStep, DockerTagStep, RegistryLoginStep};
pub use drift::{DriftDetectionStep, ResourceCountStep};
pub use output::{
    BashStepConfig, CodeCatalystStepConfig, EnvMap, GithubStepConfig, GitlabStepConfig, JobStep,
    RenderedStep, StepOutput,
};
pub use security::{ImageScanStep, SbomFormat, SbomStep};
pub use sequence::StepSequence;

use crate::core::target::Target;
use thiserror::Error;

/// Render-time failures
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StepError {
    #[error("step '{step}' cannot be rendered for target {target}")]
    UnsupportedTarget { step: &'static str, target: Target },
}

/// One declarative unit of CI behaviour
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineStep {
    Command(CommandStep),
    Script(ScriptStep),
    ExportEnv(ExportEnvStep),
    AssumeRole(AssumeRoleStep),
    UploadArtifact(UploadArtifactStep),
    DownloadArtifact(DownloadArtifactStep),
    RegistryLogin(RegistryLoginStep),
    DockerBuild(DockerBuildStep),
    DockerTag(DockerTagStep),
    DockerPush(DockerPushStep),
    ImageScan(ImageScanStep),
    Sbom(SbomStep),
    DriftDetection(DriftDetectionStep),
    ResourceCount(ResourceCountStep),
    AmplifyDeploy(AmplifyDeployStep),
    Sequence(StepSequence),
}

impl PipelineStep {
    /// Stable kind name, used in error messages and logs
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineStep::Command(_) => "command",
            PipelineStep::Script(_) => "script",
            PipelineStep::ExportEnv(_) => "export-env",
            PipelineStep::AssumeRole(_) => "assume-role",
            PipelineStep::UploadArtifact(_) => "upload-artifact",
            PipelineStep::DownloadArtifact(_) => "download-artifact",
            PipelineStep::RegistryLogin(_) => "registry-login",
            PipelineStep::DockerBuild(_) => "docker-build",
            PipelineStep::DockerTag(_) => "docker-tag",
            PipelineStep::DockerPush(_) => "docker-push",
            PipelineStep::ImageScan(_) => "image-scan",
            PipelineStep::Sbom(_) => "sbom",
            PipelineStep::DriftDetection(_) => "drift-detection",
            PipelineStep::ResourceCount(_) => "resource-count",
            PipelineStep::AmplifyDeploy(_) => "amplify-deploy",
            PipelineStep::Sequence(_) => "sequence",
        }
    }

    fn unsupported(&self, target: Target) -> StepError {
        StepError::UnsupportedTarget {
            step: self.kind(),
            target,
        }
    }

    /// Render for a target chosen at run time
    pub fn render(&self, target: Target) -> Result<RenderedStep, StepError> {
        Ok(match target {
            Target::Github => RenderedStep::Github(self.to_github()?),
            Target::Gitlab => RenderedStep::Gitlab(self.to_gitlab()?),
            Target::Bash => RenderedStep::Bash(self.to_bash()?),
            Target::CodeCatalyst => RenderedStep::CodeCatalyst(self.to_codecatalyst()?),
        })
    }

    pub fn to_github(&self) -> Result<GithubStepConfig, StepError> {
        Ok(match self {
            PipelineStep::Command(step) => step.to_github(),
            PipelineStep::Script(step) => step.to_github(),
            PipelineStep::ExportEnv(step) => step.to_github(),
            PipelineStep::AssumeRole(step) => step.to_github(),
            PipelineStep::UploadArtifact(step) => step.to_github(),
            PipelineStep::DownloadArtifact(step) => step.to_github(),
            PipelineStep::RegistryLogin(step) => step.to_github(),
            PipelineStep::DockerBuild(step) => step.to_github(),
            PipelineStep::DockerTag(step) => step.to_github(),
            PipelineStep::DockerPush(step) => step.to_github(),
            PipelineStep::ImageScan(step) => step.to_github(),
            PipelineStep::Sbom(step) => step.to_github(),
            PipelineStep::DriftDetection(step) => step.to_github(),
            PipelineStep::ResourceCount(step) => step.to_github(),
            PipelineStep::AmplifyDeploy(step) => step.to_github(),
            PipelineStep::Sequence(sequence) => sequence.to_github()?,
        })
    }

    pub fn to_gitlab(&self) -> Result<GitlabStepConfig, StepError> {
        Ok(match self {
            PipelineStep::Command(step) => step.to_gitlab(),
            PipelineStep::Script(step) => step.to_gitlab(),
            PipelineStep::ExportEnv(step) => step.to_gitlab(),
            PipelineStep::AssumeRole(step) => step.to_gitlab(),
            PipelineStep::UploadArtifact(step) => step.to_gitlab(),
            PipelineStep::DownloadArtifact(step) => step.to_gitlab(),
            PipelineStep::RegistryLogin(step) => step.to_gitlab(),
            PipelineStep::DockerBuild(step) => step.to_gitlab(),
            PipelineStep::DockerTag(step) => step.to_gitlab(),
            PipelineStep::DockerPush(step) => step.to_gitlab(),
            PipelineStep::ImageScan(step) => step.to_gitlab(),
            PipelineStep::Sbom(step) => step.to_gitlab(),
            PipelineStep::DriftDetection(step) => step.to_gitlab(),
            PipelineStep::ResourceCount(step) => step.to_gitlab(),
            PipelineStep::AmplifyDeploy(step) => step.to_gitlab(),
            PipelineStep::Sequence(sequence) => sequence.to_gitlab()?,
        })
    }

    pub fn to_bash(&self) -> Result<BashStepConfig, StepError> {
        Ok(match self {
            PipelineStep::Command(step) => step.to_bash(),
            PipelineStep::Script(step) => step.to_bash(),
            PipelineStep::ExportEnv(step) => step.to_bash(),
            PipelineStep::AssumeRole(step) => step.to_bash(),
            PipelineStep::UploadArtifact(step) => step.to_bash(),
            PipelineStep::DownloadArtifact(step) => step.to_bash(),
            PipelineStep::RegistryLogin(step) => step.to_bash(),
            PipelineStep::DockerBuild(step) => step.to_bash(),
            PipelineStep::DockerTag(step) => step.to_bash(),
            PipelineStep::DockerPush(step) => step.to_bash(),
            PipelineStep::ImageScan(step) => step.to_bash(),
            PipelineStep::Sbom(step) => step.to_bash(),
            PipelineStep::DriftDetection(step) => step.to_bash(),
            PipelineStep::ResourceCount(step) => step.to_bash(),
            PipelineStep::AmplifyDeploy(step) => step.to_bash(),
            PipelineStep::Sequence(sequence) => sequence.to_bash()?,
        })
    }

    pub fn to_codecatalyst(&self) -> Result<CodeCatalystStepConfig, StepError> {
        Ok(match self {
            PipelineStep::Command(step) => step.to_codecatalyst(),
            PipelineStep::Script(step) => step.to_codecatalyst(),
            PipelineStep::ExportEnv(step) => step.to_codecatalyst(),
            PipelineStep::AssumeRole(step) => step.to_codecatalyst(),
            PipelineStep::DockerBuild(step) => step.to_codecatalyst(),
            PipelineStep::DockerTag(step) => step.to_codecatalyst(),
            PipelineStep::DockerPush(step) => step.to_codecatalyst(),
            PipelineStep::DriftDetection(step) => step.to_codecatalyst(),
            PipelineStep::ResourceCount(step) => step.to_codecatalyst(),
            PipelineStep::Sequence(sequence) => sequence.to_codecatalyst()?,
            PipelineStep::UploadArtifact(_)
            | PipelineStep::DownloadArtifact(_)
            | PipelineStep::RegistryLogin(_)
            | PipelineStep::ImageScan(_)
            | PipelineStep::Sbom(_)
            | PipelineStep::AmplifyDeploy(_) => {
                return Err(self.unsupported(Target::CodeCatalyst))
            }
        })
    }
}

macro_rules! impl_from_step {
    ($($variant:ident($ty:ty)),* $(,)?) => {
        $(
            impl From<$ty> for PipelineStep {
                fn from(step: $ty) -> Self {
                    PipelineStep::$variant(step)
                }
            }
        )*
    };
}

impl_from_step! {
    Command(CommandStep),
    Script(ScriptStep),
    ExportEnv(ExportEnvStep),
    AssumeRole(AssumeRoleStep),
    UploadArtifact(UploadArtifactStep),
    DownloadArtifact(DownloadArtifactStep),
    RegistryLogin(RegistryLoginStep),
    DockerBuild(DockerBuildStep),
    DockerTag(DockerTagStep),
    DockerPush(DockerPushStep),
    ImageScan(ImageScanStep),
    Sbom(SbomStep),
    DriftDetection(DriftDetectionStep),
    ResourceCount(ResourceCountStep),
    AmplifyDeploy(AmplifyDeployStep),
    Sequence(StepSequence),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn amplify() -> PipelineStep {
        AmplifyDeployStep::new("d1", "main", "eu-west-1", "site.zip").into()
    }

    #[test]
    fn test_amplify_refuses_codecatalyst() {
        let err = amplify().render(Target::CodeCatalyst).unwrap_err();
        assert_eq!(
            err,
            StepError::UnsupportedTarget {
                step: "amplify-deploy",
                target: Target::CodeCatalyst
            }
        );
        assert_eq!(
            err.to_string(),
            "step 'amplify-deploy' cannot be rendered for target codecatalyst"
        );
    }

    #[test]
    fn test_render_matches_target_method() {
        let step: PipelineStep = CommandStep::new(["echo hi"]).into();
        for target in Target::ALL {
            let rendered = step.render(target).unwrap();
            let matches_target = matches!(
                (target, &rendered),
                (Target::Github, RenderedStep::Github(_))
                    | (Target::Gitlab, RenderedStep::Gitlab(_))
                    | (Target::Bash, RenderedStep::Bash(_))
                    | (Target::CodeCatalyst, RenderedStep::CodeCatalyst(_))
            );
            assert!(matches_target, "wrong rendering for {}", target);
        }
    }

    #[test]
    fn test_rendering_is_pure() {
        let step: PipelineStep = AssumeRoleStep::new("arn:role", "us-east-1")
            .via_jump_role("arn:jump")
            .into();
        for target in Target::ALL {
            assert_eq!(step.render(target), step.render(target));
        }
    }
}
