//! Docker image steps: registry login, build, tag and push

use crate::core::registry::Registry;
use crate::steps::output::{
    BashStepConfig, CodeCatalystStepConfig, EnvMap, GithubStepConfig, GitlabStepConfig, JobStep,
};

pub const DOCKER_LOGIN: &str = "docker/login-action@v3";

/// Authenticate the docker daemon against a registry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryLoginStep {
    pub registry: Registry,
}

impl RegistryLoginStep {
    pub fn new(registry: Registry) -> Self {
        Self { registry }
    }

    fn ecr_login(&self) -> Option<String> {
        let region = self.registry.region()?;
        Some(format!(
            "aws ecr get-login-password --region {} | docker login --username AWS --password-stdin {}",
            region,
            self.registry.host().unwrap_or_default()
        ))
    }

    /// Shell login shared by GitLab and bash, where secrets are plain variables
    fn shell_login(&self) -> Vec<String> {
        if let Some(command) = self.ecr_login() {
            return vec![command];
        }
        match self.registry.credentials() {
            Some((username, password)) => {
                let host = self
                    .registry
                    .host()
                    .map(|h| format!(" {}", h))
                    .unwrap_or_default();
                vec![format!(
                    "echo \"${}\" | docker login --username \"${}\" --password-stdin{}",
                    password, username, host
                )]
            }
            None => vec![],
        }
    }

    pub(crate) fn to_github(&self) -> GithubStepConfig {
        let name = format!("Login to {}", self.registry.kind());
        let step = match (self.ecr_login(), self.registry.credentials()) {
            (Some(command), _) => JobStep::run(Some(name), command),
            (None, Some((username, password))) => {
                let mut step = JobStep::uses(name, DOCKER_LOGIN)
                    .with("username", format!("${{{{ secrets.{} }}}}", username))
                    .with("password", format!("${{{{ secrets.{} }}}}", password));
                if let Some(host) = self.registry.host() {
                    step = step.with("registry", host);
                }
                step
            }
            (None, None) => JobStep::run(Some(name), "echo \"No credentials configured\""),
        };
        GithubStepConfig {
            steps: vec![step],
            ..Default::default()
        }
    }

    pub(crate) fn to_gitlab(&self) -> GitlabStepConfig {
        GitlabStepConfig {
            commands: self.shell_login(),
            ..Default::default()
        }
    }

    pub(crate) fn to_bash(&self) -> BashStepConfig {
        BashStepConfig {
            commands: self.shell_login(),
        }
    }
}

/// `docker build`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DockerBuildStep {
    /// Local image reference, `name:tag`
    pub image: String,
    pub context: String,
    pub dockerfile: Option<String>,
    pub build_args: EnvMap,
}

impl DockerBuildStep {
    pub fn new(image: impl Into<String>, context: impl Into<String>) -> Self {
        Self {
            image: image.into(),
            context: context.into(),
            dockerfile: None,
            build_args: EnvMap::new(),
        }
    }

    pub fn command(&self) -> String {
        let mut command = format!("docker build -t {}", self.image);
        if let Some(dockerfile) = &self.dockerfile {
            command.push_str(&format!(" -f {}", dockerfile));
        }
        for (key, value) in &self.build_args {
            command.push_str(&format!(" --build-arg {}={}", key, value));
        }
        command.push(' ');
        command.push_str(&self.context);
        command
    }

    pub(crate) fn to_github(&self) -> GithubStepConfig {
        single_run("Build image", self.command())
    }

    pub(crate) fn to_gitlab(&self) -> GitlabStepConfig {
        single_command(self.command())
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

/// `docker tag`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DockerTagStep {
    pub source: String,
    pub target: String,
}

impl DockerTagStep {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
        }
    }

    pub fn command(&self) -> String {
        format!("docker tag {} {}", self.source, self.target)
    }

    pub(crate) fn to_github(&self) -> GithubStepConfig {
        single_run("Tag image", self.command())
    }

    pub(crate) fn to_gitlab(&self) -> GitlabStepConfig {
        single_command(self.command())
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

/// `docker push`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DockerPushStep {
    pub image: String,
}

impl DockerPushStep {
    pub fn new(image: impl Into<String>) -> Self {
        Self {
            image: image.into(),
        }
    }

    pub fn command(&self) -> String {
        format!("docker push {}", self.image)
    }

    pub(crate) fn to_github(&self) -> GithubStepConfig {
        single_run("Push image", self.command())
    }

    pub(crate) fn to_gitlab(&self) -> GitlabStepConfig {
        single_command(self.command())
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

fn single_run(name: &str, command: String) -> GithubStepConfig {
    GithubStepConfig {
        steps: vec![JobStep::run(Some(name.to_string()), command)],
        ..Default::default()
    }
}

fn single_command(command: String) -> GitlabStepConfig {
    GitlabStepConfig {
        commands: vec![command],
        ..Default::default()
    }
}
