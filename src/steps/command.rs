//! Plain shell steps: literal commands, project tasks and env exports

use crate::steps::output::{
    double_quoted, export_line, BashStepConfig, CodeCatalystStepConfig, EnvMap, GithubStepConfig,
    GitlabStepConfig, JobStep,
};

/// Literal shell commands
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandStep {
    pub name: Option<String>,
    pub commands: Vec<String>,
    pub env: EnvMap,
}

impl CommandStep {
    pub fn new<I, S>(commands: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: None,
            commands: commands.into_iter().map(Into::into).collect(),
            env: EnvMap::new(),
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_env(mut self, key: &str, value: impl Into<String>) -> Self {
        self.env.insert(key.to_string(), value.into());
        self
    }

    /// A named step becomes one multi-line `run`; an anonymous one a `run` per command
    pub(crate) fn to_github(&self) -> GithubStepConfig {
        let steps = match &self.name {
            Some(name) => vec![JobStep::run(Some(name.clone()), self.commands.join("\n"))],
            None => self
                .commands
                .iter()
                .map(|command| JobStep::run(None, command.clone()))
                .collect(),
        };
        GithubStepConfig {
            steps,
            env: self.env.clone(),
            ..Default::default()
        }
    }

    pub(crate) fn to_gitlab(&self) -> GitlabStepConfig {
        GitlabStepConfig {
            commands: self.commands.clone(),
            env: self.env.clone(),
            ..Default::default()
        }
    }

    pub(crate) fn to_bash(&self) -> BashStepConfig {
        let mut commands: Vec<String> = self
            .env
            .iter()
            .map(|(key, value)| export_line(key, value))
            .collect();
        commands.extend(self.commands.iter().cloned());
        BashStepConfig { commands }
    }

    pub(crate) fn to_codecatalyst(&self) -> CodeCatalystStepConfig {
        CodeCatalystStepConfig {
            commands: self.commands.clone(),
            env: self.env.clone(),
            ..Default::default()
        }
    }
}

/// Runs a task registered on the host project (`.pipegen/run deploy:dev`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptStep {
    pub task: String,
    /// Command prefix that executes project tasks
    pub runner: String,
    pub env: EnvMap,
}

impl ScriptStep {
    pub fn new(runner: impl Into<String>, task: impl Into<String>) -> Self {
        Self {
            task: task.into(),
            runner: runner.into(),
            env: EnvMap::new(),
        }
    }

    pub fn with_env(mut self, key: &str, value: impl Into<String>) -> Self {
        self.env.insert(key.to_string(), value.into());
        self
    }

    pub fn command(&self) -> String {
        format!("{} {}", self.runner, self.task)
    }

    pub(crate) fn to_github(&self) -> GithubStepConfig {
        GithubStepConfig {
            steps: vec![JobStep::run(Some(self.task.clone()), self.command())],
            env: self.env.clone(),
            ..Default::default()
        }
    }

    pub(crate) fn to_gitlab(&self) -> GitlabStepConfig {
        GitlabStepConfig {
            commands: vec![self.command()],
            env: self.env.clone(),
            ..Default::default()
        }
    }

    pub(crate) fn to_bash(&self) -> BashStepConfig {
        let mut commands: Vec<String> = self
            .env
            .iter()
            .map(|(key, value)| export_line(key, value))
            .collect();
        commands.push(self.command());
        BashStepConfig { commands }
    }

    pub(crate) fn to_codecatalyst(&self) -> CodeCatalystStepConfig {
        CodeCatalystStepConfig {
            commands: vec![self.command()],
            env: self.env.clone(),
            ..Default::default()
        }
    }
}

/// Exports variables for every later step of the same job
///
/// Values are evaluated by the shell, so `$(...)` computes them at run time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportEnvStep {
    pub vars: EnvMap,
}

impl ExportEnvStep {
    pub fn new<I, K, V>(vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            vars: vars
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    fn export_lines(&self) -> Vec<String> {
        self.vars
            .iter()
            .map(|(key, value)| export_line(key, value))
            .collect()
    }

    /// GitHub steps run in separate shells, so exports go through `$GITHUB_ENV`
    pub(crate) fn to_github(&self) -> GithubStepConfig {
        let script = self
            .vars
            .iter()
            .map(|(key, value)| format!("echo \"{}={}\" >> \"$GITHUB_ENV\"", key, double_quoted(value)))
            .collect::<Vec<_>>()
            .join("\n");
        GithubStepConfig {
            steps: vec![JobStep::run(Some("Export environment".to_string()), script)],
            ..Default::default()
        }
    }

    pub(crate) fn to_gitlab(&self) -> GitlabStepConfig {
        GitlabStepConfig {
            commands: self.export_lines(),
            ..Default::default()
        }
    }

    pub(crate) fn to_bash(&self) -> BashStepConfig {
        BashStepConfig {
            commands: self.export_lines(),
        }
    }

    pub(crate) fn to_codecatalyst(&self) -> CodeCatalystStepConfig {
        CodeCatalystStepConfig {
            commands: self.export_lines(),
            ..Default::default()
        }
    }
}
