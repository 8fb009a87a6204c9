//! Host project: tasks, generated files and dev dependencies
//!
//! Generators register everything on a [`Project`] first. Nothing touches the
//! disk until [`Project::synth`] hands the files to an [`OutputBackend`], so a
//! failing generator leaves no partial output behind.

pub mod output;

pub use output::{FsOutput, InMemoryOutput, OutputBackend};

use crate::core::config::{PackageManager, ProjectConfig};
use crate::error::{Result, SynthError};
use crate::steps::output::export_line;
use crate::steps::EnvMap;
use indexmap::{IndexMap, IndexSet};
use serde::Serialize;
use tracing::{debug, info};

/// Marker line heading every generated file
pub const GENERATED_MARKER: &str =
    "~~ Generated by pipegen. To modify, edit pipegen.yaml and run \"pipegen synth\".";

/// Where the task manifest is written
pub const TASKS_FILE: &str = ".pipegen/tasks.json";

/// Executable running one registered task: `.pipegen/run <task>`
pub const TASK_RUNNER: &str = ".pipegen/run";

/// A named shell task, run through the project's task runner
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Task {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub env: EnvMap,
    pub steps: Vec<TaskStep>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskStep {
    pub exec: String,
}

impl Task {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn exec(mut self, command: impl Into<String>) -> Self {
        self.steps.push(TaskStep {
            exec: command.into(),
        });
        self
    }

    pub fn with_env(mut self, key: &str, value: impl Into<String>) -> Self {
        self.env.insert(key.to_string(), value.into());
        self
    }
}

/// A file the project will write
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedFile {
    pub path: String,
    pub content: String,
    pub executable: bool,
}

#[derive(Serialize)]
struct TaskManifest<'a> {
    tasks: &'a IndexMap<String, Task>,
}

/// In-process model of the project being generated
#[derive(Debug, Clone)]
pub struct Project {
    pub name: String,
    pub package_manager: PackageManager,
    pub src_dir: String,
    tasks: IndexMap<String, Task>,
    files: IndexMap<String, GeneratedFile>,
    dev_dependencies: IndexSet<String>,
}

impl Project {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            package_manager: PackageManager::default(),
            src_dir: "src".to_string(),
            tasks: IndexMap::new(),
            files: IndexMap::new(),
            dev_dependencies: IndexSet::new(),
        }
    }

    pub fn from_config(config: &ProjectConfig) -> Self {
        let mut project = Self::new(config.name.clone());
        project.package_manager = config.package_manager;
        project.src_dir = config.src_dir.clone();
        project
    }

    pub fn add_task(&mut self, task: Task) -> Result<()> {
        if self.tasks.contains_key(&task.name) {
            return Err(SynthError::DuplicateTask(task.name));
        }
        debug!("Registered task {}", task.name);
        self.tasks.insert(task.name.clone(), task);
        Ok(())
    }

    pub fn task(&self, name: &str) -> Option<&Task> {
        self.tasks.get(name)
    }

    pub fn tasks(&self) -> impl Iterator<Item = &Task> {
        self.tasks.values()
    }

    /// Register a text file; generated paths must be unique
    pub fn add_file(&mut self, path: impl Into<String>, content: impl Into<String>) -> Result<()> {
        self.insert_file(path.into(), content.into(), false)
    }

    /// Register a script, written with the executable bit set
    pub fn add_executable(&mut self, path: impl Into<String>, content: impl Into<String>) -> Result<()> {
        self.insert_file(path.into(), content.into(), true)
    }

    /// Serialize `value` as YAML under the generated-file marker
    pub fn add_yaml_file<T: Serialize>(&mut self, path: impl Into<String>, value: &T) -> Result<()> {
        let body = serde_yaml::to_string(value)?;
        self.add_file(path, format!("# {}\n\n{}", GENERATED_MARKER, body))
    }

    fn insert_file(&mut self, path: String, content: String, executable: bool) -> Result<()> {
        if self.files.contains_key(&path) {
            return Err(SynthError::DuplicateFile(path));
        }
        debug!("Registered file {}", path);
        self.files.insert(
            path.clone(),
            GeneratedFile {
                path,
                content,
                executable,
            },
        );
        Ok(())
    }

    pub fn file(&self, path: &str) -> Option<&GeneratedFile> {
        self.files.get(path)
    }

    pub fn files(&self) -> impl Iterator<Item = &GeneratedFile> {
        self.files.values()
    }

    pub fn add_dev_dependency(&mut self, dependency: impl Into<String>) {
        self.dev_dependencies.insert(dependency.into());
    }

    pub fn dev_dependencies(&self) -> impl Iterator<Item = &str> {
        self.dev_dependencies.iter().map(String::as_str)
    }

    /// Task manifest, as written to [`TASKS_FILE`]
    pub fn tasks_manifest(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&TaskManifest {
            tasks: &self.tasks,
        })?)
    }

    /// Bash script executing the registered tasks, as written to [`TASK_RUNNER`]
    ///
    /// Task env is exported first. Each step runs in its own subshell, so a
    /// `cd` in one step does not move the next.
    pub fn task_runner_script(&self) -> String {
        let mut script = format!(
            "#!/usr/bin/env bash\n# {}\n# Tasks are listed in {}\nset -eo pipefail\ncd \"$(dirname \"$0\")/..\"\n\ncase \"${{1:-}}\" in\n",
            GENERATED_MARKER, TASKS_FILE
        );
        for task in self.tasks.values() {
            script.push_str(&format!("  {})\n", single_quoted(&task.name)));
            for (key, value) in &task.env {
                script.push_str(&format!("    {}\n", export_line(key, value)));
            }
            for step in &task.steps {
                script.push_str("    (\n");
                for line in step.exec.lines() {
                    script.push_str(&format!("      {}\n", line));
                }
                script.push_str("    )\n");
            }
            script.push_str("    ;;\n");
        }
        script.push_str("  *)\n");
        script.push_str("    echo \"Unknown task: '${1:-}'. Available tasks:\" >&2\n");
        for task in self.tasks.values() {
            script.push_str(&format!("    echo {} >&2\n", single_quoted(&format!("  {}", task.name))));
        }
        script.push_str("    exit 1\n    ;;\nesac\n");
        script
    }

    /// Write every registered file, plus the task manifest and runner when
    /// tasks exist
    ///
    /// Returns the number of files written.
    pub fn synth(&self, backend: &dyn OutputBackend) -> Result<usize> {
        let mut written = 0;
        for file in self.files.values() {
            backend.write(file)?;
            written += 1;
        }

        if !self.tasks.is_empty() {
            backend.write(&GeneratedFile {
                path: TASKS_FILE.to_string(),
                content: self.tasks_manifest()?,
                executable: false,
            })?;
            backend.write(&GeneratedFile {
                path: TASK_RUNNER.to_string(),
                content: self.task_runner_script(),
                executable: true,
            })?;
            written += 2;
        }

        info!("Synthesized {} files for {}", written, self.name);
        Ok(written)
    }
}

fn single_quoted(value: &str) -> String {
    format!("'{}'", value.replace('\'', "'\\''"))
}
