//! Target-specific step representations
//!
//! Every target gets its own record: an ordered list of actions, an
//! environment map, the upstream jobs it needs and, for GitHub, the
//! permissions the actions require. Sequences fold these records together
//! through [`StepOutput::append`].

use crate::core::permissions::{merge_into, PermissionMap};
use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};

/// Environment variables, in declaration order
pub type EnvMap = IndexMap<String, String>;

/// Combine two rendered steps, `next` running after `self`
pub trait StepOutput: Default {
    fn append(&mut self, next: Self);
}

/// A single GitHub Actions step (`uses` or `run`)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct JobStep {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(rename = "if", default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uses: Option<String>,

    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub with: IndexMap<String, serde_yaml::Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run: Option<String>,

    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub env: EnvMap,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_directory: Option<String>,
}

impl JobStep {
    /// Step invoking a pinned action
    pub fn uses(name: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            uses: Some(action.into()),
            ..Default::default()
        }
    }

    /// Step running a literal shell command
    pub fn run(name: Option<String>, command: impl Into<String>) -> Self {
        Self {
            name,
            run: Some(command.into()),
            ..Default::default()
        }
    }

    pub fn with(mut self, key: &str, value: impl Into<serde_yaml::Value>) -> Self {
        self.with.insert(key.to_string(), value.into());
        self
    }

    pub fn with_env(mut self, key: &str, value: impl Into<String>) -> Self {
        self.env.insert(key.to_string(), value.into());
        self
    }

    pub fn with_condition(mut self, condition: impl Into<String>) -> Self {
        self.condition = Some(condition.into());
        self
    }

    pub fn in_directory(mut self, directory: impl Into<String>) -> Self {
        self.working_directory = Some(directory.into());
        self
    }
}

/// GitHub Actions rendering of a step
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GithubStepConfig {
    pub steps: Vec<JobStep>,
    pub env: EnvMap,
    pub needs: IndexSet<String>,
    pub permissions: Option<PermissionMap>,
}

impl StepOutput for GithubStepConfig {
    fn append(&mut self, next: Self) {
        self.steps.extend(next.steps);
        self.env.extend(next.env);
        self.needs.extend(next.needs);
        self.permissions = match (self.permissions.take(), next.permissions) {
            (Some(mut current), Some(other)) => {
                merge_into(&mut current, &other);
                Some(current)
            }
            (current, other) => current.or(other),
        };
    }
}

/// GitLab CI rendering of a step
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GitlabStepConfig {
    /// Hidden job fragments the enclosing job must extend
    pub extends: IndexSet<String>,
    pub commands: Vec<String>,
    pub env: EnvMap,
    pub needs: IndexSet<String>,
    /// Paths the enclosing job must publish as artifacts
    pub artifacts: IndexSet<String>,
}

impl StepOutput for GitlabStepConfig {
    fn append(&mut self, next: Self) {
        self.extends.extend(next.extends);
        self.commands.extend(next.commands);
        self.env.extend(next.env);
        self.needs.extend(next.needs);
        self.artifacts.extend(next.artifacts);
    }
}

/// Bash rendering of a step; environment travels as `export` lines
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BashStepConfig {
    pub commands: Vec<String>,
}

impl StepOutput for BashStepConfig {
    fn append(&mut self, next: Self) {
        self.commands.extend(next.commands);
    }
}

/// CodeCatalyst rendering of a step
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CodeCatalystStepConfig {
    pub commands: Vec<String>,
    pub env: EnvMap,
    pub needs: IndexSet<String>,
}

impl StepOutput for CodeCatalystStepConfig {
    fn append(&mut self, next: Self) {
        self.commands.extend(next.commands);
        self.env.extend(next.env);
        self.needs.extend(next.needs);
    }
}

/// Result of rendering a step for a runtime-selected target
#[derive(Debug, Clone, PartialEq)]
pub enum RenderedStep {
    Github(GithubStepConfig),
    Gitlab(GitlabStepConfig),
    Bash(BashStepConfig),
    CodeCatalyst(CodeCatalystStepConfig),
}

/// `export KEY=value`, quoting the value when the shell would split it
///
/// Command substitutions are copied verbatim into the double quotes; the
/// shell parses their body as a fresh command, so inner quotes must stay.
pub fn export_line(key: &str, value: &str) -> String {
    let plain = !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "_-./:@=,+$".contains(c));
    if plain && !value.contains("$(") {
        format!("export {}={}", key, value)
    } else {
        format!("export {}=\"{}\"", key, double_quoted(value))
    }
}

/// Escape `value` for a double-quoted context, leaving `$(...)` bodies untouched
pub(crate) fn double_quoted(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut depth = 0usize;
    let mut chars = value.chars().peekable();
    while let Some(c) = chars.next() {
        if depth > 0 {
            match c {
                '(' => depth += 1,
                ')' => depth -= 1,
                _ => {}
            }
            out.push(c);
            continue;
        }
        match c {
            '$' if chars.peek() == Some(&'(') => {
                chars.next();
                depth = 1;
                out.push_str("$(");
            }
            '\\' | '"' => {
                out.push('\\');
                out.push(c);
            }
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::permissions::{permissions, PermissionLevel};

    #[test]
    fn test_github_append_merges_permissions_broadest_wins() {
        let mut first = GithubStepConfig {
            permissions: Some(permissions([("contents", PermissionLevel::Read)])),
            ..Default::default()
        };
        let second = GithubStepConfig {
            permissions: Some(permissions([
                ("contents", PermissionLevel::Write),
                ("id-token", PermissionLevel::Write),
            ])),
            ..Default::default()
        };

        first.append(second);
        let merged = first.permissions.unwrap();
        assert_eq!(merged["contents"], PermissionLevel::Write);
        assert_eq!(merged["id-token"], PermissionLevel::Write);
    }

    #[test]
    fn test_github_append_keeps_permissions_from_either_side() {
        let mut first = GithubStepConfig::default();
        first.append(GithubStepConfig {
            permissions: Some(permissions([("packages", PermissionLevel::Read)])),
            ..Default::default()
        });
        assert!(first.permissions.is_some());
    }

    #[test]
    fn test_needs_union_keeps_first_occurrence_order() {
        let mut first = GitlabStepConfig::default();
        first.needs.extend(["synth".to_string(), "assets".to_string()]);
        let mut second = GitlabStepConfig::default();
        second.needs.extend(["assets".to_string(), "deploy-dev".to_string()]);

        first.append(second);
        let needs: Vec<_> = first.needs.into_iter().collect();
        assert_eq!(needs, vec!["synth", "assets", "deploy-dev"]);
    }

    #[test]
    fn test_export_line_quotes_only_when_needed() {
        assert_eq!(export_line("STAGE", "dev"), "export STAGE=dev");
        assert_eq!(export_line("REF", "$CI_COMMIT_SHA"), "export REF=$CI_COMMIT_SHA");
        assert_eq!(
            export_line("MSG", "hello world"),
            "export MSG=\"hello world\""
        );
        assert_eq!(
            export_line("VERSION", "$(cat version.txt)"),
            "export VERSION=\"$(cat version.txt)\""
        );
    }

    #[test]
    fn test_export_line_keeps_quotes_inside_substitution() {
        assert_eq!(
            export_line("PIPELINE_VERSION", "$(node -p \"require('./cdk.out/version.json').version\")"),
            "export PIPELINE_VERSION=\"$(node -p \"require('./cdk.out/version.json').version\")\""
        );
        assert_eq!(
            export_line("MSG", "say \"hi\" $(printf \"%s\" \"(x)\")"),
            "export MSG=\"say \\\"hi\\\" $(printf \"%s\" \"(x)\")\""
        );
    }

    #[test]
    fn test_export_line_evaluates_in_bash() {
        let Ok(version) = std::process::Command::new("bash").arg("--version").output() else {
            return;
        };
        assert!(version.status.success());

        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("version.json"), r#"{"version":"1.2.3"}"#).unwrap();
        let cases = [
            ("VERSION", "$(sed -n \"s/.*\\\"version\\\":\\\"\\([^\\\"]*\\)\\\".*/\\1/p\" version.json)", "1.2.3"),
            ("NESTED", "$(echo \"$(echo \"a b\")\")-x", "a b-x"),
            ("QUOTED", "say \"hi\"", "say \"hi\""),
        ];
        for (key, value, expected) in cases {
            let script = format!("{}\nprintf '%s' \"${}\"", export_line(key, value), key);
            let output = std::process::Command::new("bash")
                .arg("-c")
                .arg(&script)
                .current_dir(dir.path())
                .output()
                .unwrap();
            assert!(output.status.success(), "{}: {}", script, String::from_utf8_lossy(&output.stderr));
            assert_eq!(String::from_utf8_lossy(&output.stdout), expected, "{}", script);
        }
    }

    #[test]
    fn test_job_step_serializes_github_keys() {
        let step = JobStep::uses("Checkout", "actions/checkout@v4")
            .with("fetch-depth", 0)
            .in_directory("infra");
        let yaml = serde_yaml::to_string(&step).unwrap();
        assert!(yaml.contains("uses: actions/checkout@v4"));
        assert!(yaml.contains("fetch-depth: 0"));
        assert!(yaml.contains("working-directory: infra"));
        assert!(!yaml.contains("run:"));
    }
}
