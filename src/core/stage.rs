//! Deployment stages and their per-stage resolution

use crate::core::config::{Defaults, StepConfig};
use crate::error::ValidationError;
use crate::steps::StepSequence;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::OnceLock;

/// Account/region locator of a stage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Environment {
    pub account: String,
    pub region: String,
}

/// Runner selection: GitHub `runs-on` labels or GitLab runner tags
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Runner {
    Label(String),
    Labels(Vec<String>),
}

impl Runner {
    pub fn labels(&self) -> Vec<String> {
        match self {
            Runner::Label(label) => vec![label.clone()],
            Runner::Labels(labels) => labels.clone(),
        }
    }
}

impl Default for Runner {
    fn default() -> Self {
        Runner::Label("ubuntu-latest".to_string())
    }
}

/// A stage as declared in the project file
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageConfig {
    pub name: String,

    pub env: Environment,

    /// Deploy only on demand, outside the automatic chain
    #[serde(default)]
    pub manual_approval: bool,

    /// Independent stages only: deploy on every push instead of on demand
    #[serde(default)]
    pub deploy_on_push: bool,

    /// Overrides the default runner
    #[serde(default)]
    pub runner: Option<Runner>,

    /// Overrides the deployment role from `iamRoleArns`
    #[serde(default)]
    pub deploy_role_arn: Option<String>,

    #[serde(default)]
    pub pre_deploy_steps: Vec<StepConfig>,

    #[serde(default)]
    pub post_deploy_steps: Vec<StepConfig>,
}

/// How a stage is triggered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageKind {
    /// Part of the main linear chain
    Pipeline,
    /// Self-contained, deployed on push or on demand
    Independent,
    /// Ephemeral per developer, keyed by `USER`
    Personal,
    /// Ephemeral per branch, keyed by `BRANCH`
    Feature,
}

/// IAM roles used by the pipeline; every lookup falls back to `default`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IamRoleConfig {
    #[serde(default)]
    pub default: Option<String>,

    #[serde(default)]
    pub synth: Option<String>,

    #[serde(default)]
    pub asset_publishing: Option<String>,

    #[serde(default)]
    pub asset_publishing_per_stage: HashMap<String, String>,

    #[serde(default)]
    pub deployment: HashMap<String, String>,

    /// Role assumed first and chained into the target role
    #[serde(default)]
    pub jump_role: Option<String>,
}

impl IamRoleConfig {
    pub fn synth_role(&self) -> Option<String> {
        self.synth.clone().or_else(|| self.default.clone())
    }

    pub fn asset_role(&self) -> Option<String> {
        self.asset_publishing.clone().or_else(|| self.default.clone())
    }

    fn asset_role_for(&self, stage: &str) -> Option<String> {
        self.asset_publishing_per_stage
            .get(stage)
            .cloned()
            .or_else(|| self.asset_role())
    }

    fn deployment_role_for(&self, stage: &str) -> Option<String> {
        self.deployment
            .get(stage)
            .cloned()
            .or_else(|| self.default.clone())
    }
}

/// A stage with every fallback applied; rendering reads only from this
#[derive(Debug, Clone)]
pub struct ResolvedStage {
    pub name: String,
    /// `Dev`, `ProdEu`, ... used in generated identifiers
    pub identifier: String,
    pub kind: StageKind,
    pub env: Environment,
    pub manual_approval: bool,
    pub deploy_on_push: bool,
    pub runner: Vec<String>,
    pub deploy_role: Option<String>,
    pub asset_role: Option<String>,
    pub jump_role: Option<String>,
    pub pre_deploy: StepSequence,
    pub post_deploy: StepSequence,
}

impl ResolvedStage {
    pub fn resolve(
        config: &StageConfig,
        kind: StageKind,
        roles: &IamRoleConfig,
        defaults: &Defaults,
    ) -> Result<Self, ValidationError> {
        let identifier = stage_identifier(&config.name);
        if identifier.is_empty() {
            return Err(ValidationError::EmptyStageIdentifier(config.name.clone()));
        }

        let runner = config
            .runner
            .as_ref()
            .unwrap_or(&defaults.runner)
            .labels();

        Ok(Self {
            name: config.name.clone(),
            identifier,
            kind,
            env: config.env.clone(),
            manual_approval: config.manual_approval,
            deploy_on_push: config.deploy_on_push,
            runner,
            deploy_role: config
                .deploy_role_arn
                .clone()
                .or_else(|| roles.deployment_role_for(&config.name)),
            asset_role: roles.asset_role_for(&config.name),
            jump_role: roles.jump_role.clone(),
            pre_deploy: steps_from_config(&config.pre_deploy_steps, defaults),
            post_deploy: steps_from_config(&config.post_deploy_steps, defaults),
        })
    }

    /// Job id used across targets, e.g. `deploy-dev`
    pub fn job_id(&self, prefix: &str) -> String {
        format!("{}-{}", prefix, job_slug(&self.name))
    }
}

pub fn steps_from_config(configs: &[StepConfig], defaults: &Defaults) -> StepSequence {
    StepSequence::from_steps(configs.iter().map(|config| config.to_step(defaults)))
}

fn non_identifier_chars() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"[^a-zA-Z0-9\s]").expect("static pattern"))
}

/// Stage name reduced to characters every CI backend accepts in job ids
pub fn job_slug(name: &str) -> String {
    name.trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '-'
            }
        })
        .collect()
}

/// Turn a free-form stage name into an identifier fragment
///
/// Non-alphanumeric characters are dropped, whitespace separates words, and
/// each word gets an upper-case first letter with the rest kept as written:
/// `"prod eu-west"` becomes `"ProdEuwest"`, `"prodEU"` stays `"ProdEU"`.
pub fn stage_identifier(name: &str) -> String {
    non_identifier_chars()
        .replace_all(name, "")
        .split_whitespace()
        .map(title_case)
        .collect()
}

fn title_case(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
        None => String::new(),
    }
}

/// Reject stage sets whose names repeat or normalize to the same identifier
pub fn ensure_unique_identifiers<'a, I>(stages: I) -> Result<(), ValidationError>
where
    I: IntoIterator<Item = &'a ResolvedStage>,
{
    let mut seen: HashMap<&str, &str> = HashMap::new();
    for stage in stages {
        if let Some(first) = seen.insert(&stage.identifier, &stage.name) {
            if first == stage.name {
                return Err(ValidationError::DuplicateStage(stage.name.clone()));
            }
            return Err(ValidationError::IdentifierCollision {
                first: first.to_string(),
                second: stage.name.clone(),
                identifier: stage.identifier.clone(),
            });
        }
    }
    Ok(())
}
