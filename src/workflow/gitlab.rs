//! `.gitlab-ci.yml` documents

use crate::error::ValidationError;
use crate::steps::aws::GITLAB_AWS_FRAGMENT;
use crate::steps::{EnvMap, GitlabStepConfig};
use indexmap::IndexMap;
use serde::Serialize;

const STS_AUDIENCE: &str = "https://sts.amazonaws.com";

/// The whole pipeline file; every generator adds its jobs to one document
#[derive(Debug, Clone, Default, Serialize)]
pub struct GitlabCi {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub stages: Vec<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<GitlabDefault>,

    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub variables: EnvMap,

    #[serde(flatten)]
    pub jobs: IndexMap<String, GitlabJob>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GitlabDefault {
    pub image: GitlabImage,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum GitlabImage {
    Name(String),
    WithEntrypoint { name: String, entrypoint: Vec<String> },
}

impl GitlabCi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Register a stage; order of first registration is kept
    pub fn add_stage(&mut self, stage: &str) {
        if !self.stages.iter().any(|s| s == stage) {
            self.stages.push(stage.to_string());
        }
    }

    pub fn set_default_image(&mut self, image: &str) {
        if self.default.is_none() {
            self.default = Some(GitlabDefault {
                image: GitlabImage::Name(image.to_string()),
            });
        }
    }

    /// Add a job, registering its stage and any hidden fragment it extends
    pub fn add_job(&mut self, id: impl Into<String>, job: GitlabJob) -> Result<(), ValidationError> {
        let id = id.into();
        if self.jobs.contains_key(&id) {
            return Err(ValidationError::DuplicateJob(id));
        }
        if let Some(stage) = &job.stage {
            self.add_stage(stage);
        }
        if job.extends.iter().any(|e| e == GITLAB_AWS_FRAGMENT) {
            self.ensure_aws_fragment();
        }
        self.jobs.insert(id, job);
        Ok(())
    }

    /// Hidden job that issues the OIDC token for AWS web identity federation
    fn ensure_aws_fragment(&mut self) {
        if self.jobs.contains_key(GITLAB_AWS_FRAGMENT) {
            return;
        }
        let mut fragment = GitlabJob::default();
        fragment.id_tokens.insert(
            "AWS_TOKEN".to_string(),
            IdToken {
                aud: STS_AUDIENCE.to_string(),
            },
        );
        // hidden fragments lead the document
        self.jobs.shift_insert(0, GITLAB_AWS_FRAGMENT.to_string(), fragment);
    }
}

/// A GitLab job, or a hidden fragment when its id starts with `.`
#[derive(Debug, Clone, Default, Serialize)]
pub struct GitlabJob {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<String>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub extends: Vec<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<GitlabImage>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub needs: Option<Vec<String>>,

    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub variables: EnvMap,

    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub id_tokens: IndexMap<String, IdToken>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub script: Vec<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifacts: Option<Artifacts>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub environment: Option<GitlabEnvironment>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub when: Option<String>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub rules: Vec<Rule>,
}

impl GitlabJob {
    /// Build a job from rendered steps; `needs` precede the steps' own needs
    pub fn from_steps<I, S>(stage: &str, rendered: GitlabStepConfig, needs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut all_needs: Vec<String> = needs.into_iter().map(Into::into).collect();
        for need in rendered.needs {
            if !all_needs.contains(&need) {
                all_needs.push(need);
            }
        }

        let artifacts = if rendered.artifacts.is_empty() {
            None
        } else {
            Some(Artifacts {
                paths: rendered.artifacts.into_iter().collect(),
                expire_in: Some("30 days".to_string()),
            })
        };

        Self {
            stage: Some(stage.to_string()),
            extends: rendered.extends.into_iter().collect(),
            needs: Some(all_needs),
            variables: rendered.env,
            script: rendered.commands,
            artifacts,
            ..Default::default()
        }
    }

    pub fn with_tags(mut self, runner: &[String]) -> Self {
        self.tags = runner.to_vec();
        self
    }

    pub fn manual(mut self) -> Self {
        self.when = Some("manual".to_string());
        self
    }

    pub fn in_environment(mut self, name: impl Into<String>) -> Self {
        self.environment = Some(GitlabEnvironment { name: name.into() });
        self
    }

    pub fn with_image(mut self, image: GitlabImage) -> Self {
        self.image = Some(image);
        self
    }

    pub fn with_variable(mut self, key: &str, value: impl Into<String>) -> Self {
        self.variables.insert(key.to_string(), value.into());
        self
    }

    /// Run only when `condition` holds; a manual job keeps its `when` inside the rule
    pub fn only_if(mut self, condition: impl Into<String>) -> Self {
        let when = self.when.take();
        self.rules.push(Rule {
            condition: condition.into(),
            when,
        });
        self
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct IdToken {
    pub aud: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Artifacts {
    pub paths: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expire_in: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GitlabEnvironment {
    pub name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Rule {
    #[serde(rename = "if")]
    pub condition: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub when: Option<String>,
}

/// Rule matching pushes to `branch`
pub fn on_branch(branch: &str) -> String {
    format!("$CI_COMMIT_BRANCH == \"{}\" && $CI_PIPELINE_SOURCE != \"schedule\"", branch)
}

/// Rule matching pushes to every branch but `branch`
pub fn off_branch(branch: &str) -> String {
    format!("$CI_COMMIT_BRANCH && $CI_COMMIT_BRANCH != \"{}\" && $CI_PIPELINE_SOURCE != \"schedule\"", branch)
}

pub const ON_SCHEDULE: &str = "$CI_PIPELINE_SOURCE == \"schedule\"";

#[cfg(test)]
mod tests {
    use super::*;
    use crate::steps::{AssumeRoleStep, CommandStep, PipelineStep, StepSequence, UploadArtifactStep};

    #[test]
    fn test_extending_aws_base_adds_the_fragment_once() {
        let rendered = PipelineStep::from(
            StepSequence::new()
                .then(AssumeRoleStep::new("arn:role", "eu-west-1"))
                .then(CommandStep::new(["npx cdk synth"]))
                .then(UploadArtifactStep::new("cloud-assembly", "cdk.out")),
        )
        .to_gitlab()
        .unwrap();

        let mut ci = GitlabCi::new();
        ci.add_job("synth", GitlabJob::from_steps("synth", rendered.clone(), Vec::<String>::new()))
            .unwrap();
        ci.add_job("diff", GitlabJob::from_steps("synth", rendered, ["synth"]))
            .unwrap();

        let keys: Vec<_> = ci.jobs.keys().cloned().collect();
        assert_eq!(keys, vec![".aws_base", "synth", "diff"]);
        assert_eq!(ci.stages, vec!["synth"]);

        let doc = serde_yaml::to_value(&ci).unwrap();
        assert_eq!(doc[".aws_base"]["id_tokens"]["AWS_TOKEN"]["aud"], STS_AUDIENCE);
        assert_eq!(doc["synth"]["extends"][0], ".aws_base");
        assert_eq!(doc["synth"]["artifacts"]["paths"][0], "cdk.out");
        assert_eq!(doc["synth"]["variables"]["AWS_REGION"], "eu-west-1");
        assert_eq!(doc["diff"]["needs"][0], "synth");
    }

    #[test]
    fn test_manual_rule_keeps_when() {
        let job = GitlabJob::default().manual().only_if(on_branch("main"));
        assert!(job.when.is_none());
        assert_eq!(job.rules[0].when.as_deref(), Some("manual"));
    }

    #[test]
    fn test_duplicate_job_is_rejected() {
        let mut ci = GitlabCi::new();
        ci.add_job("synth", GitlabJob::default()).unwrap();
        assert!(ci.add_job("synth", GitlabJob::default()).is_err());
    }
}
