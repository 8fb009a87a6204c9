//! Moving build outputs between jobs

use crate::steps::output::{BashStepConfig, GithubStepConfig, GitlabStepConfig, JobStep};

pub const UPLOAD_ARTIFACT: &str = "actions/upload-artifact@v4";
pub const DOWNLOAD_ARTIFACT: &str = "actions/download-artifact@v4";

/// Publish `path` under `name` for downstream jobs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadArtifactStep {
    pub name: String,
    pub path: String,
}

impl UploadArtifactStep {
    pub fn new(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
        }
    }

    pub(crate) fn to_github(&self) -> GithubStepConfig {
        GithubStepConfig {
            steps: vec![JobStep::uses("Upload artifact", UPLOAD_ARTIFACT)
                .with("name", self.name.as_str())
                .with("path", self.path.as_str())],
            ..Default::default()
        }
    }

    /// GitLab publishes artifacts from the job definition, not from the script
    pub(crate) fn to_gitlab(&self) -> GitlabStepConfig {
        let mut config = GitlabStepConfig::default();
        config.artifacts.insert(self.path.clone());
        config
    }

    /// Bash jobs share one working tree, nothing to publish
    pub(crate) fn to_bash(&self) -> BashStepConfig {
        BashStepConfig::default()
    }
}

/// Fetch the artifact `name`, produced by `from_job`, into `path`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadArtifactStep {
    pub name: String,
    pub path: String,
    pub from_job: Option<String>,
}

impl DownloadArtifactStep {
    pub fn new(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            from_job: None,
        }
    }

    pub fn from_job(mut self, job: impl Into<String>) -> Self {
        self.from_job = Some(job.into());
        self
    }

    pub(crate) fn to_github(&self) -> GithubStepConfig {
        let mut config = GithubStepConfig {
            steps: vec![JobStep::uses("Download artifact", DOWNLOAD_ARTIFACT)
                .with("name", self.name.as_str())
                .with("path", self.path.as_str())],
            ..Default::default()
        };
        config.needs.extend(self.from_job.clone());
        config
    }

    /// Artifacts of needed jobs are restored automatically by GitLab
    pub(crate) fn to_gitlab(&self) -> GitlabStepConfig {
        let mut config = GitlabStepConfig::default();
        config.needs.extend(self.from_job.clone());
        config
    }

    pub(crate) fn to_bash(&self) -> BashStepConfig {
        BashStepConfig::default()
    }
}
