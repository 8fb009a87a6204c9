//! Manual-zip deployment to an AWS Amplify Hosting app

use crate::steps::output::{BashStepConfig, GithubStepConfig, GitlabStepConfig, JobStep};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AmplifyDeployStep {
    pub app_id: String,
    pub branch_name: String,
    pub region: String,
    /// Zip archive of the built site
    pub artifact: String,
}

impl AmplifyDeployStep {
    pub fn new(
        app_id: impl Into<String>,
        branch_name: impl Into<String>,
        region: impl Into<String>,
        artifact: impl Into<String>,
    ) -> Self {
        Self {
            app_id: app_id.into(),
            branch_name: branch_name.into(),
            region: region.into(),
            artifact: artifact.into(),
        }
    }

    fn commands(&self) -> Vec<String> {
        vec![
            format!(
                "read -r JOB_ID UPLOAD_URL <<< \"$(aws amplify create-deployment --app-id {} --branch-name {} --region {} --query '[jobId,zipUploadUrl]' --output text)\"",
                self.app_id, self.branch_name, self.region
            ),
            format!("curl --fail --silent -T {} \"$UPLOAD_URL\"", self.artifact),
            format!(
                "aws amplify start-deployment --app-id {} --branch-name {} --job-id \"$JOB_ID\" --region {}",
                self.app_id, self.branch_name, self.region
            ),
        ]
    }

    /// The deployment id lives in shell variables, so GitHub gets one step
    pub(crate) fn to_github(&self) -> GithubStepConfig {
        GithubStepConfig {
            steps: vec![JobStep::run(
                Some("Deploy to Amplify".to_string()),
                self.commands().join("\n"),
            )],
            ..Default::default()
        }
    }

    pub(crate) fn to_gitlab(&self) -> GitlabStepConfig {
        GitlabStepConfig {
            commands: self.commands(),
            ..Default::default()
        }
    }

    pub(crate) fn to_bash(&self) -> BashStepConfig {
        BashStepConfig {
            commands: self.commands(),
        }
    }
}
