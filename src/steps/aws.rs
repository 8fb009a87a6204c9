//! AWS role assumption

use crate::core::permissions::{permissions, PermissionLevel};
use crate::steps::output::{
    export_line, BashStepConfig, CodeCatalystStepConfig, GithubStepConfig, GitlabStepConfig,
    JobStep,
};

pub const CONFIGURE_AWS_CREDENTIALS: &str = "aws-actions/configure-aws-credentials@v4";

/// Hidden GitLab job carrying the OIDC token used for web identity federation
pub const GITLAB_AWS_FRAGMENT: &str = ".aws_base";

const GITLAB_SESSION_NAME: &str = "GitLabRunner-${CI_PROJECT_ID}-${CI_PIPELINE_ID}";
const GITHUB_SESSION_NAME: &str = "GitHubAction";

/// Assume an IAM role, optionally chaining through a jump role first
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssumeRoleStep {
    pub role_arn: String,
    pub region: String,
    pub session_name: Option<String>,
    pub jump_role_arn: Option<String>,
}

impl AssumeRoleStep {
    pub fn new(role_arn: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            role_arn: role_arn.into(),
            region: region.into(),
            session_name: None,
            jump_role_arn: None,
        }
    }

    pub fn via_jump_role(mut self, jump_role_arn: impl Into<String>) -> Self {
        self.jump_role_arn = Some(jump_role_arn.into());
        self
    }

    pub fn with_session_name(mut self, session_name: impl Into<String>) -> Self {
        self.session_name = Some(session_name.into());
        self
    }

    pub(crate) fn to_github(&self) -> GithubStepConfig {
        let session = self
            .session_name
            .clone()
            .unwrap_or_else(|| GITHUB_SESSION_NAME.to_string());

        let mut steps = Vec::new();
        if let Some(jump_role) = &self.jump_role_arn {
            steps.push(
                JobStep::uses("AWS Credentials (jump role)", CONFIGURE_AWS_CREDENTIALS)
                    .with("role-to-assume", jump_role.as_str())
                    .with("role-session-name", session.as_str())
                    .with("aws-region", self.region.as_str()),
            );
            steps.push(
                JobStep::uses("AWS Credentials", CONFIGURE_AWS_CREDENTIALS)
                    .with("role-to-assume", self.role_arn.as_str())
                    .with("role-session-name", session.as_str())
                    .with("aws-region", self.region.as_str())
                    .with("role-chaining", true),
            );
        } else {
            steps.push(
                JobStep::uses("AWS Credentials", CONFIGURE_AWS_CREDENTIALS)
                    .with("role-to-assume", self.role_arn.as_str())
                    .with("role-session-name", session.as_str())
                    .with("aws-region", self.region.as_str()),
            );
        }

        GithubStepConfig {
            steps,
            permissions: Some(permissions([
                ("id-token", PermissionLevel::Write),
                ("contents", PermissionLevel::Read),
            ])),
            ..Default::default()
        }
    }

    pub(crate) fn to_gitlab(&self) -> GitlabStepConfig {
        let session = self
            .session_name
            .clone()
            .unwrap_or_else(|| GITLAB_SESSION_NAME.to_string());

        let mut commands = Vec::new();
        match &self.jump_role_arn {
            Some(jump_role) => {
                commands.push(web_identity_command(jump_role, &session));
                commands.push(chained_command(&self.role_arn, &session));
            }
            None => commands.push(web_identity_command(&self.role_arn, &session)),
        }

        let mut config = GitlabStepConfig {
            commands,
            ..Default::default()
        };
        config.extends.insert(GITLAB_AWS_FRAGMENT.to_string());
        config
            .env
            .insert("AWS_REGION".to_string(), self.region.clone());
        config
    }

    /// Bash has no OIDC integration; the ambient credentials are used as-is
    pub(crate) fn to_bash(&self) -> BashStepConfig {
        BashStepConfig {
            commands: vec![
                format!(
                    "echo \"Skipping assumption of role {}: bash pipelines use the current AWS credentials\"",
                    self.role_arn
                ),
                export_line("AWS_REGION", &self.region),
            ],
        }
    }

    /// CodeCatalyst binds roles through environment connections
    pub(crate) fn to_codecatalyst(&self) -> CodeCatalystStepConfig {
        let mut config = CodeCatalystStepConfig::default();
        config
            .env
            .insert("AWS_REGION".to_string(), self.region.clone());
        config
    }
}

const CREDENTIALS_QUERY: &str = "--query 'Credentials.[AccessKeyId,SecretAccessKey,SessionToken]' --output text";
const EXPORT_CREDENTIALS: &str =
    "export $(printf \"AWS_ACCESS_KEY_ID=%s AWS_SECRET_ACCESS_KEY=%s AWS_SESSION_TOKEN=%s\"";

fn web_identity_command(role_arn: &str, session: &str) -> String {
    format!(
        "{} $(aws sts assume-role-with-web-identity --role-arn \"{}\" --role-session-name \"{}\" --web-identity-token ${{AWS_TOKEN}} --duration-seconds 3600 {}))",
        EXPORT_CREDENTIALS, role_arn, session, CREDENTIALS_QUERY
    )
}

fn chained_command(role_arn: &str, session: &str) -> String {
    format!(
        "{} $(aws sts assume-role --role-arn \"{}\" --role-session-name \"{}\" {}))",
        EXPORT_CREDENTIALS, role_arn, session, CREDENTIALS_QUERY
    )
}
