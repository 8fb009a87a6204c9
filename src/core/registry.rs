//! Container registry declarations

use crate::error::ValidationError;
use serde::{Deserialize, Serialize};

/// A registry a container image is pushed to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase", rename_all_fields = "camelCase")]
pub enum Registry {
    Ecr {
        repository: String,
        #[serde(default)]
        region: Option<String>,
        /// Defaults to `$AWS_ACCOUNT_ID` at run time
        #[serde(default)]
        account: Option<String>,
    },
    DockerHub {
        repository: String,
        #[serde(default)]
        username_secret: Option<String>,
        #[serde(default)]
        password_secret: Option<String>,
    },
    Harbor {
        repository: String,
        #[serde(default)]
        url: Option<String>,
        #[serde(default)]
        username_secret: Option<String>,
        #[serde(default)]
        password_secret: Option<String>,
    },
}

impl Registry {
    pub fn kind(&self) -> &'static str {
        match self {
            Registry::Ecr { .. } => "ECR",
            Registry::DockerHub { .. } => "DockerHub",
            Registry::Harbor { .. } => "Harbor",
        }
    }

    /// Check the registry carries everything a push needs
    pub fn validate(&self, stage: &str) -> Result<(), ValidationError> {
        match self {
            Registry::Ecr { region, .. } => {
                if region.as_deref().map_or(true, str::is_empty) {
                    return Err(ValidationError::EcrMissingRegion(stage.to_string()));
                }
            }
            Registry::DockerHub {
                username_secret,
                password_secret,
                ..
            } => self.require_credentials(stage, username_secret, password_secret)?,
            Registry::Harbor {
                url,
                username_secret,
                password_secret,
                ..
            } => {
                if url.as_deref().map_or(true, str::is_empty) {
                    return Err(ValidationError::HarborMissingUrl(stage.to_string()));
                }
                self.require_credentials(stage, username_secret, password_secret)?;
            }
        }
        Ok(())
    }

    fn require_credentials(
        &self,
        stage: &str,
        username: &Option<String>,
        password: &Option<String>,
    ) -> Result<(), ValidationError> {
        if username.is_none() || password.is_none() {
            return Err(ValidationError::MissingCredentials {
                registry: self.kind().to_string(),
                stage: stage.to_string(),
            });
        }
        Ok(())
    }

    /// Hostname used for `docker login`; `None` means Docker Hub
    pub fn host(&self) -> Option<String> {
        match self {
            Registry::Ecr {
                region, account, ..
            } => Some(format!(
                "{}.dkr.ecr.{}.amazonaws.com",
                account.as_deref().unwrap_or("$AWS_ACCOUNT_ID"),
                region.as_deref().unwrap_or_default()
            )),
            Registry::DockerHub { .. } => None,
            Registry::Harbor { url, .. } => url.as_deref().map(strip_scheme),
        }
    }

    pub fn repository(&self) -> &str {
        match self {
            Registry::Ecr { repository, .. }
            | Registry::DockerHub { repository, .. }
            | Registry::Harbor { repository, .. } => repository,
        }
    }

    /// Fully qualified image reference for `tag`
    pub fn image_ref(&self, tag: &str) -> String {
        match self.host() {
            Some(host) => format!("{}/{}:{}", host, self.repository(), tag),
            None => format!("{}:{}", self.repository(), tag),
        }
    }

    /// Secret names holding the registry credentials, if any
    pub fn credentials(&self) -> Option<(&str, &str)> {
        match self {
            Registry::Ecr { .. } => None,
            Registry::DockerHub {
                username_secret,
                password_secret,
                ..
            }
            | Registry::Harbor {
                username_secret,
                password_secret,
                ..
            } => Some((username_secret.as_deref()?, password_secret.as_deref()?)),
        }
    }

    pub fn region(&self) -> Option<&str> {
        match self {
            Registry::Ecr { region, .. } => region.as_deref(),
            _ => None,
        }
    }
}

fn strip_scheme(url: &str) -> String {
    url.trim_start_matches("https://")
        .trim_start_matches("http://")
        .trim_end_matches('/')
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_yaml_shapes() {
        let yaml = r#"
- type: ecr
  repository: my-app
  region: eu-central-1
  account: "123456789012"
- type: dockerhub
  repository: acme/my-app
  usernameSecret: DOCKERHUB_USERNAME
  passwordSecret: DOCKERHUB_TOKEN
- type: harbor
  repository: library/my-app
  url: https://harbor.example.com/
  usernameSecret: HARBOR_USER
  passwordSecret: HARBOR_PASSWORD
"#;
        let registries: Vec<Registry> = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(
            registries[0].image_ref("1.0.0"),
            "123456789012.dkr.ecr.eu-central-1.amazonaws.com/my-app:1.0.0"
        );
        assert_eq!(registries[1].image_ref("latest"), "acme/my-app:latest");
        assert_eq!(
            registries[2].image_ref("abc"),
            "harbor.example.com/library/my-app:abc"
        );
        assert_eq!(
            registries[2].credentials(),
            Some(("HARBOR_USER", "HARBOR_PASSWORD"))
        );
    }

    #[test]
    fn test_ecr_requires_region() {
        let registry = Registry::Ecr {
            repository: "app".to_string(),
            region: None,
            account: None,
        };
        assert_eq!(
            registry.validate("prod").unwrap_err().to_string(),
            "ECR registry in stage 'prod' must specify a region"
        );
    }

    #[test]
    fn test_harbor_requires_url_then_credentials() {
        let mut registry = Registry::Harbor {
            repository: "lib/app".to_string(),
            url: None,
            username_secret: Some("U".to_string()),
            password_secret: Some("P".to_string()),
        };
        assert_eq!(
            registry.validate("dev"),
            Err(ValidationError::HarborMissingUrl("dev".to_string()))
        );

        if let Registry::Harbor {
            url,
            password_secret,
            ..
        } = &mut registry
        {
            *url = Some("https://harbor.local".to_string());
            *password_secret = None;
        }
        assert!(matches!(
            registry.validate("dev"),
            Err(ValidationError::MissingCredentials { .. })
        ));
    }

    #[test]
    fn test_dockerhub_requires_both_secrets() {
        let registry = Registry::DockerHub {
            repository: "acme/app".to_string(),
            username_secret: Some("U".to_string()),
            password_secret: None,
        };
        let err = registry.validate("dev").unwrap_err();
        assert_eq!(
            err.to_string(),
            "DockerHub registry in stage 'dev' must specify usernameSecret and passwordSecret"
        );
    }
}
