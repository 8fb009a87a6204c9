//! Version format strings and their tokens

use crate::versioning::GitInfo;
use serde::{Deserialize, Serialize};

const DEFAULT_VERSION: &str = "0.0.0";

/// Where `{commit-count}` counts from
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CountFrom {
    #[default]
    All,
    SinceTag,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GitTagConfig {
    /// Literal prefix removed from the tag, usually `v`
    #[serde(default)]
    pub strip_prefix: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageJsonConfig {
    #[serde(default)]
    pub path: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitCountConfig {
    #[serde(default)]
    pub count_from: CountFrom,
    /// Left-pad the count with zeros to this width
    #[serde(default)]
    pub padding: Option<usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildNumberConfig {
    #[serde(default)]
    pub prefix: Option<String>,
}

/// Per-token options; a token without options uses its defaults
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StrategyComponents {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git_tag: Option<GitTagConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub package_json: Option<PackageJsonConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit_count: Option<CommitCountConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build_number: Option<BuildNumberConfig>,
}

/// A format string plus the options of the tokens it uses
///
/// Tokens are replaced in a fixed order: `{git-tag}`, `{package-version}`,
/// `{commit-count}`, `{commit-hash:8}`, `{commit-hash}`, `{branch}`,
/// `{build-number}`. Missing tags and package versions read as `0.0.0`; a
/// missing build number leaves `{build-number}` in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersioningStrategy {
    pub format: String,
    #[serde(default)]
    pub components: StrategyComponents,
}

impl Default for VersioningStrategy {
    fn default() -> Self {
        Self::git_tag(GitTagConfig {
            strip_prefix: Some("v".to_string()),
        })
    }
}

impl VersioningStrategy {
    pub fn git_tag(config: GitTagConfig) -> Self {
        Self::custom(
            "{git-tag}",
            StrategyComponents {
                git_tag: Some(config),
                ..Default::default()
            },
        )
    }

    pub fn package_json(config: PackageJsonConfig) -> Self {
        Self::custom(
            "{package-version}",
            StrategyComponents {
                package_json: Some(config),
                ..Default::default()
            },
        )
    }

    pub fn commit_count(config: CommitCountConfig) -> Self {
        Self::custom(
            "{commit-count}",
            StrategyComponents {
                commit_count: Some(config),
                ..Default::default()
            },
        )
    }

    pub fn commit_hash() -> Self {
        Self::custom("{commit-hash:8}", StrategyComponents::default())
    }

    pub fn build_number(config: BuildNumberConfig) -> Self {
        Self::custom(
            "{build-number}-{commit-hash:8}",
            StrategyComponents {
                build_number: Some(config),
                ..Default::default()
            },
        )
    }

    pub fn custom(format: impl Into<String>, components: StrategyComponents) -> Self {
        Self {
            format: format.into(),
            components,
        }
    }

    /// Path of the package manifest read for `{package-version}`
    pub fn package_json_path(&self) -> &str {
        self.components
            .package_json
            .as_ref()
            .and_then(|c| c.path.as_deref())
            .unwrap_or("package.json")
    }

    /// Substitute every token of the format string
    pub fn compute(&self, git: &GitInfo) -> String {
        let mut version = self.format.clone();

        version = version.replace("{git-tag}", &self.tag_value(git));
        version = version.replace(
            "{package-version}",
            git.package_version.as_deref().unwrap_or(DEFAULT_VERSION),
        );
        version = version.replace("{commit-count}", &self.count_value(git));
        version = version.replace("{commit-hash:8}", &git.commit_hash_short);
        version = version.replace("{commit-hash}", &git.commit_hash);
        version = version.replace("{branch}", &git.branch);
        if let Some(build) = &git.build_number {
            let prefix = self
                .components
                .build_number
                .as_ref()
                .and_then(|c| c.prefix.as_deref())
                .unwrap_or_default();
            version = version.replace("{build-number}", &format!("{}{}", prefix, build));
        }

        version
    }

    fn tag_value(&self, git: &GitInfo) -> String {
        let Some(tag) = git.tag.as_deref() else {
            return DEFAULT_VERSION.to_string();
        };
        let prefix = self
            .components
            .git_tag
            .as_ref()
            .and_then(|c| c.strip_prefix.as_deref());
        match prefix {
            Some(prefix) => tag.strip_prefix(prefix).unwrap_or(tag).to_string(),
            None => tag.to_string(),
        }
    }

    fn count_value(&self, git: &GitInfo) -> String {
        let config = self.components.commit_count.clone().unwrap_or_default();
        let count = match config.count_from {
            CountFrom::All => git.commit_count,
            CountFrom::SinceTag => git.commits_since_tag.unwrap_or(git.commit_count),
        };
        match config.padding {
            Some(width) => format!("{:0>width$}", count, width = width),
            None => count.to_string(),
        }
    }
}
