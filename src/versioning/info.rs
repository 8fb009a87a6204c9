//! Version record persisted next to deployments

use crate::versioning::{GitInfo, VersionError, VersioningStrategy};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Computed version plus the facts it was computed from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionInfo {
    pub version: String,
    pub commit_hash: String,
    pub commit_hash_short: String,
    pub branch: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commits_since_tag: Option<u64>,
    pub commit_count: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub package_version: Option<String>,
    pub deployed_at: DateTime<Utc>,
    pub deployed_by: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build_number: Option<String>,
    pub environment: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repository: Option<String>,
}

impl VersionInfo {
    /// Compute the version for `environment` and capture the record
    pub fn create(
        git: &GitInfo,
        strategy: &VersioningStrategy,
        environment: impl Into<String>,
        deployed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            version: strategy.compute(git),
            commit_hash: git.commit_hash.clone(),
            commit_hash_short: git.commit_hash_short.clone(),
            branch: git.branch.clone(),
            tag: git.tag.clone(),
            commits_since_tag: git.commits_since_tag,
            commit_count: git.commit_count,
            package_version: git.package_version.clone(),
            deployed_at,
            deployed_by: git.actor.clone().unwrap_or_else(|| "unknown".to_string()),
            build_number: git.build_number.clone(),
            environment: environment.into(),
            repository: git.repository.clone(),
        }
    }

    pub fn to_json(&self) -> Result<String, VersionError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, VersionError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Tagged and no commits on top of the tag
    pub fn is_tagged_release(&self) -> bool {
        self.tag.is_some() && self.commits_since_tag == Some(0)
    }

    pub fn is_main_branch(&self) -> bool {
        self.branch == "main" || self.branch == "master"
    }

    /// Orders by commit count, then by version string.
    ///
    /// The tie-break is lexicographic, not semver; it only answers "is this a
    /// newer build of the same line".
    pub fn compare(&self, other: &VersionInfo) -> Ordering {
        self.commit_count
            .cmp(&other.commit_count)
            .then_with(|| self.version.cmp(&other.version))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::versioning::GitTagConfig;
    use chrono::TimeZone;

    fn git() -> GitInfo {
        GitInfo {
            commit_hash: "abcdef0123456789abcdef0123456789abcdef01".to_string(),
            commit_hash_short: "abcdef01".to_string(),
            branch: "main".to_string(),
            tag: Some("v1.2.3".to_string()),
            commits_since_tag: Some(0),
            commit_count: 120,
            actor: Some("ci-bot".to_string()),
            ..Default::default()
        }
    }

    fn info(git: &GitInfo) -> VersionInfo {
        let strategy = VersioningStrategy::git_tag(GitTagConfig {
            strip_prefix: Some("v".to_string()),
        });
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        VersionInfo::create(git, &strategy, "prod", at)
    }

    #[test]
    fn test_tagged_release_on_main() {
        let info = info(&git());
        assert_eq!(info.version, "1.2.3");
        assert!(info.is_tagged_release());
        assert!(info.is_main_branch());
        assert_eq!(info.deployed_by, "ci-bot");
    }

    #[test]
    fn test_commits_after_tag_is_not_a_release() {
        let mut git = git();
        git.commits_since_tag = Some(3);
        git.branch = "feature/x".to_string();
        let info = info(&git);
        assert!(!info.is_tagged_release());
        assert!(!info.is_main_branch());
    }

    #[test]
    fn test_master_counts_as_main() {
        let mut git = git();
        git.branch = "master".to_string();
        assert!(info(&git).is_main_branch());
    }

    #[test]
    fn test_json_omits_absent_fields() {
        let mut git = git();
        git.tag = None;
        git.commits_since_tag = None;
        let json = info(&git).to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["commitHashShort"], "abcdef01");
        assert_eq!(value["deployedAt"], "2024-05-01T12:00:00Z");
        for absent in ["tag", "commitsSinceTag", "packageVersion", "buildNumber", "repository"] {
            assert!(value.get(absent).is_none(), "{} should be omitted", absent);
        }
    }

    #[test]
    fn test_json_round_trip() {
        let mut git = git();
        git.build_number = Some("77".to_string());
        git.repository = Some("acme/app".to_string());
        git.package_version = Some("2.0.0".to_string());
        let original = info(&git);
        let parsed = VersionInfo::from_json(&original.to_json().unwrap()).unwrap();
        assert_eq!(parsed, original);
    }

    #[test]
    fn test_compare_by_count_then_version() {
        let base = info(&git());
        let mut newer = base.clone();
        newer.commit_count += 1;
        newer.version = "1.0.0".to_string();
        assert_eq!(base.compare(&newer), Ordering::Less);

        let mut same_count = base.clone();
        same_count.version = "1.2.4".to_string();
        assert_eq!(base.compare(&same_count), Ordering::Less);
        assert_eq!(base.compare(&base.clone()), Ordering::Equal);
    }
}
