//! Gathering version facts from git or from CI environment variables

use crate::versioning::VersionError;
use serde::Deserialize;
use std::path::Path;
use std::process::Command;
use tracing::debug;

/// Raw facts a version string is computed from
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GitInfo {
    pub commit_hash: String,
    pub commit_hash_short: String,
    pub branch: String,
    pub tag: Option<String>,
    pub commits_since_tag: Option<u64>,
    pub commit_count: u64,
    pub package_version: Option<String>,
    pub build_number: Option<String>,
    pub repository: Option<String>,
    pub actor: Option<String>,
}

#[derive(Deserialize)]
struct PackageManifest {
    version: Option<String>,
}

impl GitInfo {
    /// Inspect the repository at `dir` with the git CLI
    pub fn from_git(dir: &Path) -> Result<Self, VersionError> {
        let commit_hash = git(dir, &["rev-parse", "HEAD"])?;
        let branch = git(dir, &["rev-parse", "--abbrev-ref", "HEAD"])?;
        let commit_count = parse_count(&git(dir, &["rev-list", "--count", "HEAD"])?)?;

        // a repository without tags is not an error
        let tag = git(dir, &["describe", "--tags", "--abbrev=0"]).ok();
        let commits_since_tag = match &tag {
            Some(tag) => Some(parse_count(&git(
                dir,
                &["rev-list", "--count", &format!("{}..HEAD", tag)],
            )?)?),
            None => None,
        };
        let repository = git(dir, &["config", "--get", "remote.origin.url"])
            .ok()
            .map(|url| repository_from_url(&url));
        let actor = git(dir, &["config", "user.name"]).ok();

        debug!("Git facts: {} on {} ({} commits)", commit_hash, branch, commit_count);
        Ok(Self {
            commit_hash_short: short_hash(&commit_hash),
            commit_hash,
            branch,
            tag,
            commits_since_tag,
            commit_count,
            repository,
            actor,
            ..Default::default()
        })
    }

    /// Read CI variables (GitHub Actions, GitLab CI or generic)
    pub fn from_env() -> Result<Self, VersionError> {
        Self::from_lookup(|key| std::env::var(key).ok().filter(|v| !v.is_empty()))
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, VersionError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let first = |keys: &[&str]| keys.iter().find_map(|key| lookup(key));

        let commit_hash = first(&["GITHUB_SHA", "CI_COMMIT_SHA", "COMMIT_HASH"])
            .ok_or_else(|| VersionError::MissingEnv("GITHUB_SHA, CI_COMMIT_SHA or COMMIT_HASH".to_string()))?;
        let branch = first(&["GITHUB_HEAD_REF", "GITHUB_REF_NAME", "CI_COMMIT_REF_NAME", "BRANCH"])
            .unwrap_or_else(|| "unknown".to_string());
        let commit_count = match first(&["COMMIT_COUNT"]) {
            Some(count) => parse_count(&count)?,
            None => 0,
        };
        let commits_since_tag = match first(&["COMMITS_SINCE_TAG"]) {
            Some(count) => Some(parse_count(&count)?),
            None => None,
        };

        Ok(Self {
            commit_hash_short: short_hash(&commit_hash),
            commit_hash,
            branch,
            tag: first(&["CI_COMMIT_TAG", "GIT_TAG"]),
            commits_since_tag,
            commit_count,
            package_version: None,
            build_number: first(&["GITHUB_RUN_NUMBER", "CI_PIPELINE_IID", "BUILD_NUMBER"]),
            repository: first(&["GITHUB_REPOSITORY", "CI_PROJECT_PATH"]),
            actor: first(&["GITHUB_ACTOR", "GITLAB_USER_LOGIN", "USER"]),
        })
    }

    /// Fill `package_version` from a package.json; a missing file is ignored
    pub fn with_package_json(mut self, path: &Path) -> Result<Self, VersionError> {
        if !path.exists() {
            return Ok(self);
        }
        let manifest: PackageManifest = serde_json::from_str(&std::fs::read_to_string(path)?)?;
        self.package_version = manifest.version;
        Ok(self)
    }
}

fn git(dir: &Path, args: &[&str]) -> Result<String, VersionError> {
    let output = Command::new("git").args(args).current_dir(dir).output()?;
    if !output.status.success() {
        return Err(VersionError::Git {
            command: format!("git {}", args.join(" ")),
            message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

fn parse_count(value: &str) -> Result<u64, VersionError> {
    value
        .trim()
        .parse()
        .map_err(|_| VersionError::InvalidCount(value.to_string()))
}

fn short_hash(hash: &str) -> String {
    hash.chars().take(8).collect()
}

/// `git@host:group/repo.git` and `https://host/group/repo.git` → `group/repo`
fn repository_from_url(url: &str) -> String {
    let path = url
        .trim_end_matches(".git")
        .rsplit_once(':')
        .filter(|(scheme, _)| !scheme.starts_with("http"))
        .map(|(_, path)| path.to_string())
        .unwrap_or_else(|| {
            url.trim_end_matches(".git")
                .splitn(4, '/')
                .nth(3)
                .unwrap_or(url)
                .to_string()
        });
    path.trim_start_matches('/').to_string()
}
