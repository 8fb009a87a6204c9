//! Deployable version strings computed from git facts

pub mod git;
pub mod info;
pub mod strategy;

pub use git::GitInfo;
pub use info::VersionInfo;
pub use strategy::{
    BuildNumberConfig, CommitCountConfig, CountFrom, GitTagConfig, PackageJsonConfig,
    StrategyComponents, VersioningStrategy,
};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum VersionError {
    #[error("'{command}' failed: {message}")]
    Git { command: String, message: String },

    #[error("Missing environment variable: {0}")]
    MissingEnv(String),

    #[error("Invalid commit count: '{0}'")]
    InvalidCount(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Project-level versioning switch
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersioningConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    #[serde(default)]
    pub strategy: VersioningStrategy,

    /// Installs the `pipegen` binary on the synth runner
    #[serde(default = "default_install_command")]
    pub install_command: String,
}

fn default_install_command() -> String {
    "cargo install --locked pipegen".to_string()
}

fn default_enabled() -> bool {
    true
}

impl Default for VersioningConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            strategy: VersioningStrategy::default(),
            install_command: default_install_command(),
        }
    }
}

/// Shell expressions exporting the facts `GitInfo::from_env` reads beyond
/// what the CI system provides. They need a full-depth clone.
pub const GIT_FACT_EXPORTS: [(&str, &str); 3] = [
    ("GIT_TAG", "$(git describe --tags --abbrev=0 2>/dev/null || true)"),
    ("COMMIT_COUNT", "$(git rev-list --count HEAD)"),
    (
        "COMMITS_SINCE_TAG",
        "$(git describe --tags --abbrev=0 >/dev/null 2>&1 && git rev-list --count \"$(git describe --tags --abbrev=0)..HEAD\" || true)",
    ),
];

/// Path of the version record inside the cloud assembly
pub const VERSION_FILE: &str = "version.json";
