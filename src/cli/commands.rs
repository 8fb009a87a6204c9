//! CLI command definitions

use crate::core::target::Target;
use clap::Args;

/// Generate pipeline files
#[derive(Debug, Args, Clone)]
pub struct SynthCommand {
    /// Path to the project YAML file
    #[arg(short, long, default_value = "pipegen.yaml")]
    pub file: String,

    /// Directory the files are written to
    #[arg(short, long, default_value = ".")]
    pub output: String,

    /// Override the target from the configuration
    #[arg(long, value_enum)]
    pub target: Option<TargetArg>,

    /// Render everything but write nothing
    #[arg(long)]
    pub dry_run: bool,
}

/// Validate a project configuration
#[derive(Debug, Args, Clone)]
pub struct ValidateCommand {
    /// Path to the project YAML file
    #[arg(short, long, default_value = "pipegen.yaml")]
    pub file: String,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Compute the version record
#[derive(Debug, Args, Clone)]
pub struct VersionCommand {
    /// Project YAML file holding the versioning strategy
    #[arg(short, long, default_value = "pipegen.yaml")]
    pub file: String,

    /// Where the version facts come from
    #[arg(long, value_enum, default_value_t = VersionSource::Git)]
    pub source: VersionSource,

    /// Environment recorded in the version record
    #[arg(long, default_value = "local")]
    pub environment: String,

    /// Write the record here instead of printing it
    #[arg(long)]
    pub output_file: Option<String>,
}

/// Target argument
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum TargetArg {
    Github,
    Gitlab,
    Bash,
    Codecatalyst,
}

impl From<TargetArg> for Target {
    fn from(arg: TargetArg) -> Self {
        match arg {
            TargetArg::Github => Target::Github,
            TargetArg::Gitlab => Target::Gitlab,
            TargetArg::Bash => Target::Bash,
            TargetArg::Codecatalyst => Target::CodeCatalyst,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum VersionSource {
    /// Inspect the local repository
    Git,
    /// Read CI environment variables
    Env,
}
