//! Command-line interface

pub mod commands;
pub mod output;

use clap::{Parser, Subcommand};
use commands::{SynthCommand, ValidateCommand, VersionCommand};
use std::ffi::OsString;

/// CI/CD pipeline generator
#[derive(Debug, Parser, Clone)]
#[command(name = "pipegen")]
#[command(version)]
#[command(about = "Generate CI/CD pipelines for GitHub, GitLab, bash and CodeCatalyst", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// Available commands
#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Generate pipeline files from a project configuration
    Synth(SynthCommand),

    /// Validate a project configuration without generating anything
    Validate(ValidateCommand),

    /// Compute the deployable version and print or write the version record
    Version(VersionCommand),
}

impl Cli {
    /// Parse CLI arguments from environment
    pub fn from_args() -> Self {
        Self::parse()
    }

    /// Parse CLI arguments from a slice
    pub fn try_parse_from<I, T>(itr: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        <Self as Parser>::try_parse_from(itr)
    }
}
