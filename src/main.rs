use anyhow::{Context, Result};
use chrono::Utc;
use pipegen::cli::commands::{SynthCommand, ValidateCommand, VersionCommand, VersionSource};
use pipegen::cli::output::*;
use pipegen::cli::{Cli, Command};
use pipegen::core::config::ProjectConfig;
use pipegen::core::target::Target;
use pipegen::pipelines;
use pipegen::project::{FsOutput, InMemoryOutput};
use pipegen::versioning::{GitInfo, VersionInfo};
use std::path::Path;
use tracing::{debug, Level};
use tracing_subscriber::FmtSubscriber;

fn main() -> Result<()> {
    let cli = Cli::from_args();

    let log_level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder().with_max_level(log_level).finish();
    tracing::subscriber::set_global_default(subscriber).context("Failed to set logging subscriber")?;

    match &cli.command {
        Command::Synth(cmd) => synth(cmd, cli.verbose)?,
        Command::Validate(cmd) => validate(cmd)?,
        Command::Version(cmd) => version(cmd)?,
    }

    Ok(())
}

fn synth(cmd: &SynthCommand, verbose: bool) -> Result<()> {
    let config = ProjectConfig::from_file(&cmd.file)
        .with_context(|| format!("Failed to load project config {}", cmd.file))?;
    let target: Target = cmd.target.map(Into::into).unwrap_or(config.target);

    println!(
        "{} Generating {} for {}",
        ROCKET,
        style(&config.name).bold(),
        format_target(target)
    );

    let project = pipelines::synthesize(&config, target)?;

    if cmd.dry_run {
        let backend = InMemoryOutput::new();
        let written = project.synth(&backend)?;
        println!("{} Dry run, {} files would be written:", INFO, written);
        for path in backend.paths() {
            if let Some(file) = backend.get(&path) {
                println!("{}", format_file(&file));
                if verbose {
                    println!("{}\n", format_preview(&file, 40));
                }
            }
        }
        return Ok(());
    }

    let backend = FsOutput::new(&cmd.output);
    let written = project.synth(&backend)?;
    for file in project.files() {
        println!("{}", format_file(file));
    }

    let dev_dependencies: Vec<&str> = project.dev_dependencies().collect();
    if !dev_dependencies.is_empty() {
        println!(
            "{} Add dev dependencies: {}",
            WARN,
            style(dev_dependencies.join(" ")).yellow()
        );
    }
    println!(
        "{} Wrote {} files to {}",
        CHECK,
        style(written).cyan(),
        style(backend.root().display()).dim()
    );
    Ok(())
}

fn validate(cmd: &ValidateCommand) -> Result<()> {
    println!("{} Validating {}...", INFO, cmd.file);

    match ProjectConfig::from_file(&cmd.file) {
        Ok(config) => {
            let generators = pipelines::generators(&config)?;
            println!("{} Project configuration is valid!", CHECK);
            println!("  Name: {}", style(&config.name).bold());
            println!("  Target: {}", format_target(config.target));
            println!(
                "  Pipelines: {}",
                style(generators.iter().map(|g| g.name()).collect::<Vec<_>>().join(", ")).cyan()
            );
            println!("  Stages: {}", style(config.stage_count()).cyan());

            if cmd.json {
                let json = serde_json::to_string_pretty(&config)?;
                println!("\n{}", json);
            }
            Ok(())
        }
        Err(e) => {
            println!("{} Validation failed:", CROSS);
            println!("  {}", style(format!("{:#}", e)).red());
            std::process::exit(1);
        }
    }
}

fn version(cmd: &VersionCommand) -> Result<()> {
    let strategy = if Path::new(&cmd.file).exists() {
        ProjectConfig::from_file(&cmd.file)?
            .versioning
            .map(|v| v.strategy)
            .unwrap_or_default()
    } else {
        debug!("{} not found, using the default versioning strategy", cmd.file);
        Default::default()
    };

    let git = match cmd.source {
        VersionSource::Git => GitInfo::from_git(Path::new("."))?,
        VersionSource::Env => GitInfo::from_env()?,
    };
    let git = git.with_package_json(Path::new(strategy.package_json_path()))?;

    let info = VersionInfo::create(&git, &strategy, cmd.environment.as_str(), Utc::now());
    let json = info.to_json()?;

    match &cmd.output_file {
        Some(path) => {
            if let Some(parent) = Path::new(path).parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(path, format!("{}\n", json)).with_context(|| format!("Failed to write {}", path))?;
            println!("{} Version {} written to {}", CHECK, style(&info.version).bold(), path);
        }
        None => println!("{}", json),
    }
    Ok(())
}
