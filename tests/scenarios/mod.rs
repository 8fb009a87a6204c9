//! Scenario-based tests for pipegen

mod cdk_bash;
mod cdk_codecatalyst;
mod cdk_github;
mod cdk_gitlab;
mod container;
mod drift;
mod synth_output;
mod tasks;
mod terraform;
