//! Image vulnerability scanning and SBOM generation

use crate::core::permissions::{permissions, PermissionLevel};
use crate::steps::output::{BashStepConfig, GithubStepConfig, GitlabStepConfig, JobStep};
use serde::{Deserialize, Serialize};

pub const TRIVY_ACTION: &str = "aquasecurity/trivy-action@0.28.0";
pub const UPLOAD_SARIF: &str = "github/codeql-action/upload-sarif@v3";
pub const SBOM_ACTION: &str = "anchore/sbom-action@v0";

const SARIF_FILE: &str = "trivy-results.sarif";

/// Scan an image with trivy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageScanStep {
    pub image: String,
    pub severities: Vec<String>,
    pub fail_on_findings: bool,
    pub ignore_unfixed: bool,
    /// Publish findings to GitHub code scanning
    pub upload_sarif: bool,
}

impl ImageScanStep {
    pub fn new(image: impl Into<String>) -> Self {
        Self {
            image: image.into(),
            severities: vec!["CRITICAL".to_string(), "HIGH".to_string()],
            fail_on_findings: true,
            ignore_unfixed: true,
            upload_sarif: false,
        }
    }

    fn exit_code(&self) -> &'static str {
        if self.fail_on_findings {
            "1"
        } else {
            "0"
        }
    }

    pub fn command(&self) -> String {
        let mut command = format!(
            "trivy image --exit-code {} --severity {} --no-progress",
            self.exit_code(),
            self.severities.join(",")
        );
        if self.ignore_unfixed {
            command.push_str(" --ignore-unfixed");
        }
        command.push(' ');
        command.push_str(&self.image);
        command
    }

    pub(crate) fn to_github(&self) -> GithubStepConfig {
        let mut scan = JobStep::uses("Scan image", TRIVY_ACTION)
            .with("image-ref", self.image.as_str())
            .with("severity", self.severities.join(","))
            .with("exit-code", self.exit_code())
            .with("ignore-unfixed", self.ignore_unfixed);

        let mut perms = permissions([("contents", PermissionLevel::Read)]);
        let mut steps = Vec::new();
        if self.upload_sarif {
            scan = scan.with("format", "sarif").with("output", SARIF_FILE);
            steps.push(scan);
            steps.push(
                JobStep::uses("Upload scan results", UPLOAD_SARIF)
                    .with("sarif_file", SARIF_FILE)
                    .with_condition("always()"),
            );
            perms.insert("security-events".to_string(), PermissionLevel::Write);
        } else {
            steps.push(scan.with("format", "table"));
        }

        GithubStepConfig {
            steps,
            permissions: Some(perms),
            ..Default::default()
        }
    }

    pub(crate) fn to_gitlab(&self) -> GitlabStepConfig {
        GitlabStepConfig {
            commands: vec![self.command()],
            ..Default::default()
        }
    }

    pub(crate) fn to_bash(&self) -> BashStepConfig {
        BashStepConfig {
            commands: vec![self.command()],
        }
    }
}

/// SBOM document format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SbomFormat {
    #[default]
    SpdxJson,
    CyclonedxJson,
}

impl SbomFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            SbomFormat::SpdxJson => "spdx-json",
            SbomFormat::CyclonedxJson => "cyclonedx-json",
        }
    }
}

/// Generate a software bill of materials for an image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SbomStep {
    pub image: String,
    pub format: SbomFormat,
    pub output_file: String,
}

impl SbomStep {
    pub fn new(image: impl Into<String>, format: SbomFormat) -> Self {
        let output_file = match format {
            SbomFormat::SpdxJson => "sbom.spdx.json",
            SbomFormat::CyclonedxJson => "sbom.cdx.json",
        };
        Self {
            image: image.into(),
            format,
            output_file: output_file.to_string(),
        }
    }

    pub fn command(&self) -> String {
        format!(
            "syft {} -o {}={}",
            self.image,
            self.format.as_str(),
            self.output_file
        )
    }

    pub(crate) fn to_github(&self) -> GithubStepConfig {
        GithubStepConfig {
            steps: vec![JobStep::uses("Generate SBOM", SBOM_ACTION)
                .with("image", self.image.as_str())
                .with("format", self.format.as_str())
                .with("output-file", self.output_file.as_str())],
            permissions: Some(permissions([("contents", PermissionLevel::Read)])),
            ..Default::default()
        }
    }

    pub(crate) fn to_gitlab(&self) -> GitlabStepConfig {
        let mut config = GitlabStepConfig {
            commands: vec![self.command()],
            ..Default::default()
        };
        config.artifacts.insert(self.output_file.clone());
        config
    }

    pub(crate) fn to_bash(&self) -> BashStepConfig {
        BashStepConfig {
            commands: vec![self.command()],
        }
    }
}
