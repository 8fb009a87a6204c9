//! Self-contained bash pipeline scripts

use crate::steps::BashStepConfig;
use indexmap::IndexMap;

/// A script with one shell function per job
///
/// Without arguments the script runs `default_jobs` in order; with arguments
/// it runs the named jobs (`./pipeline.sh deploy-prod`).
#[derive(Debug, Clone, Default)]
pub struct BashScript {
    pub description: String,
    /// Lines run before any job, e.g. exports every job relies on
    pub preamble: Vec<String>,
    jobs: IndexMap<String, Vec<String>>,
    default_jobs: Vec<String>,
}

impl BashScript {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            ..Default::default()
        }
    }

    /// Add a job, optionally part of the default run
    pub fn add_job(&mut self, id: impl Into<String>, rendered: BashStepConfig, run_by_default: bool) {
        let id = id.into();
        if run_by_default {
            self.default_jobs.push(id.clone());
        }
        self.jobs.insert(id, rendered.commands);
    }

    /// Reorder the default run to follow `order`
    pub fn set_default_order(&mut self, order: &[String]) {
        self.default_jobs = order
            .iter()
            .filter(|id| self.default_jobs.contains(id))
            .cloned()
            .collect();
    }

    pub fn default_jobs(&self) -> &[String] {
        &self.default_jobs
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        out.push_str("#!/usr/bin/env bash\n");
        out.push_str(&format!("# {}\n", self.description));
        out.push_str("set -euo pipefail\n");

        if !self.preamble.is_empty() {
            out.push('\n');
            for line in &self.preamble {
                out.push_str(line);
                out.push('\n');
            }
        }

        for (id, commands) in &self.jobs {
            out.push('\n');
            out.push_str(&format!("{}() {{\n", function_name(id)));
            out.push_str(&format!("  echo \"==> {}\"\n", id));
            for command in commands {
                for line in command.lines() {
                    out.push_str("  ");
                    out.push_str(line);
                    out.push('\n');
                }
            }
            out.push_str("}\n");
        }

        out.push_str("\nif [ \"$#\" -eq 0 ]; then\n");
        if self.default_jobs.is_empty() {
            out.push_str("  echo \"No job runs by default; pass job names as arguments\" >&2\n");
            out.push_str("  exit 1\n");
        }
        for id in &self.default_jobs {
            out.push_str(&format!("  {}\n", function_name(id)));
        }
        out.push_str("else\n");
        out.push_str("  for job in \"$@\"; do\n");
        out.push_str("    \"job_${job//-/_}\"\n");
        out.push_str("  done\n");
        out.push_str("fi\n");
        out
    }
}

fn function_name(id: &str) -> String {
    format!("job_{}", id.replace('-', "_"))
}
