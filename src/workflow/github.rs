//! GitHub Actions workflow documents

use crate::core::permissions::{merge_job_permissions, permissions, PermissionLevel, PermissionMap};
use crate::error::ValidationError;
use crate::steps::{EnvMap, GithubStepConfig, JobStep};
use indexmap::IndexMap;
use serde::{Serialize, Serializer};

pub const CHECKOUT: &str = "actions/checkout@v4";
pub const SETUP_NODE: &str = "actions/setup-node@v4";
pub const SETUP_TERRAFORM: &str = "hashicorp/setup-terraform@v3";

/// One `.github/workflows/*.yml` file
#[derive(Debug, Clone, Serialize)]
pub struct Workflow {
    pub name: String,

    pub on: Triggers,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub concurrency: Option<Concurrency>,

    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub env: EnvMap,

    pub jobs: IndexMap<String, Job>,
}

impl Workflow {
    pub fn new(name: impl Into<String>, on: Triggers) -> Self {
        Self {
            name: name.into(),
            on,
            concurrency: None,
            env: EnvMap::new(),
            jobs: IndexMap::new(),
        }
    }

    /// Serialize runs of the workflow under one group
    pub fn with_concurrency(mut self, group: impl Into<String>) -> Self {
        self.concurrency = Some(Concurrency {
            group: group.into(),
            cancel_in_progress: false,
        });
        self
    }

    pub fn add_job(&mut self, id: impl Into<String>, job: Job) {
        self.jobs.insert(id.into(), job);
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Triggers {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub push: Option<PushTrigger>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub workflow_dispatch: Option<WorkflowDispatch>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub schedule: Vec<Schedule>,
}

impl Triggers {
    /// Pushes to `branch` plus manual runs
    pub fn push_to(branch: &str) -> Self {
        Self {
            push: Some(PushTrigger {
                branches: vec![branch.to_string()],
                branches_ignore: vec![],
            }),
            workflow_dispatch: Some(WorkflowDispatch::default()),
            schedule: vec![],
        }
    }

    /// Pushes to every branch except `branch`
    pub fn push_except(branch: &str) -> Self {
        Self {
            push: Some(PushTrigger {
                branches: vec![],
                branches_ignore: vec![branch.to_string()],
            }),
            ..Default::default()
        }
    }

    pub fn manual() -> Self {
        Self {
            workflow_dispatch: Some(WorkflowDispatch::default()),
            ..Default::default()
        }
    }

    pub fn manual_with_input(name: &str, description: &str) -> Self {
        let mut dispatch = WorkflowDispatch::default();
        dispatch.inputs.insert(
            name.to_string(),
            DispatchInput {
                description: description.to_string(),
                required: true,
                input_type: "string".to_string(),
            },
        );
        Self {
            workflow_dispatch: Some(dispatch),
            ..Default::default()
        }
    }

    pub fn scheduled(cron: &str) -> Self {
        Self {
            workflow_dispatch: Some(WorkflowDispatch::default()),
            schedule: vec![Schedule {
                cron: cron.to_string(),
            }],
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct PushTrigger {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub branches: Vec<String>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub branches_ignore: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct WorkflowDispatch {
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub inputs: IndexMap<String, DispatchInput>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DispatchInput {
    pub description: String,
    pub required: bool,
    #[serde(rename = "type")]
    pub input_type: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Schedule {
    pub cron: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct Concurrency {
    pub group: String,
    pub cancel_in_progress: bool,
}

/// One job of a workflow
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct Job {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(serialize_with = "serialize_runs_on")]
    pub runs_on: Vec<String>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub needs: Vec<String>,

    #[serde(rename = "if", skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub environment: Option<String>,

    pub permissions: PermissionMap,

    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub env: EnvMap,

    pub steps: Vec<JobStep>,
}

fn serialize_runs_on<S: Serializer>(labels: &[String], serializer: S) -> Result<S::Ok, S::Error> {
    match labels {
        [single] => serializer.serialize_str(single),
        _ => labels.serialize(serializer),
    }
}

impl Job {
    /// Build a job from rendered steps
    ///
    /// Job permissions start at `contents: read` and widen to whatever the
    /// steps request; `needs` carries the steps' needs plus `extra_needs`.
    pub fn from_steps<I, S>(
        runner: &[String],
        preamble: Vec<JobStep>,
        rendered: GithubStepConfig,
        extra_needs: I,
    ) -> Result<Self, ValidationError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let base = permissions([("contents", PermissionLevel::Read)]);
        let permissions = match &rendered.permissions {
            Some(requested) => merge_job_permissions([&base, requested])?,
            None => base,
        };

        let mut needs: Vec<String> = extra_needs.into_iter().map(Into::into).collect();
        for need in rendered.needs {
            if !needs.contains(&need) {
                needs.push(need);
            }
        }

        let mut steps = preamble;
        steps.extend(rendered.steps);

        Ok(Self {
            name: None,
            runs_on: runner.to_vec(),
            needs,
            condition: None,
            environment: None,
            permissions,
            env: rendered.env,
            steps,
        })
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn in_environment(mut self, environment: impl Into<String>) -> Self {
        self.environment = Some(environment.into());
        self
    }

    /// Widen the job's permissions, broadest level wins
    pub fn grant(mut self, extra: &PermissionMap) -> Result<Self, ValidationError> {
        self.permissions = merge_job_permissions([&self.permissions, extra])?;
        Ok(self)
    }
}

/// Checkout plus Node.js setup every Node-based job starts with
pub fn node_preamble(node_version: &str) -> Vec<JobStep> {
    vec![
        JobStep::uses("Checkout", CHECKOUT),
        JobStep::uses("Setup Node.js", SETUP_NODE).with("node-version", node_version),
    ]
}

pub fn checkout() -> JobStep {
    JobStep::uses("Checkout", CHECKOUT)
}
