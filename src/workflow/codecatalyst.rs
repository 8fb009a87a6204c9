//! Amazon CodeCatalyst workflow documents

use crate::steps::CodeCatalystStepConfig;
use indexmap::IndexMap;
use serde::Serialize;

const BUILD_ACTION: &str = "aws/build@v1";

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CodeCatalystWorkflow {
    pub name: String,
    pub schema_version: String,
    pub triggers: Vec<Trigger>,
    pub actions: IndexMap<String, Action>,
}

impl CodeCatalystWorkflow {
    pub fn new(name: impl Into<String>, triggers: Vec<Trigger>) -> Self {
        Self {
            name: name.into(),
            schema_version: "1.0".to_string(),
            triggers,
            actions: IndexMap::new(),
        }
    }

    pub fn add_action(&mut self, id: impl Into<String>, action: Action) {
        self.actions.insert(id.into(), action);
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Trigger {
    #[serde(rename = "Type")]
    pub kind: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub branches: Vec<String>,
}

impl Trigger {
    pub fn push(branch: &str) -> Self {
        Self {
            kind: "PUSH".to_string(),
            branches: vec![branch.to_string()],
        }
    }

    pub fn manual() -> Self {
        Self {
            kind: "MANUAL".to_string(),
            branches: vec![],
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Action {
    pub identifier: String,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub environment: Option<ActionEnvironment>,

    pub inputs: Inputs,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub outputs: Option<Outputs>,

    pub configuration: Configuration,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ActionEnvironment {
    pub name: String,
    pub connections: Vec<Connection>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Connection {
    pub name: String,
    pub role: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Inputs {
    pub sources: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub artifacts: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub variables: Vec<Variable>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Variable {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Outputs {
    pub artifacts: Vec<OutputArtifact>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct OutputArtifact {
    pub name: String,
    pub files: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Configuration {
    pub steps: Vec<RunStep>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct RunStep {
    pub run: String,
}

impl Action {
    /// A build action running the rendered commands; env becomes input variables
    pub fn build<I, S>(rendered: CodeCatalystStepConfig, depends_on: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut depends: Vec<String> = depends_on.into_iter().map(Into::into).collect();
        for need in rendered.needs {
            if !depends.contains(&need) {
                depends.push(need);
            }
        }

        Self {
            identifier: BUILD_ACTION.to_string(),
            depends_on: depends,
            environment: None,
            inputs: Inputs {
                sources: vec!["WorkflowSource".to_string()],
                artifacts: vec![],
                variables: rendered
                    .env
                    .into_iter()
                    .map(|(name, value)| Variable { name, value })
                    .collect(),
            },
            outputs: None,
            configuration: Configuration {
                steps: rendered
                    .commands
                    .into_iter()
                    .map(|run| RunStep { run })
                    .collect(),
            },
        }
    }

    /// Bind the action to a CodeCatalyst environment with an account connection
    pub fn in_environment(mut self, name: &str, account: &str, role_arn: Option<&str>) -> Self {
        self.environment = Some(ActionEnvironment {
            name: name.to_string(),
            connections: vec![Connection {
                name: account.to_string(),
                role: role_arn.map(role_name).unwrap_or_default(),
            }],
        });
        self
    }

    pub fn consuming(mut self, artifact: &str) -> Self {
        self.inputs.artifacts.push(artifact.to_string());
        self
    }

    pub fn producing(mut self, artifact: &str, files: &str) -> Self {
        self.outputs
            .get_or_insert_with(|| Outputs { artifacts: vec![] })
            .artifacts
            .push(OutputArtifact {
                name: artifact.to_string(),
                files: vec![files.to_string()],
            });
        self
    }
}

/// `arn:aws:iam::123456789012:role/path/deploy` → `deploy`
pub fn role_name(role_arn: &str) -> String {
    role_arn
        .rsplit('/')
        .next()
        .unwrap_or(role_arn)
        .to_string()
}
