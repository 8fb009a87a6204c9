//! Shared fixtures and assertions for the integration tests
#![allow(dead_code)]

use pipegen::core::config::ProjectConfig;
use pipegen::core::target::Target;
use pipegen::pipelines::synthesize;
use pipegen::project::Project;
use serde_yaml::Value;

/// CDK app with an automatic chain, a manual stage, an independent stage and
/// both ephemeral stages
pub const CDK_PROJECT: &str = r#"
name: shop
versioning:
  enabled: true
cdk:
  pkgNamespace: "@acme"
  iamRoleArns:
    default: arn:aws:iam::111111111111:role/deploy
    synth: arn:aws:iam::111111111111:role/synth
  stages:
    - name: dev
      env: { account: "111111111111", region: eu-central-1 }
    - name: staging
      env: { account: "222222222222", region: eu-central-1 }
    - name: prod
      env: { account: "333333333333", region: eu-central-1 }
      manualApproval: true
  independentStages:
    - name: sandbox
      env: { account: "444444444444", region: us-east-1 }
      deployOnPush: true
  personalStage:
    env: { account: "555555555555", region: eu-central-1 }
  featureStages:
    env: { account: "555555555555", region: eu-central-1 }
"#;

pub const CONTAINER_PROJECT: &str = r#"
name: svc
container:
  imageName: svc
  scan:
    severities: [CRITICAL]
  sbom: spdx-json
  stages:
    - name: dev
      roleArn: arn:aws:iam::111111111111:role/push
      registries:
        - type: ecr
          repository: svc
          region: eu-west-1
          account: "111111111111"
    - name: prod
      manualApproval: true
      registries:
        - type: dockerhub
          repository: acme/svc
          usernameSecret: DOCKERHUB_USER
          passwordSecret: DOCKERHUB_TOKEN
"#;

pub const TERRAFORM_PROJECT: &str = r#"
name: infra
terraform:
  workingDirectory: infra
  stages:
    - name: dev
    - name: prod
      manualApproval: true
"#;

pub const DRIFT_PROJECT: &str = r#"
name: watch
driftDetection:
  schedule: "0 6 * * 1-5"
  stages:
    - name: prod
      region: eu-central-1
      stacks: [shop-prod]
      roleArn: arn:aws:iam::333333333333:role/drift
      countResources: true
"#;

pub fn config(yaml: &str) -> ProjectConfig {
    ProjectConfig::from_yaml(yaml).unwrap()
}

pub fn synth(yaml: &str, target: Target) -> Project {
    synthesize(&config(yaml), target).unwrap()
}

/// Parse a generated YAML file; the marker line is a plain comment
pub fn yaml_file(project: &Project, path: &str) -> Value {
    let file = project
        .file(path)
        .unwrap_or_else(|| panic!("{} was not generated", path));
    serde_yaml::from_str(&file.content).unwrap()
}

pub fn text_file<'a>(project: &'a Project, path: &str) -> &'a str {
    &project
        .file(path)
        .unwrap_or_else(|| panic!("{} was not generated", path))
        .content
}

pub fn job<'a>(doc: &'a Value, id: &str) -> &'a Value {
    let jobs = doc.get("jobs").unwrap_or(doc);
    jobs.get(id).unwrap_or_else(|| panic!("job {} missing", id))
}

pub fn job_ids(doc: &Value) -> Vec<String> {
    doc["jobs"]
        .as_mapping()
        .unwrap()
        .keys()
        .map(|k| k.as_str().unwrap().to_string())
        .collect()
}

pub fn strings(value: &Value) -> Vec<String> {
    match value {
        Value::Sequence(items) => items.iter().map(|i| i.as_str().unwrap().to_string()).collect(),
        Value::String(single) => vec![single.clone()],
        Value::Null => vec![],
        other => panic!("expected a string list, got {:?}", other),
    }
}

pub fn needs(doc: &Value, id: &str) -> Vec<String> {
    strings(&job(doc, id)["needs"])
}

/// Every `run` command of a GitHub job, in order
pub fn run_commands(job: &Value) -> Vec<String> {
    job["steps"]
        .as_sequence()
        .unwrap()
        .iter()
        .filter_map(|step| step["run"].as_str())
        .flat_map(|run| run.lines().map(str::to_string).collect::<Vec<_>>())
        .collect()
}

/// Every `uses` action of a GitHub job, in order
pub fn actions(job: &Value) -> Vec<String> {
    job["steps"]
        .as_sequence()
        .unwrap()
        .iter()
        .filter_map(|step| step["uses"].as_str().map(str::to_string))
        .collect()
}

pub fn assert_config_error(yaml: &str, expected: &str) {
    let err = ProjectConfig::from_yaml(yaml).unwrap_err();
    let message = format!("{:#}", err);
    assert!(
        message.contains(expected),
        "expected error containing {:?}, got {:?}",
        expected,
        message
    );
}

/// Position of `id` in the bash script's default run
pub fn default_position(script: &str, id: &str) -> Option<usize> {
    let call = format!("  job_{}", id.replace('-', "_"));
    let default_block = script.split("if [ \"$#\" -eq 0 ]; then\n").nth(1)?.split("else\n").next()?;
    default_block.lines().position(|line| line == call)
}
