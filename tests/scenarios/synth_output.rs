//! Writing a synthesized project to disk

use crate::helpers::*;
use pipegen::core::target::Target;
use pipegen::pipelines::synthesize;
use pipegen::project::{FsOutput, InMemoryOutput, GENERATED_MARKER, TASKS_FILE, TASK_RUNNER};
use std::path::Path;

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    std::fs::metadata(path).unwrap().permissions().mode() & 0o111 != 0
}

#[cfg(not(unix))]
fn is_executable(_path: &Path) -> bool {
    true
}

fn files_below(root: &Path) -> Vec<String> {
    let mut found = Vec::new();
    let mut pending = vec![root.to_path_buf()];
    while let Some(dir) = pending.pop() {
        for entry in std::fs::read_dir(dir).unwrap() {
            let path = entry.unwrap().path();
            if path.is_dir() {
                pending.push(path);
            } else {
                found.push(path.strip_prefix(root).unwrap().to_string_lossy().replace('\\', "/"));
            }
        }
    }
    found.sort();
    found
}

#[test]
fn test_bash_script_is_written_executable() {
    let dir = tempfile::tempdir().unwrap();
    let project = synth(CDK_PROJECT, Target::Bash);
    project.synth(&FsOutput::new(dir.path())).unwrap();

    let script = dir.path().join("pipeline.sh");
    assert!(is_executable(&script));
    let content = std::fs::read_to_string(&script).unwrap();
    assert!(content.starts_with("#!/usr/bin/env bash"));

    let manifest: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(dir.path().join(TASKS_FILE)).unwrap()).unwrap();
    assert!(manifest["tasks"]["deploy:dev"]["steps"].is_array());
    assert!(is_executable(&dir.path().join(TASK_RUNNER)));
}

#[test]
fn test_github_project_writes_every_workflow() {
    let yaml = format!("{}\n{}", CDK_PROJECT.trim_end(), DRIFT_PROJECT.replace("name: watch\n", ""));
    let dir = tempfile::tempdir().unwrap();
    let project = synthesize(&config(&yaml), Target::Github).unwrap();
    let written = project.synth(&FsOutput::new(dir.path())).unwrap();

    let files = files_below(dir.path());
    assert_eq!(files.len(), written);
    assert!(files.contains(&".github/workflows/deploy.yml".to_string()));
    assert!(files.contains(&".github/workflows/drift-detection.yml".to_string()));
    assert!(files.contains(&TASKS_FILE.to_string()));
    assert!(files.contains(&TASK_RUNNER.to_string()));

    let deploy = std::fs::read_to_string(dir.path().join(".github/workflows/deploy.yml")).unwrap();
    assert!(deploy.starts_with(&format!("# {}", GENERATED_MARKER)));
}

#[test]
fn test_gitlab_generators_share_one_file() {
    let yaml = format!("{}\n{}", CONTAINER_PROJECT.trim_end(), TERRAFORM_PROJECT.replace("name: infra\n", ""));
    let project = synthesize(&config(&yaml), Target::Gitlab).unwrap();
    let doc = yaml_file(&project, ".gitlab-ci.yml");

    assert_eq!(strings(&doc["stages"]), vec!["build", "push", "validate", "plan", "apply"]);
    job(&doc, "push-prod");
    job(&doc, "apply-prod");
}

#[test]
fn test_dry_run_keeps_files_in_memory() {
    let project = synth(TERRAFORM_PROJECT, Target::Github);
    let output = InMemoryOutput::new();
    let written = project.synth(&output).unwrap();

    assert_eq!(written, output.len());
    assert_eq!(output.paths(), vec![".github/workflows/terraform.yml", TASKS_FILE, TASK_RUNNER]);
}

#[test]
fn test_failed_synthesis_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let result = synthesize(&config(DRIFT_PROJECT), Target::Bash)
        .and_then(|project| project.synth(&FsOutput::new(dir.path())));

    assert!(result.is_err());
    assert!(files_below(dir.path()).is_empty());
}
