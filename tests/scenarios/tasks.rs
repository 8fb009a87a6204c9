//! Task calls in generated pipelines resolve against the generated runner

use crate::helpers::*;
use pipegen::core::config::Defaults;
use pipegen::core::target::Target;
use pipegen::pipelines::synthesize;
use pipegen::project::{Project, TASK_RUNNER};
use regex::Regex;

/// Every task name a generated file calls through the runner
fn task_calls(project: &Project) -> Vec<String> {
    let call = Regex::new(&format!(r"{} ([A-Za-z0-9:_\-]+)", regex::escape(TASK_RUNNER))).unwrap();
    project
        .files()
        .flat_map(|file| {
            call.captures_iter(&file.content)
                .map(|c| c[1].to_string())
                .collect::<Vec<_>>()
        })
        .collect()
}

#[test]
fn test_default_runner_is_the_generated_script() {
    assert_eq!(Defaults::default().task_runner, TASK_RUNNER);
}

#[test]
fn test_every_task_call_resolves_to_a_registered_task() {
    for yaml in [CDK_PROJECT, CONTAINER_PROJECT, TERRAFORM_PROJECT, DRIFT_PROJECT] {
        for target in Target::ALL {
            // unsupported pipeline/target pairs are covered elsewhere
            let Ok(project) = synthesize(&config(yaml), target) else {
                continue;
            };
            let runner = project.task_runner_script();
            for name in task_calls(&project) {
                assert!(project.task(&name).is_some(), "{} calls unregistered task {}", target, name);
                assert!(
                    runner.contains(&format!("  '{}')\n", name)),
                    "{} runner has no branch for {}",
                    target,
                    name
                );
            }
        }
    }
}

#[test]
fn test_cdk_pipeline_calls_tasks_on_every_target() {
    for target in Target::ALL {
        let project = synth(CDK_PROJECT, target);
        let calls = task_calls(&project);
        assert!(calls.contains(&"synth:silent".to_string()), "{} never synthesizes", target);
        assert!(calls.contains(&"version:compute".to_string()), "{} never versions", target);
    }
}
