//! Scheduled drift detection

use crate::helpers::*;
use pipegen::core::target::Target;

#[test]
fn test_github_scheduled_workflow() {
    let project = synth(DRIFT_PROJECT, Target::Github);
    let doc = yaml_file(&project, ".github/workflows/drift-detection.yml");

    assert_eq!(doc["on"]["schedule"][0]["cron"].as_str(), Some("0 6 * * 1-5"));
    let drift = job(&doc, "drift-prod");
    assert_eq!(drift["permissions"]["id-token"].as_str(), Some("write"));

    let commands = run_commands(drift);
    assert!(commands.contains(&"npx detect-drift --region eu-central-1 --stacks shop-prod --timeout 30".to_string()));
    assert!(commands.contains(
        &"npx count-resources --region eu-central-1 --stacks shop-prod --warning-threshold 450 --output-file resource-count-prod.json --github-summary"
            .to_string()
    ));

    let deps: Vec<&str> = project.dev_dependencies().collect();
    assert!(deps.contains(&"projen-pipelines"));
}

#[test]
fn test_gitlab_jobs_only_on_schedule() {
    let project = synth(DRIFT_PROJECT, Target::Gitlab);
    let doc = yaml_file(&project, ".gitlab-ci.yml");
    let drift = job(&doc, "drift-prod");

    assert_eq!(drift["rules"][0]["if"].as_str(), Some("$CI_PIPELINE_SOURCE == \"schedule\""));
    assert_eq!(drift["stage"].as_str(), Some("drift"));
    assert_eq!(strings(&drift["artifacts"]["paths"]), vec!["resource-count-prod.json"]);
}

#[test]
fn test_stage_without_stacks_is_rejected() {
    assert_config_error(
        "name: watch\ndriftDetection:\n  stages:\n    - name: prod\n      region: eu-central-1\n",
        "Drift detection stage 'prod' must list at least one stack",
    );
}

#[test]
fn test_bash_and_codecatalyst_are_rejected() {
    for target in [Target::Bash, Target::CodeCatalyst] {
        let err = pipegen::pipelines::synthesize(&config(DRIFT_PROJECT), target).unwrap_err();
        assert!(err.to_string().starts_with("drift detection pipeline cannot be generated"));
    }
}
