//! CDK pipeline as a bash script

use crate::helpers::*;
use pipegen::core::target::Target;

#[test]
fn test_script_is_executable_and_runs_automatic_jobs_in_order() {
    let project = synth(CDK_PROJECT, Target::Bash);
    let file = project.file("pipeline.sh").unwrap();
    assert!(file.executable);

    let script = file.content.as_str();
    let synth_at = default_position(script, "synth").unwrap();
    let assets_at = default_position(script, "assetUpload").unwrap();
    let dev_at = default_position(script, "deploy-dev").unwrap();
    let staging_at = default_position(script, "deploy-staging").unwrap();
    assert!(synth_at < assets_at && assets_at < dev_at && dev_at < staging_at);
    assert!(default_position(script, "independent-sandbox").is_some());
}

#[test]
fn test_on_demand_jobs_are_defined_but_not_run_by_default() {
    let project = synth(CDK_PROJECT, Target::Bash);
    let script = text_file(&project, "pipeline.sh");

    for id in ["release-prod", "assemblyUpload", "deploy-feature"] {
        assert!(script.contains(&format!("job_{}() {{", id.replace('-', "_"))), "{} missing", id);
        assert!(default_position(script, id).is_none(), "{} runs by default", id);
    }
    assert!(script.contains("export ASSEMBLY_VERSION=\"${ASSEMBLY_VERSION:-latest}\""));
}

#[test]
fn test_roles_are_not_assumed_locally() {
    let project = synth(CDK_PROJECT, Target::Bash);
    let script = text_file(&project, "pipeline.sh");
    assert!(script.contains("Skipping assumption of role arn:aws:iam::111111111111:role/deploy"));
    assert!(!script.contains("aws sts"));
}
