//! CDK pipeline on GitLab CI

use crate::helpers::*;
use pipegen::core::target::Target;
use serde_yaml::Value;

fn document() -> Value {
    yaml_file(&synth(CDK_PROJECT, Target::Gitlab), ".gitlab-ci.yml")
}

#[test]
fn test_stages_in_first_use_order() {
    let doc = document();
    assert_eq!(strings(&doc["stages"]), vec!["synth", "assets", "deploy", "release", "feature"]);
    assert_eq!(
        doc["default"]["image"].as_str(),
        Some("jsii/superchain:1-bookworm-slim-node20")
    );
}

#[test]
fn test_role_assumption_uses_hidden_oidc_fragment() {
    let doc = document();
    assert_eq!(
        doc[".aws_base"]["id_tokens"]["AWS_TOKEN"]["aud"].as_str(),
        Some("https://sts.amazonaws.com")
    );

    let deploy = job(&doc, "deploy-dev");
    assert_eq!(strings(&deploy["extends"]), vec![".aws_base"]);
    assert_eq!(deploy["variables"]["AWS_REGION"].as_str(), Some("eu-central-1"));
}

#[test]
fn test_deploys_run_on_main_only_and_chain() {
    let doc = document();
    let deploy = job(&doc, "deploy-staging");

    assert_eq!(deploy["environment"]["name"].as_str(), Some("staging"));
    assert_eq!(
        deploy["rules"][0]["if"].as_str(),
        Some("$CI_COMMIT_BRANCH == \"main\" && $CI_PIPELINE_SOURCE != \"schedule\"")
    );
    assert!(deploy["rules"][0]["when"].is_null());
    let needs = needs(&doc, "deploy-staging");
    assert!(needs.contains(&"assetUpload".to_string()));
    assert!(needs.contains(&"deploy-dev".to_string()));
    assert!(strings(&deploy["script"]).contains(&".pipegen/run deploy:staging".to_string()));
}

#[test]
fn test_synth_publishes_assembly_artifact() {
    let doc = document();
    assert_eq!(strings(&job(&doc, "synth")["artifacts"]["paths"]), vec!["cdk.out"]);
}

#[test]
fn test_synth_clones_full_history_and_exports_git_facts() {
    let doc = document();
    let synth_job = job(&doc, "synth");
    assert_eq!(synth_job["variables"]["GIT_DEPTH"].as_str(), Some("0"));

    let script = strings(&synth_job["script"]);
    let version_at = script.iter().position(|c| c == ".pipegen/run version:compute").unwrap();
    assert!(script.iter().position(|c| c == "cargo install --locked pipegen").unwrap() < version_at);
    for fact in ["GIT_TAG", "COMMIT_COUNT", "COMMITS_SINCE_TAG"] {
        let prefix = format!("export {}=\"$(", fact);
        let export_at = script
            .iter()
            .position(|c| c.starts_with(&prefix))
            .unwrap_or_else(|| panic!("{} is not exported", fact));
        assert!(export_at < version_at);
    }
    assert!(job(&doc, "deploy-dev")["variables"].get("GIT_DEPTH").is_none());
}

#[test]
fn test_install_command_is_configurable() {
    let yaml = CDK_PROJECT.replace(
        "versioning:\n  enabled: true\n",
        "versioning:\n  enabled: true\n  installCommand: npm install -g pipegen-bin\n",
    );
    let doc = yaml_file(&synth(&yaml, Target::Gitlab), ".gitlab-ci.yml");
    let script = strings(&job(&doc, "synth")["script"]);
    assert!(script.contains(&"npm install -g pipegen-bin".to_string()));
    assert!(!script.iter().any(|c| c.starts_with("cargo install")));
}

#[test]
fn test_release_is_manual_with_overridable_version() {
    let doc = document();
    let release = job(&doc, "release-prod");

    assert_eq!(release["rules"][0]["when"].as_str(), Some("manual"));
    assert_eq!(release["variables"]["ASSEMBLY_VERSION"].as_str(), Some("latest"));
    assert_eq!(needs(&doc, "release-prod"), vec!["assemblyUpload"]);
    assert_eq!(release["stage"].as_str(), Some("release"));
}

#[test]
fn test_independent_stage_deploys_on_push() {
    let doc = document();
    let sandbox = job(&doc, "independent-sandbox");
    assert!(sandbox["rules"][0]["when"].is_null());
    let script = strings(&sandbox["script"]);
    let diff = script.iter().position(|c| c == ".pipegen/run diff:sandbox").unwrap();
    let deploy = script.iter().position(|c| c == ".pipegen/run deploy:sandbox").unwrap();
    assert!(diff < deploy);
}

#[test]
fn test_feature_job_runs_off_main() {
    let doc = document();
    let feature = job(&doc, "deploy-feature");
    assert_eq!(
        feature["rules"][0]["if"].as_str(),
        Some("$CI_COMMIT_BRANCH && $CI_COMMIT_BRANCH != \"main\" && $CI_PIPELINE_SOURCE != \"schedule\"")
    );
    assert_eq!(feature["environment"]["name"].as_str(), Some("feature/$CI_COMMIT_REF_SLUG"));
    assert_eq!(feature["variables"]["BRANCH"].as_str(), Some("$CI_COMMIT_REF_SLUG"));
}
