//! CDK pipeline on GitHub Actions

use crate::helpers::*;
use pipegen::core::target::Target;

#[test]
fn test_main_workflow_chains_automatic_stages() {
    let project = synth(CDK_PROJECT, Target::Github);
    let doc = yaml_file(&project, ".github/workflows/deploy.yml");

    let ids = job_ids(&doc);
    for expected in ["synth", "assetUpload", "deploy-dev", "deploy-staging", "assemblyUpload", "independent-sandbox"] {
        assert!(ids.contains(&expected.to_string()), "missing job {}", expected);
    }
    // manual stages never deploy from the main workflow
    assert!(!ids.contains(&"deploy-prod".to_string()));

    assert!(needs(&doc, "assetUpload").contains(&"synth".to_string()));
    let staging = needs(&doc, "deploy-staging");
    assert!(staging.contains(&"assetUpload".to_string()));
    assert!(staging.contains(&"deploy-dev".to_string()));
    assert!(needs(&doc, "independent-sandbox").is_empty());

    assert_eq!(doc["on"]["push"]["branches"][0].as_str(), Some("main"));
    assert_eq!(doc["concurrency"]["group"].as_str(), Some("deploy"));
}

#[test]
fn test_deploy_job_permissions_and_environment() {
    let project = synth(CDK_PROJECT, Target::Github);
    let doc = yaml_file(&project, ".github/workflows/deploy.yml");
    let deploy = job(&doc, "deploy-dev");

    assert_eq!(deploy["environment"].as_str(), Some("dev"));
    assert_eq!(deploy["permissions"]["id-token"].as_str(), Some("write"));
    assert_eq!(deploy["permissions"]["contents"].as_str(), Some("read"));
    assert_eq!(deploy["runs-on"].as_str(), Some("ubuntu-latest"));

    let commands = run_commands(deploy);
    assert!(commands.contains(&".pipegen/run deploy:dev".to_string()));
    assert!(actions(deploy).contains(&"actions/download-artifact@v4".to_string()));
}

#[test]
fn test_synth_job_records_version_and_uploads_assembly() {
    let project = synth(CDK_PROJECT, Target::Github);
    let doc = yaml_file(&project, ".github/workflows/deploy.yml");
    let synth_job = job(&doc, "synth");

    let commands = run_commands(synth_job);
    let synth_at = commands.iter().position(|c| c == ".pipegen/run synth:silent").unwrap();
    let version_at = commands.iter().position(|c| c == ".pipegen/run version:compute").unwrap();
    assert!(synth_at < version_at);
    assert!(actions(synth_job).contains(&"actions/upload-artifact@v4".to_string()));
}

#[test]
fn test_synth_job_gathers_git_facts_for_versioning() {
    let project = synth(CDK_PROJECT, Target::Github);
    let doc = yaml_file(&project, ".github/workflows/deploy.yml");
    let synth_job = job(&doc, "synth");

    let checkout = &synth_job["steps"][0];
    assert_eq!(checkout["uses"].as_str(), Some("actions/checkout@v4"));
    assert_eq!(checkout["with"]["fetch-depth"].as_u64(), Some(0));
    assert!(job(&doc, "deploy-dev")["steps"][0]["with"].get("fetch-depth").is_none());

    let commands = run_commands(synth_job);
    let version_at = commands.iter().position(|c| c == ".pipegen/run version:compute").unwrap();
    let install_at = commands.iter().position(|c| c == "cargo install --locked pipegen").unwrap();
    assert!(install_at < version_at);
    for fact in ["GIT_TAG", "COMMIT_COUNT", "COMMITS_SINCE_TAG"] {
        let prefix = format!("echo \"{}=$(", fact);
        let export_at = commands
            .iter()
            .position(|c| c.starts_with(&prefix) && c.ends_with(">> \"$GITHUB_ENV\""))
            .unwrap_or_else(|| panic!("{} is not exported", fact));
        assert!(export_at < version_at, "{} exported after version:compute", fact);
    }
}

#[test]
fn test_unversioned_synth_keeps_shallow_checkout() {
    let yaml = CDK_PROJECT.replace("versioning:\n  enabled: true\n", "");
    let project = synth(&yaml, Target::Github);
    let doc = yaml_file(&project, ".github/workflows/deploy.yml");
    let synth_job = job(&doc, "synth");

    assert!(synth_job["steps"][0]["with"].get("fetch-depth").is_none());
    let commands = run_commands(synth_job);
    assert!(!commands.iter().any(|c| c.contains("version:compute") || c.contains("GIT_TAG")));
}

#[test]
fn test_assembly_upload_publishes_to_github_packages() {
    let project = synth(CDK_PROJECT, Target::Github);
    let doc = yaml_file(&project, ".github/workflows/deploy.yml");
    let assembly = job(&doc, "assemblyUpload");

    assert_eq!(assembly["permissions"]["packages"].as_str(), Some("write"));
    assert_eq!(assembly["env"]["NODE_AUTH_TOKEN"].as_str(), Some("${{ secrets.GITHUB_TOKEN }}"));
    assert!(run_commands(assembly).contains(&".pipegen/run publish:assembly".to_string()));
}

#[test]
fn test_manual_stage_gets_release_workflow() {
    let project = synth(CDK_PROJECT, Target::Github);
    let doc = yaml_file(&project, ".github/workflows/release-prod.yml");

    assert!(doc["on"]["workflow_dispatch"]["inputs"]["version"].is_mapping());
    let release = job(&doc, "deploy-prod");
    assert_eq!(release["environment"].as_str(), Some("prod"));
    assert_eq!(release["permissions"]["packages"].as_str(), Some("read"));
    assert!(run_commands(release).contains(&".pipegen/run deploy:prod".to_string()));
}

#[test]
fn test_feature_workflow_ignores_main_branch() {
    let project = synth(CDK_PROJECT, Target::Github);
    let doc = yaml_file(&project, ".github/workflows/deploy-feature.yml");

    assert_eq!(doc["on"]["push"]["branches-ignore"][0].as_str(), Some("main"));
    let feature = job(&doc, "deploy-feature");
    assert_eq!(feature["env"]["BRANCH"].as_str(), Some("${{ github.head_ref || github.ref_name }}"));
    assert!(run_commands(feature).contains(&".pipegen/run deploy:feature".to_string()));
}

#[test]
fn test_app_entrypoint_and_tasks() {
    let project = synth(CDK_PROJECT, Target::Github);

    let app = text_file(&project, "src/app.ts");
    assert!(app.contains("provideDevStack"));
    assert!(app.contains("providePersonalStack"));
    assert!(app.contains("process.env.BRANCH"));

    for task in ["deploy:dev", "deploy:sandbox", "deploy:personal", "deploy:feature", "assembly:fetch"] {
        assert!(project.task(task).is_some(), "missing task {}", task);
    }
    let deps: Vec<&str> = project.dev_dependencies().collect();
    assert!(deps.contains(&"aws-cdk"));
}
