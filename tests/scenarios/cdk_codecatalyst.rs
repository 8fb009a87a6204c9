//! CDK pipeline on Amazon CodeCatalyst

use crate::helpers::*;
use pipegen::core::target::Target;

#[test]
fn test_deploy_workflow_moves_assembly_through_action_artifacts() {
    let project = synth(CDK_PROJECT, Target::CodeCatalyst);
    let doc = yaml_file(&project, ".codecatalyst/workflows/deploy.yaml");

    assert_eq!(doc["SchemaVersion"].as_str(), Some("1.0"));
    assert_eq!(doc["Triggers"][0]["Type"].as_str(), Some("PUSH"));

    let actions = &doc["Actions"];
    assert_eq!(
        actions["synth"]["Outputs"]["Artifacts"][0]["Name"].as_str(),
        Some("CloudAssembly")
    );
    let deploy = &actions["deploy-dev"];
    assert_eq!(strings(&deploy["Inputs"]["Artifacts"]), vec!["CloudAssembly"]);
    assert_eq!(deploy["Environment"]["Name"].as_str(), Some("dev"));
    assert_eq!(
        deploy["Environment"]["Connections"][0]["Name"].as_str(),
        Some("111111111111")
    );
    assert_eq!(deploy["Environment"]["Connections"][0]["Role"].as_str(), Some("deploy"));

    let staging_depends = strings(&actions["deploy-staging"]["DependsOn"]);
    assert!(staging_depends.contains(&"deploy-dev".to_string()));
}

#[test]
fn test_manual_stage_and_feature_handling() {
    let project = synth(CDK_PROJECT, Target::CodeCatalyst);
    let release = yaml_file(&project, ".codecatalyst/workflows/release-prod.yaml");
    assert_eq!(release["Triggers"][0]["Type"].as_str(), Some("MANUAL"));

    // feature stages have no CodeCatalyst rendering
    assert!(project
        .files()
        .all(|f| !f.path.starts_with(".codecatalyst/workflows/deploy-feature")));
}
