//! Terraform plan and apply pipeline

use crate::helpers::*;
use pipegen::core::target::Target;

#[test]
fn test_github_validate_plan_apply_chain() {
    let project = synth(TERRAFORM_PROJECT, Target::Github);
    let doc = yaml_file(&project, ".github/workflows/terraform.yml");

    assert_eq!(
        job_ids(&doc),
        vec!["validate", "plan-dev", "apply-dev", "plan-prod", "apply-prod"]
    );
    assert_eq!(needs(&doc, "plan-prod"), vec!["validate"]);
    let apply_prod = needs(&doc, "apply-prod");
    assert!(apply_prod.contains(&"plan-prod".to_string()));
    assert!(apply_prod.contains(&"apply-dev".to_string()));

    let validate = job(&doc, "validate");
    assert!(actions(validate).contains(&"hashicorp/setup-terraform@v3".to_string()));
    assert_eq!(
        run_commands(validate),
        vec![
            "terraform -chdir=infra init -backend=false",
            "terraform -chdir=infra fmt -check -recursive",
            "terraform -chdir=infra validate",
        ]
    );

    assert!(job(&doc, "apply-dev")["environment"].is_null());
    assert_eq!(job(&doc, "apply-prod")["environment"].as_str(), Some("prod"));
}

#[test]
fn test_apply_uses_the_uploaded_plan() {
    let project = synth(TERRAFORM_PROJECT, Target::Github);
    let doc = yaml_file(&project, ".github/workflows/terraform.yml");

    let plan = job(&doc, "plan-dev");
    assert!(run_commands(plan)
        .contains(&"terraform -chdir=infra plan -input=false -var-file=dev.tfvars -out=dev.tfplan".to_string()));
    let upload = plan["steps"]
        .as_sequence()
        .unwrap()
        .iter()
        .find(|s| s["uses"].as_str() == Some("actions/upload-artifact@v4"))
        .unwrap();
    assert_eq!(upload["with"]["path"].as_str(), Some("infra/dev.tfplan"));

    assert!(run_commands(job(&doc, "apply-dev"))
        .contains(&"terraform -chdir=infra apply -input=false dev.tfplan".to_string()));
}

#[test]
fn test_gitlab_terraform_image_and_manual_apply() {
    let project = synth(TERRAFORM_PROJECT, Target::Gitlab);
    let doc = yaml_file(&project, ".gitlab-ci.yml");

    let validate = job(&doc, "validate");
    assert_eq!(validate["image"]["name"].as_str(), Some("hashicorp/terraform:latest"));
    assert_eq!(strings(&validate["image"]["entrypoint"]), vec![""]);

    assert_eq!(job(&doc, "apply-prod")["rules"][0]["when"].as_str(), Some("manual"));
    assert!(job(&doc, "apply-dev")["rules"][0]["when"].is_null());
    assert_eq!(strings(&doc["stages"]), vec!["validate", "plan", "apply"]);
}

#[test]
fn test_bash_applies_only_automatic_stages() {
    let project = synth(TERRAFORM_PROJECT, Target::Bash);
    let script = text_file(&project, "terraform.sh");

    assert!(default_position(script, "validate").unwrap() < default_position(script, "plan-dev").unwrap());
    assert!(default_position(script, "plan-dev").unwrap() < default_position(script, "apply-dev").unwrap());
    assert!(default_position(script, "plan-prod").is_some());
    assert!(default_position(script, "apply-prod").is_none());
}

#[test]
fn test_terraform_tasks() {
    let project = synth(TERRAFORM_PROJECT, Target::Github);
    let validate = project.task("terraform:validate").unwrap();
    assert_eq!(validate.steps.len(), 3);
    assert!(project.task("terraform:plan:prod").is_some());
}
