//! Container build and promotion pipeline

use crate::helpers::*;
use pipegen::core::target::Target;

const ECR_HOST: &str = "111111111111.dkr.ecr.eu-west-1.amazonaws.com";

#[test]
fn test_github_build_then_chained_pushes() {
    let project = synth(CONTAINER_PROJECT, Target::Github);
    let doc = yaml_file(&project, ".github/workflows/container.yml");

    assert_eq!(job_ids(&doc), vec!["build", "push-dev", "push-prod"]);
    let prod_needs = needs(&doc, "push-prod");
    assert!(prod_needs.contains(&"build".to_string()));
    assert!(prod_needs.contains(&"push-dev".to_string()));

    assert!(job(&doc, "push-dev")["environment"].is_null());
    assert_eq!(job(&doc, "push-prod")["environment"].as_str(), Some("prod"));
}

#[test]
fn test_github_build_job_scans_and_saves_image() {
    let project = synth(CONTAINER_PROJECT, Target::Github);
    let doc = yaml_file(&project, ".github/workflows/container.yml");
    let build = job(&doc, "build");

    let names: Vec<&str> = build["steps"]
        .as_sequence()
        .unwrap()
        .iter()
        .filter_map(|s| s["name"].as_str())
        .collect();
    let scan = names.iter().position(|n| *n == "Scan image").unwrap();
    let save = names.iter().position(|n| *n == "Save image").unwrap();
    assert!(names.contains(&"Generate SBOM"));
    assert!(scan < save);

    let commands = run_commands(build);
    assert!(commands.contains(&"docker build -t svc:${{ github.sha }} .".to_string()));
    assert!(commands.contains(&"docker save -o image.tar svc:${{ github.sha }}".to_string()));
}

#[test]
fn test_github_push_logs_in_per_registry() {
    let project = synth(CONTAINER_PROJECT, Target::Github);
    let doc = yaml_file(&project, ".github/workflows/container.yml");

    let dev = job(&doc, "push-dev");
    assert_eq!(dev["permissions"]["id-token"].as_str(), Some("write"));
    let commands = run_commands(dev);
    assert_eq!(commands[0], "docker load -i image.tar");
    assert!(commands.contains(&format!(
        "aws ecr get-login-password --region eu-west-1 | docker login --username AWS --password-stdin {}",
        ECR_HOST
    )));
    assert!(commands.contains(&format!("docker push {}/svc:${{{{ github.sha }}}}", ECR_HOST)));

    let prod = job(&doc, "push-prod");
    let login = prod["steps"]
        .as_sequence()
        .unwrap()
        .iter()
        .find(|s| s["uses"].as_str() == Some("docker/login-action@v3"))
        .unwrap();
    assert_eq!(login["with"]["username"].as_str(), Some("${{ secrets.DOCKERHUB_USER }}"));
    assert!(run_commands(prod).contains(&"docker push acme/svc:${{ github.sha }}".to_string()));
}

#[test]
fn test_gitlab_manual_stage_and_artifacts() {
    let project = synth(CONTAINER_PROJECT, Target::Gitlab);
    let doc = yaml_file(&project, ".gitlab-ci.yml");

    let artifacts = strings(&job(&doc, "build")["artifacts"]["paths"]);
    assert!(artifacts.contains(&"image.tar".to_string()));
    assert!(artifacts.contains(&"sbom.spdx.json".to_string()));

    let prod = job(&doc, "push-prod");
    assert_eq!(prod["rules"][0]["when"].as_str(), Some("manual"));
    assert_eq!(prod["environment"]["name"].as_str(), Some("prod"));
    assert!(strings(&prod["script"])
        .contains(&"echo \"$DOCKERHUB_TOKEN\" | docker login --username \"$DOCKERHUB_USER\" --password-stdin".to_string()));
    assert!(strings(&job(&doc, "push-dev")["script"]).contains(&format!("docker push {}/svc:$CI_COMMIT_SHA", ECR_HOST)));
}

#[test]
fn test_bash_script_tags_from_git() {
    let project = synth(CONTAINER_PROJECT, Target::Bash);
    let script = text_file(&project, "container.sh");

    assert!(script.contains("export IMAGE_TAG=\"${IMAGE_TAG:-$(git rev-parse --short HEAD)}\""));
    assert!(script.contains(&format!("docker push {}/svc:$IMAGE_TAG", ECR_HOST)));
    assert!(default_position(script, "build").unwrap() < default_position(script, "push-dev").unwrap());
    assert!(default_position(script, "push-prod").is_none());
}

#[test]
fn test_codecatalyst_is_rejected() {
    let err = pipegen::pipelines::synthesize(&config(CONTAINER_PROJECT), Target::CodeCatalyst).unwrap_err();
    assert_eq!(
        err.to_string(),
        "container pipeline cannot be generated for target codecatalyst"
    );
}

#[test]
fn test_registry_validation_messages() {
    assert_config_error(
        "name: svc\ncontainer:\n  imageName: svc\n  stages: []\n",
        "At least one stage must be defined",
    );
    assert_config_error(
        "name: svc\ncontainer:\n  imageName: svc\n  stages:\n    - name: prod\n      registries:\n        - type: ecr\n          repository: svc\n",
        "ECR registry in stage 'prod' must specify a region",
    );
    assert_config_error(
        "name: svc\ncontainer:\n  imageName: svc\n  stages:\n    - name: prod\n      registries:\n        - type: harbor\n          repository: lib/svc\n          usernameSecret: U\n          passwordSecret: P\n",
        "Harbor registry in stage 'prod' must specify a url",
    );
    assert_config_error(
        "name: svc\ncontainer:\n  imageName: svc\n  stages:\n    - name: prod\n      registries:\n        - type: dockerhub\n          repository: acme/svc\n",
        "DockerHub registry in stage 'prod' must specify usernameSecret and passwordSecret",
    );
}
