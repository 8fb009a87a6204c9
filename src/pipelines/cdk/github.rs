//! GitHub Actions workflows for the CDK pipeline

use crate::core::permissions::{permissions, PermissionLevel};
use crate::core::stage::{job_slug, ResolvedStage};
use crate::error::Result;
use crate::pipelines::cdk::{CdkPipeline, ASSEMBLY_JOB, ASSET_JOB, FEATURE_JOB, SYNTH_JOB};
use crate::pipelines::JobGraph;
use crate::project::Project;
use crate::steps::StepSequence;
use crate::workflow::github::{node_preamble, CHECKOUT, SETUP_NODE};
use crate::workflow::{Job, Triggers, Workflow};
use tracing::{debug, info};

pub const DEPLOY_WORKFLOW: &str = ".github/workflows/deploy.yml";
const GITHUB_PACKAGES: &str = "https://npm.pkg.github.com";

fn workflow_path(name: &str) -> String {
    format!(".github/workflows/{}.yml", name)
}

pub(super) fn generate(pipeline: &CdkPipeline, project: &mut Project) -> Result<()> {
    let defaults = &pipeline.settings.defaults;
    let mut workflow = Workflow::new("deploy", Triggers::push_to(&defaults.branch)).with_concurrency("deploy");
    let mut graph = JobGraph::new();

    let mut add = |workflow: &mut Workflow, id: String, job: Job| -> Result<()> {
        graph.add(id.clone(), job.needs.clone())?;
        workflow.add_job(id, job);
        Ok(())
    };

    add(
        &mut workflow,
        SYNTH_JOB.to_string(),
        synth_job(pipeline)?,
    )?;
    add(
        &mut workflow,
        ASSET_JOB.to_string(),
        job(pipeline, &pipeline.runner(), pipeline.asset_steps(true), [SYNTH_JOB])?.named("Publish assets"),
    )?;

    let mut previous: Option<String> = None;
    for stage in pipeline.automatic_stages() {
        let id = stage.job_id("deploy");
        let mut needs = vec![ASSET_JOB.to_string()];
        needs.extend(previous.take());
        let deploy = job(pipeline, &stage.runner, pipeline.deploy_steps(stage, true), needs)?
            .named(format!("Deploy {}", stage.name))
            .in_environment(stage.name.as_str());
        add(&mut workflow, id.clone(), deploy)?;
        previous = Some(id);
    }

    if pipeline.has_manual_stages() {
        let mut assembly = job_with_registry(
            pipeline,
            &pipeline.runner(),
            pipeline.assembly_steps(true),
            vec![SYNTH_JOB.to_string()],
        )?
        .named("Publish cloud assembly")
        .grant(&permissions([("packages", PermissionLevel::Write)]))?;
        assembly
            .env
            .insert("NODE_AUTH_TOKEN".to_string(), "${{ secrets.GITHUB_TOKEN }}".to_string());
        add(&mut workflow, ASSEMBLY_JOB.to_string(), assembly)?;
    }

    for stage in pipeline.independent.iter().filter(|s| s.deploy_on_push) {
        add(&mut workflow, stage.job_id("independent"), independent_job(pipeline, stage)?)?;
    }

    graph.validate()?;
    info!("CDK workflow with {} jobs", graph.len());
    project.add_yaml_file(DEPLOY_WORKFLOW, &workflow)?;

    for stage in pipeline.manual_stages() {
        release_workflow(pipeline, stage, project)?;
    }
    for stage in pipeline.independent.iter().filter(|s| !s.deploy_on_push) {
        let mut workflow = Workflow::new(format!("deploy-{}", stage.name), Triggers::manual());
        workflow.add_job(stage.job_id("independent"), independent_job(pipeline, stage)?);
        project.add_yaml_file(workflow_path(&format!("deploy-{}", job_slug(&stage.name))), &workflow)?;
    }
    if let Some(stage) = &pipeline.feature {
        let mut workflow = Workflow::new("deploy-feature", Triggers::push_except(&defaults.branch))
            .with_concurrency("deploy-feature-${{ github.ref_name }}");
        let steps = pipeline.feature_steps(stage, "${{ github.head_ref || github.ref_name }}");
        workflow.add_job(
            FEATURE_JOB,
            job(pipeline, &stage.runner, steps, Vec::<String>::new())?
                .named("Deploy feature")
                .in_environment("feature"),
        );
        project.add_yaml_file(workflow_path("deploy-feature"), &workflow)?;
    }

    Ok(())
}

fn job<I, S>(pipeline: &CdkPipeline, runner: &[String], steps: StepSequence, needs: I) -> Result<Job>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let preamble = node_preamble(&pipeline.settings.defaults.node_version);
    Ok(Job::from_steps(runner, preamble, steps.to_github()?, needs)?)
}

/// Versioning counts commits and finds tags, so the synth checkout keeps full history
fn synth_job(pipeline: &CdkPipeline) -> Result<Job> {
    let mut preamble = node_preamble(&pipeline.settings.defaults.node_version);
    if pipeline.settings.versioning_enabled() {
        if let Some(checkout) = preamble.iter_mut().find(|s| s.uses.as_deref() == Some(CHECKOUT)) {
            *checkout = checkout.clone().with("fetch-depth", 0);
        }
    }
    let steps = pipeline.synth_steps(true).to_github()?;
    Ok(Job::from_steps(&pipeline.runner(), preamble, steps, Vec::<String>::new())?.named("Synth"))
}

/// Job whose npm client authenticates against GitHub Packages
fn job_with_registry(
    pipeline: &CdkPipeline,
    runner: &[String],
    steps: StepSequence,
    needs: Vec<String>,
) -> Result<Job> {
    let mut preamble = node_preamble(&pipeline.settings.defaults.node_version);
    if let Some(setup) = preamble
        .iter_mut()
        .find(|s| s.uses.as_deref() == Some(SETUP_NODE))
    {
        *setup = setup.clone().with("registry-url", GITHUB_PACKAGES);
    }
    Ok(Job::from_steps(runner, preamble, steps.to_github()?, needs)?)
}

fn independent_job(pipeline: &CdkPipeline, stage: &ResolvedStage) -> Result<Job> {
    Ok(job(pipeline, &stage.runner, pipeline.independent_steps(stage), Vec::<String>::new())?
        .named(format!("Deploy {}", stage.name))
        .in_environment(stage.name.as_str()))
}

/// On-demand workflow deploying a published cloud assembly to one stage
fn release_workflow(pipeline: &CdkPipeline, stage: &ResolvedStage, project: &mut Project) -> Result<()> {
    let name = format!("release-{}", job_slug(&stage.name));
    let mut workflow = Workflow::new(
        name.clone(),
        Triggers::manual_with_input("version", "Cloud assembly version to deploy"),
    );

    let steps = pipeline.release_steps(stage, "${{ github.event.inputs.version }}");
    let mut release = job_with_registry(pipeline, &stage.runner, steps, vec![])?
        .named(format!("Release {}", stage.name))
        .in_environment(stage.name.as_str())
        .grant(&permissions([("packages", PermissionLevel::Read)]))?;
    release
        .env
        .insert("NODE_AUTH_TOKEN".to_string(), "${{ secrets.GITHUB_TOKEN }}".to_string());
    workflow.add_job(stage.job_id("deploy"), release);

    debug!("Release workflow {}", name);
    project.add_yaml_file(workflow_path(&name), &workflow)?;
    Ok(())
}
