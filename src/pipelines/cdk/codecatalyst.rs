//! Amazon CodeCatalyst workflows for the CDK pipeline
//!
//! Roles come from environment account connections, so role assumption
//! renders to nothing here, and the cloud assembly travels as an action
//! output artifact instead of through upload and download steps.

use crate::core::stage::{job_slug, ResolvedStage};
use crate::error::Result;
use crate::pipelines::cdk::{CdkPipeline, ASSEMBLY_JOB, ASSET_JOB, SYNTH_JOB};
use crate::pipelines::JobGraph;
use crate::project::Project;
use crate::steps::{CommandStep, StepSequence};
use crate::workflow::{Action, CodeCatalystWorkflow, Trigger};
use tracing::{info, warn};

pub const DEPLOY_WORKFLOW: &str = ".codecatalyst/workflows/deploy.yaml";
const ASSEMBLY_OUTPUT: &str = "CloudAssembly";

fn workflow_path(name: &str) -> String {
    format!(".codecatalyst/workflows/{}.yaml", name)
}

pub(super) fn generate(pipeline: &CdkPipeline, project: &mut Project) -> Result<()> {
    let mut workflow = CodeCatalystWorkflow::new("deploy", vec![Trigger::push(&pipeline.settings.defaults.branch)]);
    let mut graph = JobGraph::new();
    let dir = pipeline.assembly_dir().to_string();

    let synth = Action::build(pipeline.synth_steps(false).to_codecatalyst()?, Vec::<String>::new())
        .producing(ASSEMBLY_OUTPUT, &format!("{}/**/*", dir));
    graph.add(SYNTH_JOB, Vec::<String>::new())?;
    workflow.add_action(SYNTH_JOB, synth);

    let assets = Action::build(with_assembly(pipeline, pipeline.asset_steps(false)).to_codecatalyst()?, [SYNTH_JOB])
        .consuming(ASSEMBLY_OUTPUT);
    graph.add(ASSET_JOB, [SYNTH_JOB])?;
    workflow.add_action(ASSET_JOB, assets);

    let mut previous: Option<String> = None;
    for stage in pipeline.automatic_stages() {
        let id = stage.job_id("deploy");
        let mut depends = vec![ASSET_JOB.to_string()];
        depends.extend(previous.take());
        graph.add(id.clone(), depends.clone())?;
        let deploy = Action::build(
            with_assembly(pipeline, pipeline.deploy_steps(stage, false)).to_codecatalyst()?,
            depends,
        )
        .consuming(ASSEMBLY_OUTPUT)
        .in_environment(&stage.name, &stage.env.account, stage.deploy_role.as_deref());
        workflow.add_action(id.clone(), deploy);
        previous = Some(id);
    }

    if pipeline.has_manual_stages() {
        let assembly = Action::build(
            with_assembly(pipeline, pipeline.assembly_steps(false)).to_codecatalyst()?,
            [SYNTH_JOB],
        )
        .consuming(ASSEMBLY_OUTPUT);
        graph.add(ASSEMBLY_JOB, [SYNTH_JOB])?;
        workflow.add_action(ASSEMBLY_JOB, assembly);
    }

    for stage in pipeline.independent.iter().filter(|s| s.deploy_on_push) {
        let id = stage.job_id("independent");
        graph.add(id.clone(), Vec::<String>::new())?;
        workflow.add_action(id, independent_action(pipeline, stage)?);
    }

    graph.validate()?;
    info!("CodeCatalyst workflow with {} actions", graph.len());
    project.add_yaml_file(DEPLOY_WORKFLOW, &workflow)?;

    for stage in pipeline.manual_stages() {
        let name = format!("release-{}", job_slug(&stage.name));
        let mut release = CodeCatalystWorkflow::new(name.clone(), vec![Trigger::manual()]);
        let steps = pipeline.release_steps(stage, "latest");
        release.add_action(
            stage.job_id("deploy"),
            Action::build(steps.to_codecatalyst()?, Vec::<String>::new()).in_environment(
                &stage.name,
                &stage.env.account,
                stage.deploy_role.as_deref(),
            ),
        );
        project.add_yaml_file(workflow_path(&name), &release)?;
    }

    for stage in pipeline.independent.iter().filter(|s| !s.deploy_on_push) {
        let name = format!("deploy-{}", job_slug(&stage.name));
        let mut independent = CodeCatalystWorkflow::new(name.clone(), vec![Trigger::manual()]);
        independent.add_action(stage.job_id("independent"), independent_action(pipeline, stage)?);
        project.add_yaml_file(workflow_path(&name), &independent)?;
    }

    if pipeline.feature.is_some() {
        warn!("Feature stages have no CodeCatalyst workflow; use the deploy:feature task");
    }
    Ok(())
}

/// Restore the consumed assembly into the working directory first
fn with_assembly(pipeline: &CdkPipeline, steps: StepSequence) -> StepSequence {
    let dir = pipeline.assembly_dir();
    let mut restored = StepSequence::new().then(CommandStep::new([format!(
        "rm -rf {dir} && cp -r \"$CATALYST_SOURCE_DIR_{}/{dir}\" {dir}",
        ASSEMBLY_OUTPUT,
        dir = dir
    )]));
    restored.extend(steps.steps().iter().cloned());
    restored
}

fn independent_action(pipeline: &CdkPipeline, stage: &ResolvedStage) -> Result<Action> {
    Ok(Action::build(pipeline.independent_steps(stage).to_codecatalyst()?, Vec::<String>::new())
        .in_environment(&stage.name, &stage.env.account, stage.deploy_role.as_deref()))
}
