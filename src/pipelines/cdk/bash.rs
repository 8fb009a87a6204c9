//! `pipeline.sh` for running the CDK pipeline locally or on a plain runner

use crate::error::Result;
use crate::pipelines::cdk::{CdkPipeline, ASSEMBLY_JOB, ASSET_JOB, FEATURE_JOB, SYNTH_JOB};
use crate::pipelines::JobGraph;
use crate::project::Project;
use crate::workflow::BashScript;
use tracing::info;

pub const PIPELINE_SCRIPT: &str = "pipeline.sh";

/// Without arguments the script runs synth, asset publishing and every
/// automatic deployment; manual and ephemeral jobs run only when named
pub(super) fn generate(pipeline: &CdkPipeline, project: &mut Project) -> Result<()> {
    let mut script = BashScript::new(format!("CDK pipeline for {}", pipeline.settings.project_name));
    let mut graph = JobGraph::new();

    script.add_job(SYNTH_JOB, pipeline.synth_steps(true).to_bash()?, true);
    graph.add(SYNTH_JOB, Vec::<String>::new())?;
    script.add_job(ASSET_JOB, pipeline.asset_steps(true).to_bash()?, true);
    graph.add(ASSET_JOB, [SYNTH_JOB])?;

    let mut previous: Option<String> = None;
    for stage in pipeline.automatic_stages() {
        let id = stage.job_id("deploy");
        script.add_job(id.clone(), pipeline.deploy_steps(stage, true).to_bash()?, true);
        let mut needs = vec![ASSET_JOB.to_string()];
        needs.extend(previous.take());
        graph.add(id.clone(), needs)?;
        previous = Some(id);
    }

    if pipeline.has_manual_stages() {
        script.add_job(ASSEMBLY_JOB, pipeline.assembly_steps(true).to_bash()?, false);
        graph.add(ASSEMBLY_JOB, [SYNTH_JOB])?;
        for stage in pipeline.manual_stages() {
            let steps = pipeline.release_steps(stage, "${ASSEMBLY_VERSION:-latest}");
            script.add_job(stage.job_id("release"), steps.to_bash()?, false);
            graph.add(stage.job_id("release"), Vec::<String>::new())?;
        }
    }

    for stage in &pipeline.independent {
        let id = stage.job_id("independent");
        script.add_job(id.clone(), pipeline.independent_steps(stage).to_bash()?, stage.deploy_on_push);
        graph.add(id, Vec::<String>::new())?;
    }

    if let Some(stage) = &pipeline.feature {
        let steps = pipeline.feature_steps(stage, "${BRANCH:-$(git rev-parse --abbrev-ref HEAD)}");
        script.add_job(FEATURE_JOB, steps.to_bash()?, false);
        graph.add(FEATURE_JOB, Vec::<String>::new())?;
    }

    script.set_default_order(&graph.execution_order()?);
    info!("Bash pipeline with {} jobs", graph.len());
    project.add_executable(PIPELINE_SCRIPT, script.render())?;
    Ok(())
}
