//! GitLab CI jobs for the CDK pipeline

use crate::core::stage::ResolvedStage;
use crate::error::Result;
use crate::pipelines::cdk::{CdkPipeline, ASSEMBLY_JOB, ASSET_JOB, FEATURE_JOB, SYNTH_JOB};
use crate::pipelines::JobGraph;
use crate::steps::StepSequence;
use crate::workflow::gitlab::{off_branch, on_branch};
use crate::workflow::{GitlabCi, GitlabJob};
use tracing::info;

const SYNTH_STAGE: &str = "synth";
const ASSETS_STAGE: &str = "assets";
const DEPLOY_STAGE: &str = "deploy";
const RELEASE_STAGE: &str = "release";
const FEATURE_STAGE: &str = "feature";

pub(super) fn generate(pipeline: &CdkPipeline, ci: &mut GitlabCi) -> Result<()> {
    let main = on_branch(&pipeline.settings.defaults.branch);
    let mut graph = JobGraph::new();
    let mut jobs: Vec<(String, GitlabJob)> = Vec::new();

    let mut synth = job(SYNTH_STAGE, pipeline.synth_steps(true), Vec::<String>::new(), &[])?.only_if(&main);
    if pipeline.settings.versioning_enabled() {
        synth = synth.with_variable("GIT_DEPTH", "0");
    }
    jobs.push((SYNTH_JOB.to_string(), synth));
    jobs.push((
        ASSET_JOB.to_string(),
        job(ASSETS_STAGE, pipeline.asset_steps(true), [SYNTH_JOB], &[])?.only_if(&main),
    ));

    let mut previous: Option<String> = None;
    for stage in pipeline.automatic_stages() {
        let id = stage.job_id("deploy");
        let mut needs = vec![ASSET_JOB.to_string()];
        needs.extend(previous.take());
        let deploy = job(DEPLOY_STAGE, pipeline.deploy_steps(stage, true), needs, &pipeline.gitlab_tags(stage))?
            .in_environment(stage.name.as_str())
            .only_if(&main);
        jobs.push((id.clone(), deploy));
        previous = Some(id);
    }

    if pipeline.has_manual_stages() {
        jobs.push((
            ASSEMBLY_JOB.to_string(),
            job(ASSETS_STAGE, pipeline.assembly_steps(true), [SYNTH_JOB], &[])?.only_if(&main),
        ));
        for stage in pipeline.manual_stages() {
            let release = job(
                RELEASE_STAGE,
                pipeline.release_steps(stage, "$ASSEMBLY_VERSION"),
                [ASSEMBLY_JOB],
                &pipeline.gitlab_tags(stage),
            )?
            .with_variable("ASSEMBLY_VERSION", "latest")
            .in_environment(stage.name.as_str())
            .manual()
            .only_if(&main);
            jobs.push((stage.job_id("release"), release));
        }
    }

    for stage in &pipeline.independent {
        let mut independent = independent_job(pipeline, stage)?;
        if !stage.deploy_on_push {
            independent = independent.manual();
        }
        jobs.push((stage.job_id("independent"), independent.only_if(&main)));
    }

    if let Some(stage) = &pipeline.feature {
        let feature = job(
            FEATURE_STAGE,
            pipeline.feature_steps(stage, "$CI_COMMIT_REF_SLUG"),
            Vec::<String>::new(),
            &[],
        )?
        .in_environment("feature/$CI_COMMIT_REF_SLUG")
        .only_if(off_branch(&pipeline.settings.defaults.branch));
        jobs.push((FEATURE_JOB.to_string(), feature));
    }

    for (id, job) in &jobs {
        graph.add(id.clone(), job.needs.clone().unwrap_or_default())?;
    }
    graph.validate()?;

    for (id, job) in jobs {
        ci.add_job(id, job)?;
    }
    info!("CDK GitLab pipeline with {} jobs", graph.len());
    Ok(())
}

fn job<I, S>(stage: &str, steps: StepSequence, needs: I, tags: &[String]) -> Result<GitlabJob>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    Ok(GitlabJob::from_steps(stage, steps.to_gitlab()?, needs).with_tags(tags))
}

fn independent_job(pipeline: &CdkPipeline, stage: &ResolvedStage) -> Result<GitlabJob> {
    Ok(job(
        DEPLOY_STAGE,
        pipeline.independent_steps(stage),
        Vec::<String>::new(),
        &pipeline.gitlab_tags(stage),
    )?
    .in_environment(stage.name.as_str()))
}
