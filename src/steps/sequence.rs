//! Ordered composition of steps

use crate::steps::output::{
    BashStepConfig, CodeCatalystStepConfig, GithubStepConfig, GitlabStepConfig, StepOutput,
};
use crate::steps::{PipelineStep, StepError};

/// Steps rendered one after another, in declaration order
///
/// Actions are concatenated, environments merged left to right (later keys
/// win), needs unioned and GitHub permissions merged broadest-wins. Nothing
/// is reordered or deduplicated.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StepSequence {
    steps: Vec<PipelineStep>,
}

impl StepSequence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_steps<I>(steps: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<PipelineStep>,
    {
        Self {
            steps: steps.into_iter().map(Into::into).collect(),
        }
    }

    pub fn push(&mut self, step: impl Into<PipelineStep>) {
        self.steps.push(step.into());
    }

    pub fn then(mut self, step: impl Into<PipelineStep>) -> Self {
        self.push(step);
        self
    }

    pub fn extend<I>(&mut self, steps: I)
    where
        I: IntoIterator,
        I::Item: Into<PipelineStep>,
    {
        self.steps.extend(steps.into_iter().map(Into::into));
    }

    pub fn steps(&self) -> &[PipelineStep] {
        &self.steps
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    fn fold<T, F>(&self, render: F) -> Result<T, StepError>
    where
        T: StepOutput,
        F: Fn(&PipelineStep) -> Result<T, StepError>,
    {
        self.steps.iter().try_fold(T::default(), |mut acc, step| {
            acc.append(render(step)?);
            Ok(acc)
        })
    }

    pub fn to_github(&self) -> Result<GithubStepConfig, StepError> {
        self.fold(PipelineStep::to_github)
    }

    pub fn to_gitlab(&self) -> Result<GitlabStepConfig, StepError> {
        self.fold(PipelineStep::to_gitlab)
    }

    pub fn to_bash(&self) -> Result<BashStepConfig, StepError> {
        self.fold(PipelineStep::to_bash)
    }

    pub fn to_codecatalyst(&self) -> Result<CodeCatalystStepConfig, StepError> {
        self.fold(PipelineStep::to_codecatalyst)
    }
}
