//! Errors surfaced by the deployment pipeline.

use thiserror::Error;

use crate::ArtifactStore;

/// Errors produced while resolving parameters, validating a plan or running it.
#[derive(Debug, Error)]
pub enum DeployError {
    /// A human-scale amount could not be converted to its fixed-point representation.
    #[error("invalid amount for `{field}`: {value:?} ({reason})")]
    InvalidAmount {
        field: &'static str,
        value: String,
        reason: &'static str,
    },

    /// The presale window is empty or does not fit in a unix timestamp.
    #[error("invalid presale window: start {start_time}, duration {duration_secs}s")]
    InvalidWindow { start_time: u64, duration_secs: u64 },

    /// An artifact was registered twice under the same name.
    #[error("artifact `{0}` is already registered")]
    DuplicateArtifact(String),

    /// No artifact is registered under the requested name.
    #[error("no artifact registered under `{0}`")]
    UnknownArtifact(String),

    /// Two steps of a plan share the same name.
    #[error("plan declares step `{0}` more than once")]
    DuplicatePlanStep(&'static str),

    /// A step depends on something no earlier step produces.
    #[error("step `{step}` depends on `{dependency}`, which no earlier step produces")]
    CyclicOrUnorderedDependency {
        step: &'static str,
        dependency: &'static str,
    },

    /// An external deploy or call action failed.
    #[error("step `{step}` failed: {cause:#}")]
    StepFailed { step: String, cause: anyhow::Error },
}

impl DeployError {
    pub fn step_failed(step: impl Into<String>, cause: anyhow::Error) -> Self {
        Self::StepFailed {
            step: step.into(),
            cause,
        }
    }
}

/// A deployment run that stopped before completing.
///
/// Carries the artifacts deployed before the failure so an operator can inspect
/// the chain state or resume by hand. Nothing is rolled back.
#[derive(Debug, Error)]
#[error("run stopped at step `{step}`")]
pub struct RunFailure {
    /// Name of the step that was running when the run stopped.
    pub step: &'static str,
    /// The error that stopped the run.
    #[source]
    pub error: DeployError,
    /// Artifacts registered before the failure, in deployment order.
    pub artifacts: ArtifactStore,
}
