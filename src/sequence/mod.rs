//! Executable step sequences.
//!
//! A `StepSequence` is what the transformer produces from an action list and
//! what a depot worker eventually performs. Steps run strictly in order and
//! the first failure ends the sequence.

mod result;
pub mod steps;

use async_trait::async_trait;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

use crate::runtime::RuntimeError;

pub use result::{ResultReader, ResultWriter, result_slot};
pub use steps::{DownloadStep, FetchResultStep, RunStep, TryStep, UploadStep};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StepError {
    #[error(transparent)]
    Runtime(#[from] RuntimeError),

    #[error("process exited with status {0}")]
    ExitStatus(i32),

    #[error("process timed out after {0:?}")]
    TimedOut(Duration),
}

#[async_trait]
pub trait Step: Send {
    /// Short label used in logs and diagnostics.
    fn name(&self) -> &str;

    async fn perform(&mut self) -> Result<(), StepError>;
}

/// Ordered steps compiled from one action list.
#[derive(Default)]
pub struct StepSequence {
    steps: Vec<Box<dyn Step>>,
}

impl StepSequence {
    pub fn new(steps: Vec<Box<dyn Step>>) -> Self {
        Self { steps }
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Names of the steps, in execution order.
    pub fn names(&self) -> Vec<String> {
        self.steps.iter().map(|s| s.name().to_string()).collect()
    }

    /// Perform every step in order, stopping at the first failure.
    pub async fn perform(&mut self) -> Result<(), StepError> {
        for (index, step) in self.steps.iter_mut().enumerate() {
            tracing::debug!(index, step = step.name(), "Performing step");
            if let Err(err) = step.perform().await {
                tracing::debug!(index, step = step.name(), error = %err, "Step failed");
                return Err(err);
            }
        }
        Ok(())
    }
}

impl fmt::Debug for StepSequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StepSequence")
            .field("steps", &self.names())
            .finish()
    }
}
