//! Compiles declarative action lists into step sequences.

use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::model::{ExecutorAction, LogConfig};
use crate::runtime::Container;
use crate::sequence::{
    DownloadStep, FetchResultStep, ResultWriter, RunStep, Step, StepSequence, TryStep, UploadStep,
};

/// Deepest `try` nesting accepted in an action list.
pub const MAX_TRY_DEPTH: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransformError {
    #[error("action {index} ({kind}): missing `{field}`")]
    MissingField {
        index: usize,
        kind: &'static str,
        field: &'static str,
    },

    #[error("action {index}: only one fetch_result is allowed per run")]
    DuplicateFetchResult { index: usize },

    #[error("action {index}: try nested deeper than {max}")]
    TryTooDeep { index: usize, max: usize },

    #[error("action {index}: environment variable with empty name")]
    EmptyEnvName { index: usize },
}

/// Builds the step sequence for one run.
pub trait Transformer: Send + Sync {
    fn steps_for(
        &self,
        log: &LogConfig,
        actions: &[ExecutorAction],
        container: Arc<dyn Container>,
        result: ResultWriter,
    ) -> Result<StepSequence, TransformError>;
}

/// Maps every action onto the matching step from `crate::sequence`.
#[derive(Debug, Clone, Default)]
pub struct ActionTransformer;

impl ActionTransformer {
    pub fn new() -> Self {
        Self
    }
}

struct Build<'a> {
    log: &'a LogConfig,
    container: Arc<dyn Container>,
    result: Option<ResultWriter>,
}

impl Build<'_> {
    fn step(
        &mut self,
        index: usize,
        action: &ExecutorAction,
        depth: usize,
    ) -> Result<Box<dyn Step>, TransformError> {
        let kind = action.kind();
        let require = |value: &str, field: &'static str| {
            if value.is_empty() {
                Err(TransformError::MissingField { index, kind, field })
            } else {
                Ok(())
            }
        };

        let step: Box<dyn Step> = match action {
            ExecutorAction::Download { from, to } => {
                require(from.as_str(), "from")?;
                require(to.as_str(), "to")?;
                Box::new(DownloadStep::new(self.container.clone(), from.clone(), to.clone()))
            }
            ExecutorAction::Run {
                script,
                env,
                timeout_secs,
            } => {
                require(script.as_str(), "script")?;
                if env.iter().any(|var| var.name.is_empty()) {
                    return Err(TransformError::EmptyEnvName { index });
                }
                Box::new(RunStep::new(
                    self.container.clone(),
                    self.log.clone(),
                    script.clone(),
                    env.clone(),
                    timeout_secs.map(Duration::from_secs),
                ))
            }
            ExecutorAction::Upload { from, to } => {
                require(from.as_str(), "from")?;
                require(to.as_str(), "to")?;
                Box::new(UploadStep::new(self.container.clone(), from.clone(), to.clone()))
            }
            ExecutorAction::FetchResult { file } => {
                require(file.as_str(), "file")?;
                let writer = self
                    .result
                    .take()
                    .ok_or(TransformError::DuplicateFetchResult { index })?;
                Box::new(FetchResultStep::new(self.container.clone(), file.clone(), writer))
            }
            ExecutorAction::Try { action } => {
                if depth >= MAX_TRY_DEPTH {
                    return Err(TransformError::TryTooDeep {
                        index,
                        max: MAX_TRY_DEPTH,
                    });
                }
                Box::new(TryStep::new(self.step(index, action, depth + 1)?))
            }
        };

        Ok(step)
    }
}

impl Transformer for ActionTransformer {
    fn steps_for(
        &self,
        log: &LogConfig,
        actions: &[ExecutorAction],
        container: Arc<dyn Container>,
        result: ResultWriter,
    ) -> Result<StepSequence, TransformError> {
        let mut build = Build {
            log,
            container,
            result: Some(result),
        };

        let steps = actions
            .iter()
            .enumerate()
            .map(|(index, action)| build.step(index, action, 0))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(StepSequence::new(steps))
    }
}
