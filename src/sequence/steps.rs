//! Concrete steps, one per action kind.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use super::{ResultWriter, Step, StepError};
use crate::model::{EnvironmentVariable, LogConfig};
use crate::runtime::{Container, ProcessSpec};

pub struct DownloadStep {
    container: Arc<dyn Container>,
    from: String,
    to: String,
}

impl DownloadStep {
    pub fn new(container: Arc<dyn Container>, from: String, to: String) -> Self {
        Self { container, from, to }
    }
}

#[async_trait]
impl Step for DownloadStep {
    fn name(&self) -> &str {
        "download"
    }

    async fn perform(&mut self) -> Result<(), StepError> {
        self.container.copy_in(&self.from, &self.to).await?;
        Ok(())
    }
}

pub struct RunStep {
    container: Arc<dyn Container>,
    log: LogConfig,
    script: String,
    env: Vec<EnvironmentVariable>,
    timeout: Option<Duration>,
}

impl RunStep {
    pub fn new(
        container: Arc<dyn Container>,
        log: LogConfig,
        script: String,
        env: Vec<EnvironmentVariable>,
        timeout: Option<Duration>,
    ) -> Self {
        Self {
            container,
            log,
            script,
            env,
            timeout,
        }
    }
}

#[async_trait]
impl Step for RunStep {
    fn name(&self) -> &str {
        "run"
    }

    async fn perform(&mut self) -> Result<(), StepError> {
        let process = ProcessSpec {
            script: self.script.clone(),
            env: self.env.clone(),
        };

        let outcome = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, self.container.run(process))
                .await
                .map_err(|_| StepError::TimedOut(limit))??,
            None => self.container.run(process).await?,
        };

        // Process output belongs to the container's log identity, not ours.
        info!(
            log_guid = %self.log.guid,
            source_name = %self.log.source_name,
            index = ?self.log.index,
            exit_status = outcome.exit_status,
            "{}",
            outcome.output
        );

        if outcome.exit_status != 0 {
            return Err(StepError::ExitStatus(outcome.exit_status));
        }
        Ok(())
    }
}

pub struct UploadStep {
    container: Arc<dyn Container>,
    from: String,
    to: String,
}

impl UploadStep {
    pub fn new(container: Arc<dyn Container>, from: String, to: String) -> Self {
        Self { container, from, to }
    }
}

#[async_trait]
impl Step for UploadStep {
    fn name(&self) -> &str {
        "upload"
    }

    async fn perform(&mut self) -> Result<(), StepError> {
        self.container.copy_out(&self.from, &self.to).await?;
        Ok(())
    }
}

pub struct FetchResultStep {
    container: Arc<dyn Container>,
    file: String,
    result: Option<ResultWriter>,
}

impl FetchResultStep {
    pub fn new(container: Arc<dyn Container>, file: String, result: ResultWriter) -> Self {
        Self {
            container,
            file,
            result: Some(result),
        }
    }
}

#[async_trait]
impl Step for FetchResultStep {
    fn name(&self) -> &str {
        "fetch_result"
    }

    async fn perform(&mut self) -> Result<(), StepError> {
        let contents = self.container.read_file(&self.file).await?;
        if let Some(writer) = self.result.take() {
            writer.fill(contents);
        }
        Ok(())
    }
}

/// Runs the wrapped step and swallows its failure.
pub struct TryStep {
    inner: Box<dyn Step>,
    name: String,
}

impl TryStep {
    pub fn new(inner: Box<dyn Step>) -> Self {
        let name = format!("try({})", inner.name());
        Self { inner, name }
    }
}

#[async_trait]
impl Step for TryStep {
    fn name(&self) -> &str {
        &self.name
    }

    async fn perform(&mut self) -> Result<(), StepError> {
        if let Err(err) = self.inner.perform().await {
            warn!(step = self.inner.name(), error = %err, "Ignoring failed step");
        }
        Ok(())
    }
}
