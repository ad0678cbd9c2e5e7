//! Executor client: the coordination point between the registry, the
//! container runtime, the transformer, and the depot.
//!
//! Run resolves a guid to a live container, compiles the actions against it,
//! and hands the resulting sequence to the depot. Delete destroys the
//! container (if one was ever provisioned) and then forgets the registration.
//! Neither operation retries; every failure is logged once and returned.
//!
//! There is no lock around a guid. Two deletes can both pass the lookup
//! before either destroys, and a run can race a delete; whatever the
//! registry or runtime reports in that case is what the caller sees.

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::depot::{DispatchError, DispatchSender, WorkItem};
use crate::model::ExecutorAction;
use crate::registry::{Registry, RegistryError};
use crate::runtime::{RuntimeClient, RuntimeError};
use crate::sequence::result_slot;
use crate::transformer::Transformer;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExecutorError {
    #[error("container not found")]
    ContainerNotFound,

    #[error("steps invalid")]
    StepsInvalid,

    #[error(transparent)]
    Registry(RegistryError),

    #[error(transparent)]
    Runtime(RuntimeError),

    #[error(transparent)]
    Dispatch(DispatchError),
}

#[async_trait]
pub trait Client: Send + Sync {
    /// Queue `actions` for execution in the container registered as `guid`.
    ///
    /// `Ok` means the work was accepted by the depot, nothing more. The
    /// outcome arrives later at `complete_url`.
    async fn run_container(
        &self,
        guid: &str,
        actions: &[ExecutorAction],
        complete_url: &str,
    ) -> Result<(), ExecutorError>;

    async fn delete_container(&self, guid: &str) -> Result<(), ExecutorError>;

    async fn ping(&self) -> Result<(), RuntimeError>;
}

pub struct ExecutorClient {
    runtime: Arc<dyn RuntimeClient>,
    registry: Arc<dyn Registry>,
    transformer: Arc<dyn Transformer>,
    run_actions: DispatchSender,
}

impl ExecutorClient {
    pub fn new(
        runtime: Arc<dyn RuntimeClient>,
        registry: Arc<dyn Registry>,
        transformer: Arc<dyn Transformer>,
        run_actions: DispatchSender,
    ) -> Self {
        Self {
            runtime,
            registry,
            transformer,
            run_actions,
        }
    }
}

#[async_trait]
impl Client for ExecutorClient {
    async fn run_container(
        &self,
        guid: &str,
        actions: &[ExecutorAction],
        complete_url: &str,
    ) -> Result<(), ExecutorError> {
        // Any registry failure reads as "not found" to the caller.
        let registration = match self.registry.find_by_guid(guid).await {
            Ok(registration) => registration,
            Err(err) => {
                info!(guid, error = %err, "Container not found for run");
                return Err(ExecutorError::ContainerNotFound);
            }
        };

        let container = match self.runtime.lookup(registration.handle_str()).await {
            Ok(container) => container,
            Err(err) => {
                info!(
                    guid,
                    handle = registration.handle_str(),
                    error = %err,
                    "Container lookup failed"
                );
                return Err(ExecutorError::Runtime(err));
            }
        };

        let (writer, reader) = result_slot();
        let sequence = match self
            .transformer
            .steps_for(&registration.log, actions, container, writer)
        {
            Ok(sequence) => sequence,
            Err(err) => {
                warn!(guid, error = %err, "Steps invalid");
                return Err(ExecutorError::StepsInvalid);
            }
        };

        let item = WorkItem {
            complete_url: complete_url.to_string(),
            registration,
            sequence,
            result: reader,
        };

        if let Err(err) = self.run_actions.dispatch(item).await {
            error!(guid, error = %err, "Failed to dispatch run");
            return Err(ExecutorError::Dispatch(err));
        }

        Ok(())
    }

    async fn delete_container(&self, guid: &str) -> Result<(), ExecutorError> {
        let registration = self
            .registry
            .find_by_guid(guid)
            .await
            .map_err(|err| handle_delete_error(guid, ExecutorError::Registry(err)))?;

        // Nothing to destroy if no container was ever provisioned. Destroy is
        // idempotent, so a delete that failed after this point can be retried.
        if let Some(handle) = &registration.container_handle {
            self.runtime
                .destroy(handle.as_str())
                .await
                .map_err(|err| handle_delete_error(guid, ExecutorError::Runtime(err)))?;
        }

        self.registry
            .delete(guid)
            .await
            .map_err(|err| handle_delete_error(guid, ExecutorError::Registry(err)))?;

        Ok(())
    }

    async fn ping(&self) -> Result<(), RuntimeError> {
        self.runtime.ping().await
    }
}

fn handle_delete_error(guid: &str, err: ExecutorError) -> ExecutorError {
    match err {
        ExecutorError::Registry(RegistryError::NotFound(ref missing)) => {
            info!(guid, missing = %missing, "Container not found for delete");
            ExecutorError::ContainerNotFound
        }
        other => {
            error!(guid, error = %other, "Failed to delete container");
            other
        }
    }
}
