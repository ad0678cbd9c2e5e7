//! Allocation of new containers: reserve a registration, create the runtime
//! container, then record its handle.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info};

use crate::model::{LogConfig, Registration};
use crate::registry::{Registry, RegistryError};
use crate::runtime::{ContainerSpec, RuntimeClient, RuntimeError};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationRequest {
    #[serde(default)]
    pub memory_mb: u64,
    #[serde(default)]
    pub disk_mb: u64,
    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProvisionError {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}

#[derive(Clone)]
pub struct Provisioner {
    registry: Arc<dyn Registry>,
    runtime: Arc<dyn RuntimeClient>,
}

impl Provisioner {
    pub fn new(registry: Arc<dyn Registry>, runtime: Arc<dyn RuntimeClient>) -> Self {
        Self { registry, runtime }
    }

    pub async fn allocate(
        &self,
        guid: &str,
        request: AllocationRequest,
    ) -> Result<Registration, ProvisionError> {
        let registration = Registration::new(guid, request.log)
            .with_limits(request.memory_mb, request.disk_mb);
        self.registry.reserve(registration).await?;

        let spec = ContainerSpec {
            memory_mb: request.memory_mb,
            disk_mb: request.disk_mb,
        };
        let handle = match self.runtime.create(spec).await {
            Ok(handle) => handle,
            Err(err) => {
                error!(guid, error = %err, "Container creation failed; releasing reservation");
                if let Err(cleanup) = self.registry.delete(guid).await {
                    error!(guid, error = %cleanup, "Failed to release reservation");
                }
                return Err(err.into());
            }
        };

        // The reservation can vanish under a concurrent delete while the
        // container is being created; the new container must not outlive it.
        let registration = match self.registry.bind_handle(guid, handle.clone()).await {
            Ok(registration) => registration,
            Err(err) => {
                error!(guid, handle = %handle, error = %err, "Failed to bind handle; destroying container");
                if let Err(cleanup) = self.runtime.destroy(handle.as_str()).await {
                    error!(guid, handle = %handle, error = %cleanup, "Failed to destroy unbound container");
                }
                return Err(err.into());
            }
        };
        info!(guid, handle = registration.handle_str(), "Allocated container");
        Ok(registration)
    }
}
