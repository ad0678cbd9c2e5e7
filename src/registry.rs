//! Registry of container registrations, keyed by container guid.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::model::Registration;
use crate::types::{ContainerGuid, ContainerHandle};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("container not found: {0}")]
    NotFound(String),

    #[error("container already registered: {0}")]
    AlreadyExists(String),

    #[error("registry backend error: {0}")]
    Backend(String),
}

pub type RegistryResult<T> = Result<T, RegistryError>;

/// Storage for `Registration` records.
///
/// Implementations must report a missing guid as `RegistryError::NotFound`
/// from both `find_by_guid` and `delete`; callers rely on that variant to
/// tell an absent container apart from a broken backend.
#[async_trait]
pub trait Registry: Send + Sync {
    async fn find_by_guid(&self, guid: &str) -> RegistryResult<Registration>;
    async fn delete(&self, guid: &str) -> RegistryResult<()>;

    /// Insert a registration that has no runtime container yet.
    async fn reserve(&self, registration: Registration) -> RegistryResult<Registration>;

    /// Record the runtime handle for an existing registration.
    async fn bind_handle(&self, guid: &str, handle: ContainerHandle) -> RegistryResult<Registration>;

    async fn list(&self) -> RegistryResult<Vec<Registration>>;
}

/// Process-local registry backed by a map.
#[derive(Clone, Default)]
pub struct InMemoryRegistry {
    registrations: Arc<RwLock<HashMap<ContainerGuid, Registration>>>,
}

impl InMemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the number of registrations currently held.
    pub async fn len(&self) -> usize {
        self.registrations.read().await.len()
    }

    /// Return `true` if no registrations are held.
    pub async fn is_empty(&self) -> bool {
        self.registrations.read().await.is_empty()
    }
}

#[async_trait]
impl Registry for InMemoryRegistry {
    async fn find_by_guid(&self, guid: &str) -> RegistryResult<Registration> {
        self.registrations
            .read()
            .await
            .get(guid)
            .cloned()
            .ok_or_else(|| RegistryError::NotFound(guid.to_string()))
    }

    async fn delete(&self, guid: &str) -> RegistryResult<()> {
        let removed = self.registrations.write().await.remove(guid);
        match removed {
            Some(_) => {
                debug!(guid, "Removed registration");
                Ok(())
            }
            None => Err(RegistryError::NotFound(guid.to_string())),
        }
    }

    async fn reserve(&self, registration: Registration) -> RegistryResult<Registration> {
        let mut registrations = self.registrations.write().await;
        if registrations.contains_key(registration.guid.as_str()) {
            return Err(RegistryError::AlreadyExists(registration.guid.into_inner()));
        }

        info!(guid = %registration.guid, "Reserved registration");
        registrations.insert(registration.guid.clone(), registration.clone());
        Ok(registration)
    }

    async fn bind_handle(&self, guid: &str, handle: ContainerHandle) -> RegistryResult<Registration> {
        let mut registrations = self.registrations.write().await;
        let registration = registrations
            .get_mut(guid)
            .ok_or_else(|| RegistryError::NotFound(guid.to_string()))?;

        info!(guid, handle = %handle, "Bound container handle");
        registration.container_handle = Some(handle);
        Ok(registration.clone())
    }

    async fn list(&self) -> RegistryResult<Vec<Registration>> {
        let mut all: Vec<Registration> = self.registrations.read().await.values().cloned().collect();
        all.sort_by(|a, b| a.allocated_at.cmp(&b.allocated_at));
        Ok(all)
    }
}
