//! Process-local runtime backend.
//!
//! Containers are plain maps of files plus a log of the processes that were
//! started in them. Nothing is isolated and nothing is actually executed; a
//! script's exit status is whatever was configured with
//! `InMemoryContainer::set_exit_status` (zero otherwise).

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use super::{
    Container, ContainerSpec, ProcessOutcome, ProcessSpec, RuntimeClient, RuntimeError,
    RuntimeResult,
};
use crate::types::ContainerHandle;

#[derive(Default)]
struct ContainerState {
    files: HashMap<String, String>,
    processes: Vec<ProcessSpec>,
    uploads: Vec<(String, String)>,
    exit_statuses: HashMap<String, i32>,
}

pub struct InMemoryContainer {
    handle: ContainerHandle,
    spec: ContainerSpec,
    state: RwLock<ContainerState>,
}

impl InMemoryContainer {
    pub fn new(handle: ContainerHandle, spec: ContainerSpec) -> Self {
        Self {
            handle,
            spec,
            state: RwLock::new(ContainerState::default()),
        }
    }

    pub fn spec(&self) -> &ContainerSpec {
        &self.spec
    }

    pub async fn write_file(&self, path: impl Into<String>, contents: impl Into<String>) {
        self.state.write().await.files.insert(path.into(), contents.into());
    }

    /// Make every run of `script` exit with `status`.
    pub async fn set_exit_status(&self, script: impl Into<String>, status: i32) {
        self.state.write().await.exit_statuses.insert(script.into(), status);
    }

    /// Processes started so far, in order.
    pub async fn processes(&self) -> Vec<ProcessSpec> {
        self.state.read().await.processes.clone()
    }

    /// `(container path, destination)` pairs copied out so far.
    pub async fn uploads(&self) -> Vec<(String, String)> {
        self.state.read().await.uploads.clone()
    }
}

#[async_trait]
impl Container for InMemoryContainer {
    fn handle(&self) -> &ContainerHandle {
        &self.handle
    }

    async fn run(&self, process: ProcessSpec) -> RuntimeResult<ProcessOutcome> {
        let mut state = self.state.write().await;
        let exit_status = state.exit_statuses.get(&process.script).copied().unwrap_or(0);

        debug!(handle = %self.handle, script = %process.script, exit_status, "Ran process");
        let output = format!("ran {}", process.script);
        state.processes.push(process);

        Ok(ProcessOutcome { exit_status, output })
    }

    async fn copy_in(&self, from: &str, to: &str) -> RuntimeResult<()> {
        // The source location stands in for the downloaded content.
        self.state
            .write()
            .await
            .files
            .insert(to.to_string(), from.to_string());
        Ok(())
    }

    async fn copy_out(&self, from: &str, to: &str) -> RuntimeResult<()> {
        let mut state = self.state.write().await;
        if !state.files.contains_key(from) {
            return Err(RuntimeError::Backend(format!("no such file: {}", from)));
        }
        state.uploads.push((from.to_string(), to.to_string()));
        Ok(())
    }

    async fn read_file(&self, path: &str) -> RuntimeResult<String> {
        self.state
            .read()
            .await
            .files
            .get(path)
            .cloned()
            .ok_or_else(|| RuntimeError::Backend(format!("no such file: {}", path)))
    }
}

/// Runtime backend holding its containers in memory.
#[derive(Clone)]
pub struct InMemoryRuntime {
    containers: Arc<RwLock<HashMap<ContainerHandle, Arc<InMemoryContainer>>>>,
    reachable: Arc<AtomicBool>,
}

impl Default for InMemoryRuntime {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryRuntime {
    pub fn new() -> Self {
        Self {
            containers: Arc::new(RwLock::new(HashMap::new())),
            reachable: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Toggle the result of `ping`.
    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::SeqCst);
    }

    /// Install a container under a caller-chosen handle.
    pub async fn insert(&self, handle: impl Into<ContainerHandle>) -> Arc<InMemoryContainer> {
        let handle = handle.into();
        let container = Arc::new(InMemoryContainer::new(handle.clone(), ContainerSpec::default()));
        self.containers.write().await.insert(handle, container.clone());
        container
    }

    /// Concrete access to a container, for inspection.
    pub async fn container(&self, handle: &str) -> Option<Arc<InMemoryContainer>> {
        self.containers.read().await.get(handle).cloned()
    }

    pub async fn len(&self) -> usize {
        self.containers.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.containers.read().await.is_empty()
    }

    fn check_reachable(&self) -> RuntimeResult<()> {
        if self.reachable.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(RuntimeError::Unreachable("in-memory runtime is offline".to_string()))
        }
    }
}

#[async_trait]
impl RuntimeClient for InMemoryRuntime {
    async fn create(&self, spec: ContainerSpec) -> RuntimeResult<ContainerHandle> {
        self.check_reachable()?;

        let handle = ContainerHandle::new(Uuid::new_v4().to_string());
        let container = Arc::new(InMemoryContainer::new(handle.clone(), spec));
        self.containers.write().await.insert(handle.clone(), container);

        info!(handle = %handle, "Created container");
        Ok(handle)
    }

    async fn lookup(&self, handle: &str) -> RuntimeResult<Arc<dyn Container>> {
        self.check_reachable()?;

        let container = self
            .container(handle)
            .await
            .ok_or_else(|| RuntimeError::NotFound(handle.to_string()))?;
        Ok(container)
    }

    async fn destroy(&self, handle: &str) -> RuntimeResult<()> {
        self.check_reachable()?;

        match self.containers.write().await.remove(handle) {
            Some(_) => {
                info!(handle, "Destroyed container");
                Ok(())
            }
            None => {
                debug!(handle, "Container already destroyed");
                Ok(())
            }
        }
    }

    async fn ping(&self) -> RuntimeResult<()> {
        self.check_reachable()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_lookup_destroy() {
        let runtime = InMemoryRuntime::new();
        let handle = runtime
            .create(ContainerSpec {
                memory_mb: 128,
                disk_mb: 256,
            })
            .await
            .unwrap();

        let container = runtime.lookup(handle.as_str()).await.unwrap();
        assert_eq!(container.handle(), &handle);
        assert_eq!(runtime.container(handle.as_str()).await.unwrap().spec().memory_mb, 128);

        runtime.destroy(handle.as_str()).await.unwrap();
        assert!(runtime.is_empty().await);

        runtime.destroy(handle.as_str()).await.unwrap();
        assert!(runtime.is_empty().await);
    }

    #[tokio::test]
    async fn test_destroy_unreachable_is_error() {
        let runtime = InMemoryRuntime::new();
        runtime.insert("h1").await;
        runtime.set_reachable(false);

        assert!(matches!(runtime.destroy("h1").await, Err(RuntimeError::Unreachable(_))));
        assert_eq!(runtime.len().await, 1);
    }

    #[tokio::test]
    async fn test_lookup_empty_handle_is_not_found() {
        let runtime = InMemoryRuntime::new();
        let err = runtime.lookup("").await.err().unwrap();
        assert_eq!(err, RuntimeError::NotFound(String::new()));
    }

    #[tokio::test]
    async fn test_unreachable_backend() {
        let runtime = InMemoryRuntime::new();
        runtime.insert("h1").await;
        runtime.set_reachable(false);

        assert!(matches!(runtime.ping().await, Err(RuntimeError::Unreachable(_))));
        assert!(matches!(runtime.lookup("h1").await, Err(RuntimeError::Unreachable(_))));

        runtime.set_reachable(true);
        assert!(runtime.ping().await.is_ok());
    }

    #[tokio::test]
    async fn test_container_files_and_processes() {
        let container = InMemoryContainer::new(ContainerHandle::new("h1"), ContainerSpec::default());
        container.set_exit_status("false", 1).await;

        let ok = container
            .run(ProcessSpec {
                script: "true".to_string(),
                env: vec![],
            })
            .await
            .unwrap();
        assert_eq!(ok.exit_status, 0);

        let failed = container
            .run(ProcessSpec {
                script: "false".to_string(),
                env: vec![],
            })
            .await
            .unwrap();
        assert_eq!(failed.exit_status, 1);
        assert_eq!(container.processes().await.len(), 2);

        container.copy_in("http://blob/app", "/app").await.unwrap();
        assert_eq!(container.read_file("/app").await.unwrap(), "http://blob/app");

        container.copy_out("/app", "http://upload/app").await.unwrap();
        assert_eq!(
            container.uploads().await,
            vec![("/app".to_string(), "http://upload/app".to_string())]
        );

        assert!(container.copy_out("/missing", "http://upload").await.is_err());
        assert!(container.read_file("/missing").await.is_err());
    }
}
