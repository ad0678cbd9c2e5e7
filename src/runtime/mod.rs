//! Client interface to the container runtime backend.
//!
//! The executor never creates processes or filesystems itself. Everything
//! that touches an isolated environment goes through these two traits:
//! - `RuntimeClient`: create, look up, and destroy containers by handle
//! - `Container`: operate on one live container

pub mod memory;

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

use crate::model::EnvironmentVariable;
use crate::types::ContainerHandle;

pub use memory::{InMemoryContainer, InMemoryRuntime};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuntimeError {
    #[error("unknown container handle: {0}")]
    NotFound(String),

    #[error("runtime backend unreachable: {0}")]
    Unreachable(String),

    #[error("runtime error: {0}")]
    Backend(String),
}

pub type RuntimeResult<T> = Result<T, RuntimeError>;

/// Resources requested when creating a container.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContainerSpec {
    pub memory_mb: u64,
    pub disk_mb: u64,
}

/// A process to run inside a container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessSpec {
    pub script: String,
    pub env: Vec<EnvironmentVariable>,
}

/// Outcome of a finished process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutcome {
    pub exit_status: i32,
    pub output: String,
}

/// One live container.
#[async_trait]
pub trait Container: Send + Sync {
    fn handle(&self) -> &ContainerHandle;

    async fn run(&self, process: ProcessSpec) -> RuntimeResult<ProcessOutcome>;

    /// Fetch `from` (a remote location) into the container at `to`.
    async fn copy_in(&self, from: &str, to: &str) -> RuntimeResult<()>;

    /// Send the container file `from` to the remote location `to`.
    async fn copy_out(&self, from: &str, to: &str) -> RuntimeResult<()>;

    async fn read_file(&self, path: &str) -> RuntimeResult<String>;
}

#[async_trait]
pub trait RuntimeClient: Send + Sync {
    async fn create(&self, spec: ContainerSpec) -> RuntimeResult<ContainerHandle>;

    async fn lookup(&self, handle: &str) -> RuntimeResult<Arc<dyn Container>>;

    /// Destroy the container behind `handle`.
    ///
    /// Idempotent: a handle that is already gone is `Ok`, so an interrupted
    /// delete can be completed and two racing deletes both succeed here.
    async fn destroy(&self, handle: &str) -> RuntimeResult<()>;

    /// Liveness check against the backend.
    async fn ping(&self) -> RuntimeResult<()>;
}
