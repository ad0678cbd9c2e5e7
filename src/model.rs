use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::types::{ContainerGuid, ContainerHandle};

/// Identity used to attribute log output produced by a container's steps.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LogConfig {
    pub guid: String,
    pub source_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<u32>,
}

/// Registry record for a single container.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Registration {
    pub guid: ContainerGuid,
    /// Runtime handle; `None` until a container has been provisioned.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "non_empty_handle"
    )]
    pub container_handle: Option<ContainerHandle>,
    #[serde(default)]
    pub log: LogConfig,
    #[serde(default)]
    pub memory_mb: u64,
    #[serde(default)]
    pub disk_mb: u64,
    pub allocated_at: DateTime<Utc>,
}

fn non_empty_handle<'de, D>(deserializer: D) -> Result<Option<ContainerHandle>, D::Error>
where
    D: Deserializer<'de>,
{
    let handle = Option::<ContainerHandle>::deserialize(deserializer)?;
    Ok(handle.filter(|h| !h.is_empty()))
}

impl Registration {
    /// A fresh registration with no runtime container yet.
    pub fn new(guid: impl Into<ContainerGuid>, log: LogConfig) -> Self {
        Self {
            guid: guid.into(),
            container_handle: None,
            log,
            memory_mb: 0,
            disk_mb: 0,
            allocated_at: Utc::now(),
        }
    }

    /// Attach a runtime handle. An empty handle counts as no handle.
    pub fn with_handle(mut self, handle: impl Into<ContainerHandle>) -> Self {
        let handle = handle.into();
        self.container_handle = if handle.is_empty() { None } else { Some(handle) };
        self
    }

    pub fn with_limits(mut self, memory_mb: u64, disk_mb: u64) -> Self {
        self.memory_mb = memory_mb;
        self.disk_mb = disk_mb;
        self
    }

    /// The handle as the runtime sees it; empty when nothing was provisioned.
    pub fn handle_str(&self) -> &str {
        self.container_handle
            .as_ref()
            .map(|h| h.as_str())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentVariable {
    pub name: String,
    pub value: String,
}

/// Declarative description of one unit of work inside a container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ExecutorAction {
    /// Copy a remote artifact into the container.
    Download { from: String, to: String },
    /// Run a script inside the container.
    Run {
        script: String,
        #[serde(default)]
        env: Vec<EnvironmentVariable>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timeout_secs: Option<u64>,
    },
    /// Copy a file out of the container to a remote location.
    Upload { from: String, to: String },
    /// Read a file from the container and report it as the run result.
    FetchResult { file: String },
    /// Run the inner action and ignore its failure.
    Try { action: Box<ExecutorAction> },
}

impl ExecutorAction {
    pub fn run(script: impl Into<String>) -> Self {
        Self::Run {
            script: script.into(),
            env: Vec::new(),
            timeout_secs: None,
        }
    }

    pub fn try_action(action: ExecutorAction) -> Self {
        Self::Try {
            action: Box::new(action),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Download { .. } => "download",
            Self::Run { .. } => "run",
            Self::Upload { .. } => "upload",
            Self::FetchResult { .. } => "fetch_result",
            Self::Try { .. } => "try",
        }
    }
}

/// Payload delivered to a run's completion callback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerRunResult {
    pub guid: ContainerGuid,
    pub failed: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub failure_reason: String,
    #[serde(default)]
    pub result: String,
}
