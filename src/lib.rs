// Core modules
pub mod config;
pub mod executor;
pub mod model;
pub mod registry;
pub mod types;

// Execution pipeline
pub mod depot;
pub mod provision;
pub mod runtime;
pub mod sequence;
pub mod transformer;

pub mod api;


// Re-export key types and functions
pub use config::ExecutorConfig;
pub use executor::{Client, ExecutorClient, ExecutorError};
pub use model::{ContainerRunResult, ExecutorAction, LogConfig, Registration};
pub use registry::{InMemoryRegistry, Registry, RegistryError};
pub use runtime::{InMemoryRuntime, RuntimeClient, RuntimeError};
pub use types::{ContainerGuid, ContainerHandle};

use anyhow::Result;
use axum::Router;
use std::sync::Arc;

use api::AppState;
use depot::{CallbackSender, Depot, DepotHandle, HttpCallbackSender, dispatch_channel};
use provision::Provisioner;
use transformer::ActionTransformer;

/// A wired executor: the HTTP router and the depot workers behind it.
pub struct App {
    pub router: Router,
    pub depot: DepotHandle,
}

/// Convenience function to assemble the executor over the given backends.
///
/// Starts the depot workers, so it must be called inside a tokio runtime.
/// Dropping the router drops the last dispatch sender; the workers then
/// drain the queue and stop.
pub fn create_app(
    config: &ExecutorConfig,
    registry: Arc<dyn Registry>,
    runtime: Arc<dyn RuntimeClient>,
    callback: Arc<dyn CallbackSender>,
) -> Result<App> {
    config.validate()?;

    let (run_actions, work) = dispatch_channel(config.dispatch_capacity, config.dispatch_timeout);
    let depot = Depot::spawn(work, callback, config.depot_workers);

    let client = ExecutorClient::new(
        runtime.clone(),
        registry.clone(),
        Arc::new(ActionTransformer::new()),
        run_actions,
    );

    let state = AppState {
        client: Arc::new(client),
        registry: registry.clone(),
        provisioner: Provisioner::new(registry, runtime),
    };

    Ok(App {
        router: api::create_router(state),
        depot,
    })
}

/// Assemble the executor with in-memory backends and HTTP callbacks.
pub fn create_default_app(config: &ExecutorConfig) -> Result<App> {
    let callback = HttpCallbackSender::new(config.callback_timeout)?;
    create_app(
        config,
        Arc::new(InMemoryRegistry::new()),
        Arc::new(InMemoryRuntime::new()),
        Arc::new(callback),
    )
}
