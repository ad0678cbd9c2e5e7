use anyhow::Result;
use clap::{Parser, Subcommand};
use container_executor::{ExecutorConfig, create_default_app};
use std::time::Duration;
use tracing::{Level, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "container-executor")]
#[command(about = "Runs action sequences inside managed containers")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the executor HTTP API and depot workers
    Serve {
        /// Bind address, e.g. 0.0.0.0:1700
        #[arg(long)]
        bind: Option<String>,
        /// Work items queued before run requests start waiting
        #[arg(long)]
        dispatch_capacity: Option<usize>,
        /// How long a run request waits for queue space
        #[arg(long)]
        dispatch_timeout_ms: Option<u64>,
        #[arg(long)]
        depot_workers: Option<usize>,
        /// Timeout for completion callbacks
        #[arg(long)]
        callback_timeout_ms: Option<u64>,
    },
    /// Print the effective configuration as JSON
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("container_executor=info".parse()?)
                .add_directive("tower_http=info".parse()?),
        )
        .with_max_level(Level::INFO)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve {
            bind,
            dispatch_capacity,
            dispatch_timeout_ms,
            depot_workers,
            callback_timeout_ms,
        } => {
            let mut config = ExecutorConfig::default();
            if let Some(bind) = bind {
                config.bind = bind;
            }
            if let Some(capacity) = dispatch_capacity {
                config.dispatch_capacity = capacity;
            }
            if let Some(ms) = dispatch_timeout_ms {
                config.dispatch_timeout = Duration::from_millis(ms);
            }
            if let Some(workers) = depot_workers {
                config.depot_workers = workers;
            }
            if let Some(ms) = callback_timeout_ms {
                config.callback_timeout = Duration::from_millis(ms);
            }

            info!(
                bind = %config.bind,
                dispatch_capacity = config.dispatch_capacity,
                depot_workers = config.depot_workers,
                "Starting executor"
            );

            let app = create_default_app(&config)?;
            let listener = tokio::net::TcpListener::bind(&config.bind).await?;
            info!("Executor listening on http://{}", config.bind);

            axum::serve(listener, app.router)
                .with_graceful_shutdown(shutdown_signal())
                .await?;

            info!("HTTP server stopped; draining depot");
            app.depot.join().await;
        }
        Commands::Config => {
            let config = ExecutorConfig::default();
            config.validate()?;
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
    }

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", err);
        std::future::pending::<()>().await;
    }
}
