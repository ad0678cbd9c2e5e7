use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_BIND: &str = "0.0.0.0:1700";
pub const DEFAULT_DISPATCH_CAPACITY: usize = 64;
pub const DEFAULT_DISPATCH_TIMEOUT_MS: u64 = 5_000;
pub const DEFAULT_DEPOT_WORKERS: usize = 4;
pub const DEFAULT_CALLBACK_TIMEOUT_MS: u64 = 10_000;

/// Process-level settings for the executor service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutorConfig {
    pub bind: String,
    /// Work items the dispatch queue holds before `run` starts waiting.
    pub dispatch_capacity: usize,
    /// Longest a `run` waits for room in a full dispatch queue.
    pub dispatch_timeout: Duration,
    pub depot_workers: usize,
    pub callback_timeout: Duration,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            bind: env::var("EXECUTOR_BIND").unwrap_or_else(|_| DEFAULT_BIND.to_string()),
            dispatch_capacity: env_or("EXECUTOR_DISPATCH_CAPACITY", DEFAULT_DISPATCH_CAPACITY),
            dispatch_timeout: Duration::from_millis(env_or(
                "EXECUTOR_DISPATCH_TIMEOUT_MS",
                DEFAULT_DISPATCH_TIMEOUT_MS,
            )),
            depot_workers: env_or("EXECUTOR_DEPOT_WORKERS", DEFAULT_DEPOT_WORKERS),
            callback_timeout: Duration::from_millis(env_or(
                "EXECUTOR_CALLBACK_TIMEOUT_MS",
                DEFAULT_CALLBACK_TIMEOUT_MS,
            )),
        }
    }
}

impl ExecutorConfig {
    pub fn validate(&self) -> Result<()> {
        if self.dispatch_capacity == 0 {
            bail!("dispatch capacity must be at least 1");
        }
        if self.depot_workers == 0 {
            bail!("depot needs at least one worker");
        }
        if self.dispatch_timeout.is_zero() {
            bail!("dispatch timeout must be non-zero");
        }
        Ok(())
    }
}

fn env_or<T: FromStr>(name: &str, default: T) -> T {
    match env::var(name) {
        Ok(raw) => parse_or(name, &raw, default),
        Err(_) => default,
    }
}

fn parse_or<T: FromStr>(name: &str, raw: &str, default: T) -> T {
    match raw.trim().parse() {
        Ok(value) => value,
        Err(_) => {
            tracing::warn!("Ignoring invalid value `{}` for {}", raw, name);
            default
        }
    }
}
