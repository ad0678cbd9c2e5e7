use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use thiserror::Error;
use url::Url;

use crate::model::ContainerRunResult;

#[derive(Debug, Error)]
pub enum CallbackError {
    #[error("invalid callback url `{url}`: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("callback request failed: {0}")]
    Request(#[from] reqwest::Error),
}

/// Delivers a finished run's result to its completion address.
#[async_trait]
pub trait CallbackSender: Send + Sync {
    async fn deliver(&self, complete_url: &str, result: &ContainerRunResult) -> Result<(), CallbackError>;
}

/// POSTs the result as JSON. No retries.
#[derive(Clone)]
pub struct HttpCallbackSender {
    client: Client,
}

impl HttpCallbackSender {
    pub fn new(timeout: Duration) -> Result<Self, CallbackError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("container-executor/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl CallbackSender for HttpCallbackSender {
    async fn deliver(&self, complete_url: &str, result: &ContainerRunResult) -> Result<(), CallbackError> {
        let url = Url::parse(complete_url).map_err(|source| CallbackError::InvalidUrl {
            url: complete_url.to_string(),
            source,
        })?;

        self.client
            .post(url)
            .json(result)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}
