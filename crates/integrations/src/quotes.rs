use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use crewbot_core::config::QuotesConfig;
use crewbot_core::TransportError;
use serde::Deserialize;

use crate::http::{ApiClient, Endpoint};

pub const SERVICE_NAME: &str = "quotes";

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct Quote {
    #[serde(rename = "q")]
    pub text: String,
    #[serde(rename = "a")]
    pub author: String,
}

impl fmt::Display for Quote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -{}", self.text, self.author)
    }
}

#[async_trait]
pub trait QuoteService: Send + Sync {
    async fn random_quote(&self) -> Result<Quote, TransportError>;
}

/// ZenQuotes returns a one-element array of `{ "q": ..., "a": ... }` objects.
pub struct ZenQuotes {
    client: Arc<dyn ApiClient>,
    endpoint: Endpoint,
}

impl ZenQuotes {
    pub fn new(client: Arc<dyn ApiClient>, endpoint: Endpoint) -> Self {
        Self { client, endpoint }
    }

    pub fn from_config(client: Arc<dyn ApiClient>, config: &QuotesConfig) -> Self {
        let endpoint = Endpoint::new(
            SERVICE_NAME,
            config.endpoint.clone(),
            Duration::from_secs(config.timeout_secs),
        );
        Self::new(client, endpoint)
    }
}

#[async_trait]
impl QuoteService for ZenQuotes {
    async fn random_quote(&self) -> Result<Quote, TransportError> {
        let body = self.client.call(&self.endpoint, None).await?;
        let quotes: Vec<Quote> = serde_json::from_slice(&body)
            .map_err(|error| TransportError::decode(SERVICE_NAME, error.to_string()))?;

        quotes
            .into_iter()
            .next()
            .ok_or_else(|| TransportError::decode(SERVICE_NAME, "empty quote list"))
    }
}
