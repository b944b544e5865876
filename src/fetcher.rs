//! Event Fetcher
//!
//! Pulls the latest page of token transfers for the watched address from an
//! Etherscan-compatible explorer API (`module=account&action=tokentx`).

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::ExplorerConfig;
use crate::event::TransferEvent;

/// First block of the queried range
pub const START_BLOCK: u64 = 0;

/// Last block of the queried range
pub const END_BLOCK: u64 = 99_999_999;

/// Errors that can occur while fetching transfers
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FetchError {
    #[error("Explorer request failed: {0}")]
    Transport(String),

    #[error("Explorer returned HTTP {0}")]
    Status(u16),

    #[error("Explorer returned a malformed body: {0}")]
    Malformed(String),
}

/// Source of raw transfer events
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EventSource: Send + Sync {
    /// Fetch the latest page of transfers
    async fn fetch(&self) -> Result<Vec<TransferEvent>, FetchError>;
}

/// HTTP client for the explorer API
pub struct ExplorerClient {
    http: Client,
    config: ExplorerConfig,
}

impl ExplorerClient {
    /// Build a client with the configured request timeout
    pub fn new(config: ExplorerConfig) -> Result<Self, reqwest::Error> {
        let http = Client::builder().timeout(config.timeout).build()?;

        if config.is_unauthenticated() {
            warn!("Explorer client is using the placeholder API key; expect rate limiting");
        }

        Ok(Self { http, config })
    }

    pub fn config(&self) -> &ExplorerConfig {
        &self.config
    }

    /// Query string for the `tokentx` request
    pub fn query_params(&self) -> Vec<(&'static str, String)> {
        vec![
            ("module", "account".to_string()),
            ("action", "tokentx".to_string()),
            ("address", self.config.address.clone()),
            ("page", "1".to_string()),
            ("offset", self.config.page_size.to_string()),
            ("startblock", START_BLOCK.to_string()),
            ("endblock", END_BLOCK.to_string()),
            ("sort", "asc".to_string()),
            ("apikey", self.config.api_key.clone()),
        ]
    }
}

#[async_trait]
impl EventSource for ExplorerClient {
    async fn fetch(&self) -> Result<Vec<TransferEvent>, FetchError> {
        debug!(
            "Querying explorer {} for address {}",
            self.config.base_url, self.config.address
        );

        let response = self
            .http
            .get(&self.config.base_url)
            .query(&self.query_params())
            .send()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        let body = response
            .text()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        parse_explorer_body(&body)
    }
}

/// Extract transfer events from an explorer response body
///
/// A JSON body whose `result` is not a list (rate limiting, bad key, no
/// transfers on some explorers) yields an empty page rather than an error.
pub fn parse_explorer_body(body: &str) -> Result<Vec<TransferEvent>, FetchError> {
    let value: Value =
        serde_json::from_str(body).map_err(|e| FetchError::Malformed(e.to_string()))?;

    match value.get("result") {
        Some(Value::Array(items)) => {
            let events = TransferEvent::from_json_list(items);
            if events.len() < items.len() {
                warn!(
                    "Skipped {} non-object entries in explorer result",
                    items.len() - events.len()
                );
            }
            Ok(events)
        }
        other => {
            let message = value.get("message").and_then(Value::as_str).unwrap_or("");
            let result = other.map_or_else(|| "<missing>".to_string(), |v| v.to_string());
            warn!(
                "Explorer result is not a list (message: '{}', result: {})",
                message, result
            );
            Ok(Vec::new())
        }
    }
}
