//! Analysis Relay
//!
//! Sends a digest to the local analysis service and returns its commentary,
//! flattened to a single line.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::config::AnalysisConfig;
use crate::normalizer::Digest;

/// Persona and task given to the analysis model ahead of every digest
pub const ANALYST_INSTRUCTION: &str = "You are a crypto analyst. You will be given a set of \
transaction data; analyze it and provide a summary of the transaction data. Be extremely \
concise and do not include explanations, reasoning, or any additional commentary. Don't just \
organize the information into a list, you have to provide your thought on it, based on your \
knowledge of the market.";

/// Closing tag of the reasoning block some models emit before their answer
const REASONING_END_TAG: &str = "</think>";

/// Errors that can occur while requesting an analysis
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnalysisError {
    #[error("Analysis request failed: {0}")]
    Transport(String),

    #[error("Analysis service returned HTTP {0}")]
    Status(u16),

    #[error("Analysis service returned a malformed body: {0}")]
    Malformed(String),
}

/// Request body for the analysis endpoint
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CommandRequest {
    pub command: String,
}

impl CommandRequest {
    /// Prefix the digest with the analyst instruction
    pub fn for_digest(digest: &Digest) -> Self {
        Self {
            command: format!("{}\n\n{}", ANALYST_INSTRUCTION, digest.text()),
        }
    }
}

/// Response body of the analysis endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct CommandResponse {
    pub result: String,
}

/// Single-line commentary produced for one digest
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisResult(String);

impl AnalysisResult {
    /// Strip any reasoning preamble and collapse whitespace
    ///
    /// # Returns
    /// `None` if nothing is left
    pub fn from_raw(raw: &str) -> Option<Self> {
        let text = collapse_whitespace(strip_reasoning(raw));
        if text.is_empty() {
            None
        } else {
            Some(AnalysisResult(text))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl std::fmt::Display for AnalysisResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Drop everything up to and including the first `</think>`
pub fn strip_reasoning(text: &str) -> &str {
    match text.find(REASONING_END_TAG) {
        Some(pos) => &text[pos + REASONING_END_TAG.len()..],
        None => text,
    }
}

/// Replace every whitespace run with one space and trim the ends
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Producer of commentary for a digest
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Analyzer: Send + Sync {
    async fn analyze(&self, digest: &Digest) -> Result<AnalysisResult, AnalysisError>;
}

/// HTTP client for the analysis service
pub struct AnalysisClient {
    http: Client,
    config: AnalysisConfig,
}

impl AnalysisClient {
    pub fn new(config: AnalysisConfig) -> Result<Self, reqwest::Error> {
        let http = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { http, config })
    }

    pub fn url(&self) -> &str {
        &self.config.url
    }
}

#[async_trait]
impl Analyzer for AnalysisClient {
    async fn analyze(&self, digest: &Digest) -> Result<AnalysisResult, AnalysisError> {
        debug!("Posting {} digest lines to {}", digest.len(), self.config.url);

        let response = self
            .http
            .post(&self.config.url)
            .json(&CommandRequest::for_digest(digest))
            .send()
            .await
            .map_err(|e| AnalysisError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AnalysisError::Status(status.as_u16()));
        }

        let body: CommandResponse = response
            .json()
            .await
            .map_err(|e| AnalysisError::Malformed(e.to_string()))?;

        AnalysisResult::from_raw(&body.result)
            .ok_or_else(|| AnalysisError::Malformed("empty result".to_string()))
    }
}
