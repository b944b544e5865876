//! Publish Relay
//!
//! Hands the analysis text to an external publishing program as its last
//! positional argument and captures what the program prints.

use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::config::PublishConfig;

/// Longest stderr excerpt carried inside an error
const STDERR_EXCERPT_LEN: usize = 512;

/// Errors that can occur during publishing
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PublishError {
    #[error("Failed to start publisher '{program}': {reason}")]
    Spawn { program: String, reason: String },

    #[error("Publisher exited with {}: {stderr}", exit_label(.code))]
    NonZeroExit { code: Option<i32>, stderr: String },

    #[error("Publisher did not exit within {0:?}")]
    Timeout(Duration),
}

fn exit_label(code: &Option<i32>) -> String {
    match *code {
        Some(code) => format!("status {}", code),
        None => "no status (killed by signal)".to_string(),
    }
}

/// Captured result of a successful publisher run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishOutcome {
    /// Trimmed standard output
    pub stdout: String,
    /// Trimmed standard error, usually empty
    pub stderr: String,
}

/// Sink for analysis text
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Publish: Send + Sync {
    async fn publish(&self, text: &str) -> Result<PublishOutcome, PublishError>;
}

/// Runs the publishing program once per call
pub struct CommandPublisher {
    config: PublishConfig,
}

impl CommandPublisher {
    pub fn new(config: PublishConfig) -> Self {
        Self { config }
    }

    /// Program path with a leading `~/` expanded
    pub fn program(&self) -> String {
        expand_path(&self.config.program)
    }

    pub fn timeout(&self) -> Duration {
        self.config.timeout
    }
}

#[async_trait]
impl Publish for CommandPublisher {
    async fn publish(&self, text: &str) -> Result<PublishOutcome, PublishError> {
        let program = self.program();
        debug!("Running publisher {} {:?}", program, self.config.args);

        let mut command = Command::new(&program);
        command
            .args(&self.config.args)
            .arg(text)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = command.spawn().map_err(|e| PublishError::Spawn {
            program: program.clone(),
            reason: e.to_string(),
        })?;

        // Dropping the future on timeout kills the child
        let output = match tokio::time::timeout(self.config.timeout, child.wait_with_output()).await {
            Ok(result) => result.map_err(|e| PublishError::Spawn {
                program,
                reason: e.to_string(),
            })?,
            Err(_) => {
                warn!("Publisher exceeded {:?}, killed", self.config.timeout);
                return Err(PublishError::Timeout(self.config.timeout));
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();

        if !output.status.success() {
            return Err(PublishError::NonZeroExit {
                code: output.status.code(),
                stderr: excerpt(&stderr),
            });
        }

        Ok(PublishOutcome { stdout, stderr })
    }
}

/// Expand ~ to home directory in path
pub fn expand_path(path: &str) -> String {
    if path.starts_with("~/") {
        if let Some(home) = dirs::home_dir() {
            return path.replacen("~", &home.to_string_lossy(), 1);
        }
    }
    path.to_string()
}

fn excerpt(text: &str) -> String {
    match text.char_indices().nth(STDERR_EXCERPT_LEN) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}
