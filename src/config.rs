//! Watcher Configuration
//!
//! Settings are read from the environment, with defaults for everything.
//! Only malformed values are errors.

use std::env;
use std::time::Duration;

use thiserror::Error;

use crate::normalizer::Locale;

/// Explorer endpoint (Base Sepolia)
pub const DEFAULT_EXPLORER_URL: &str = "https://api-sepolia.basescan.org/api";

/// Address whose token transfers are watched
pub const DEFAULT_WATCH_ADDRESS: &str = "0xa9E1BAE837d0D3b5879a69550d7C387Ce57aD753";

/// Publicly documented placeholder key; the explorer serves it rate-limited
pub const PLACEHOLDER_API_KEY: &str = "YourApiKeyToken";

/// Transfers requested per poll
pub const DEFAULT_PAGE_SIZE: u32 = 2;

/// Local analysis service
pub const DEFAULT_ANALYSIS_URL: &str = "http://127.0.0.1:5000/command";

/// Publishing program and its leading arguments
pub const DEFAULT_PUBLISH_COMMAND: &str = "node scripts/takocast.js";

pub const DEFAULT_INTERVAL_SECS: u64 = 5;
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_ANALYSIS_TIMEOUT_SECS: u64 = 120;
pub const DEFAULT_PUBLISH_TIMEOUT_SECS: u64 = 60;

/// Errors raised while loading configuration
#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("Invalid value for {name}: '{value}' ({reason})")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("{0} must not be empty")]
    Missing(&'static str),
}

/// Explorer API settings
#[derive(Debug, Clone, PartialEq)]
pub struct ExplorerConfig {
    pub base_url: String,
    pub address: String,
    pub api_key: String,
    pub page_size: u32,
    pub timeout: Duration,
}

impl ExplorerConfig {
    /// Whether requests go out with the placeholder key
    pub fn is_unauthenticated(&self) -> bool {
        self.api_key == PLACEHOLDER_API_KEY
    }
}

impl Default for ExplorerConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_EXPLORER_URL.to_string(),
            address: DEFAULT_WATCH_ADDRESS.to_string(),
            api_key: PLACEHOLDER_API_KEY.to_string(),
            page_size: DEFAULT_PAGE_SIZE,
            timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
        }
    }
}

/// Analysis service settings
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisConfig {
    pub url: String,
    pub timeout: Duration,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_ANALYSIS_URL.to_string(),
            timeout: Duration::from_secs(DEFAULT_ANALYSIS_TIMEOUT_SECS),
        }
    }
}

/// Publishing program settings
#[derive(Debug, Clone, PartialEq)]
pub struct PublishConfig {
    /// Executable to run
    pub program: String,
    /// Arguments placed before the published text
    pub args: Vec<String>,
    /// Upper bound on the wait for the program to exit
    pub timeout: Duration,
}

impl PublishConfig {
    /// Split a whitespace-separated command line into program and arguments
    pub fn from_command_line(command: &str, timeout: Duration) -> Result<Self, ConfigError> {
        let mut parts = command.split_whitespace().map(str::to_string);
        let program = parts.next().ok_or(ConfigError::Missing("PUBLISH_COMMAND"))?;

        Ok(Self {
            program,
            args: parts.collect(),
            timeout,
        })
    }
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            program: "node".to_string(),
            args: vec!["scripts/takocast.js".to_string()],
            timeout: Duration::from_secs(DEFAULT_PUBLISH_TIMEOUT_SECS),
        }
    }
}

/// Complete watcher configuration
#[derive(Debug, Clone, PartialEq)]
pub struct WatcherConfig {
    pub explorer: ExplorerConfig,
    pub analysis: AnalysisConfig,
    pub publish: PublishConfig,
    /// Delay between cycle starts in continuous mode
    pub interval: Duration,
    pub locale: Locale,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            explorer: ExplorerConfig::default(),
            analysis: AnalysisConfig::default(),
            publish: PublishConfig::default(),
            interval: Duration::from_secs(DEFAULT_INTERVAL_SECS),
            locale: Locale::default(),
        }
    }
}

impl WatcherConfig {
    /// Load configuration from the process environment
    ///
    /// Environment variables:
    /// - `BASESCAN_API_KEY` (default: placeholder key, rate-limited)
    /// - `EXPLORER_URL`, `WATCH_ADDRESS`, `EXPLORER_PAGE_SIZE` (default: 2)
    /// - `ANALYSIS_URL` (default: http://127.0.0.1:5000/command)
    /// - `PUBLISH_COMMAND` (default: `node scripts/takocast.js`)
    /// - `WATCHER_INTERVAL_SECS` (default: 5)
    /// - `HTTP_TIMEOUT_SECS` (30), `ANALYSIS_TIMEOUT_SECS` (120), `PUBLISH_TIMEOUT_SECS` (60)
    /// - `WATCHER_LOCALE` (`en` or `zh`, default: en)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        // The explorer client warns about the placeholder when it is built
        let api_key = var("BASESCAN_API_KEY").unwrap_or_else(|| PLACEHOLDER_API_KEY.to_string());

        let explorer = ExplorerConfig {
            base_url: var("EXPLORER_URL").unwrap_or_else(|| DEFAULT_EXPLORER_URL.to_string()),
            address: var("WATCH_ADDRESS").unwrap_or_else(|| DEFAULT_WATCH_ADDRESS.to_string()),
            api_key,
            page_size: parse_var(&var, "EXPLORER_PAGE_SIZE", DEFAULT_PAGE_SIZE)?,
            timeout: secs_var(&var, "HTTP_TIMEOUT_SECS", DEFAULT_HTTP_TIMEOUT_SECS)?,
        };

        let analysis = AnalysisConfig {
            url: var("ANALYSIS_URL").unwrap_or_else(|| DEFAULT_ANALYSIS_URL.to_string()),
            timeout: secs_var(&var, "ANALYSIS_TIMEOUT_SECS", DEFAULT_ANALYSIS_TIMEOUT_SECS)?,
        };

        let publish = PublishConfig::from_command_line(
            &var("PUBLISH_COMMAND").unwrap_or_else(|| DEFAULT_PUBLISH_COMMAND.to_string()),
            secs_var(&var, "PUBLISH_TIMEOUT_SECS", DEFAULT_PUBLISH_TIMEOUT_SECS)?,
        )?;

        let locale = match var("WATCHER_LOCALE") {
            Some(code) => code.parse().map_err(|reason| ConfigError::Invalid {
                name: "WATCHER_LOCALE",
                value: code.clone(),
                reason,
            })?,
            None => Locale::default(),
        };

        Ok(Self {
            explorer,
            analysis,
            publish,
            interval: secs_var(&var, "WATCHER_INTERVAL_SECS", DEFAULT_INTERVAL_SECS)?,
            locale,
        })
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }
}

fn parse_var<T, F>(var: &F, name: &'static str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match var(name) {
        Some(value) => {
            let parsed = value.trim().parse::<T>();
            parsed.map_err(|e| ConfigError::Invalid {
                name,
                value,
                reason: e.to_string(),
            })
        }
        None => Ok(default),
    }
}

fn secs_var<F>(var: &F, name: &'static str, default: u64) -> Result<Duration, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let secs: u64 = parse_var(var, name, default)?;
    if secs == 0 {
        return Err(ConfigError::Invalid {
            name,
            value: secs.to_string(),
            reason: "must be greater than zero".to_string(),
        });
    }
    Ok(Duration::from_secs(secs))
}
