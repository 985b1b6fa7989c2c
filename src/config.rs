//! Configuration management for the changelog bot.
//!
//! Configuration can be set via environment variables:
//! - `SLACK_TOKEN` - Required. Bot token used for channel history and downloads.
//! - `SLACK_CHANNEL_ID` - Required. The channel to fetch product updates from.
//! - `GITHUB_TOKEN` - Required. Token for the documentation repository.
//! - `GITHUB_REPO` - Required. Target repository in `owner/name` form.
//! - `OPENROUTER_API_KEY` - Required. API key for the hosted LLM runtime.
//! - `DEFAULT_MODEL` - Optional. Model for the writer and publisher roles.
//! - `REVIEW_MODEL` - Optional. Stronger model for formatting and review.
//! - `MAX_ITERATIONS` - Optional. Maximum agent loop iterations. Defaults to `25`.
//! - `WORKSPACE_PATH` - Optional. Staging directory. Defaults to current directory.
//! - `MAX_FILE_SIZE` - Optional. Media download ceiling in bytes. Defaults to 100 MiB.
//! - `MAX_CONCURRENT_DOWNLOADS` - Optional. Download worker budget. Defaults to `5`.
//! - `DOCS_SEARCH_URL` - Optional. Documentation search endpoint; tool disabled if unset.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

/// Media download limits.
#[derive(Debug, Clone)]
pub struct MediaConfig {
    /// Downloads larger than this many bytes are rejected, not written.
    pub max_file_size: u64,

    /// Fixed width of the per-message download worker pool.
    pub max_concurrent_downloads: usize,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            max_file_size: 100 * 1024 * 1024,
            max_concurrent_downloads: 5,
        }
    }
}

/// Pipeline configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Slack bot token
    pub slack_token: String,

    /// Slack channel to fetch updates from
    pub slack_channel_id: String,

    /// GitHub token for the documentation repository
    pub github_token: String,

    /// Documentation repository (`owner/name`)
    pub github_repo: String,

    /// API key for the hosted LLM runtime
    pub api_key: String,

    /// Model for the writer and publisher roles
    pub default_model: String,

    /// Stronger model for the formatter and reviewer roles
    pub review_model: String,

    /// Maximum iterations for each agent loop
    pub max_iterations: usize,

    /// Local staging directory for changelog and media files
    pub workspace_path: PathBuf,

    /// Documentation search endpoint (tool disabled when unset)
    pub docs_search_url: Option<String>,

    /// Media download limits
    pub media: MediaConfig,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingEnvVar` if any required variable is not set.
    pub fn from_env() -> Result<Self, ConfigError> {
        let slack_token = require_env("SLACK_TOKEN")?;
        let slack_channel_id = require_env("SLACK_CHANNEL_ID")?;
        let github_token = require_env("GITHUB_TOKEN")?;
        let github_repo = require_env("GITHUB_REPO")?;
        let api_key = require_env("OPENROUTER_API_KEY")?;

        let default_model = std::env::var("DEFAULT_MODEL")
            .unwrap_or_else(|_| "anthropic/claude-sonnet-4.5".to_string());

        let review_model = std::env::var("REVIEW_MODEL")
            .unwrap_or_else(|_| "anthropic/claude-opus-4.1".to_string());

        let max_iterations = parse_env("MAX_ITERATIONS", 25usize)?;

        let workspace_path = std::env::var("WORKSPACE_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));

        let docs_search_url = std::env::var("DOCS_SEARCH_URL")
            .ok()
            .filter(|v| !v.trim().is_empty());

        let media = MediaConfig {
            max_file_size: parse_env("MAX_FILE_SIZE", MediaConfig::default().max_file_size)?,
            max_concurrent_downloads: parse_env(
                "MAX_CONCURRENT_DOWNLOADS",
                MediaConfig::default().max_concurrent_downloads,
            )?,
        };

        Ok(Self {
            slack_token,
            slack_channel_id,
            github_token,
            github_repo,
            api_key,
            default_model,
            review_model,
            max_iterations,
            workspace_path,
            docs_search_url,
            media,
        })
    }

    /// Create a config with custom values (useful for testing).
    pub fn new(
        slack_token: String,
        slack_channel_id: String,
        github_token: String,
        github_repo: String,
        api_key: String,
        workspace_path: PathBuf,
    ) -> Self {
        Self {
            slack_token,
            slack_channel_id,
            github_token,
            github_repo,
            api_key,
            default_model: "anthropic/claude-sonnet-4.5".to_string(),
            review_model: "anthropic/claude-opus-4.1".to_string(),
            max_iterations: 25,
            workspace_path,
            docs_search_url: None,
            media: MediaConfig::default(),
        }
    }
}

fn require_env(name: &str) -> Result<String, ConfigError> {
    std::env::var(name)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| ConfigError::MissingEnvVar(name.to_string()))
}

fn parse_env<T: std::str::FromStr>(name: &str, default: T) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e| ConfigError::InvalidValue(name.to_string(), format!("{}", e))),
        Err(_) => Ok(default),
    }
}
