//! Command line arguments and the resolved export configuration.

use std::{path::PathBuf, time::Duration};

use clap::Parser;

use crate::client::DEFAULT_BASE_URL;
use crate::error::{ExportError, Result};
use crate::model::CONVERSATION_TYPES;
use crate::retry::RetryPolicy;

const MAX_PAGE_SIZE: u32 = 1000;

/// Exports Slack conversation history to local JSON files.
///
/// The token needs channels:read, channels:history, groups:read,
/// groups:history, im:read, im:history, mpim:read, mpim:history and
/// users:read.
#[derive(Parser, Clone)]
#[command(name = "slack-export", version)]
#[command(about = "Exports Slack conversation history to local JSON files")]
pub struct Args {
    /// Slack user OAuth token (xoxp-...).
    #[arg(env = "SLACK_EXPORT_TOKEN", hide_env_values = true)]
    pub token: String,

    /// Directory the conversation files are written to.
    #[arg(short, long, env = "SLACK_EXPORT_OUTPUT_DIR", default_value = "export")]
    pub output_dir: PathBuf,

    /// Conversation types to export.
    #[arg(
        long,
        env = "SLACK_EXPORT_TYPES",
        value_delimiter = ',',
        value_parser = clap::builder::PossibleValuesParser::new(["public_channel", "private_channel", "mpim", "im"]),
        default_value = "public_channel,private_channel,mpim,im"
    )]
    pub types: Vec<String>,

    /// Only export these conversation ids (repeatable).
    #[arg(short, long = "channel", env = "SLACK_EXPORT_CHANNELS", value_delimiter = ',')]
    pub channels: Vec<String>,

    /// JSON file with users missing from the workspace directory.
    #[arg(long, env = "SLACK_EXPORT_EXTRA_USERS")]
    pub extra_users: Option<PathBuf>,

    /// Slack Web API base URL.
    #[arg(long, env = "SLACK_EXPORT_API_BASE_URL", default_value = DEFAULT_BASE_URL)]
    pub api_base_url: String,

    /// Request timeout in seconds.
    #[arg(short, long, env = "SLACK_EXPORT_TIMEOUT", default_value = "30")]
    pub timeout: u64,

    /// Number of retries on transient failures and rate limits.
    #[arg(short, long, env = "SLACK_EXPORT_RETRIES", default_value = "5")]
    pub retries: u32,

    /// Items requested per page.
    #[arg(long, env = "SLACK_EXPORT_PAGE_SIZE", default_value = "200")]
    pub page_size: u32,

    /// Log level (overridden by RUST_LOG).
    #[arg(long, env = "SLACK_EXPORT_LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

/// Everything the exporter needs for one run.
#[derive(Clone)]
pub struct ExportConfig {
    pub token: String,
    pub output_dir: PathBuf,
    pub types: Vec<String>,
    pub channels: Vec<String>,
    pub extra_users: Option<PathBuf>,
    pub api_base_url: String,
    pub timeout: Duration,
    pub retry: RetryPolicy,
    pub page_size: u32,
}

const REDACTED: &str = "<redacted>";

impl std::fmt::Debug for Args {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Args")
            .field("token", &REDACTED)
            .field("output_dir", &self.output_dir)
            .field("types", &self.types)
            .field("channels", &self.channels)
            .field("extra_users", &self.extra_users)
            .field("api_base_url", &self.api_base_url)
            .field("timeout", &self.timeout)
            .field("retries", &self.retries)
            .field("page_size", &self.page_size)
            .field("log_level", &self.log_level)
            .finish()
    }
}

impl std::fmt::Debug for ExportConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExportConfig")
            .field("token", &REDACTED)
            .field("output_dir", &self.output_dir)
            .field("types", &self.types)
            .field("channels", &self.channels)
            .field("extra_users", &self.extra_users)
            .field("api_base_url", &self.api_base_url)
            .field("timeout", &self.timeout)
            .field("retry", &self.retry)
            .field("page_size", &self.page_size)
            .finish()
    }
}

impl ExportConfig {
    /// Config with defaults for everything but the token and output directory.
    pub fn new(token: impl Into<String>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            token: token.into(),
            output_dir: output_dir.into(),
            types: CONVERSATION_TYPES.iter().map(ToString::to_string).collect(),
            channels: Vec::new(),
            extra_users: None,
            api_base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(30),
            retry: RetryPolicy::default(),
            page_size: 200,
        }
    }

    /// The `types` parameter for `conversations.list`.
    pub fn types_param(&self) -> String {
        self.types.join(",")
    }

    pub fn validate(&self) -> Result<()> {
        if self.token.trim().is_empty() {
            return Err(ExportError::Config("token must not be empty".into()));
        }
        if self.types.is_empty() {
            return Err(ExportError::Config(
                "at least one conversation type is required".into(),
            ));
        }
        if let Some(bad) = self
            .types
            .iter()
            .find(|t| !CONVERSATION_TYPES.contains(&t.as_str()))
        {
            return Err(ExportError::Config(format!(
                "unknown conversation type '{bad}'"
            )));
        }
        Ok(())
    }
}

impl Args {
    pub fn into_config(self) -> Result<ExportConfig> {
        let mut types: Vec<String> = Vec::with_capacity(self.types.len());
        for t in self.types {
            if !types.contains(&t) {
                types.push(t);
            }
        }

        let config = ExportConfig {
            token: self.token.trim().to_string(),
            output_dir: self.output_dir,
            types,
            channels: self.channels,
            extra_users: self.extra_users,
            api_base_url: self.api_base_url,
            timeout: Duration::from_secs(self.timeout),
            retry: RetryPolicy::new(self.retries),
            page_size: self.page_size.clamp(1, MAX_PAGE_SIZE),
        };
        config.validate()?;
        Ok(config)
    }
}
