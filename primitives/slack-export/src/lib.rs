//! Slack Export - Conversation History Exporter
//!
//! Exports every conversation visible to a Slack user token (public and
//! private channels, direct messages and multi-person direct messages) into
//! one JSON file per conversation.
//!
//! # Example
//!
//! ```no_run
//! use slack_export::{ExportConfig, Exporter};
//!
//! # async fn demo() -> Result<(), slack_export::ExportError> {
//! let config = ExportConfig::new("xoxp-...", "export");
//! let summary = Exporter::new(config)?.run().await?;
//! println!("exported {} conversations", summary.conversations);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod export;
pub mod logging;
pub mod model;
pub mod retry;
pub mod users;
pub mod writer;

pub use client::SlackClient;
pub use config::{Args, ExportConfig};
pub use error::ExportError;
pub use export::{ExportSummary, Exporter};
pub use retry::RetryPolicy;
