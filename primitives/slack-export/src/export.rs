//! The export pass.
//!
//! Runs strictly in sequence: authenticate, load users, list conversations,
//! then fetch and write each conversation's history. Nothing touches the
//! output directory until every listing call has succeeded, and the first
//! error ends the run.

use std::path::PathBuf;

use tracing::{debug, info, warn};

use crate::client::SlackClient;
use crate::config::ExportConfig;
use crate::error::Result;
use crate::model::{Conversation, ExportedMessage};
use crate::users::UserDirectory;
use crate::writer;

/// What a finished run produced.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ExportSummary {
    pub conversations: usize,
    pub messages: usize,
    pub files: Vec<PathBuf>,
}

pub struct Exporter {
    config: ExportConfig,
    client: SlackClient,
}

impl Exporter {
    pub fn new(config: ExportConfig) -> Result<Self> {
        config.validate()?;
        let client = SlackClient::new(
            config.token.clone(),
            config.api_base_url.clone(),
            config.timeout,
            config.retry,
            config.page_size,
        )?;
        Ok(Self { config, client })
    }

    pub async fn run(&self) -> Result<ExportSummary> {
        let identity = self.client.auth_test().await?;
        info!(
            team = %identity.team,
            team_id = %identity.team_id,
            user = %identity.user,
            user_id = %identity.user_id,
            "Auth successful"
        );

        let users = self.load_users().await?;
        let conversations = self.load_conversations().await?;

        let mut summary = ExportSummary::default();
        for conversation in &conversations {
            let (path, count) = self.export_conversation(conversation, &users).await?;
            summary.conversations += 1;
            summary.messages += count;
            summary.files.push(path);
        }

        info!(
            conversations = summary.conversations,
            messages = summary.messages,
            output_dir = %self.config.output_dir.display(),
            "Export finished"
        );
        Ok(summary)
    }

    async fn load_users(&self) -> Result<UserDirectory> {
        info!("Fetching users...");
        let members = self.client.list_users().await?;
        let mut users = UserDirectory::from_members(&members);

        if let Some(path) = &self.config.extra_users {
            let added = users.merge_extra(path)?;
            info!(added, path = %path.display(), "Merged extra users");
        }

        info!(users = users.len(), "Users loaded");
        Ok(users)
    }

    async fn load_conversations(&self) -> Result<Vec<Conversation>> {
        let types = self.config.types_param();
        info!(types = %types, "Fetching conversations...");
        let mut conversations = self.client.list_conversations(&types).await?;

        if !self.config.channels.is_empty() {
            conversations.retain(|c| self.config.channels.contains(&c.id));
            for wanted in &self.config.channels {
                if !conversations.iter().any(|c| &c.id == wanted) {
                    warn!(channel = %wanted, "Requested conversation not visible to this token");
                }
            }
        }

        info!(conversations = conversations.len(), "Conversations listed");
        Ok(conversations)
    }

    /// Fetches one conversation completely, then writes it.
    async fn export_conversation(
        &self,
        conversation: &Conversation,
        users: &UserDirectory,
    ) -> Result<(PathBuf, usize)> {
        let description = conversation.describe(users);
        debug!(
            id = %conversation.id,
            kind = ?conversation.kind(),
            creator = conversation.creator.as_deref().unwrap_or("-"),
            "Exporting conversation"
        );

        let raw = self.client.conversation_history(&conversation.id).await?;
        let messages: Vec<ExportedMessage> = raw
            .into_iter()
            .map(|m| ExportedMessage::from_raw(m, users))
            .collect();

        let path = writer::output_path(&self.config.output_dir, conversation, &description);
        writer::write_conversation(&path, &messages)?;

        info!(
            id = %conversation.id,
            description = %description,
            messages = messages.len(),
            path = %path.display(),
            "Exported conversation"
        );
        Ok((path, messages.len()))
    }
}
