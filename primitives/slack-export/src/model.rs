//! Slack API payloads and the exported message record.

use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};

use crate::users::UserDirectory;

/// Prefix Slack puts in front of MPIM purposes.
const MPIM_PURPOSE_PREFIX: &str = "Group messaging with: ";

/// Response of `auth.test`.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthIdentity {
    pub team: String,
    pub team_id: String,
    pub user: String,
    pub user_id: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResponseMetadata {
    #[serde(default)]
    pub next_cursor: Option<String>,
}

impl ResponseMetadata {
    /// The cursor for the next page, if there is one.
    pub fn cursor(&self) -> Option<&str> {
        self.next_cursor.as_deref().filter(|c| !c.is_empty())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct UsersPage {
    #[serde(default)]
    pub members: Vec<Member>,
    #[serde(default)]
    pub response_metadata: ResponseMetadata,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Member {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub real_name: Option<String>,
    #[serde(default)]
    pub profile: Option<MemberProfile>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MemberProfile {
    #[serde(default)]
    pub real_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConversationsPage {
    #[serde(default)]
    pub channels: Vec<Conversation>,
    #[serde(default)]
    pub response_metadata: ResponseMetadata,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HistoryPage {
    #[serde(default)]
    pub messages: Vec<RawMessage>,
    #[serde(default)]
    pub has_more: bool,
    #[serde(default)]
    pub response_metadata: ResponseMetadata,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Purpose {
    #[serde(default)]
    pub value: String,
}

/// What kind of thread a conversation is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversationKind {
    PublicChannel,
    PrivateChannel,
    DirectMessage,
    MultiPartyDirectMessage,
    Unknown,
}

/// Accepted values for `conversations.list`'s `types` parameter.
pub const CONVERSATION_TYPES: &[&str] = &["public_channel", "private_channel", "mpim", "im"];

/// A conversation visible to the token's user.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Conversation {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub is_channel: bool,
    #[serde(default)]
    pub is_group: bool,
    #[serde(default)]
    pub is_im: bool,
    #[serde(default)]
    pub is_mpim: bool,
    #[serde(default)]
    pub is_private: bool,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub creator: Option<String>,
    #[serde(default)]
    pub purpose: Option<Purpose>,
}

impl Conversation {
    pub fn kind(&self) -> ConversationKind {
        if self.is_im {
            ConversationKind::DirectMessage
        } else if self.is_mpim {
            ConversationKind::MultiPartyDirectMessage
        } else if self.is_channel || self.is_group {
            if self.is_private || self.is_group {
                ConversationKind::PrivateChannel
            } else {
                ConversationKind::PublicChannel
            }
        } else {
            ConversationKind::Unknown
        }
    }

    /// Human readable description, also used in the output file name.
    pub fn describe(&self, users: &UserDirectory) -> String {
        match self.kind() {
            ConversationKind::DirectMessage => {
                let peer = self.user.as_deref().unwrap_or_default();
                format!("IM with {}", users.handle(peer))
            }
            ConversationKind::MultiPartyDirectMessage => {
                let purpose = self.purpose.as_ref().map_or("", |p| p.value.as_str());
                let purpose = purpose.strip_prefix(MPIM_PURPOSE_PREFIX).unwrap_or(purpose);
                format!("Group IM: {purpose}")
            }
            ConversationKind::PublicChannel | ConversationKind::PrivateChannel => {
                let visibility = if self.kind() == ConversationKind::PrivateChannel {
                    "private"
                } else {
                    "public"
                };
                let name = self.name.as_deref().unwrap_or(&self.id);
                format!("Channel \"{name}\" ({visibility})")
            }
            ConversationKind::Unknown => "Unknown conversation type".to_string(),
        }
    }
}

/// A message as returned by `conversations.history`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawMessage {
    pub ts: String,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub text: String,
}

/// A message as written to the export file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportedMessage {
    pub user: String,
    pub text: String,
    pub ts: String,
    pub ts_readable: String,
}

impl ExportedMessage {
    /// Resolves the author and mentions of a raw message.
    pub fn from_raw(raw: RawMessage, users: &UserDirectory) -> Self {
        let user = match raw.user.as_deref() {
            Some(id) => users.display(id),
            None => "Unknown".to_string(),
        };
        Self {
            user,
            text: users.replace_mentions(&raw.text).into_owned(),
            ts_readable: readable_ts(&raw.ts),
            ts: raw.ts,
        }
    }
}

/// Formats a Slack `ts` ("1512085950.000216") as local time.
pub fn readable_ts(ts: &str) -> String {
    let Ok(seconds) = ts.parse::<f64>() else {
        return String::new();
    };
    if !seconds.is_finite() {
        return String::new();
    }
    let whole = seconds.trunc() as i64;
    let nanos = (seconds.fract() * 1e9) as u32;
    DateTime::<Utc>::from_timestamp(whole, nanos)
        .map(|utc| {
            utc.with_timezone(&Local)
                .format("%Y-%m-%d %H:%M:%S")
                .to_string()
        })
        .unwrap_or_default()
}
