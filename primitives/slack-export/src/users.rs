//! User id resolution for authors and mentions.

use std::{borrow::Cow, collections::HashMap, path::Path, sync::LazyLock};

use regex::{Captures, Regex};
use serde::Deserialize;

use crate::error::{ExportError, Result};
use crate::model::Member;

/// Matches `<@U123>` and `<@U123|label>`.
static MENTION: LazyLock<Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(r"<@([A-Za-z0-9]+)(?:\|[^>]*)?>"));

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UserProfile {
    pub name: String,
    pub real_name: String,
}

impl UserProfile {
    pub fn new(name: impl Into<String>, real_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            real_name: real_name.into(),
        }
    }
}

impl From<&Member> for UserProfile {
    fn from(member: &Member) -> Self {
        let real_name = member
            .profile
            .as_ref()
            .and_then(|p| p.real_name.clone())
            .or_else(|| member.real_name.clone())
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| member.name.clone());
        Self::new(member.name.clone(), real_name)
    }
}

/// Map of user id to profile.
#[derive(Debug, Clone, Default)]
pub struct UserDirectory {
    users: HashMap<String, UserProfile>,
}

impl UserDirectory {
    pub fn from_members(members: &[Member]) -> Self {
        let users = members
            .iter()
            .map(|m| (m.id.clone(), UserProfile::from(m)))
            .collect();
        Self { users }
    }

    pub fn insert(&mut self, id: impl Into<String>, profile: UserProfile) {
        self.users.insert(id.into(), profile);
    }

    /// Merges a JSON file of `{ "<id>": { "name": .., "real_name": .. } }`.
    ///
    /// Entries in the file replace users already known to the workspace.
    pub fn merge_extra(&mut self, path: &Path) -> Result<usize> {
        let raw = std::fs::read_to_string(path).map_err(|e| ExportError::io(path, e))?;
        let extra: HashMap<String, UserProfile> = serde_json::from_str(&raw).map_err(|e| {
            ExportError::Config(format!("extra users file {}: {e}", path.display()))
        })?;
        let count = extra.len();
        self.users.extend(extra);
        Ok(count)
    }

    pub fn lookup(&self, id: &str) -> Option<&UserProfile> {
        self.users.get(id)
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    /// Author label for an exported message.
    pub fn display(&self, id: &str) -> String {
        match self.lookup(id) {
            Some(user) => format!("{} (@{})", user.real_name, user.name),
            None => {
                tracing::debug!(user = id, "unknown message author");
                format!("Unknown - ID {id}")
            }
        }
    }

    /// Short handle, falling back to the raw id.
    pub fn handle<'a>(&'a self, id: &'a str) -> &'a str {
        self.lookup(id).map_or(id, |u| u.name.as_str())
    }

    /// Rewrites every known `<@ID>` mention to `@name`.
    pub fn replace_mentions<'a>(&self, text: &'a str) -> Cow<'a, str> {
        let Ok(re) = MENTION.as_ref() else {
            return Cow::Borrowed(text);
        };
        re.replace_all(text, |caps: &Captures<'_>| match self.lookup(&caps[1]) {
            Some(user) => format!("@{}", user.name),
            None => caps[0].to_string(),
        })
    }
}
