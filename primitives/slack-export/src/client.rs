//! Slack Web API client.
//!
//! Every call is a GET against `{base_url}/{method}` carrying the user token as
//! a bearer header. Responses are checked for Slack's `ok` envelope, transient
//! failures are retried per [`RetryPolicy`], and list endpoints are followed
//! through their pagination cursors.

use std::time::Duration;

use reqwest::{Client, StatusCode, header::RETRY_AFTER};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{ExportError, Result};
use crate::model::{
    AuthIdentity, Conversation, ConversationsPage, HistoryPage, Member, RawMessage, UsersPage,
};
use crate::retry::{RetryPolicy, parse_retry_after};

pub const DEFAULT_BASE_URL: &str = "https://slack.com/api";

/// Authenticated Slack Web API client.
#[derive(Clone)]
pub struct SlackClient {
    http: Client,
    token: String,
    base_url: String,
    retry: RetryPolicy,
    page_size: u32,
}

impl std::fmt::Debug for SlackClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlackClient")
            .field("base_url", &self.base_url)
            .field("retry", &self.retry)
            .field("page_size", &self.page_size)
            .finish_non_exhaustive()
    }
}

/// Outcome of a single attempt that did not produce a payload.
struct Failure {
    error: ExportError,
    retry_after: Option<Duration>,
}

impl From<ExportError> for Failure {
    fn from(error: ExportError) -> Self {
        Self {
            error,
            retry_after: None,
        }
    }
}

impl SlackClient {
    pub fn new(
        token: impl Into<String>,
        base_url: impl Into<String>,
        timeout: Duration,
        retry: RetryPolicy,
        page_size: u32,
    ) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("slack-export/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            token: token.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            retry,
            page_size,
        })
    }

    /// Calls `method` with retries and decodes the payload.
    pub async fn call<T: DeserializeOwned>(&self, method: &str, params: &[(&str, &str)]) -> Result<T> {
        let max_attempts = self.retry.max_attempts();
        let mut attempt = 0;

        loop {
            attempt += 1;
            let failure = match self.attempt(method, params).await {
                Ok(body) => {
                    return serde_json::from_value(body).map_err(|source| ExportError::Decode {
                        method: method.to_string(),
                        source,
                    });
                }
                Err(failure) => failure,
            };

            if !failure.error.is_retryable() {
                return Err(failure.error);
            }
            if attempt >= max_attempts {
                let rate_limited = failure.retry_after.is_some()
                    || matches!(&failure.error, ExportError::Status { status: 429, .. })
                    || matches!(&failure.error, ExportError::Api { error, .. } if error == "ratelimited");
                return Err(if rate_limited {
                    ExportError::RateLimited {
                        method: method.to_string(),
                        attempts: attempt,
                    }
                } else {
                    failure.error
                });
            }

            let delay = self.retry.delay(attempt - 1, failure.retry_after);
            warn!(
                method,
                attempt,
                max_attempts,
                delay_ms = delay.as_millis() as u64,
                error = %failure.error,
                "Slack call failed, retrying"
            );
            tokio::time::sleep(delay).await;
        }
    }

    /// One request without retries.
    async fn attempt(&self, method: &str, params: &[(&str, &str)]) -> Result<Value, Failure> {
        let url = format!("{}/{method}", self.base_url);
        debug!(method, ?params, "calling Slack");

        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.token)
            .query(params)
            .send()
            .await
            .map_err(ExportError::from)?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(parse_retry_after);
            return Err(Failure {
                error: ExportError::Status {
                    method: method.to_string(),
                    status: status.as_u16(),
                },
                retry_after,
            });
        }
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(ExportError::Auth {
                method: method.to_string(),
                reason: format!("HTTP {status}"),
            }
            .into());
        }
        if !status.is_success() {
            return Err(ExportError::Status {
                method: method.to_string(),
                status: status.as_u16(),
            }
            .into());
        }

        let bytes = response.bytes().await.map_err(ExportError::from)?;
        let body: Value = serde_json::from_slice(&bytes).map_err(|source| ExportError::Decode {
            method: method.to_string(),
            source,
        })?;

        if body.get("ok").and_then(Value::as_bool) == Some(true) {
            Ok(body)
        } else {
            let error = body
                .get("error")
                .and_then(Value::as_str)
                .unwrap_or("unknown_error");
            Err(ExportError::from_api(method, error).into())
        }
    }

    /// Checks the token and returns who it belongs to.
    pub async fn auth_test(&self) -> Result<AuthIdentity> {
        self.call("auth.test", &[]).await
    }

    /// All workspace members.
    pub async fn list_users(&self) -> Result<Vec<Member>> {
        let limit = self.page_size.to_string();
        let mut members = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let mut params = vec![("limit", limit.as_str())];
            if let Some(c) = cursor.as_deref() {
                params.push(("cursor", c));
            }
            let page: UsersPage = self.call("users.list", &params).await?;
            members.extend(page.members);

            match page.response_metadata.cursor() {
                Some(next) => cursor = Some(next.to_string()),
                None => break,
            }
        }

        Ok(members)
    }

    /// All conversations of the given types (comma separated list).
    pub async fn list_conversations(&self, types: &str) -> Result<Vec<Conversation>> {
        let limit = self.page_size.to_string();
        let mut conversations = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let mut params = vec![
                ("types", types),
                ("exclude_archived", "false"),
                ("limit", limit.as_str()),
            ];
            if let Some(c) = cursor.as_deref() {
                params.push(("cursor", c));
            }
            let page: ConversationsPage = self.call("conversations.list", &params).await?;
            conversations.extend(page.channels);

            match page.response_metadata.cursor() {
                Some(next) => cursor = Some(next.to_string()),
                None => break,
            }
        }

        Ok(conversations)
    }

    /// Complete history of one conversation, in the order Slack returns it.
    ///
    /// Follows `response_metadata.next_cursor`. When a page reports
    /// `has_more` without a cursor, the next page is requested with
    /// `latest` set to the oldest timestamp seen so far.
    pub async fn conversation_history(&self, channel: &str) -> Result<Vec<RawMessage>> {
        enum Next {
            Cursor(String),
            Latest(String),
        }

        let limit = self.page_size.to_string();
        let mut messages: Vec<RawMessage> = Vec::new();
        let mut next: Option<Next> = None;
        let mut pages = 0usize;

        loop {
            let mut params = vec![("channel", channel), ("limit", limit.as_str())];
            match &next {
                Some(Next::Cursor(c)) => params.push(("cursor", c.as_str())),
                Some(Next::Latest(ts)) => params.push(("latest", ts.as_str())),
                None => {}
            }

            let page: HistoryPage = self.call("conversations.history", &params).await?;
            pages += 1;
            let received = page.messages.len();
            messages.extend(page.messages);

            next = if let Some(cursor) = page.response_metadata.cursor() {
                Some(Next::Cursor(cursor.to_string()))
            } else if page.has_more && received > 0 {
                messages.last().map(|m| Next::Latest(m.ts.clone()))
            } else {
                None
            };

            if next.is_none() {
                break;
            }
        }

        debug!(channel, pages, messages = messages.len(), "history fetched");
        Ok(messages)
    }
}
