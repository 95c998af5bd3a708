//! In-process stub of the Slack Web API for integration tests
#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use std::{
    collections::HashMap,
    net::SocketAddr,
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use serde_json::{Value, json};
use slack_export::{ExportConfig, RetryPolicy};

pub const GOOD_TOKEN: &str = "xoxp-good";

/// Canned workspace served by [`StubSlack`].
#[derive(Default)]
struct Workspace {
    users: Vec<Value>,
    conversations: Vec<Value>,
    /// Conversation id -> pages of messages, served in order.
    history: HashMap<String, Vec<Vec<Value>>>,
    /// Pages served via `has_more` + `latest` instead of cursors.
    legacy_paging: bool,
}

struct StubState {
    workspace: Mutex<Workspace>,
    rate_limited: AtomicUsize,
    failures: AtomicUsize,
    /// Method name -> Slack error code it always answers with.
    broken: Mutex<HashMap<String, String>>,
    calls: Mutex<Vec<(String, HashMap<String, String>)>>,
}

/// Builder and handle for a stub Slack API bound to 127.0.0.1.
pub struct StubSlack {
    state: Arc<StubState>,
    addr: Option<SocketAddr>,
}

impl StubSlack {
    pub fn new() -> Self {
        Self {
            state: Arc::new(StubState {
                workspace: Mutex::new(Workspace::default()),
                rate_limited: AtomicUsize::new(0),
                failures: AtomicUsize::new(0),
                broken: Mutex::new(HashMap::new()),
                calls: Mutex::new(Vec::new()),
            }),
            addr: None,
        }
    }

    pub fn user(self, id: &str, name: &str, real_name: &str) -> Self {
        self.state.workspace.lock().unwrap().users.push(json!({
            "id": id,
            "name": name,
            "profile": { "real_name": real_name },
        }));
        self
    }

    pub fn conversation(self, conversation: Value, pages: Vec<Vec<Value>>) -> Self {
        {
            let mut ws = self.state.workspace.lock().unwrap();
            let id = conversation["id"].as_str().unwrap().to_string();
            ws.conversations.push(conversation);
            ws.history.insert(id, pages);
        }
        self
    }

    pub fn channel(self, id: &str, name: &str, pages: Vec<Vec<Value>>) -> Self {
        self.conversation(
            json!({
                "id": id,
                "name": name,
                "is_channel": true,
                "is_private": false,
                "creator": "U1",
            }),
            pages,
        )
    }

    pub fn legacy_paging(self) -> Self {
        self.state.workspace.lock().unwrap().legacy_paging = true;
        self
    }

    /// The next `n` history calls answer 429 with `Retry-After: 0`.
    pub fn rate_limit_history(self, n: usize) -> Self {
        self.state.rate_limited.store(n, Ordering::SeqCst);
        self
    }

    /// The next `n` history calls answer 500.
    pub fn fail_history(self, n: usize) -> Self {
        self.state.failures.store(n, Ordering::SeqCst);
        self
    }

    /// Every call to `method` answers `{"ok": false, "error": error}`.
    pub fn fail_method(self, method: &str, error: &str) -> Self {
        self.state
            .broken
            .lock()
            .unwrap()
            .insert(method.to_string(), error.to_string());
        self
    }

    pub async fn start(mut self) -> Self {
        let app = Router::new()
            .route("/api/{method}", get(handle))
            .with_state(self.state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        self.addr = Some(listener.local_addr().unwrap());
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        self
    }

    pub fn base_url(&self) -> String {
        format!("http://{}/api", self.addr.expect("stub not started"))
    }

    /// Names of the API methods called so far, in order.
    pub fn methods(&self) -> Vec<String> {
        self.state
            .calls
            .lock()
            .unwrap()
            .iter()
            .map(|(m, _)| m.clone())
            .collect()
    }

    /// Query parameters of every call to `method`.
    pub fn params_of(&self, method: &str) -> Vec<HashMap<String, String>> {
        self.state
            .calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(m, _)| m == method)
            .map(|(_, p)| p.clone())
            .collect()
    }

    pub fn config(&self, token: &str, output_dir: &std::path::Path) -> ExportConfig {
        let mut config = ExportConfig::new(token, output_dir);
        config.api_base_url = self.base_url();
        config.timeout = Duration::from_secs(5);
        config.retry = RetryPolicy {
            max_retries: 3,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(10),
        };
        config
    }
}

pub fn message(ts: &str, user: &str, text: &str) -> Value {
    json!({ "type": "message", "ts": ts, "user": user, "text": text })
}

fn slack_error(error: &str) -> Response {
    Json(json!({ "ok": false, "error": error })).into_response()
}

async fn handle(
    State(state): State<Arc<StubState>>,
    Path(method): Path<String>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    state
        .calls
        .lock()
        .unwrap()
        .push((method.clone(), params.clone()));

    let expected = format!("Bearer {GOOD_TOKEN}");
    let authorized = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        == Some(expected.as_str());
    if !authorized {
        return slack_error("invalid_auth");
    }
    if let Some(error) = state.broken.lock().unwrap().get(&method) {
        return slack_error(error);
    }

    let ws = state.workspace.lock().unwrap();
    match method.as_str() {
        "auth.test" => Json(json!({
            "ok": true,
            "team": "Acme",
            "team_id": "T1",
            "user": "alice",
            "user_id": "U1",
        }))
        .into_response(),
        "users.list" => Json(json!({
            "ok": true,
            "members": ws.users,
            "response_metadata": { "next_cursor": "" },
        }))
        .into_response(),
        "conversations.list" => {
            let types: Vec<&str> = params
                .get("types")
                .map(|t| t.split(',').collect())
                .unwrap_or_default();
            let channels: Vec<&Value> = ws
                .conversations
                .iter()
                .filter(|c| types.is_empty() || types.contains(&conversation_type(c)))
                .collect();

            // Two conversations per page so listing pagination is exercised.
            let start: usize = params
                .get("cursor")
                .and_then(|c| c.parse().ok())
                .unwrap_or(0);
            let end = (start + 2).min(channels.len());
            let next = if end < channels.len() {
                end.to_string()
            } else {
                String::new()
            };
            let page = &channels[start.min(end)..end];
            Json(json!({
                "ok": true,
                "channels": page,
                "response_metadata": { "next_cursor": next },
            }))
            .into_response()
        }
        "conversations.history" => {
            if take(&state.rate_limited) {
                return (
                    StatusCode::TOO_MANY_REQUESTS,
                    [(header::RETRY_AFTER, "0")],
                    Json(json!({ "ok": false, "error": "ratelimited" })),
                )
                    .into_response();
            }
            if take(&state.failures) {
                return StatusCode::INTERNAL_SERVER_ERROR.into_response();
            }

            let Some(channel) = params.get("channel") else {
                return slack_error("channel_not_found");
            };
            let Some(pages) = ws.history.get(channel) else {
                return slack_error("channel_not_found");
            };

            let index = if ws.legacy_paging {
                match params.get("latest") {
                    None => 0,
                    Some(latest) => pages
                        .iter()
                        .position(|p| p.last().and_then(|m| m["ts"].as_str()) == Some(latest.as_str()))
                        .map_or(pages.len(), |i| i + 1),
                }
            } else {
                params
                    .get("cursor")
                    .and_then(|c| c.strip_prefix("page:"))
                    .and_then(|c| c.parse().ok())
                    .unwrap_or(0)
            };

            let messages = pages.get(index).cloned().unwrap_or_default();
            let has_more = index + 1 < pages.len();
            let next_cursor = if has_more && !ws.legacy_paging {
                format!("page:{}", index + 1)
            } else {
                String::new()
            };
            Json(json!({
                "ok": true,
                "messages": messages,
                "has_more": has_more,
                "response_metadata": { "next_cursor": next_cursor },
            }))
            .into_response()
        }
        _ => slack_error("unknown_method"),
    }
}

fn conversation_type(c: &Value) -> &'static str {
    let flag = |name: &str| c[name].as_bool().unwrap_or(false);
    if flag("is_im") {
        "im"
    } else if flag("is_mpim") {
        "mpim"
    } else if flag("is_private") || flag("is_group") {
        "private_channel"
    } else {
        "public_channel"
    }
}

fn take(counter: &AtomicUsize) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}
