//! REST client for the Foundry agents service.
//!
//! Speaks the thread/message/run API (`/threads`, `/threads/{id}/messages`,
//! `/threads/{id}/runs`) plus agent creation (`/assistants`). Every request
//! carries the `api-version` query parameter and, when configured, a bearer
//! token. Raw JSON payloads are adapted into the typed values of
//! [`super::types`] here and nowhere else.

use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Url};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use super::config::ServiceConfig;
use super::trait_def::{AgentProvisioner, RemoteJobService};
use super::types::{
    AgentHandle, AgentSpec, ContentPart, MessageRole, RemoteError, RunHandle, RunSnapshot,
    ThreadHandle, ThreadMessage,
};

/// Page size requested when listing messages.
const MESSAGE_PAGE_LIMIT: &str = "100";

/// HTTP client for one project endpoint.
#[derive(Debug, Clone)]
pub struct FoundryClient {
    config: ServiceConfig,
    base: Url,
    http: reqwest::Client,
}

impl FoundryClient {
    /// Build a client with a 60 second per-request timeout.
    ///
    /// Fails if the endpoint is not an absolute URL with a path.
    pub fn new(config: ServiceConfig) -> Result<Self> {
        let base = Url::parse(config.base_url())
            .with_context(|| format!("invalid project endpoint: {}", config.endpoint))?;
        if base.cannot_be_a_base() {
            bail!("invalid project endpoint: {}", config.endpoint);
        }
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(60))
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self { config, base, http })
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// The endpoint URL with `segments` appended, each percent-encoded as a
    /// single path segment.
    fn url(&self, segments: &[&str]) -> Result<Url> {
        if let Some(bad) = segments.iter().find(|s| matches!(**s, "" | "." | "..")) {
            bail!("invalid path segment {bad:?}");
        }
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|()| anyhow!("invalid project endpoint: {}", self.config.endpoint))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn request(&self, method: Method, segments: &[&str]) -> Result<RequestBuilder> {
        let builder = self
            .http
            .request(method, self.url(segments)?)
            .query(&[("api-version", self.config.api_version.as_str())]);
        Ok(match &self.config.access_token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        })
    }

    /// Send a request and decode a JSON body, failing on non-2xx statuses.
    async fn send_json<T: DeserializeOwned>(&self, builder: RequestBuilder, what: &str) -> Result<T> {
        let response = builder
            .send()
            .await
            .with_context(|| format!("{what}: request failed"))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("{what}: service returned {status}: {body}");
        }

        let bytes = response
            .bytes()
            .await
            .with_context(|| format!("{what}: failed to read response body"))?;
        serde_json::from_slice(&bytes).with_context(|| format!("{what}: malformed response body"))
    }
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct IdBody {
    id: String,
}

#[derive(Debug, Deserialize)]
struct RunBody {
    id: String,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    last_error: Value,
}

#[derive(Debug, Deserialize)]
struct MessagePage {
    data: Vec<MessageBody>,
    #[serde(default)]
    has_more: bool,
    #[serde(default)]
    last_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MessageBody {
    id: String,
    #[serde(default)]
    role: Option<String>,
    #[serde(default)]
    content: Vec<Value>,
}

impl From<MessageBody> for ThreadMessage {
    fn from(body: MessageBody) -> Self {
        Self {
            id: body.id,
            role: body.role.unwrap_or_else(|| "unknown".to_string()),
            content: body.content.iter().map(content_part).collect(),
        }
    }
}

/// Extract the display text of one content item.
///
/// Text items look like `{"type": "text", "text": {"value": "..."}}`. Items
/// without a `text` field fall back to `input_text`, `content` or `value`,
/// in that order. An item whose `text` field is present but empty has no
/// display text and does not fall back.
fn content_part(item: &Value) -> ContentPart {
    fn non_empty(value: &Value) -> Option<String> {
        match value {
            Value::Null => None,
            Value::String(s) if s.is_empty() => None,
            Value::String(s) => Some(s.clone()),
            Value::Bool(false) => None,
            Value::Array(a) if a.is_empty() => None,
            Value::Object(o) if o.is_empty() => None,
            other => Some(other.to_string()),
        }
    }

    match item.get("text") {
        Some(Value::Null) | None => {}
        Some(text) => {
            let value = text.get("value").unwrap_or(text);
            return non_empty(value).map_or(ContentPart::Other, ContentPart::Text);
        }
    }

    ["input_text", "content", "value"]
        .iter()
        .find_map(|key| item.get(*key).and_then(non_empty))
        .map_or(ContentPart::Other, ContentPart::Text)
}

// ---------------------------------------------------------------------------
// Trait impls
// ---------------------------------------------------------------------------

#[async_trait]
impl RemoteJobService for FoundryClient {
    async fn create_thread(&self) -> Result<ThreadHandle> {
        let body: IdBody = self
            .send_json(
                self.request(Method::POST, &["threads"])?.json(&serde_json::json!({})),
                "create thread",
            )
            .await?;
        debug!(thread_id = %body.id, "thread created");
        Ok(ThreadHandle { id: body.id })
    }

    async fn append_message(&self, thread_id: &str, role: MessageRole, text: &str) -> Result<()> {
        let _: IdBody = self
            .send_json(
                self.request(Method::POST, &["threads", thread_id, "messages"])?
                    .json(&serde_json::json!({ "role": role, "content": text })),
                "create message",
            )
            .await?;
        Ok(())
    }

    async fn create_run(&self, thread_id: &str, agent_id: &str) -> Result<RunHandle> {
        let body: RunBody = self
            .send_json(
                self.request(Method::POST, &["threads", thread_id, "runs"])?
                    .json(&serde_json::json!({ "assistant_id": agent_id })),
                "create run",
            )
            .await?;
        debug!(thread_id, run_id = %body.id, status = ?body.status, "run created");
        Ok(RunHandle { id: body.id })
    }

    async fn get_run(&self, thread_id: &str, run_id: &str) -> Result<RunSnapshot> {
        let body: RunBody = self
            .send_json(
                self.request(Method::GET, &["threads", thread_id, "runs", run_id])?,
                "get run",
            )
            .await?;
        Ok(RunSnapshot {
            id: body.id,
            status: body.status,
            last_error: RemoteError::from_json(&body.last_error),
        })
    }

    async fn list_messages(&self, thread_id: &str) -> Result<Vec<ThreadMessage>> {
        let mut messages = Vec::new();
        let mut after: Option<String> = None;

        loop {
            let mut builder = self
                .request(Method::GET, &["threads", thread_id, "messages"])?
                .query(&[("order", "asc"), ("limit", MESSAGE_PAGE_LIMIT)]);
            if let Some(cursor) = &after {
                builder = builder.query(&[("after", cursor.as_str())]);
            }

            let page: MessagePage = self.send_json(builder, "list messages").await?;
            let fallback_cursor = page.data.last().map(|m| m.id.clone());
            messages.extend(page.data.into_iter().map(ThreadMessage::from));

            if !page.has_more {
                break;
            }
            match page.last_id.or(fallback_cursor) {
                Some(cursor) if after.as_deref() == Some(cursor.as_str()) => {
                    tracing::warn!(thread_id, cursor = %cursor, "message cursor did not advance; stopping");
                    break;
                }
                Some(cursor) => after = Some(cursor),
                None => break,
            }
        }

        Ok(messages)
    }
}

#[async_trait]
impl AgentProvisioner for FoundryClient {
    async fn create_agent(&self, spec: &AgentSpec) -> Result<AgentHandle> {
        let handle: AgentHandle = self
            .send_json(
                self.request(Method::POST, &["assistants"])?.json(spec),
                "create agent",
            )
            .await?;
        debug!(agent_id = %handle.id, name = %spec.name, "agent created");
        Ok(handle)
    }
}
