//! Value types exchanged with the remote agents service.

use serde::{Deserialize, Serialize};

/// Handle to a remote conversation thread.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadHandle {
    pub id: String,
}

/// Handle to a single run of an agent against a thread.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunHandle {
    pub id: String,
}

/// Point-in-time view of a run as reported by the remote service.
///
/// `status` is the raw status string; callers normalize it through
/// [`crate::run::RunStatus::parse`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSnapshot {
    pub id: String,
    pub status: Option<String>,
    pub last_error: Option<RemoteError>,
}

/// Structured error payload attached to a failed run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteError {
    pub code: Option<String>,
    pub message: Option<String>,
}

impl RemoteError {
    pub fn new(code: Option<&str>, message: Option<&str>) -> Self {
        Self {
            code: code.map(str::to_owned),
            message: message.map(str::to_owned),
        }
    }

    /// Build a `RemoteError` from a raw `last_error` JSON payload.
    ///
    /// - objects contribute their `code` and `message` fields (non-string
    ///   values are rendered as JSON text)
    /// - a bare string becomes the message
    /// - `null` yields `None`
    /// - anything else becomes the message as JSON text
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        use serde_json::Value;

        let field = |v: Option<&Value>| -> Option<String> {
            match v? {
                Value::Null => None,
                Value::String(s) => Some(s.clone()),
                other => Some(other.to_string()),
            }
        };

        match value {
            Value::Null => None,
            Value::Object(map) => Some(Self {
                code: field(map.get("code")),
                message: field(map.get("message")),
            }),
            Value::String(s) => Some(Self {
                code: None,
                message: Some(s.clone()),
            }),
            other => Some(Self {
                code: None,
                message: Some(other.to_string()),
            }),
        }
    }

    /// Whether the error signals rate limiting.
    ///
    /// Case-insensitive substring match: `rate_limit` in the code or
    /// `rate limit` in the message.
    pub fn is_rate_limited(&self) -> bool {
        let code = self.code.as_deref().unwrap_or_default().to_lowercase();
        let message = self.message.as_deref().unwrap_or_default().to_lowercase();
        code.contains("rate_limit") || message.contains("rate limit")
    }
}

impl std::fmt::Display for RemoteError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (&self.code, &self.message) {
            (Some(code), Some(message)) => write!(f, "{code}: {message}"),
            (Some(code), None) => f.write_str(code),
            (None, Some(message)) => f.write_str(message),
            (None, None) => f.write_str("unknown error"),
        }
    }
}

/// Author role of a message appended to a thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    User,
    Assistant,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

impl std::fmt::Display for MessageRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One piece of a message's content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentPart {
    Text(String),
    /// Non-text content (images, files, ...) that has no display text.
    Other,
}

/// A message stored on a thread.
///
/// `role` is kept as the remote service reports it because its
/// representation is not stable across service versions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadMessage {
    pub id: String,
    pub role: String,
    pub content: Vec<ContentPart>,
}

impl ThreadMessage {
    /// Convenience constructor for a single-text message.
    pub fn text(id: impl Into<String>, role: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            role: role.into(),
            content: vec![ContentPart::Text(text.into())],
        }
    }

    /// Non-empty text parts, in order.
    pub fn text_parts(&self) -> impl Iterator<Item = &str> {
        self.content.iter().filter_map(|part| match part {
            ContentPart::Text(text) if !text.is_empty() => Some(text.as_str()),
            _ => None,
        })
    }
}

/// A tool attached to an agent at creation time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ToolDefinition {
    /// Lets the agent delegate to another agent.
    ConnectedAgent { connected_agent: ConnectedAgent },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectedAgent {
    pub id: String,
    pub name: String,
    pub description: String,
}

impl ToolDefinition {
    pub fn connected_agent(
        id: impl Into<String>,
        name: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self::ConnectedAgent {
            connected_agent: ConnectedAgent {
                id: id.into(),
                name: name.into(),
                description: description.into(),
            },
        }
    }
}

/// Everything needed to create one agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AgentSpec {
    pub model: String,
    pub name: String,
    pub instructions: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolDefinition>,
}

/// A created agent.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AgentHandle {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
}
