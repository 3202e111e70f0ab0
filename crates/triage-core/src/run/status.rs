use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

// ---------------------------------------------------------------------------
// Normalization
// ---------------------------------------------------------------------------

/// Reduce a raw status to a lowercase bare token.
///
/// Qualified forms such as `"RunStatus.IN_PROGRESS"` lose everything up to
/// the last `.`. Normalizing an already-normalized token is a no-op.
pub fn normalize_status(raw: &str) -> String {
    let bare = match raw.rfind('.') {
        Some(pos) => &raw[pos + 1..],
        None => raw,
    };
    bare.trim().to_lowercase()
}

// ---------------------------------------------------------------------------
// RunStatus
// ---------------------------------------------------------------------------

/// Broad classification of a [`RunStatus`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusCategory {
    /// The run may still change; keep polling.
    Pending,
    /// Terminal and successful.
    Success,
    /// Terminal and unsuccessful.
    Failure,
}

/// Status of a remote run, normalized.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RunStatus {
    Queued,
    InProgress,
    RequiresAction,
    Cancelling,
    Completed,
    Succeeded,
    Failed,
    Canceled,
    /// Any token this crate does not know. Treated as non-terminal.
    Other(String),
}

impl RunStatus {
    /// Normalize and classify a raw status string.
    pub fn parse(raw: &str) -> Self {
        match normalize_status(raw).as_str() {
            "queued" => Self::Queued,
            "in_progress" => Self::InProgress,
            "requires_action" => Self::RequiresAction,
            "cancelling" => Self::Cancelling,
            "completed" => Self::Completed,
            "succeeded" => Self::Succeeded,
            "failed" => Self::Failed,
            "canceled" | "cancelled" => Self::Canceled,
            other => Self::Other(other.to_owned()),
        }
    }

    pub fn category(&self) -> StatusCategory {
        match self {
            Self::Completed | Self::Succeeded => StatusCategory::Success,
            Self::Failed | Self::Canceled => StatusCategory::Failure,
            Self::Queued
            | Self::InProgress
            | Self::RequiresAction
            | Self::Cancelling
            | Self::Other(_) => StatusCategory::Pending,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.category() != StatusCategory::Pending
    }

    pub fn is_success(&self) -> bool {
        self.category() == StatusCategory::Success
    }

    /// The normalized token.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Queued => "queued",
            Self::InProgress => "in_progress",
            Self::RequiresAction => "requires_action",
            Self::Cancelling => "cancelling",
            Self::Completed => "completed",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::Canceled => "canceled",
            Self::Other(token) => token,
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RunStatus {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

impl Serialize for RunStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for RunStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::parse(&raw))
    }
}
