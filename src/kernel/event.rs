use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::TransportError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TurnId(pub Uuid);

impl TurnId {
    pub fn new() -> Self {
        TurnId(Uuid::new_v4())
    }
}

impl Default for TurnId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TurnId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// Presentation hint attached to assistant turns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnKind {
    Explanation,
    Hint,
    Question,
    Warning,
}

/// One entry of the transcript. Immutable once closed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub id: TurnId,
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<TurnKind>,
    pub created_at: DateTime<Utc>,
}

impl Turn {
    pub fn user(content: &str) -> Self {
        Self {
            id: TurnId::new(),
            role: Role::User,
            content: content.to_string(),
            kind: None,
            created_at: Utc::now(),
        }
    }

    pub fn assistant(content: &str, kind: TurnKind) -> Self {
        Self {
            id: TurnId::new(),
            role: Role::Assistant,
            content: content.to_string(),
            kind: Some(kind),
            created_at: Utc::now(),
        }
    }
}

/// Everything that can wake the conversation controller.
#[derive(Debug, Clone)]
pub enum Event {
    /// Text the human submitted.
    UserMessage(String),
    /// Raw bytes read from the open model stream.
    StreamChunk(Bytes),
    /// The transport closed the stream normally.
    StreamEnded,
    /// The request or the stream failed.
    StreamFailed(TransportError),
}

impl Event {
    pub fn user(text: &str) -> Self {
        Event::UserMessage(text.to_string())
    }

    pub fn chunk(bytes: impl Into<Bytes>) -> Self {
        Event::StreamChunk(bytes.into())
    }
}
