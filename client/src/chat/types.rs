use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Kind of a chat message.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    #[default]
    Text,
    System,
}

impl std::str::FromStr for MessageKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(MessageKind::Text),
            "system" => Ok(MessageKind::System),
            _ => Err(()),
        }
    }
}

/// A chat message in canonical form.
///
/// Held only in the active conversation's in-memory sequence; nothing is
/// persisted across reconnects.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: String,
    pub content: String,
    pub sender_id: String,
    pub sender_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_user_id: Option<String>,
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "type")]
    pub kind: MessageKind,
}

impl ChatMessage {
    /// Normalizes an inbound text frame into the canonical message shape.
    ///
    /// The far end is not consistent about field names, so the common
    /// variants are accepted (`content`/`message`, `senderId`/`from`,
    /// `senderName`/`fromName`, `targetUserId`/`to`) and missing
    /// id/timestamp/type are defaulted locally. Returns `None` for frames
    /// that are not a JSON object.
    pub fn from_frame(text: &str) -> Option<Self> {
        let value: Value = serde_json::from_str(text).ok()?;
        let frame = value.as_object()?;

        let field = |names: &[&str]| -> Option<String> {
            names
                .iter()
                .find_map(|name| frame.get(*name).and_then(Value::as_str))
                .map(str::to_owned)
        };

        Some(Self {
            id: field(&["id"]).unwrap_or_else(|| Uuid::new_v4().to_string()),
            content: field(&["content", "message"]).unwrap_or_default(),
            sender_id: field(&["senderId", "from"]).unwrap_or_default(),
            sender_name: field(&["senderName", "fromName"]).unwrap_or_else(|| "Unknown".to_string()),
            target_user_id: field(&["targetUserId", "to"]),
            timestamp: field(&["timestamp"])
                .and_then(|raw| raw.parse().ok())
                .unwrap_or_else(Utc::now),
            kind: field(&["type"])
                .and_then(|raw| raw.parse().ok())
                .unwrap_or_default(),
        })
    }
}

/// An outbound message before the transport stamps id and timestamp.
#[derive(Clone, Debug, PartialEq)]
pub struct MessageDraft {
    pub content: String,
    pub sender_id: String,
    pub sender_name: String,
    pub target_user_id: Option<String>,
    pub kind: MessageKind,
}

impl MessageDraft {
    pub fn text(
        content: impl Into<String>,
        sender_id: impl Into<String>,
        sender_name: impl Into<String>,
        target_user_id: impl Into<String>,
    ) -> Self {
        Self {
            content: content.into(),
            sender_id: sender_id.into(),
            sender_name: sender_name.into(),
            target_user_id: Some(target_user_id.into()),
            kind: MessageKind::Text,
        }
    }

    /// Stamps a client-generated id and the current timestamp.
    pub(crate) fn into_message(self) -> ChatMessage {
        ChatMessage {
            id: Uuid::new_v4().to_string(),
            content: self.content,
            sender_id: self.sender_id,
            sender_name: self.sender_name,
            target_user_id: self.target_user_id,
            timestamp: Utc::now(),
            kind: self.kind,
        }
    }
}

/// Snapshot of the transport's connection state.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ConnectionState {
    /// A connection attempt or a scheduled reconnect is pending
    pub attempting: bool,
    /// The socket is open
    pub open: bool,
    /// Reconnect attempts consumed since the last explicit connect
    pub reconnect_attempts: u32,
    pub last_error: Option<String>,
}
