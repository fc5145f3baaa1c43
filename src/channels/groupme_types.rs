//! GroupMe wire types and the normalized group/message shapes served by the API.

use serde::{Deserialize, Serialize};

// ── Normalized types ────────────────────────────────────────────────

/// A group as listed in the sidebar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupSummary {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

/// Full group metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupInfo {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    pub members_count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_message_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_message_at: Option<i64>,
}

/// One message posted in a group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    pub sender: String,
    pub text: String,
    /// Unix seconds.
    pub timestamp: i64,
    /// Provider attachment objects (`{"type": "image", "url": ...}` etc.), passed through.
    pub attachments: Vec<serde_json::Value>,
}

/// Messages fetched for one group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupMessages {
    pub group_id: String,
    pub group_name: String,
    pub unread_count: usize,
    pub messages: Vec<ChatMessage>,
}

impl GroupMessages {
    pub fn new(group_id: impl Into<String>, group_name: impl Into<String>, messages: Vec<ChatMessage>) -> Self {
        Self {
            group_id: group_id.into(),
            group_name: group_name.into(),
            unread_count: messages.len(),
            messages,
        }
    }

    /// Id of the most recently created message, if any.
    ///
    /// GroupMe returns newest-first normally but oldest-first with `since_id`,
    /// so position alone is not reliable. Ties go to the later entry.
    pub fn newest_message_id(&self) -> Option<&str> {
        self.messages
            .iter()
            .enumerate()
            .max_by_key(|(i, m)| (m.timestamp, *i))
            .map(|(_, m)| m.id.as_str())
    }
}

// ── Wire types ──────────────────────────────────────────────────────

/// Every GroupMe v3 response wraps its payload in `response`.
#[derive(Debug, Deserialize)]
pub struct Envelope<T> {
    pub response: Option<T>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawGroup {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub created_at: Option<i64>,
    pub updated_at: Option<i64>,
    #[serde(default)]
    pub members: Vec<serde_json::Value>,
    pub messages: Option<RawGroupMessagesPreview>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawGroupMessagesPreview {
    pub last_message_id: Option<String>,
    pub last_message_created_at: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawMessagesPage {
    #[serde(default)]
    pub messages: Vec<RawMessage>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawMessage {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub text: Option<String>,
    #[serde(default)]
    pub created_at: i64,
    #[serde(default)]
    pub attachments: Vec<serde_json::Value>,
}

impl From<RawGroup> for GroupSummary {
    fn from(g: RawGroup) -> Self {
        Self {
            id: g.id,
            name: g.name,
            image_url: g.image_url,
        }
    }
}

impl From<RawGroup> for GroupInfo {
    fn from(g: RawGroup) -> Self {
        let (last_message_id, last_message_at) = g
            .messages
            .map(|m| (m.last_message_id, m.last_message_created_at))
            .unwrap_or_default();
        Self {
            id: g.id,
            name: g.name,
            description: g.description.filter(|d| !d.is_empty()),
            image_url: g.image_url,
            members_count: g.members.len(),
            created_at: g.created_at,
            updated_at: g.updated_at,
            last_message_id,
            last_message_at,
        }
    }
}

impl From<RawMessage> for ChatMessage {
    fn from(m: RawMessage) -> Self {
        Self {
            id: m.id,
            sender: m.name,
            text: m.text.unwrap_or_default(),
            timestamp: m.created_at,
            attachments: m.attachments,
        }
    }
}
