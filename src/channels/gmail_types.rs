//! Gmail wire types, the normalized `MailRecord`, and body extraction.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::{Deserialize, Serialize};

/// Body placeholder when a message carries no decodable text part.
pub const NO_BODY: &str = "(No body found)";
pub const NO_SUBJECT: &str = "(No Subject)";
pub const UNKNOWN_SENDER: &str = "(Unknown Sender)";
pub const UNKNOWN_DATE: &str = "(Unknown Date)";

/// One fetched email, normalized for the feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MailRecord {
    pub from: String,
    pub subject: String,
    pub date: String,
    /// Raw decoded text, not sanitized.
    pub body: String,
}

impl MailRecord {
    /// Build a record from a full Gmail message.
    pub fn from_message(message: &GmailMessage) -> Self {
        let Some(payload) = message.payload.as_ref() else {
            return Self {
                from: UNKNOWN_SENDER.to_string(),
                subject: NO_SUBJECT.to_string(),
                date: UNKNOWN_DATE.to_string(),
                body: NO_BODY.to_string(),
            };
        };

        Self {
            from: payload.header("From").unwrap_or(UNKNOWN_SENDER).to_string(),
            subject: payload.header("Subject").unwrap_or(NO_SUBJECT).to_string(),
            date: payload.header("Date").unwrap_or(UNKNOWN_DATE).to_string(),
            body: extract_body(payload),
        }
    }
}

// ── Wire types ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagesListResponse {
    #[serde(default)]
    pub messages: Vec<MessageInfo>,
    pub next_page_token: Option<String>,
    pub result_size_estimate: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageInfo {
    pub id: String,
    pub thread_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GmailMessage {
    pub id: String,
    pub thread_id: Option<String>,
    pub snippet: Option<String>,
    pub payload: Option<MessagePart>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagePart {
    pub mime_type: Option<String>,
    #[serde(default)]
    pub headers: Vec<Header>,
    pub body: Option<MessagePartBody>,
    /// `Some` for multipart payloads, even when the list is empty.
    pub parts: Option<Vec<MessagePart>>,
}

impl MessagePart {
    /// First header with exactly this name (case-sensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|h| h.name == name)
            .map(|h| h.value.as_str())
    }

    fn data(&self) -> Option<&str> {
        self.body
            .as_ref()
            .and_then(|b| b.data.as_deref())
            .filter(|d| !d.is_empty())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Header {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagePartBody {
    pub size: Option<u64>,
    pub data: Option<String>,
}

// ── Body extraction ─────────────────────────────────────────────────

/// Extract the plain-text body of a message payload.
///
/// Multipart payloads yield the first `text/plain` part with data. Single-part
/// payloads yield their inline body. Anything else, including undecodable
/// data, yields [`NO_BODY`].
pub fn extract_body(payload: &MessagePart) -> String {
    let decoded = match payload.parts.as_ref() {
        Some(parts) => parts
            .iter()
            .filter(|p| p.mime_type.as_deref() == Some("text/plain"))
            .filter_map(|p| p.data())
            .find_map(decode_base64url),
        None => payload.data().and_then(decode_base64url),
    };
    decoded.unwrap_or_else(|| NO_BODY.to_string())
}

/// Decode a base64url blob (padded or not) into text.
pub fn decode_base64url(data: &str) -> Option<String> {
    match URL_SAFE_NO_PAD.decode(data.trim_end_matches('=')) {
        Ok(bytes) => Some(String::from_utf8_lossy(&bytes).into_owned()),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to decode message body part");
            None
        }
    }
}
