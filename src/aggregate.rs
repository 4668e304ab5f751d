//! Reconstruction of a chunked agent reply into one answer.
//!
//! The agent service delivers a chat reply as a chunked body that is only
//! meaningful once complete. [`collect_reply`] drains every chunk into one
//! buffer in arrival order and parses it exactly once, after the stream
//! ends. [`select_answer`] then picks the assistant's answer.
//!
//! # Selection
//!
//! The reply is an ordered list of message objects. The answer is the
//! **first** message tagged as assistant output (`role: "assistant"` or
//! `message_type: "assistant_message"`) that carries text. Later assistant
//! entries are ignored.
//!
//! # Errors
//!
//! - Invalid JSON → [`DocsError::ReplyParse`]. The stream cannot be re-read,
//!   so this is final.
//! - Valid JSON with no assistant text → [`DocsError::NoAssistantContent`].
//!   This includes JSON that is not a message list at all, such as an error
//!   object, and list entries that are not message objects.

use bytes::Bytes;
use futures::{Stream, StreamExt};
use serde::Deserialize;
use serde_json::Value;

use crate::error::{DocsError, DocsResult};

/// Message entries of a reply: the `messages` field of an envelope object,
/// or the reply itself when it is a bare array. Any other shape has none.
fn reply_messages(reply: Value) -> Vec<ReplyMessage> {
    let items = match reply {
        Value::Array(items) => items,
        Value::Object(mut envelope) => match envelope.remove("messages") {
            Some(Value::Array(items)) => items,
            _ => return Vec::new(),
        },
        _ => return Vec::new(),
    };
    // Entries that are not message objects are skipped.
    items
        .into_iter()
        .filter_map(|item| serde_json::from_value(item).ok())
        .collect()
}

#[derive(Debug, Deserialize)]
struct ReplyMessage {
    #[serde(default)]
    role: Option<String>,
    #[serde(default)]
    message_type: Option<String>,
    #[serde(default)]
    content: Option<Value>,
}

impl ReplyMessage {
    fn is_assistant(&self) -> bool {
        self.role.as_deref() == Some("assistant")
            || self.message_type.as_deref() == Some("assistant_message")
    }

    /// Text of the message: a plain string, or the concatenated `text`
    /// fields of a list of content parts.
    fn text(&self) -> Option<String> {
        match self.content.as_ref()? {
            Value::String(s) => Some(s.clone()),
            Value::Array(parts) => {
                let text: String = parts
                    .iter()
                    .filter_map(|part| match part {
                        Value::String(s) => Some(s.as_str()),
                        other => other.get("text").and_then(|t| t.as_str()),
                    })
                    .collect();
                if text.is_empty() {
                    None
                } else {
                    Some(text)
                }
            }
            _ => None,
        }
    }
}

/// Drain a reply stream and return the assistant's answer.
pub async fn collect_reply<S>(mut stream: S) -> DocsResult<String>
where
    S: Stream<Item = DocsResult<Bytes>> + Unpin,
{
    let mut buffer: Vec<u8> = Vec::new();
    let mut chunks = 0usize;
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        buffer.extend_from_slice(&chunk);
        chunks += 1;
    }
    tracing::debug!(chunks, bytes = buffer.len(), "agent reply drained");
    select_answer(&buffer)
}

/// Parse a complete reply body and select the first assistant answer.
pub fn select_answer(body: &[u8]) -> DocsResult<String> {
    let reply: Value = serde_json::from_slice(body).map_err(DocsError::ReplyParse)?;
    reply_messages(reply)
        .iter()
        .filter(|message| message.is_assistant())
        .find_map(ReplyMessage::text)
        .ok_or(DocsError::NoAssistantContent)
}
