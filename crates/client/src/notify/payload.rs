//! Incoming notification payloads from page messages and push deliveries.
//!
//! Parsing is lenient: anything that is not a usable string is treated as
//! absent and later filled from the configured defaults.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Notification fields as received. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationPayload {
    pub title: Option<String>,
    pub body: Option<String>,
    pub icon: Option<String>,
    pub badge: Option<String>,
    pub image: Option<String>,
    pub tag: Option<String>,
    /// Where a click should take the user.
    pub url: Option<String>,
}

impl NotificationPayload {
    /// Only a body, e.g. from a plain-text push.
    pub fn with_body(body: impl Into<String>) -> Self {
        Self { body: Some(body.into()), ..Default::default() }
    }

    /// Pick known string fields out of a JSON object.
    ///
    /// `click_action` is accepted as an alias for `url`.
    pub fn from_object(object: &Map<String, Value>) -> Self {
        let field = |name: &str| {
            object
                .get(name)
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
        };

        Self {
            title: field("title"),
            body: field("body"),
            icon: field("icon"),
            badge: field("badge"),
            image: field("image"),
            tag: field("tag"),
            url: field("url").or_else(|| field("click_action")),
        }
    }

    /// Parse push data.
    ///
    /// - JSON object: known fields
    /// - JSON string: body
    /// - other UTF-8 text: body
    /// - missing, blank, other JSON, or binary: nothing (all defaults)
    pub fn from_push(data: Option<&[u8]>) -> Self {
        let Some(data) = data else {
            return Self::default();
        };

        match serde_json::from_slice::<Value>(data) {
            Ok(Value::Object(object)) => Self::from_object(&object),
            Ok(Value::String(text)) if !text.trim().is_empty() => Self::with_body(text.trim()),
            Ok(other) => {
                tracing::debug!(kind = json_kind(&other), "push payload is not an object, using defaults");
                Self::default()
            }
            Err(_) => match std::str::from_utf8(data) {
                Ok(text) if !text.trim().is_empty() => Self::with_body(text.trim()),
                Ok(_) => Self::default(),
                Err(_) => {
                    tracing::debug!(len = data.len(), "push payload is not text, using defaults");
                    Self::default()
                }
            },
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// A message posted by a page to the relay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientMessage {
    /// `{"type": "SHOW_NOTIFICATION", "body": ..., "tag": ..., "url": ...}`
    ShowNotification(NotificationPayload),
}

impl ClientMessage {
    pub const SHOW_NOTIFICATION: &'static str = "SHOW_NOTIFICATION";

    /// Recognize a message. Anything without a known `type` is `None`.
    pub fn parse(message: &Value) -> Option<Self> {
        let object = message.as_object()?;
        match object.get("type").and_then(Value::as_str)? {
            Self::SHOW_NOTIFICATION => Some(Self::ShowNotification(NotificationPayload::from_object(object))),
            _ => None,
        }
    }
}
