//! Wire envelope exchanged with preview clients.
//!
//! Inbound:
//! ```json
//! {"command": "update", "content": "123", "locale": "de", "webspaceKey": "sulu_io",
//!  "type": "form", "user": 1, "changes": {"title": "New Title"}}
//! ```
//!
//! Outbound:
//! ```json
//! {"command": "changes", "msg": "OK", "content": "123", "changes": {"title": ["New Title"]}}
//! ```

use crate::error::PreviewError;
use crate::key::PreviewKey;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    Start,
    Update,
    Render,
    Changes,
    Stop,
}

impl Command {
    pub fn as_str(&self) -> &'static str {
        match self {
            Command::Start => "start",
            Command::Update => "update",
            Command::Render => "render",
            Command::Changes => "changes",
            Command::Stop => "stop",
        }
    }
}

impl FromStr for Command {
    type Err = MessageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "start" => Ok(Command::Start),
            "update" => Ok(Command::Update),
            "render" => Ok(Command::Render),
            "changes" | "getChanges" => Ok(Command::Changes),
            "stop" => Ok(Command::Stop),
            other => Err(MessageError::UnknownCommand(other.to_string())),
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Client role on a key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Editor sending field changes
    Form,
    /// Viewer receiving rendered fragment changes
    Preview,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InboundMessage {
    pub command: String,

    #[serde(default)]
    pub content: Option<String>,

    #[serde(default, alias = "languageCode")]
    pub locale: Option<String>,

    #[serde(default)]
    pub webspace_key: Option<String>,

    #[serde(default, rename = "type")]
    pub role: Option<Role>,

    /// Numeric or string user id
    #[serde(default)]
    pub user: Option<Value>,

    #[serde(default)]
    pub template_key: Option<String>,

    #[serde(default)]
    pub changes: Option<Map<String, Value>>,

    /// Render command only: omit page chrome
    #[serde(default)]
    pub partial: Option<bool>,
}

impl InboundMessage {
    pub fn parse(raw: &str) -> Result<Self, MessageError> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn command(&self) -> Result<Command, MessageError> {
        self.command.parse()
    }

    pub fn key(&self) -> Result<PreviewKey, MessageError> {
        let user = match &self.user {
            Some(Value::String(user)) if !user.is_empty() => user.clone(),
            Some(Value::Number(user)) => user.to_string(),
            _ => return Err(MessageError::MissingField("user")),
        };
        Ok(PreviewKey {
            user_id: user,
            content_id: required(&self.content, "content")?,
            webspace_key: required(&self.webspace_key, "webspaceKey")?,
            locale: required(&self.locale, "locale")?,
        })
    }
}

fn required(value: &Option<String>, name: &'static str) -> Result<String, MessageError> {
    value
        .as_ref()
        .filter(|v| !v.is_empty())
        .cloned()
        .ok_or(MessageError::MissingField(name))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Status {
    #[serde(rename = "OK")]
    Ok,
    #[serde(rename = "ERROR")]
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboundMessage {
    pub command: String,

    pub msg: Status,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub other: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub changes: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl OutboundMessage {
    pub fn ok(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            msg: Status::Ok,
            other: None,
            content: None,
            changes: None,
            data: None,
        }
    }

    pub fn error(command: impl Into<String>, error: &MessageError) -> Self {
        Self {
            data: Some(serde_json::json!({
                "code": error.code(),
                "message": error.to_string(),
            })),
            msg: Status::Error,
            ..Self::ok(command)
        }
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    pub fn with_other(mut self, other: bool) -> Self {
        self.other = Some(other);
        self
    }

    pub fn with_changes(mut self, changes: Value) -> Self {
        self.changes = Some(changes);
        self
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn is_ok(&self) -> bool {
        self.msg == Status::Ok
    }
}

#[derive(Error, Debug)]
pub enum MessageError {
    #[error("Malformed message: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("Unknown command '{0}'")]
    UnknownCommand(String),

    #[error("Missing field '{0}'")]
    MissingField(&'static str),

    #[error(transparent)]
    Preview(#[from] PreviewError),
}

impl MessageError {
    pub fn code(&self) -> &'static str {
        match self {
            MessageError::Malformed(_) => "malformed",
            MessageError::UnknownCommand(_) => "unknown_command",
            MessageError::MissingField(_) => "missing_field",
            MessageError::Preview(e) => e.code(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_start_message() {
        let message = InboundMessage::parse(
            r#"{"command":"start","content":"123","languageCode":"de","webspaceKey":"sulu_io","type":"form","user":1}"#,
        )
        .unwrap();
        assert_eq!(message.command().unwrap(), Command::Start);
        assert_eq!(message.role, Some(Role::Form));
        assert_eq!(message.key().unwrap(), PreviewKey::new("1", "123", "sulu_io", "de"));
    }

    #[test]
    fn test_missing_key_fields() {
        let message = InboundMessage::parse(r#"{"command":"start","content":"123","user":"u"}"#).unwrap();
        assert!(matches!(message.key(), Err(MessageError::MissingField("webspaceKey"))));
    }

    #[test]
    fn test_unknown_command() {
        let message = InboundMessage::parse(r#"{"command":"explode"}"#).unwrap();
        let err = message.command().unwrap_err();
        assert_eq!(err.code(), "unknown_command");
    }

    #[test]
    fn test_outbound_serialization_skips_empty_fields() {
        let message = OutboundMessage::ok("start").with_other(false).with_content("123");
        assert_eq!(
            serde_json::to_value(&message).unwrap(),
            json!({"command": "start", "msg": "OK", "other": false, "content": "123"})
        );
    }

    #[test]
    fn test_error_message_carries_code() {
        let message = OutboundMessage::error("update", &MessageError::MissingField("user"));
        assert!(!message.is_ok());
        assert_eq!(message.data.unwrap()["code"], "missing_field");
    }
}
