//! Template content shapes.
//!
//! A template is either plain text or an ordered list of role-tagged
//! [`Message`]s. Message content is either a string or a list of content
//! items (JSON maps such as `{"type": "text", "text": "..."}`), which are
//! walked recursively when extracting and substituting placeholders.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{PromptError, Result};

/// The author of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::System, Role::User, Role::Assistant];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = PromptError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "system" => Ok(Role::System),
            "user" => Ok(Role::User),
            "assistant" => Ok(Role::Assistant),
            other => Err(PromptError::UnsupportedRole(other.to_string())),
        }
    }
}

/// The body of a message: plain text or a list of content items.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<Map<String, Value>>),
}

impl MessageContent {
    /// The text, if this content is plain text.
    pub fn text(&self) -> Option<&str> {
        match self {
            MessageContent::Text(text) => Some(text.as_str()),
            MessageContent::Parts(_) => None,
        }
    }

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::String(text) => Ok(MessageContent::Text(text)),
            Value::Array(items) => items
                .into_iter()
                .map(|item| match item {
                    Value::Object(map) => Ok(map),
                    other => Err(PromptError::shape(format!(
                        "content items must be maps, got {}",
                        kind_of(&other)
                    ))),
                })
                .collect::<Result<Vec<_>>>()
                .map(MessageContent::Parts),
            other => Err(PromptError::shape(format!(
                "message content must be a string or a list, got {}",
                kind_of(&other)
            ))),
        }
    }
}

impl From<&str> for MessageContent {
    fn from(text: &str) -> Self {
        MessageContent::Text(text.to_string())
    }
}

impl From<String> for MessageContent {
    fn from(text: String) -> Self {
        MessageContent::Text(text)
    }
}

/// One role-tagged fragment of a chat template.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Message {
    pub role: Role,
    pub content: MessageContent,
}

impl Message {
    pub fn new(role: Role, content: impl Into<MessageContent>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<MessageContent>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<MessageContent>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<MessageContent>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// Reads a `{role, content}` map.
    ///
    /// Keys other than `role` and `content` (a `name`, for instance) are
    /// dropped; the resulting message carries only those two fields.
    ///
    /// A role literal other than `system`, `user` or `assistant` yields
    /// [`PromptError::UnsupportedRole`]; any other structural problem yields
    /// [`PromptError::InvalidShape`].
    pub fn from_value(value: Value) -> Result<Self> {
        let mut map = match value {
            Value::Object(map) => map,
            other => {
                return Err(PromptError::shape(format!(
                    "each message must be a map, got {}",
                    kind_of(&other)
                )))
            }
        };

        let (Some(role), Some(content)) = (map.remove("role"), map.remove("content")) else {
            return Err(PromptError::shape(
                "each message must have 'role' and 'content' keys",
            ));
        };
        let role = match role {
            Value::String(role) => role,
            other => {
                return Err(PromptError::shape(format!(
                    "message role must be a string, got {}",
                    kind_of(&other)
                )))
            }
        };

        Ok(Self {
            role: role.parse()?,
            content: MessageContent::from_value(content)?,
        })
    }
}

/// Raw template content: plain text or chat messages.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum TemplateContent {
    Text(String),
    Messages(Vec<Message>),
}

impl TemplateContent {
    /// Validates and converts a JSON value into template content.
    ///
    /// Strings become [`TemplateContent::Text`]; lists must hold
    /// `{role, content}` maps. Every structural problem, including an
    /// unknown role, is reported as [`PromptError::InvalidShape`].
    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::String(text) => Ok(TemplateContent::Text(text)),
            Value::Array(items) => items
                .into_iter()
                .map(|item| {
                    Message::from_value(item).map_err(|err| match err {
                        PromptError::UnsupportedRole(role) => PromptError::shape(format!(
                            "invalid role '{}'. Must be one of: system, user, assistant",
                            role
                        )),
                        other => other,
                    })
                })
                .collect::<Result<Vec<_>>>()
                .map(TemplateContent::Messages),
            other => Err(PromptError::shape(format!(
                "template must be a string or a list of messages, got {}",
                kind_of(&other)
            ))),
        }
    }

    pub fn is_chat(&self) -> bool {
        matches!(self, TemplateContent::Messages(_))
    }

    /// Every string in the content, including strings nested in content
    /// items, in document order.
    pub fn strings(&self) -> Vec<&str> {
        let mut out = Vec::new();
        match self {
            TemplateContent::Text(text) => out.push(text.as_str()),
            TemplateContent::Messages(messages) => {
                for message in messages {
                    match &message.content {
                        MessageContent::Text(text) => out.push(text.as_str()),
                        MessageContent::Parts(parts) => {
                            for part in parts {
                                for value in part.values() {
                                    collect_strings(value, &mut out);
                                }
                            }
                        }
                    }
                }
            }
        }
        out
    }

    pub fn to_value(&self) -> Value {
        match self {
            TemplateContent::Text(text) => Value::String(text.clone()),
            TemplateContent::Messages(messages) => {
                Value::Array(messages.iter().map(message_value).collect())
            }
        }
    }
}

impl From<&str> for TemplateContent {
    fn from(text: &str) -> Self {
        TemplateContent::Text(text.to_string())
    }
}

impl From<String> for TemplateContent {
    fn from(text: String) -> Self {
        TemplateContent::Text(text)
    }
}

impl From<Vec<Message>> for TemplateContent {
    fn from(messages: Vec<Message>) -> Self {
        TemplateContent::Messages(messages)
    }
}

pub(crate) fn message_value(message: &Message) -> Value {
    let content = match &message.content {
        MessageContent::Text(text) => Value::String(text.clone()),
        MessageContent::Parts(parts) => {
            Value::Array(parts.iter().cloned().map(Value::Object).collect())
        }
    };
    let mut map = Map::new();
    map.insert("role".into(), Value::String(message.role.as_str().into()));
    map.insert("content".into(), content);
    Value::Object(map)
}

fn collect_strings<'a>(value: &'a Value, out: &mut Vec<&'a str>) {
    match value {
        Value::String(text) => out.push(text.as_str()),
        Value::Array(items) => items.iter().for_each(|item| collect_strings(item, out)),
        Value::Object(map) => map.values().for_each(|item| collect_strings(item, out)),
        Value::Null | Value::Bool(_) | Value::Number(_) => {}
    }
}

pub(crate) fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "map",
    }
}
