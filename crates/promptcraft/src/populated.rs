//! Populated prompts.

use serde::Serialize;
use serde_json::Value;

use crate::client::{format_for_client, ClientMessages};
use crate::content::{kind_of, message_value, Message};
use crate::error::{PromptError, Result};

/// The result of populating a template.
///
/// Mirrors the template's shape: text for a plain template, messages with
/// every placeholder resolved for a chat template.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum PopulatedPrompt {
    Text(String),
    Messages(Vec<Message>),
}

impl PopulatedPrompt {
    /// Reads an already-populated prompt: a string or a list of
    /// `{role, content}` maps.
    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::String(text) => Ok(PopulatedPrompt::Text(text)),
            Value::Array(items) => items
                .into_iter()
                .map(Message::from_value)
                .collect::<Result<Vec<_>>>()
                .map(PopulatedPrompt::Messages),
            other => Err(PromptError::shape(format!(
                "populated prompt must be a string or a list of messages, got {}",
                kind_of(&other)
            ))),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            PopulatedPrompt::Text(text) => Some(text.as_str()),
            PopulatedPrompt::Messages(_) => None,
        }
    }

    pub fn as_messages(&self) -> Option<&[Message]> {
        match self {
            PopulatedPrompt::Text(_) => None,
            PopulatedPrompt::Messages(messages) => Some(messages.as_slice()),
        }
    }

    pub fn is_chat(&self) -> bool {
        matches!(self, PopulatedPrompt::Messages(_))
    }

    /// Name of the result's shape, as used in error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            PopulatedPrompt::Text(_) => "string",
            PopulatedPrompt::Messages(_) => "messages",
        }
    }

    /// Shapes the messages for `client`. See [`format_for_client`].
    pub fn format_for_client(&self, client: &str) -> Result<ClientMessages> {
        format_for_client(self, client)
    }

    pub fn into_value(self) -> Value {
        match self {
            PopulatedPrompt::Text(text) => Value::String(text),
            PopulatedPrompt::Messages(messages) => {
                Value::Array(messages.iter().map(message_value).collect())
            }
        }
    }
}
