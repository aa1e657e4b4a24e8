//! Client message adapters.
//!
//! A populated chat prompt is a list of `{role, content}` messages. Each
//! [`ClientFormat`] reshapes that list into what a particular chat API
//! expects:
//!
//! | Client | Shape |
//! |--------|-------|
//! | `openai` | the message list unchanged |
//! | `anthropic` | `{system, messages}` with system messages split out |
//! | `google` | `{system_instruction, contents}` with role-tagged parts |
//!
//! Adapters are pure functions of the messages.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::content::{Message, MessageContent, Role};
use crate::error::{PromptError, Result};
use crate::populated::PopulatedPrompt;

/// A supported client message format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClientFormat {
    /// Pass-through role/content list.
    OpenAi,
    /// System prompt split from the conversation.
    Anthropic,
    /// System instruction plus role-tagged content parts.
    Google,
}

impl ClientFormat {
    pub const ALL: [ClientFormat; 3] = [
        ClientFormat::OpenAi,
        ClientFormat::Anthropic,
        ClientFormat::Google,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ClientFormat::OpenAi => "openai",
            ClientFormat::Anthropic => "anthropic",
            ClientFormat::Google => "google",
        }
    }

    pub fn names() -> Vec<&'static str> {
        Self::ALL.iter().map(ClientFormat::as_str).collect()
    }

    /// Reshapes `messages` for this client.
    pub fn format(&self, messages: &[Message]) -> ClientMessages {
        match self {
            ClientFormat::OpenAi => ClientMessages::Messages(messages.to_vec()),
            ClientFormat::Anthropic => split_system(messages),
            ClientFormat::Google => structure(messages),
        }
    }
}

impl fmt::Display for ClientFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ClientFormat {
    type Err = PromptError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|format| format.as_str() == s)
            .ok_or_else(|| PromptError::UnsupportedClient {
                requested: s.to_string(),
                supported: Self::names(),
            })
    }
}

/// Messages shaped for one client. Serializes to the client's wire shape.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ClientMessages {
    Messages(Vec<Message>),
    SystemSplit {
        system: Option<MessageContent>,
        messages: Vec<Message>,
    },
    Structured {
        system_instruction: Option<String>,
        contents: StructuredContents,
    },
}

/// The `contents` field of the structured shape.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum StructuredContents {
    /// A lone text part, collapsed to its string.
    Text(String),
    Contents(Vec<StructuredContent>),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StructuredContent {
    pub role: &'static str,
    pub parts: Vec<ContentPart>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ContentPart {
    Text { text: String },
    /// A non-text content item, passed through unchanged.
    Opaque(Map<String, Value>),
}

/// Shapes a populated prompt for `client`.
///
/// Only chat prompts can be formatted; a text prompt fails with
/// [`PromptError::NotChat`] whatever the client. An unknown client name
/// fails with [`PromptError::UnsupportedClient`] listing the known ones.
pub fn format_for_client(prompt: &PopulatedPrompt, client: &str) -> Result<ClientMessages> {
    let PopulatedPrompt::Messages(messages) = prompt else {
        return Err(PromptError::NotChat {
            actual: prompt.kind_name(),
        });
    };
    let format: ClientFormat = client.parse()?;
    Ok(format.format(messages))
}

fn split_system(messages: &[Message]) -> ClientMessages {
    let system = messages
        .iter()
        .find(|m| m.role == Role::System)
        .map(|m| m.content.clone());
    let messages = messages
        .iter()
        .filter(|m| m.role != Role::System)
        .cloned()
        .collect();
    ClientMessages::SystemSplit { system, messages }
}

fn structure(messages: &[Message]) -> ClientMessages {
    let mut system = Vec::new();
    let mut contents = Vec::new();

    for message in messages {
        let role = match message.role {
            Role::System => {
                system.push(plain_text(&message.content));
                continue;
            }
            Role::User => "user",
            Role::Assistant => "model",
        };
        contents.push(StructuredContent {
            role,
            parts: parts_of(&message.content),
        });
    }

    let system_instruction = (!system.is_empty()).then(|| system.join("\n\n"));

    let single_text = match contents.as_slice() {
        [only] => match only.parts.as_slice() {
            [ContentPart::Text { text }] => Some(text.clone()),
            _ => None,
        },
        _ => None,
    };
    let contents = match single_text {
        Some(text) => StructuredContents::Text(text),
        None => StructuredContents::Contents(contents),
    };

    ClientMessages::Structured {
        system_instruction,
        contents,
    }
}

fn parts_of(content: &MessageContent) -> Vec<ContentPart> {
    match content {
        MessageContent::Text(text) => vec![ContentPart::Text { text: text.clone() }],
        MessageContent::Parts(items) => items
            .iter()
            .map(|item| match text_item(item) {
                Some(text) => ContentPart::Text {
                    text: text.to_string(),
                },
                None => ContentPart::Opaque(item.clone()),
            })
            .collect(),
    }
}

fn plain_text(content: &MessageContent) -> String {
    match content {
        MessageContent::Text(text) => text.clone(),
        MessageContent::Parts(items) => items
            .iter()
            .filter_map(text_item)
            .collect::<Vec<_>>()
            .join("\n"),
    }
}

// `{"type": "text", "text": "..."}`
fn text_item(item: &Map<String, Value>) -> Option<&str> {
    match (item.get("type"), item.get("text")) {
        (Some(Value::String(kind)), Some(Value::String(text))) if kind == "text" => {
            Some(text.as_str())
        }
        _ => None,
    }
}
