//! # Promptcraft - Validated Prompt Templates
//!
//! Promptcraft defines prompts as templates: plain text or role-tagged chat
//! messages with named placeholders. It provides:
//!
//! - Three placeholder syntaxes (`{name}`, `{{name}}` and sandboxed Jinja),
//!   detected automatically or chosen explicitly
//! - Security tiers bounding what a Jinja template may call
//! - Validation that declared variables match the content, and that
//!   populate calls supply exactly the required variables
//! - Adapters reshaping chat prompts for `openai`, `anthropic` and `google`
//!   style clients
//!
//! Rendering is provided by `promptcraft-render`, whose public API is
//! re-exported here.
//!
//! ## Core Concepts
//!
//! - [`PromptTemplate`]: immutable template with declared variables
//! - [`TemplateContent`]: plain text or a list of [`Message`]s
//! - [`PopulatedPrompt`]: the result of [`PromptTemplate::populate`]
//! - [`ClientFormat`] / [`format_for_client`]: client-specific shapes
//! - [`PromptDocument`]: YAML/JSON interchange form
//!
//! ## Quick Start
//!
//! ```rust
//! use promptcraft::{vars, Message, PromptTemplate};
//!
//! let template = PromptTemplate::new(
//!     vec![
//!         Message::system("You are helpful."),
//!         Message::user("Hello {{name}}"),
//!     ],
//!     ["name"],
//! )
//! .unwrap();
//!
//! let prompt = template.populate(&vars! { "name" => "Bob" }).unwrap();
//! let shaped = prompt.format_for_client("anthropic").unwrap();
//!
//! assert_eq!(
//!     serde_json::to_value(&shaped).unwrap(),
//!     serde_json::json!({
//!         "system": "You are helpful.",
//!         "messages": [{"role": "user", "content": "Hello Bob"}]
//!     })
//! );
//! ```
//!
//! ## Validation
//!
//! Declaring a variable the content never uses, or using one that is not
//! declared, fails at construction:
//!
//! ```rust
//! use promptcraft::{PromptError, PromptTemplate};
//!
//! let err = PromptTemplate::new("Hello {name}", ["name", "age"]).unwrap_err();
//! assert!(matches!(err, PromptError::Alignment { .. }));
//! ```
//!
//! A template that declares no variables is accepted, and populate calls are
//! then checked against the names found in the content. A warning is logged
//! through `tracing` in that case.

mod client;
mod content;
mod document;
mod error;
mod populated;
mod template;
mod validate;

pub use client::{
    format_for_client, ClientFormat, ClientMessages, ContentPart, StructuredContent,
    StructuredContents,
};
pub use content::{Message, MessageContent, Role, TemplateContent};
pub use document::{PromptDocument, PromptSection};
pub use error::{PromptError, Result};
pub use populated::PopulatedPrompt;
pub use template::{PromptTemplate, PromptTemplateBuilder, TemplateOptions};
pub use validate::{check_alignment, check_completeness};

// Re-export the rendering layer.
pub use promptcraft_render::{
    detect_renderer, value_to_string, vars, Capability, DoubleBraceRenderer, JinjaRenderer,
    RenderError, RendererKind, SecurityLevel, SingleBraceRenderer, TemplateRenderer, TierPolicy,
    Variables,
};
