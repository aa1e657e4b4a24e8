//! Error types for prompt templates.

use std::collections::BTreeSet;

use promptcraft_render::RenderError;

/// Errors raised while building, populating or adapting a prompt template.
#[derive(Debug, thiserror::Error)]
pub enum PromptError {
    /// The renderer failed: bad syntax, an undefined name, or a capability
    /// outside the security tier.
    #[error(transparent)]
    Render(#[from] RenderError),

    /// Declared variables differ from the names the content references.
    #[error("{}", describe_alignment(.undeclared, .unused, .extract))]
    Alignment {
        undeclared: BTreeSet<String>,
        unused: BTreeSet<String>,
        extract: String,
    },

    /// Supplied variables differ from the variables the template requires.
    #[error("{}", describe_completeness(.missing, .unexpected, .required, .provided))]
    Completeness {
        missing: BTreeSet<String>,
        unexpected: BTreeSet<String>,
        required: BTreeSet<String>,
        provided: BTreeSet<String>,
    },

    /// The requested client format is not one of the known adapters.
    #[error(
        "Unsupported client format: {}. Supported formats: {}",
        .requested,
        .supported.join(", ")
    )]
    UnsupportedClient {
        requested: String,
        supported: Vec<&'static str>,
    },

    /// Client formatting was requested for a non-chat result.
    #[error("format_for_client is only applicable to chat prompts, got content of type: {actual}")]
    NotChat { actual: &'static str },

    /// A message role is not one of `system`, `user`, `assistant`.
    #[error("Unsupported role: '{0}'. Must be one of: system, user, assistant")]
    UnsupportedRole(String),

    /// Template content has the wrong structure.
    #[error("Invalid template content: {0}")]
    InvalidShape(String),

    /// A prompt document could not be read or written.
    #[error("Invalid prompt document: {0}")]
    Document(String),
}

impl PromptError {
    /// Create a shape error.
    pub fn shape(msg: impl Into<String>) -> Self {
        Self::InvalidShape(msg.into())
    }
}

impl From<serde_yaml::Error> for PromptError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::Document(err.to_string())
    }
}

impl From<serde_json::Error> for PromptError {
    fn from(err: serde_json::Error) -> Self {
        Self::Document(err.to_string())
    }
}

/// Result type for template operations.
pub type Result<T> = std::result::Result<T, PromptError>;

fn list(names: &BTreeSet<String>) -> String {
    let names: Vec<&str> = names.iter().map(String::as_str).collect();
    format!("[{}]", names.join(", "))
}

fn describe_alignment(
    undeclared: &BTreeSet<String>,
    unused: &BTreeSet<String>,
    extract: &str,
) -> String {
    let mut problems = Vec::new();
    if !undeclared.is_empty() {
        problems.push(format!(
            "undeclared variables in template: {}",
            list(undeclared)
        ));
    }
    if !unused.is_empty() {
        problems.push(format!("declared but unused variables: {}", list(unused)));
    }
    format!(
        "Template variables mismatch: {}. Template: {}",
        problems.join("; "),
        extract
    )
}

fn describe_completeness(
    missing: &BTreeSet<String>,
    unexpected: &BTreeSet<String>,
    required: &BTreeSet<String>,
    provided: &BTreeSet<String>,
) -> String {
    let mut problems = Vec::new();
    if !missing.is_empty() {
        problems.push(format!("missing required variables: {}", list(missing)));
    }
    if !unexpected.is_empty() {
        problems.push(format!("unexpected variables: {}", list(unexpected)));
    }
    format!(
        "Variable mismatch: {}. Required: {}, provided: {}",
        problems.join("; "),
        list(required),
        list(provided)
    )
}
