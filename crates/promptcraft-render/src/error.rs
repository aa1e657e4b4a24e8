//! Error types for placeholder rendering.
//!
//! This module provides [`RenderError`], the error type returned by every
//! [`TemplateRenderer`](crate::TemplateRenderer). It abstracts over the
//! underlying template engine's errors so callers never match on MiniJinja
//! error kinds directly.

use std::fmt;

use thiserror::Error;

use crate::engine::SecurityLevel;

/// The kind of sandboxed capability an expression tried to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    /// A `{{ value | name }}` filter.
    Filter,
    /// An `{% if value is name %}` test.
    Test,
    /// A callable global such as `range(3)`.
    Global,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Capability::Filter => f.write_str("filter"),
            Capability::Test => f.write_str("test"),
            Capability::Global => f.write_str("global"),
        }
    }
}

/// Error type for rendering and variable extraction.
#[derive(Debug, Error)]
pub enum RenderError {
    /// Malformed placeholder or expression syntax.
    #[error("{}", describe_syntax(.message, .line))]
    Syntax {
        message: String,
        line: Option<usize>,
    },

    /// A referenced name has no value at render time.
    #[error("undefined variable '{0}': make sure all required variables are provided")]
    UndefinedVariable(String),

    /// The expression uses a filter, test or global outside the active tier.
    #[error("{kind} '{name}' is not available at security level '{level}'")]
    UnsupportedCapability {
        kind: Capability,
        name: String,
        level: SecurityLevel,
    },

    /// Any other failure raised while evaluating an expression.
    #[error("error evaluating template: {0}")]
    Evaluation(String),

    /// A configuration literal (renderer type, security level) is unknown.
    #[error("{0}")]
    InvalidOption(String),
}

impl RenderError {
    /// Create a syntax error without a line indicator.
    pub fn syntax(message: impl Into<String>) -> Self {
        Self::Syntax {
            message: message.into(),
            line: None,
        }
    }

    /// Create a syntax error pointing at `line` (1-based).
    pub fn syntax_at(message: impl Into<String>, line: usize) -> Self {
        Self::Syntax {
            message: message.into(),
            line: Some(line),
        }
    }
}

fn describe_syntax(message: &str, line: &Option<usize>) -> String {
    match line {
        Some(line) => format!("invalid template syntax at line {}: {}", line, message),
        None => format!("invalid template syntax: {}", message),
    }
}

/// Result type for rendering operations.
pub type Result<T> = std::result::Result<T, RenderError>;

// Unknown filter/test/function errors carry no security level here.
// `JinjaRenderer` intercepts them and attaches its level before falling back
// to this conversion.
impl From<minijinja::Error> for RenderError {
    fn from(err: minijinja::Error) -> Self {
        use minijinja::ErrorKind;

        match err.kind() {
            ErrorKind::SyntaxError | ErrorKind::BadEscape => RenderError::Syntax {
                message: err.detail().unwrap_or("malformed expression").to_string(),
                line: err.line(),
            },
            ErrorKind::UndefinedError => RenderError::UndefinedVariable(
                err.detail().unwrap_or("undefined value").to_string(),
            ),
            ErrorKind::UnknownFilter | ErrorKind::UnknownTest | ErrorKind::UnknownFunction => {
                RenderError::Evaluation(format!("capability not available: {}", err))
            }
            _ => RenderError::Evaluation(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_syntax_display_with_line() {
        let err = RenderError::syntax_at("unexpected end of input", 3);
        assert_eq!(
            err.to_string(),
            "invalid template syntax at line 3: unexpected end of input"
        );
    }

    #[test]
    fn test_syntax_display_without_line() {
        let err = RenderError::syntax("empty placeholder");
        assert!(err.to_string().contains("empty placeholder"));
        assert!(!err.to_string().contains("line"));
    }

    #[test]
    fn test_capability_display_names_filter() {
        let err = RenderError::UnsupportedCapability {
            kind: Capability::Filter,
            name: "replace".into(),
            level: SecurityLevel::Strict,
        };
        assert_eq!(
            err.to_string(),
            "filter 'replace' is not available at security level 'strict'"
        );
    }

    #[test]
    fn test_from_minijinja_syntax_error() {
        let mj_err = minijinja::Error::new(minijinja::ErrorKind::SyntaxError, "unexpected '}'");
        let err: RenderError = mj_err.into();
        assert!(matches!(err, RenderError::Syntax { .. }));
    }

    #[test]
    fn test_from_minijinja_undefined() {
        let mj_err = minijinja::Error::new(minijinja::ErrorKind::UndefinedError, "undefined value");
        let err: RenderError = mj_err.into();
        assert!(matches!(err, RenderError::UndefinedVariable(_)));
    }

    #[test]
    fn test_from_minijinja_other_error() {
        let mj_err = minijinja::Error::new(minijinja::ErrorKind::InvalidOperation, "bad");
        let err: RenderError = mj_err.into();
        assert!(matches!(err, RenderError::Evaluation(_)));
    }
}
