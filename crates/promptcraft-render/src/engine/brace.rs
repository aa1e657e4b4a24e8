//! Brace-delimited placeholder renderers.
//!
//! [`SingleBraceRenderer`] substitutes `{name}` and [`DoubleBraceRenderer`]
//! substitutes `{{name}}`. Both are plain pattern matchers: there are no
//! loops, conditionals or filters, and whitespace inside the delimiters is
//! ignored (`{ name }` and `{name}` are the same placeholder).
//!
//! Unlike a format string, a missing variable is an error rather than being
//! left in place, and a placeholder that opens another placeholder before
//! closing (`{outer{inner}}`) is rejected as a syntax error.
//!
//! # Example
//!
//! ```rust
//! use promptcraft_render::{vars, SingleBraceRenderer, TemplateRenderer};
//!
//! let renderer = SingleBraceRenderer;
//! let output = renderer
//!     .render("Hello {name}, how are you?", &vars! { "name" => "Alice" })
//!     .unwrap();
//! assert_eq!(output, "Hello Alice, how are you?");
//! ```

use std::collections::BTreeSet;

use once_cell::sync::Lazy;
use regex::Regex;

use super::{RendererKind, TemplateRenderer};
use crate::error::{RenderError, Result};
use crate::value::{value_to_string, Variables};

struct BraceSyntax {
    placeholder: Regex,
    nested: Regex,
    example: &'static str,
}

static SINGLE: Lazy<BraceSyntax> = Lazy::new(|| BraceSyntax {
    placeholder: Regex::new(r"\{([^{}]+)\}").expect("single brace pattern"),
    nested: Regex::new(r"\{[^{}]*\{").expect("single brace nesting pattern"),
    example: "{name}",
});

static DOUBLE: Lazy<BraceSyntax> = Lazy::new(|| BraceSyntax {
    placeholder: Regex::new(r"\{\{([^{}]+)\}\}").expect("double brace pattern"),
    nested: Regex::new(r"\{\{[^{}]*\{\{").expect("double brace nesting pattern"),
    example: "{{name}}",
});

impl BraceSyntax {
    fn check_nesting(&self, text: &str) -> Result<()> {
        match self.nested.find(text) {
            Some(m) => Err(RenderError::syntax_at(
                format!(
                    "nested placeholder delimiters are not supported near '{}'; use {} placeholders",
                    m.as_str(),
                    self.example
                ),
                line_of(text, m.start()),
            )),
            None => Ok(()),
        }
    }

    fn names(&self, text: &str) -> Result<BTreeSet<String>> {
        self.check_nesting(text)?;
        let mut names = BTreeSet::new();
        for caps in self.placeholder.captures_iter(text) {
            let Some(raw) = caps.get(1) else { continue };
            names.insert(self.placeholder_name(text, raw)?.to_string());
        }
        Ok(names)
    }

    fn render(&self, text: &str, variables: &Variables) -> Result<String> {
        self.check_nesting(text)?;

        let mut output = String::with_capacity(text.len());
        let mut last = 0;
        for caps in self.placeholder.captures_iter(text) {
            let (Some(whole), Some(raw)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            let name = self.placeholder_name(text, raw)?;
            let value = variables
                .get(name)
                .ok_or_else(|| RenderError::UndefinedVariable(name.to_string()))?;

            output.push_str(&text[last..whole.start()]);
            output.push_str(&value_to_string(value));
            last = whole.end();
        }
        output.push_str(&text[last..]);

        Ok(output)
    }

    fn placeholder_name<'t>(&self, text: &str, raw: regex::Match<'t>) -> Result<&'t str> {
        let name = raw.as_str().trim();
        if name.is_empty() {
            return Err(RenderError::syntax_at(
                format!("empty placeholder; expected {}", self.example),
                line_of(text, raw.start()),
            ));
        }
        Ok(name)
    }
}

fn line_of(text: &str, offset: usize) -> usize {
    text[..offset].matches('\n').count() + 1
}

/// Renders `{name}` placeholders.
#[derive(Debug, Clone, Copy, Default)]
pub struct SingleBraceRenderer;

impl TemplateRenderer for SingleBraceRenderer {
    fn render(&self, text: &str, variables: &Variables) -> Result<String> {
        SINGLE.render(text, variables)
    }

    fn variable_names(&self, text: &str) -> Result<BTreeSet<String>> {
        SINGLE.names(text)
    }

    fn kind(&self) -> RendererKind {
        RendererKind::SingleBrace
    }
}

/// Renders `{{name}}` placeholders.
///
/// Single braces are literal text to this renderer, which makes it the
/// natural choice for prompts that contain JSON examples.
#[derive(Debug, Clone, Copy, Default)]
pub struct DoubleBraceRenderer;

impl TemplateRenderer for DoubleBraceRenderer {
    fn render(&self, text: &str, variables: &Variables) -> Result<String> {
        DOUBLE.render(text, variables)
    }

    fn variable_names(&self, text: &str) -> Result<BTreeSet<String>> {
        DOUBLE.names(text)
    }

    fn kind(&self) -> RendererKind {
        RendererKind::DoubleBrace
    }
}
