//! Placeholder renderer abstraction.
//!
//! This module defines the [`TemplateRenderer`] trait, which every
//! substitution strategy implements, and the tagged [`RendererKind`] used to
//! select one. Three implementations are provided:
//!
//! | Renderer | Syntax | Logic |
//! |----------|--------|-------|
//! | [`SingleBraceRenderer`] | `{name}` | none |
//! | [`DoubleBraceRenderer`] | `{{name}}` | none |
//! | [`JinjaRenderer`] | `{{ name \| upper }}`, `{% if %}`, `{% for %}` | sandboxed, tiered by [`SecurityLevel`] |
//!
//! Renderers are pure: the same text and variables always produce the same
//! output, and no call mutates the renderer. They are `Send + Sync` and can
//! be shared across threads behind an [`Arc`].

mod brace;
mod jinja;
mod policy;

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::error::{RenderError, Result};
use crate::value::Variables;

pub use brace::{DoubleBraceRenderer, SingleBraceRenderer};
pub use jinja::JinjaRenderer;
pub use policy::{SecurityLevel, TierPolicy};

/// A substitution strategy that can render text and report its placeholders.
pub trait TemplateRenderer: Send + Sync + fmt::Debug {
    /// Substitutes every placeholder in `text` using `variables`.
    ///
    /// Non-string values are coerced to their canonical string form. A
    /// placeholder with no matching variable is an error, never an empty
    /// substitution.
    fn render(&self, text: &str, variables: &Variables) -> Result<String>;

    /// Returns every distinct placeholder name referenced in `text`.
    ///
    /// Names bound locally inside the text (loop variables, `{% set %}`
    /// targets) are not reported.
    fn variable_names(&self, text: &str) -> Result<BTreeSet<String>>;

    /// The tag identifying this strategy.
    fn kind(&self) -> RendererKind;
}

/// The three placeholder syntaxes a template can use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RendererKind {
    /// `{name}` placeholders.
    SingleBrace,
    /// `{{name}}` placeholders.
    DoubleBrace,
    /// Full Jinja expressions.
    Jinja,
}

impl RendererKind {
    /// Every kind, in the order auto-detection prefers them.
    pub const ALL: [RendererKind; 3] = [
        RendererKind::Jinja,
        RendererKind::DoubleBrace,
        RendererKind::SingleBrace,
    ];

    /// The canonical literal for this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            RendererKind::SingleBrace => "single_brace",
            RendererKind::DoubleBrace => "double_brace",
            RendererKind::Jinja => "jinja2",
        }
    }

    /// Instantiates the renderer for this kind.
    ///
    /// `level` only affects [`RendererKind::Jinja`]; the brace renderers have
    /// no capabilities to restrict.
    pub fn build(&self, level: SecurityLevel) -> Arc<dyn TemplateRenderer> {
        match self {
            RendererKind::SingleBrace => Arc::new(SingleBraceRenderer),
            RendererKind::DoubleBrace => Arc::new(DoubleBraceRenderer),
            RendererKind::Jinja => Arc::new(JinjaRenderer::new(level)),
        }
    }
}

impl fmt::Display for RendererKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RendererKind {
    type Err = RenderError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "single_brace" => Ok(RendererKind::SingleBrace),
            "double_brace" => Ok(RendererKind::DoubleBrace),
            "jinja2" | "jinja" => Ok(RendererKind::Jinja),
            other => Err(RenderError::InvalidOption(format!(
                "unknown renderer type: {}. Valid options are: double_brace, single_brace, jinja2",
                other
            ))),
        }
    }
}
