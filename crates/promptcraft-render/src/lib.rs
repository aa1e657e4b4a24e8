//! # Promptcraft Render - Placeholder Substitution Engines
//!
//! `promptcraft-render` provides the substitution layer for prompt templates:
//! three interchangeable renderers behind one trait, a sandboxed expression
//! language with security tiers, and auto-detection of which syntax a
//! template uses.
//!
//! This crate is the rendering foundation for the `promptcraft` template
//! library, but can be used on its own wherever text needs placeholders
//! filled from a map of values.
//!
//! ## Core Concepts
//!
//! - [`TemplateRenderer`]: render text and report its placeholder names
//! - [`RendererKind`]: tag selecting one of the three renderers
//! - [`SecurityLevel`]: how much of the expression language is available
//! - [`detect_renderer`]: pick a renderer from the syntax a template uses
//! - [`Variables`]: JSON values keyed by placeholder name (see [`vars!`])
//!
//! ## Quick Start
//!
//! ```rust
//! use promptcraft_render::{vars, RendererKind, SecurityLevel};
//!
//! let renderer = RendererKind::DoubleBrace.build(SecurityLevel::default());
//! let output = renderer
//!     .render("Hello {{name}}!", &vars! { "name" => "Bob" })
//!     .unwrap();
//! assert_eq!(output, "Hello Bob!");
//!
//! let names = renderer.variable_names("{{greeting}}, {{name}}").unwrap();
//! assert_eq!(names.len(), 2);
//! ```
//!
//! ## Security Tiers
//!
//! The Jinja renderer only exposes the filters, tests and globals its tier
//! allows. Using anything else fails before evaluation starts:
//!
//! ```rust
//! use promptcraft_render::{vars, JinjaRenderer, SecurityLevel, TemplateRenderer};
//!
//! let text = "{{ name|replace('o', 'a') }}";
//! let variables = vars! { "name" => "world" };
//!
//! assert!(JinjaRenderer::new(SecurityLevel::Strict).render(text, &variables).is_err());
//! assert_eq!(
//!     JinjaRenderer::new(SecurityLevel::Standard).render(text, &variables).unwrap(),
//!     "warld"
//! );
//! ```

mod detect;
mod engine;
mod error;
mod value;

pub use detect::detect_renderer;
pub use engine::{
    DoubleBraceRenderer, JinjaRenderer, RendererKind, SecurityLevel, SingleBraceRenderer,
    TemplateRenderer, TierPolicy,
};
pub use error::{Capability, RenderError, Result};
pub use value::{value_to_string, Variables};

#[doc(hidden)]
pub mod __private {
    pub use serde_json;
}
