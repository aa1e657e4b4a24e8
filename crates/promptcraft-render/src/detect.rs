//! Renderer auto-detection.
//!
//! Picks the least capable renderer whose syntax markers appear in a
//! template. Markers are checked in a fixed order: expression-language
//! markers first, then simple double-brace placeholders, and single-brace
//! placeholders when neither is present.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::engine::RendererKind;

static JINJA_MARKERS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        // {% statement %}
        r"(?s)\{%.*?%\}",
        // {# comment #}
        r"(?s)\{#.*?#\}",
        // {{ value | filter }}
        r"\{\{[^}]*\|[^}]*\}\}",
        // {{ value.attribute }}
        r"\{\{[^}]*\.[^}]*\}\}",
        // {{ value[key] }}
        r"\{\{[^}]*\[[^}]*\][^}]*\}\}",
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).expect("jinja marker pattern"))
    .collect()
});

static DOUBLE_BRACE_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{\{[^{}|.\[]+\}\}").expect("double brace marker pattern"));

/// Chooses a renderer for the given template strings.
///
/// Every string is scanned; chat templates pass the text of each message
/// (and of nested content items) so that a marker anywhere selects the
/// renderer for the whole template.
///
/// ```rust
/// use promptcraft_render::{detect_renderer, RendererKind};
///
/// assert_eq!(detect_renderer(["Hello {name}"]), RendererKind::SingleBrace);
/// assert_eq!(detect_renderer(["Hello {{name}}"]), RendererKind::DoubleBrace);
/// assert_eq!(detect_renderer(["Hello {{ name|upper }}"]), RendererKind::Jinja);
/// ```
pub fn detect_renderer<'a, I>(texts: I) -> RendererKind
where
    I: IntoIterator<Item = &'a str>,
{
    let mut double_brace = false;
    for text in texts {
        if JINJA_MARKERS.iter().any(|marker| marker.is_match(text)) {
            tracing::debug!(renderer = %RendererKind::Jinja, "detected expression markers");
            return RendererKind::Jinja;
        }
        double_brace = double_brace || DOUBLE_BRACE_MARKER.is_match(text);
    }

    let kind = if double_brace {
        RendererKind::DoubleBrace
    } else {
        RendererKind::SingleBrace
    };
    tracing::debug!(renderer = %kind, "detected placeholder syntax");
    kind
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text_defaults_to_single_brace() {
        assert_eq!(
            detect_renderer(["No placeholders at all"]),
            RendererKind::SingleBrace
        );
        assert_eq!(detect_renderer(Vec::<&str>::new()), RendererKind::SingleBrace);
    }

    #[test]
    fn test_single_brace() {
        assert_eq!(
            detect_renderer(["Hello {name}, how are you?"]),
            RendererKind::SingleBrace
        );
    }

    #[test]
    fn test_double_brace() {
        assert_eq!(
            detect_renderer(["Hello {{name}}, you are {{ age }}"]),
            RendererKind::DoubleBrace
        );
    }

    #[test]
    fn test_statement_block() {
        assert_eq!(
            detect_renderer(["{% if x %}yes{% endif %}"]),
            RendererKind::Jinja
        );
    }

    #[test]
    fn test_comment_block() {
        assert_eq!(
            detect_renderer(["{# note #}Hello {{name}}"]),
            RendererKind::Jinja
        );
    }

    #[test]
    fn test_filter_attribute_and_subscript() {
        assert_eq!(detect_renderer(["{{ name|upper }}"]), RendererKind::Jinja);
        assert_eq!(detect_renderer(["{{ user.name }}"]), RendererKind::Jinja);
        assert_eq!(detect_renderer(["{{ items[0] }}"]), RendererKind::Jinja);
    }

    #[test]
    fn test_markers_do_not_span_blocks() {
        let text = "Total {{count}}. Then {{other}}";
        assert_eq!(detect_renderer([text]), RendererKind::DoubleBrace);
    }

    #[test]
    fn test_any_string_can_upgrade() {
        let texts = ["You are helpful.", "Hello {{name}}", "{% for x in xs %}{{x}}{% endfor %}"];
        assert_eq!(detect_renderer(texts), RendererKind::Jinja);
    }
}
