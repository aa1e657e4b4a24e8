//! Sandboxed Jinja renderer.
//!
//! [`JinjaRenderer`] evaluates templates with MiniJinja inside an environment
//! scoped to a [`SecurityLevel`]. The environment is built once, at
//! construction, from the level's [`TierPolicy`](super::TierPolicy) and is
//! never changed afterwards.
//!
//! Before evaluation the source is scanned for filter, test and global
//! usages. Anything outside the tier fails with
//! [`RenderError::UnsupportedCapability`] naming the capability, so a
//! disallowed call never runs partially. Undefined names are always errors:
//! the environment uses strict undefined semantics.
//!
//! # Example
//!
//! ```rust
//! use promptcraft_render::{vars, JinjaRenderer, RenderError, SecurityLevel, TemplateRenderer};
//!
//! let strict = JinjaRenderer::new(SecurityLevel::Strict);
//! let output = strict
//!     .render("Hello {{ name|upper }}!", &vars! { "name" => "world" })
//!     .unwrap();
//! assert_eq!(output, "Hello WORLD!");
//!
//! let err = strict
//!     .render("Hello {{ name|replace('o', 'a') }}!", &vars! { "name" => "world" })
//!     .unwrap_err();
//! assert!(matches!(err, RenderError::UnsupportedCapability { .. }));
//! ```

use std::collections::BTreeSet;
use std::fmt;
use std::num::NonZeroUsize;
use std::sync::Mutex;

use lru::LruCache;
use minijinja::{Environment, ErrorKind, Value};
use once_cell::sync::Lazy;
use regex::Regex;

use super::policy::{build_environment, SecurityLevel};
use super::{RendererKind, TemplateRenderer};
use crate::error::{Capability, RenderError, Result};
use crate::value::Variables;

/// Jinja expression renderer bound to one security tier.
pub struct JinjaRenderer {
    level: SecurityLevel,
    env: Environment<'static>,
    names_cache: Option<Mutex<LruCache<String, BTreeSet<String>>>>,
}

impl JinjaRenderer {
    /// Creates a renderer whose environment allows only what `level` permits.
    pub fn new(level: SecurityLevel) -> Self {
        let policy = level.policy();
        let names_cache =
            NonZeroUsize::new(policy.cache_capacity).map(|cap| Mutex::new(LruCache::new(cap)));

        tracing::debug!(
            level = %level,
            autoescape = policy.autoescape,
            cache_capacity = policy.cache_capacity,
            "building jinja environment"
        );

        Self {
            level,
            env: build_environment(level),
            names_cache,
        }
    }

    /// The tier this renderer was built for.
    pub fn security_level(&self) -> SecurityLevel {
        self.level
    }

    /// Fails if `text` uses a filter, test or global outside this tier.
    pub fn check_capabilities(&self, text: &str) -> Result<()> {
        let policy = self.level.policy();
        if !policy.is_restricted() {
            return Ok(());
        }

        for usage in scan_capabilities(text) {
            let allowed = match usage.kind {
                Capability::Filter => policy.allows_filter(&usage.name),
                Capability::Test => policy.allows_test(&usage.name),
                Capability::Global => policy.allows_global(&usage.name),
            };
            if !allowed {
                return Err(RenderError::UnsupportedCapability {
                    kind: usage.kind,
                    name: usage.name,
                    level: self.level,
                });
            }
        }
        Ok(())
    }

    fn parse_names(&self, text: &str) -> Result<BTreeSet<String>> {
        let template = self
            .env
            .template_from_str(text)
            .map_err(|err| self.convert_error(err))?;
        let globals = self.level.policy().global_names();
        let called: BTreeSet<String> = scan_capabilities(text)
            .into_iter()
            .filter(|usage| usage.kind == Capability::Global)
            .map(|usage| usage.name)
            .collect();

        // A global only counts as one where it is called; `{{ debug }}` is
        // still a variable.
        Ok(template
            .undeclared_variables(false)
            .into_iter()
            .filter(|name| !(globals.contains(&name.as_str()) && called.contains(name)))
            .collect())
    }

    // MiniJinja does not report which name was undefined; recover it from
    // the referenced names so the error points at the missing variable.
    fn name_undefined(
        &self,
        text: &str,
        variables: &Variables,
        err: minijinja::Error,
    ) -> RenderError {
        let missing = self.variable_names(text).ok().and_then(|names| {
            names
                .into_iter()
                .find(|name| !variables.contains_key(name))
        });
        match missing {
            Some(name) => RenderError::UndefinedVariable(name),
            None => err.into(),
        }
    }

    fn convert_error(&self, err: minijinja::Error) -> RenderError {
        let kind = match err.kind() {
            ErrorKind::UnknownFilter => Capability::Filter,
            ErrorKind::UnknownTest => Capability::Test,
            ErrorKind::UnknownFunction => Capability::Global,
            _ => return err.into(),
        };
        RenderError::UnsupportedCapability {
            kind,
            name: err.detail().unwrap_or("unknown").to_string(),
            level: self.level,
        }
    }
}

impl fmt::Debug for JinjaRenderer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JinjaRenderer")
            .field("level", &self.level)
            .field("cached", &self.names_cache.is_some())
            .finish()
    }
}

impl TemplateRenderer for JinjaRenderer {
    fn render(&self, text: &str, variables: &Variables) -> Result<String> {
        self.check_capabilities(text)?;

        let template = self
            .env
            .template_from_str(text)
            .map_err(|err| self.convert_error(err))?;
        template
            .render(Value::from_serialize(variables))
            .map_err(|err| match err.kind() {
                ErrorKind::UndefinedError => self.name_undefined(text, variables, err),
                _ => self.convert_error(err),
            })
    }

    fn variable_names(&self, text: &str) -> Result<BTreeSet<String>> {
        let Some(cache) = &self.names_cache else {
            return self.parse_names(text);
        };

        if let Ok(mut cache) = cache.lock() {
            if let Some(names) = cache.get(text) {
                return Ok(names.clone());
            }
        }

        let names = self.parse_names(text)?;
        if let Ok(mut cache) = cache.lock() {
            cache.put(text.to_string(), names.clone());
        }
        Ok(names)
    }

    fn kind(&self) -> RendererKind {
        RendererKind::Jinja
    }
}

#[derive(Debug, PartialEq, Eq)]
struct CapabilityUse {
    kind: Capability,
    name: String,
}

static EXPRESSION_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)\{\{.*?\}\}|\{%.*?%\}").expect("expression block pattern"));
static STRING_LITERAL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#""(?:[^"\\]|\\.)*"|'(?:[^'\\]|\\.)*'"#).expect("string literal pattern")
});
static FILTER_USE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\|\s*([A-Za-z_][A-Za-z0-9_]*)").expect("filter pattern"));
static FILTER_BLOCK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\{%-?\s*filter\s+([A-Za-z_][A-Za-z0-9_]*)").expect("filter block pattern")
});
static TEST_USE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\bis\s+(?:not\s+)?([A-Za-z_][A-Za-z0-9_]*)").expect("test pattern")
});
static CALL_USE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:^|[^.\w])([A-Za-z_][A-Za-z0-9_]*)\s*\(").expect("call pattern")
});
static MACRO_DEF: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\{%-?\s*macro\s+([A-Za-z_][A-Za-z0-9_]*)").expect("macro pattern")
});

// Identifiers that may precede `(` without being a global call.
const NOT_CALLS: &[&str] = &[
    "if", "elif", "else", "in", "not", "and", "or", "is", "for", "macro", "call", "set", "with",
    "caller", "super", "loop", "varargs", "kwargs",
];

/// Lists every filter, test and callable global referenced inside the
/// expression blocks of `text`, in order of appearance.
fn scan_capabilities(text: &str) -> Vec<CapabilityUse> {
    let macros: BTreeSet<&str> = MACRO_DEF
        .captures_iter(text)
        .filter_map(|caps| caps.get(1).map(|m| m.as_str()))
        .collect();

    let mut found = Vec::new();
    for block in EXPRESSION_BLOCK.find_iter(text) {
        let block = STRING_LITERAL.replace_all(block.as_str(), "\"\"");

        if let Some(name) = FILTER_BLOCK.captures(&block).and_then(|caps| caps.get(1)) {
            found.push(CapabilityUse {
                kind: Capability::Filter,
                name: name.as_str().to_string(),
            });
        }
        for caps in FILTER_USE.captures_iter(&block) {
            if let Some(name) = caps.get(1) {
                found.push(CapabilityUse {
                    kind: Capability::Filter,
                    name: name.as_str().to_string(),
                });
            }
        }
        for caps in TEST_USE.captures_iter(&block) {
            if let Some(name) = caps.get(1) {
                found.push(CapabilityUse {
                    kind: Capability::Test,
                    name: name.as_str().to_string(),
                });
            }
        }

        // Drop filter and test names but keep the operator, so an argument
        // list is never read as a call of the preceding identifier.
        let block = FILTER_BLOCK.replace(&block, "");
        let block = FILTER_USE.replace_all(&block, "|");
        let block = TEST_USE.replace_all(&block, "is ");
        for caps in CALL_USE.captures_iter(&block) {
            let Some(name) = caps.get(1).map(|m| m.as_str()) else {
                continue;
            };
            if NOT_CALLS.contains(&name) || macros.contains(name) {
                continue;
            }
            found.push(CapabilityUse {
                kind: Capability::Global,
                name: name.to_string(),
            });
        }
    }
    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vars;

    fn names(list: &[&str]) -> BTreeSet<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_basic_render() {
        let renderer = JinjaRenderer::new(SecurityLevel::Standard);
        let output = renderer
            .render("Hello {{name}}!", &vars! { "name" => "world" })
            .unwrap();
        assert_eq!(output, "Hello world!");
    }

    #[test]
    fn test_strict_allows_case_filters() {
        let renderer = JinjaRenderer::new(SecurityLevel::Strict);
        let output = renderer
            .render("Hello {{ name|upper }}!", &vars! { "name" => "world" })
            .unwrap();
        assert_eq!(output, "Hello WORLD!");
    }

    #[test]
    fn test_strict_rejects_replace() {
        let renderer = JinjaRenderer::new(SecurityLevel::Strict);
        let err = renderer
            .render(
                "Hello {{ name|replace('o', 'a') }}!",
                &vars! { "name" => "world" },
            )
            .unwrap_err();
        match err {
            RenderError::UnsupportedCapability { kind, name, level } => {
                assert_eq!(kind, Capability::Filter);
                assert_eq!(name, "replace");
                assert_eq!(level, SecurityLevel::Strict);
            }
            other => panic!("expected capability error, got {:?}", other),
        }
    }

    #[test]
    fn test_standard_allows_replace_and_globals() {
        let renderer = JinjaRenderer::new(SecurityLevel::Standard);
        let output = renderer
            .render(
                "Hello {{ name|replace('o', 'a')|title }}!",
                &vars! { "name" => "world" },
            )
            .unwrap();
        assert_eq!(output, "Hello Warld!");

        let output = renderer
            .render("Count: {{ range(3)|join(', ') }}", &Variables::new())
            .unwrap();
        assert_eq!(output, "Count: 0, 1, 2");
    }

    #[test]
    fn test_standard_rejects_unlisted_filter() {
        let renderer = JinjaRenderer::new(SecurityLevel::Standard);
        let err = renderer
            .render("{{ items|tojson }}", &vars! { "items" => vec![1] })
            .unwrap_err();
        assert!(err.to_string().contains("filter 'tojson'"));
    }

    #[test]
    fn test_strict_rejects_globals() {
        let renderer = JinjaRenderer::new(SecurityLevel::Strict);
        let err = renderer
            .check_capabilities("{% for i in range(3) %}{{ i }}{% endfor %}")
            .unwrap_err();
        assert!(matches!(
            err,
            RenderError::UnsupportedCapability {
                kind: Capability::Global,
                ..
            }
        ));
    }

    #[test]
    fn test_strict_rejects_unlisted_test() {
        let renderer = JinjaRenderer::new(SecurityLevel::Strict);
        assert!(renderer
            .check_capabilities("{% if x is defined %}{{ x }}{% endif %}")
            .is_ok());
        let err = renderer
            .check_capabilities("{% if x is number %}{{ x }}{% endif %}")
            .unwrap_err();
        assert!(err.to_string().contains("test 'number'"));
    }

    #[test]
    fn test_relaxed_template_features() {
        let renderer = JinjaRenderer::new(SecurityLevel::Relaxed);
        let template = "{% set greeting = 'Hello' %}\n{{ greeting }} {{ name|title }}!\n{% for i in range(count) %}\nItem {{ i + 1 }}\n{% endfor %}\n";
        let output = renderer
            .render(template, &vars! { "name" => "world", "count" => 2 })
            .unwrap();
        assert!(output.contains("Hello World!"));
        assert!(output.contains("Item 1"));
        assert!(output.contains("Item 2"));
    }

    #[test]
    fn test_syntax_error_has_line() {
        let renderer = JinjaRenderer::new(SecurityLevel::Standard);
        let err = renderer
            .render("Hello {{name!", &vars! { "name" => "world" })
            .unwrap_err();
        assert!(matches!(err, RenderError::Syntax { line: Some(1), .. }));
        assert!(err.to_string().contains("invalid template syntax"));
    }

    #[test]
    fn test_undefined_variable_is_named() {
        let renderer = JinjaRenderer::new(SecurityLevel::Standard);
        let err = renderer
            .render("Hello {{name}}!", &Variables::new())
            .unwrap_err();
        assert!(matches!(err, RenderError::UndefinedVariable(ref n) if n == "name"));
    }

    #[test]
    fn test_defined_test_tolerates_missing_name() {
        let renderer = JinjaRenderer::new(SecurityLevel::Strict);
        let output = renderer
            .render(
                "{% if x is defined %}{{ x }}{% else %}none{% endif %}",
                &Variables::new(),
            )
            .unwrap();
        assert_eq!(output, "none");
    }

    #[test]
    fn test_variable_names_skip_local_bindings() {
        let renderer = JinjaRenderer::new(SecurityLevel::Standard);
        let template = "{% set local = 'value' %}\nHello {{name}}, you are {{age}} years old.\n{% if show_extra %}\nExtra info: {{extra}}\n{% endif %}\n{% for item in items %}{{ item }}{% endfor %}";
        assert_eq!(
            renderer.variable_names(template).unwrap(),
            names(&["age", "extra", "items", "name", "show_extra"])
        );
    }

    #[test]
    fn test_variable_names_exclude_tier_globals() {
        let renderer = JinjaRenderer::new(SecurityLevel::Standard);
        assert_eq!(
            renderer
                .variable_names("{{ len(items) }} {{ range(n)|join(',') }}")
                .unwrap(),
            names(&["items", "n"])
        );
    }

    #[test]
    fn test_variable_names_cached() {
        let renderer = JinjaRenderer::new(SecurityLevel::Standard);
        let first = renderer.variable_names("{{ a }} {{ b }}").unwrap();
        let second = renderer.variable_names("{{ a }} {{ b }}").unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_autoescape_by_level() {
        let payload = vars! { "name" => "<script>alert('xss')</script>" };

        let escaped = JinjaRenderer::new(SecurityLevel::Standard)
            .render("Hello {{name}}!", &payload)
            .unwrap();
        assert!(escaped.contains("&lt;script&gt;"));
        assert!(!escaped.contains("<script>"));

        let raw = JinjaRenderer::new(SecurityLevel::Relaxed)
            .render("Hello {{name}}!", &payload)
            .unwrap();
        assert_eq!(raw, "Hello <script>alert('xss')</script>!");
    }

    #[test]
    fn test_safe_filter_skips_escaping() {
        let renderer = JinjaRenderer::new(SecurityLevel::Standard);
        let output = renderer
            .render("Hello {{name|safe}}!", &vars! { "name" => "<b>world</b>" })
            .unwrap();
        assert_eq!(output, "Hello <b>world</b>!");
    }

    #[test]
    fn test_control_structures() {
        let renderer = JinjaRenderer::new(SecurityLevel::Standard);
        let template = "{% if show_greeting %}\nHello {{name}}!\n{% else %}\nGoodbye {{name}}!\n{% endif %}\n";
        let output = renderer
            .render(template, &vars! { "name" => "world", "show_greeting" => true })
            .unwrap();
        assert_eq!(output.trim(), "Hello world!");
    }

    #[test]
    fn test_scan_ignores_string_literals() {
        let found = scan_capabilities(r#"{{ "this is fine | really" }}"#);
        assert!(found.is_empty(), "{:?}", found);
    }

    #[test]
    fn test_scan_ignores_text_outside_blocks() {
        let found = scan_capabilities("a | b is c range(1) {{ x }}");
        assert!(found.is_empty(), "{:?}", found);
    }

    #[test]
    fn test_scan_finds_filter_block_and_macros() {
        let found = scan_capabilities(
            "{% macro greet(n) %}hi {{ n }}{% endmacro %}{{ greet(name) }}{% filter upper %}x{% endfilter %}",
        );
        assert_eq!(
            found,
            vec![CapabilityUse {
                kind: Capability::Filter,
                name: "upper".into()
            }]
        );
    }

    #[test]
    fn test_scan_filter_arguments_are_not_calls() {
        let found = scan_capabilities("{{ name|replace('o', 'a') }} {{ items | join(', ') }}");
        let found: Vec<&str> = found.iter().map(|usage| usage.name.as_str()).collect();
        assert_eq!(found, vec!["replace", "join"]);

        let found = scan_capabilities("{% if n is divisibleby(3) %}{{ n|int(0) }}{% endif %}");
        assert!(found.iter().all(|usage| usage.name != "n"), "{:?}", found);
    }

    #[test]
    fn test_scan_finds_calls_inside_filter_arguments() {
        let found = scan_capabilities("{{ items|join(range(2)) }}");
        assert!(found.contains(&CapabilityUse {
            kind: Capability::Global,
            name: "range".into()
        }));
    }

    #[test]
    fn test_standard_accepts_filters_with_arguments() {
        let renderer = JinjaRenderer::new(SecurityLevel::Standard);
        let output = renderer
            .render("Hello {{ name|replace('o','a') }}!", &vars! { "name" => "world" })
            .unwrap();
        assert_eq!(output, "Hello warld!");

        let output = renderer
            .render(
                "{{ items|join(', ') }} {{ count|int(0) + 1 }}",
                &vars! { "items" => vec!["a", "b"], "count" => "4" },
            )
            .unwrap();
        assert_eq!(output, "a, b 5");
    }

    #[test]
    fn test_uncalled_global_name_is_a_variable() {
        let renderer = JinjaRenderer::new(SecurityLevel::Relaxed);
        assert_eq!(
            renderer
                .variable_names("{{ debug }} {{ namespace }} {{ range(n)|join(',') }}")
                .unwrap(),
            names(&["debug", "n", "namespace"])
        );
    }

    #[test]
    fn test_scan_skips_method_calls() {
        let found = scan_capabilities("{% for k, v in data.items() %}{{ k }}{% endfor %}");
        assert!(found.is_empty(), "{:?}", found);
    }
}
