//! The prompt template entity.
//!
//! A [`PromptTemplate`] pairs content with the variables it declares and a
//! renderer chosen once at construction. Construction runs the alignment
//! check; every [`populate`](PromptTemplate::populate) call runs the
//! completeness check before substituting.
//!
//! # Example
//!
//! ```rust
//! use promptcraft::{vars, PromptTemplate};
//!
//! let template = PromptTemplate::new("Hello {name}, how are you?", ["name"]).unwrap();
//! let prompt = template.populate(&vars! { "name" => "Alice" }).unwrap();
//! assert_eq!(prompt.as_text(), Some("Hello Alice, how are you?"));
//! ```

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use promptcraft_render::{
    detect_renderer, RendererKind, SecurityLevel, TemplateRenderer, Variables,
};
use serde_json::{Map, Value};

use crate::client::{format_for_client, ClientMessages};
use crate::content::{Message, MessageContent, TemplateContent};
use crate::error::Result;
use crate::populated::PopulatedPrompt;
use crate::validate::{check_alignment, check_completeness, truncate};

const DISPLAY_LEN: usize = 50;

/// Renderer selection for a new template.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TemplateOptions {
    /// Explicit renderer; `None` detects one from the content.
    pub renderer: Option<RendererKind>,
    /// Tier for the Jinja renderer. Ignored by the brace renderers.
    pub security_level: SecurityLevel,
}

impl TemplateOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn renderer(mut self, kind: RendererKind) -> Self {
        self.renderer = Some(kind);
        self
    }

    pub fn security_level(mut self, level: SecurityLevel) -> Self {
        self.security_level = level;
        self
    }
}

/// A validated, immutable prompt template.
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    content: TemplateContent,
    variables: BTreeSet<String>,
    metadata: Map<String, Value>,
    client_parameters: Map<String, Value>,
    custom_data: Map<String, Value>,
    security_level: SecurityLevel,
    renderer: Arc<dyn TemplateRenderer>,
}

impl PromptTemplate {
    /// Builds a template with an auto-detected renderer.
    pub fn new<I, S>(content: impl Into<TemplateContent>, variables: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::builder(content).variables(variables).build()
    }

    /// Builds a template with explicit renderer options.
    pub fn with_options<I, S>(
        content: impl Into<TemplateContent>,
        variables: I,
        options: TemplateOptions,
    ) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::builder(content)
            .variables(variables)
            .options(options)
            .build()
    }

    pub fn builder(content: impl Into<TemplateContent>) -> PromptTemplateBuilder {
        PromptTemplateBuilder::new(content.into())
    }

    pub fn content(&self) -> &TemplateContent {
        &self.content
    }

    /// The declared variable names.
    pub fn variables(&self) -> &BTreeSet<String> {
        &self.variables
    }

    pub fn metadata(&self) -> &Map<String, Value> {
        &self.metadata
    }

    pub fn client_parameters(&self) -> &Map<String, Value> {
        &self.client_parameters
    }

    pub fn custom_data(&self) -> &Map<String, Value> {
        &self.custom_data
    }

    pub fn renderer_kind(&self) -> RendererKind {
        self.renderer.kind()
    }

    pub fn security_level(&self) -> SecurityLevel {
        self.security_level
    }

    pub fn renderer(&self) -> &dyn TemplateRenderer {
        self.renderer.as_ref()
    }

    pub fn is_chat(&self) -> bool {
        self.content.is_chat()
    }

    /// Every placeholder name the content references, as the renderer sees
    /// them.
    pub fn used_variables(&self) -> Result<BTreeSet<String>> {
        used_variables(self.renderer.as_ref(), &self.content)
    }

    /// The names [`populate`](Self::populate) expects.
    ///
    /// These are the declared variables, or the referenced names when the
    /// template declares none.
    pub fn required_variables(&self) -> Result<BTreeSet<String>> {
        if self.variables.is_empty() {
            return self.used_variables();
        }
        Ok(self.variables.clone())
    }

    /// Substitutes `variables` into the content.
    ///
    /// The supplied names must match [`required_variables`](Self::required_variables)
    /// exactly. The result has the same shape as the content: text for a
    /// plain template, messages for a chat template.
    pub fn populate(&self, variables: &Variables) -> Result<PopulatedPrompt> {
        if self.variables.is_empty() {
            tracing::warn!(
                "populating a template without declared variables; checking against referenced names only"
            );
        }
        let required = self.required_variables()?;
        let provided: BTreeSet<String> = variables.keys().cloned().collect();
        check_completeness(&required, &provided)?;

        let renderer = self.renderer.as_ref();
        match &self.content {
            TemplateContent::Text(text) => {
                Ok(PopulatedPrompt::Text(renderer.render(text, variables)?))
            }
            TemplateContent::Messages(messages) => messages
                .iter()
                .map(|message| {
                    Ok(Message {
                        role: message.role,
                        content: render_content(renderer, &message.content, variables)?,
                    })
                })
                .collect::<Result<Vec<_>>>()
                .map(PopulatedPrompt::Messages),
        }
    }

    /// Populates the template and shapes the messages for `client`.
    pub fn create_messages(&self, client: &str, variables: &Variables) -> Result<ClientMessages> {
        if variables.contains_key("client") {
            tracing::warn!(
                client,
                "a template variable is named 'client'; it is substituted as a variable and does not select the client format"
            );
        }
        let prompt = self.populate(variables)?;
        format_for_client(&prompt, client)
    }
}

impl PartialEq for PromptTemplate {
    fn eq(&self, other: &Self) -> bool {
        self.content == other.content
            && self.variables == other.variables
            && self.metadata == other.metadata
            && self.client_parameters == other.client_parameters
            && self.custom_data == other.custom_data
            && self.renderer_kind() == other.renderer_kind()
            && self.security_level == other.security_level
    }
}

impl fmt::Display for PromptTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let content = match &self.content {
            TemplateContent::Text(text) => text.clone(),
            TemplateContent::Messages(_) => self.content.to_value().to_string(),
        };
        let variables: Vec<&str> = self.variables.iter().map(String::as_str).collect();

        write!(
            f,
            "PromptTemplate(template={:?}, variables=[{}], renderer={}",
            truncate(&content, DISPLAY_LEN),
            variables.join(", "),
            self.renderer_kind()
        )?;
        if !self.metadata.is_empty() {
            let metadata = Value::Object(self.metadata.clone()).to_string();
            write!(f, ", metadata={}", truncate(&metadata, DISPLAY_LEN))?;
        }
        write!(f, ")")
    }
}

/// Fluent construction of a [`PromptTemplate`].
#[derive(Debug, Clone)]
pub struct PromptTemplateBuilder {
    content: TemplateContent,
    variables: BTreeSet<String>,
    metadata: Map<String, Value>,
    client_parameters: Map<String, Value>,
    custom_data: Map<String, Value>,
    options: TemplateOptions,
}

impl PromptTemplateBuilder {
    fn new(content: TemplateContent) -> Self {
        Self {
            content,
            variables: BTreeSet::new(),
            metadata: Map::new(),
            client_parameters: Map::new(),
            custom_data: Map::new(),
            options: TemplateOptions::default(),
        }
    }

    /// Set the declared variable names.
    pub fn variables<I, S>(mut self, variables: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.variables = variables.into_iter().map(Into::into).collect();
        self
    }

    pub fn metadata(mut self, metadata: Map<String, Value>) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn client_parameters(mut self, client_parameters: Map<String, Value>) -> Self {
        self.client_parameters = client_parameters;
        self
    }

    pub fn custom_data(mut self, custom_data: Map<String, Value>) -> Self {
        self.custom_data = custom_data;
        self
    }

    /// Use `kind` instead of detecting the renderer.
    pub fn renderer(mut self, kind: RendererKind) -> Self {
        self.options.renderer = Some(kind);
        self
    }

    pub fn security_level(mut self, level: SecurityLevel) -> Self {
        self.options.security_level = level;
        self
    }

    pub fn options(mut self, options: TemplateOptions) -> Self {
        self.options = options;
        self
    }

    /// Selects the renderer and checks the declared variables against the
    /// content.
    pub fn build(self) -> Result<PromptTemplate> {
        let kind = self
            .options
            .renderer
            .unwrap_or_else(|| detect_renderer(self.content.strings()));
        let renderer = kind.build(self.options.security_level);

        let used = used_variables(renderer.as_ref(), &self.content)?;
        if self.variables.is_empty() {
            tracing::warn!(
                renderer = %kind,
                "no template variables declared; completeness is checked against referenced names only"
            );
        } else {
            let source = match &self.content {
                TemplateContent::Text(text) => text.clone(),
                TemplateContent::Messages(_) => self.content.to_value().to_string(),
            };
            check_alignment(&self.variables, &used, &source)?;
        }

        Ok(PromptTemplate {
            content: self.content,
            variables: self.variables,
            metadata: self.metadata,
            client_parameters: self.client_parameters,
            custom_data: self.custom_data,
            security_level: self.options.security_level,
            renderer,
        })
    }
}

fn used_variables(
    renderer: &dyn TemplateRenderer,
    content: &TemplateContent,
) -> Result<BTreeSet<String>> {
    let mut used = BTreeSet::new();
    for text in content.strings() {
        used.extend(renderer.variable_names(text)?);
    }
    Ok(used)
}

fn render_content(
    renderer: &dyn TemplateRenderer,
    content: &MessageContent,
    variables: &Variables,
) -> Result<MessageContent> {
    match content {
        MessageContent::Text(text) => Ok(MessageContent::Text(renderer.render(text, variables)?)),
        MessageContent::Parts(parts) => parts
            .iter()
            .map(|part| render_map(renderer, part, variables))
            .collect::<Result<Vec<_>>>()
            .map(MessageContent::Parts),
    }
}

fn render_map(
    renderer: &dyn TemplateRenderer,
    map: &Map<String, Value>,
    variables: &Variables,
) -> Result<Map<String, Value>> {
    map.iter()
        .map(|(key, value)| Ok((key.clone(), render_value(renderer, value, variables)?)))
        .collect()
}

fn render_value(
    renderer: &dyn TemplateRenderer,
    value: &Value,
    variables: &Variables,
) -> Result<Value> {
    match value {
        Value::String(text) => Ok(Value::String(renderer.render(text, variables)?)),
        Value::Array(items) => items
            .iter()
            .map(|item| render_value(renderer, item, variables))
            .collect::<Result<Vec<_>>>()
            .map(Value::Array),
        Value::Object(map) => render_map(renderer, map, variables).map(Value::Object),
        Value::Null | Value::Bool(_) | Value::Number(_) => Ok(value.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::Role;
    use crate::error::PromptError;
    use promptcraft_render::vars;
    use serde_json::json;

    fn set(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn chat() -> TemplateContent {
        TemplateContent::Messages(vec![
            Message::system("You are helpful."),
            Message::user("Hello {{name}}"),
        ])
    }

    #[test]
    fn test_plain_template_populates() {
        let template = PromptTemplate::new("Hello {name}, how are you?", ["name"]).unwrap();
        assert_eq!(template.renderer_kind(), RendererKind::SingleBrace);
        let prompt = template.populate(&vars! { "name" => "Alice" }).unwrap();
        assert_eq!(prompt, PopulatedPrompt::Text("Hello Alice, how are you?".into()));
    }

    #[test]
    fn test_chat_template_populates() {
        let template = PromptTemplate::new(chat(), ["name"]).unwrap();
        assert_eq!(template.renderer_kind(), RendererKind::DoubleBrace);
        let prompt = template.populate(&vars! { "name" => "Bob" }).unwrap();
        assert_eq!(
            prompt,
            PopulatedPrompt::Messages(vec![
                Message::system("You are helpful."),
                Message::user("Hello Bob"),
            ])
        );
    }

    #[test]
    fn test_unused_declared_variable_fails_construction() {
        let err = PromptTemplate::new("Hello {name}", ["name", "age"]).unwrap_err();
        match err {
            PromptError::Alignment { unused, .. } => assert_eq!(unused, set(&["age"])),
            other => panic!("expected alignment error, got {:?}", other),
        }
    }

    #[test]
    fn test_undeclared_variable_fails_construction() {
        let err = PromptTemplate::new("Hello {name} from {city}", ["name"]).unwrap_err();
        match err {
            PromptError::Alignment { undeclared, .. } => {
                assert_eq!(undeclared, set(&["city"]))
            }
            other => panic!("expected alignment error, got {:?}", other),
        }
    }

    #[test]
    fn test_unexpected_variable_fails_population() {
        let template = PromptTemplate::new("Hello {name}", ["name"]).unwrap();
        let err = template
            .populate(&vars! { "name" => "World", "extra" => "x" })
            .unwrap_err();
        match err {
            PromptError::Completeness { unexpected, .. } => {
                assert_eq!(unexpected, set(&["extra"]))
            }
            other => panic!("expected completeness error, got {:?}", other),
        }
    }

    #[test]
    fn test_no_declared_variables_uses_live_names() {
        let template = PromptTemplate::new("Hello {name}", Vec::<String>::new()).unwrap();
        assert!(template.variables().is_empty());
        assert_eq!(template.required_variables().unwrap(), set(&["name"]));

        assert!(template.populate(&vars! {}).is_err());
        let prompt = template.populate(&vars! { "name" => "Ann" }).unwrap();
        assert_eq!(prompt.as_text(), Some("Hello Ann"));
    }

    #[test]
    fn test_explicit_renderer_overrides_detection() {
        let json_prompt = r#"Answer as {"value": "{{answer}}"}"#;
        let template = PromptTemplate::builder(json_prompt)
            .variables(["answer"])
            .renderer(RendererKind::DoubleBrace)
            .build()
            .unwrap();
        let prompt = template.populate(&vars! { "answer" => 42 }).unwrap();
        assert_eq!(prompt.as_text(), Some(r#"Answer as {"value": "42"}"#));
    }

    #[test]
    fn test_jinja_tier_applies_to_population() {
        let text = "Hello {{ name|replace('o', 'a') }}!";
        let strict = PromptTemplate::with_options(
            text,
            ["name"],
            TemplateOptions::new().security_level(SecurityLevel::Strict),
        )
        .unwrap();
        assert_eq!(strict.renderer_kind(), RendererKind::Jinja);
        let err = strict.populate(&vars! { "name" => "world" }).unwrap_err();
        assert!(err.to_string().contains("filter 'replace'"));

        let standard = PromptTemplate::new(text, ["name"]).unwrap();
        let prompt = standard.populate(&vars! { "name" => "world" }).unwrap();
        assert_eq!(prompt.as_text(), Some("Hello warld!"));
    }

    #[test]
    fn test_nested_parts_are_rendered() {
        let content = TemplateContent::from_value(json!([
            {"role": "user", "content": [
                {"type": "text", "text": "Describe {{subject}}"},
                {"type": "image_url", "image_url": {"url": "{{image}}"}, "detail": 2}
            ]}
        ]))
        .unwrap();
        let template = PromptTemplate::new(content, ["subject", "image"]).unwrap();
        let prompt = template
            .populate(&vars! { "subject" => "the cat", "image" => "https://img/cat.png" })
            .unwrap();
        assert_eq!(
            prompt.into_value(),
            json!([
                {"role": "user", "content": [
                    {"type": "text", "text": "Describe the cat"},
                    {"type": "image_url", "image_url": {"url": "https://img/cat.png"}, "detail": 2}
                ]}
            ])
        );
    }

    #[test]
    fn test_create_messages_formats_for_client() {
        let template = PromptTemplate::new(chat(), ["name"]).unwrap();
        let shaped = template
            .create_messages("anthropic", &vars! { "name" => "Bob" })
            .unwrap();
        assert_eq!(
            serde_json::to_value(&shaped).unwrap(),
            json!({
                "system": "You are helpful.",
                "messages": [{"role": "user", "content": "Hello Bob"}]
            })
        );
    }

    #[test]
    fn test_equality_covers_fields() {
        let a = PromptTemplate::new("Hello {name}", ["name"]).unwrap();
        let b = PromptTemplate::new("Hello {name}", ["name"]).unwrap();
        assert_eq!(a, b);

        let mut metadata = Map::new();
        metadata.insert("domain".into(), json!("greetings"));
        let c = PromptTemplate::builder("Hello {name}")
            .variables(["name"])
            .metadata(metadata)
            .build()
            .unwrap();
        assert_ne!(a, c);

        let d = PromptTemplate::builder("Hello {name}")
            .variables(["name"])
            .renderer(RendererKind::Jinja)
            .build();
        // `{name}` is literal text to Jinja, so `name` is unused.
        assert!(d.is_err());
    }

    #[test]
    fn test_display_truncates() {
        let long = format!("Hello {{name}} {}", "x".repeat(80));
        let template = PromptTemplate::new(long.as_str(), ["name"]).unwrap();
        let shown = template.to_string();
        assert!(shown.starts_with("PromptTemplate(template=\"Hello {name} xxx"));
        assert!(shown.contains("...\""));
        assert!(shown.contains("variables=[name]"));
        assert!(shown.contains("renderer=single_brace"));
    }

    #[test]
    fn test_roles_preserved_in_order() {
        let template = PromptTemplate::new(
            vec![
                Message::user("Q: {{q}}"),
                Message::assistant("A: {{a}}"),
                Message::user("And?"),
            ],
            ["q", "a"],
        )
        .unwrap();
        let prompt = template.populate(&vars! { "q" => "1+1", "a" => 2 }).unwrap();
        let roles: Vec<Role> = prompt
            .as_messages()
            .unwrap()
            .iter()
            .map(|m| m.role)
            .collect();
        assert_eq!(roles, vec![Role::User, Role::Assistant, Role::User]);
    }
}
