//! Serializable prompt documents.
//!
//! A [`PromptDocument`] is the interchange form of a template, readable from
//! and writable to YAML or JSON:
//!
//! ```yaml
//! prompt:
//!   template: "Hello {name}, how are you?"
//!   template_variables: [name]
//!   metadata:
//!     domain: greetings
//!   client_parameters:
//!     temperature: 0.7
//! ```
//!
//! Keys in the `prompt` section beyond the known fields are kept and merged
//! into the template's custom data.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::content::TemplateContent;
use crate::error::Result;
use crate::template::{PromptTemplate, TemplateOptions};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptDocument {
    pub prompt: PromptSection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptSection {
    /// A string, or a list of `{role, content}` messages.
    pub template: Value,
    #[serde(default)]
    pub template_variables: Vec<String>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
    #[serde(default)]
    pub client_parameters: Map<String, Value>,
    #[serde(default)]
    pub custom_data: Map<String, Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl PromptDocument {
    pub fn from_yaml_str(text: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(text)?)
    }

    pub fn to_yaml_string(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn from_json_str(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl PromptTemplate {
    /// The interchange form of this template.
    pub fn to_document(&self) -> PromptDocument {
        PromptDocument {
            prompt: PromptSection {
                template: self.content().to_value(),
                template_variables: self.variables().iter().cloned().collect(),
                metadata: self.metadata().clone(),
                client_parameters: self.client_parameters().clone(),
                custom_data: self.custom_data().clone(),
                extra: Map::new(),
            },
        }
    }

    /// Builds and validates a template from its interchange form.
    pub fn from_document(document: PromptDocument, options: TemplateOptions) -> Result<Self> {
        let section = document.prompt;
        let content = TemplateContent::from_value(section.template)?;

        let mut custom_data = section.custom_data;
        custom_data.extend(section.extra);

        PromptTemplate::builder(content)
            .variables(section.template_variables)
            .metadata(section.metadata)
            .client_parameters(section.client_parameters)
            .custom_data(custom_data)
            .options(options)
            .build()
    }
}
