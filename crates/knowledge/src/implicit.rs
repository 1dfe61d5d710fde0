//! Implicit filtering: the model writes the filter itself from a description
//! of the metadata attributes.

use crate::extractor::parse_model_json;
use crate::prompts::{self, PromptLibrary};
use kbfilter_core::{AppError, AppResult};
use kbfilter_filter::FilterExpression;
use kbfilter_llm::{LlmClient, LlmRequest};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AttributeType {
    #[default]
    String,
    Number,
    Boolean,
    StringList,
}

impl AttributeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::StringList => "stringList",
        }
    }
}

/// Description of one filterable attribute, shown to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataAttributeSchema {
    pub key: String,
    #[serde(rename = "type", default)]
    pub attribute_type: AttributeType,
    pub description: String,
}

impl MetadataAttributeSchema {
    pub fn new(key: impl Into<String>, attribute_type: AttributeType, description: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            attribute_type,
            description: description.into(),
        }
    }
}

/// Generates a filter for a query from the attribute schema.
pub struct ImplicitFilterGenerator {
    client: Arc<dyn LlmClient>,
    model: String,
    prompts: Arc<PromptLibrary>,
    schema: Vec<MetadataAttributeSchema>,
}

impl ImplicitFilterGenerator {
    pub fn new(
        client: Arc<dyn LlmClient>,
        model: impl Into<String>,
        prompts: Arc<PromptLibrary>,
        schema: Vec<MetadataAttributeSchema>,
    ) -> Self {
        Self {
            client,
            model: model.into(),
            prompts,
            schema,
        }
    }

    pub fn schema(&self) -> &[MetadataAttributeSchema] {
        &self.schema
    }

    /// Ask the model for a filter. `Ok(None)` means the question does not
    /// restrict any attribute.
    ///
    /// The reply must be `{"filter": <expression | null>}` or a bare
    /// expression. Expressions using keys outside the schema are rejected.
    pub async fn generate(&self, query: &str) -> AppResult<Option<FilterExpression>> {
        if self.schema.is_empty() {
            return Err(AppError::Config(
                "Implicit filtering needs at least one metadata attribute".to_string(),
            ));
        }

        let attributes: Vec<Value> = self
            .schema
            .iter()
            .map(|a| {
                json!({
                    "key": a.key,
                    "type": a.attribute_type.as_str(),
                    "description": a.description,
                })
            })
            .collect();

        let prompt = self.prompts.render(
            prompts::IMPLICIT_FILTER,
            &json!({"query": query, "attributes": attributes}),
        )?;
        let request = LlmRequest::new(prompt, &self.model)
            .with_temperature(0.0)
            .with_max_tokens(512)
            .json();

        let response = self.client.complete(&request).await?;
        let value = parse_model_json(&response.content)?;

        let expression = match value {
            Value::Null => None,
            Value::Object(mut map) if map.len() == 1 && map.contains_key("filter") => {
                match map.remove("filter") {
                    Some(Value::Null) | None => None,
                    Some(inner) => Some(FilterExpression::from_value(inner)?),
                }
            }
            other => Some(FilterExpression::from_value(other)?),
        };

        if let Some(expression) = &expression {
            self.check_keys(expression)?;
            tracing::info!(operator = expression.operator(), "Generated implicit filter");
        } else {
            tracing::info!("Model generated no filter for question");
        }

        Ok(expression)
    }

    fn check_keys(&self, expression: &FilterExpression) -> AppResult<()> {
        for key in expression.keys() {
            if !self.schema.iter().any(|a| a.key == key) {
                return Err(AppError::invalid_field(
                    "filter.key",
                    format!("'{}' is not a known metadata attribute", key),
                ));
            }
        }
        Ok(())
    }
}
