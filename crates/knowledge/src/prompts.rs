//! Prompt templates for the model-backed steps.
//!
//! Built-in Handlebars templates can be overridden per workspace by dropping
//! `<id>.hbs` into `.kbfilter/prompts/`.

use handlebars::Handlebars;
use kbfilter_core::config::STATE_DIR;
use kbfilter_core::{AppError, AppResult};
use serde::Serialize;
use std::path::Path;

/// Attribute extraction (filter method 2).
pub const EXTRACT: &str = "extract";

/// Filter generation from the attribute schema (filter method 3).
pub const IMPLICIT_FILTER: &str = "implicit-filter";

/// Grounded answer over retrieved documents.
pub const ANSWER: &str = "answer";

const EXTRACT_TEMPLATE: &str = r#"Extract every person mentioned in the question below, together with the business category and the role that apply to them.

Respond with JSON only, shaped as {"entities": [ ... ]}. Each entity is an object with exactly the string fields "name", "category" and "role".
Use the string "unknown" for any field you cannot determine from the question. Respond with {"entities": []} when nobody is mentioned.
{{#if categories}}
Known categories: {{#each categories}}{{this}}{{#unless @last}}, {{/unless}}{{/each}}.
{{/if}}
Question: {{query}}
"#;

const IMPLICIT_FILTER_TEMPLATE: &str = r#"You translate a question into a metadata filter for a document search.

Metadata attributes available on every document:
{{#each attributes}}- {{key}} ({{type}}): {{description}}
{{/each}}
Operators: equals, notEquals, in, andAll, orAll. Example of the expected shape:
{"andAll": [ {"equals": {"key": "category", "value": "finance"} }, {"equals": {"key": "role", "value": "manager"} } ]}

Use only the attribute keys listed above and only values stated in the question.
Respond with JSON only: {"filter": <filter>} or {"filter": null} when the question does not restrict any attribute.

Question: {{query}}
"#;

const ANSWER_TEMPLATE: &str = r#"Question:
{{query}}

Documents:
{{#each documents}}
[{{index}}] {{source}}
{{text}}
{{/each}}
"#;

/// Registry of rendered-on-demand prompt templates.
pub struct PromptLibrary {
    registry: Handlebars<'static>,
}

impl PromptLibrary {
    /// Built-in templates only.
    pub fn builtin() -> AppResult<Self> {
        let mut registry = Handlebars::new();
        registry.set_strict_mode(true);
        registry.register_escape_fn(handlebars::no_escape);

        for (id, template) in [
            (EXTRACT, EXTRACT_TEMPLATE),
            (IMPLICIT_FILTER, IMPLICIT_FILTER_TEMPLATE),
            (ANSWER, ANSWER_TEMPLATE),
        ] {
            registry
                .register_template_string(id, template)
                .map_err(|e| AppError::Config(format!("Invalid built-in prompt '{}': {}", id, e)))?;
        }

        Ok(Self { registry })
    }

    /// Built-in templates with workspace overrides applied.
    pub fn load(workspace: &Path) -> AppResult<Self> {
        let mut library = Self::builtin()?;
        let dir = workspace.join(STATE_DIR).join("prompts");

        for id in [EXTRACT, IMPLICIT_FILTER, ANSWER] {
            let path = dir.join(format!("{}.hbs", id));
            if !path.exists() {
                continue;
            }

            let template = std::fs::read_to_string(&path).map_err(|e| {
                AppError::Config(format!("Failed to read prompt {:?}: {}", path, e))
            })?;
            library
                .registry
                .register_template_string(id, template)
                .map_err(|e| AppError::Config(format!("Invalid prompt {:?}: {}", path, e)))?;
            tracing::debug!("Using workspace prompt override {:?}", path);
        }

        Ok(library)
    }

    /// Render template `id` with `data`.
    pub fn render<T: Serialize>(&self, id: &str, data: &T) -> AppResult<String> {
        self.registry
            .render(id, data)
            .map_err(|e| AppError::Config(format!("Failed to render prompt '{}': {}", id, e)))
    }
}
