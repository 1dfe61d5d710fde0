//! Agent definition files.
//!
//! An agent definition names the model, the instruction it answers with, the
//! knowledge bases it retrieves from (with their filterable attributes), and
//! the action groups it could call. See `demos/restaurant-agent.json`.

use crate::implicit::{AttributeType, MetadataAttributeSchema};
use kbfilter_core::{AppError, AppResult};
use kbfilter_filter::FilterKeys;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentDefinition {
    pub agent_name: String,

    #[serde(default)]
    pub description: String,

    /// System instruction for answering
    pub instruction: String,

    /// Model used for answers; the configured model when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub foundation_model: Option<String>,

    #[serde(
        rename = "idleSessionTTLInSeconds",
        alias = "idleSessionTtlInSeconds",
        default = "default_idle_session_ttl"
    )]
    pub idle_session_ttl_in_seconds: u64,

    #[serde(default)]
    pub knowledge_bases: Vec<KnowledgeBaseBinding>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub action_groups: Vec<ActionGroup>,
}

fn default_idle_session_ttl() -> u64 {
    600
}

/// A knowledge base the agent retrieves from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KnowledgeBaseBinding {
    /// Local base name
    pub knowledge_base_id: String,

    #[serde(default)]
    pub description: String,

    #[serde(default = "default_number_of_results")]
    pub number_of_results: u32,

    /// Attributes the implicit filter generator may use
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub metadata_attributes: Vec<MetadataAttributeSchema>,
}

fn default_number_of_results() -> u32 {
    5
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionGroup {
    pub action_group_name: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub functions: Vec<ActionFunction>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionFunction {
    pub name: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub parameters: BTreeMap<String, FunctionParameter>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionParameter {
    #[serde(rename = "type")]
    pub parameter_type: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub required: bool,
}

const PARAMETER_TYPES: [&str; 5] = ["string", "number", "integer", "boolean", "array"];

impl AgentDefinition {
    /// Load and validate a definition file.
    pub fn load(path: &Path) -> AppResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("Failed to read agent definition {:?}: {}", path, e))
        })?;

        let definition = Self::parse(&content).map_err(|e| match e {
            AppError::Validation(msg) => AppError::Validation(format!("{:?}: {}", path, msg)),
            other => other,
        })?;

        tracing::debug!(agent = %definition.agent_name, "Loaded agent definition from {:?}", path);
        Ok(definition)
    }

    /// Parse and validate definition JSON.
    pub fn parse(content: &str) -> AppResult<Self> {
        let definition: Self = serde_json::from_str(content)
            .map_err(|e| AppError::Validation(format!("agent definition: {}", e)))?;
        definition.validate()?;
        Ok(definition)
    }

    /// Minimal definition over a single base, used when no file is given.
    /// The attribute schema uses the configured metadata keys.
    pub fn default_for(base_name: &str, keys: &FilterKeys) -> Self {
        Self {
            agent_name: format!("{}-agent", base_name),
            description: format!("Answers questions from the '{}' knowledge base", base_name),
            instruction: "You answer questions using only the documents provided. \
                          If they do not contain the answer, say that you could not find it."
                .to_string(),
            foundation_model: None,
            idle_session_ttl_in_seconds: default_idle_session_ttl(),
            knowledge_bases: vec![KnowledgeBaseBinding {
                knowledge_base_id: base_name.to_string(),
                description: String::new(),
                number_of_results: default_number_of_results(),
                metadata_attributes: vec![
                    MetadataAttributeSchema::new(&keys.name, AttributeType::String, "Full name of the person the document is about"),
                    MetadataAttributeSchema::new(&keys.category, AttributeType::String, "Business category of the document"),
                    MetadataAttributeSchema::new(&keys.role, AttributeType::String, "Job role of the person the document is about"),
                ],
            }],
            action_groups: Vec::new(),
        }
    }

    pub fn validate(&self) -> AppResult<()> {
        if self.agent_name.trim().is_empty() {
            return Err(AppError::invalid_field("agentName", "must not be empty"));
        }
        if self.instruction.trim().is_empty() {
            return Err(AppError::invalid_field("instruction", "must not be empty"));
        }
        if self.idle_session_ttl_in_seconds == 0 {
            return Err(AppError::invalid_field(
                "idleSessionTTLInSeconds",
                "must be greater than zero",
            ));
        }
        if self.knowledge_bases.is_empty() {
            return Err(AppError::invalid_field(
                "knowledgeBases",
                "at least one knowledge base is required",
            ));
        }

        for (i, kb) in self.knowledge_bases.iter().enumerate() {
            if kb.knowledge_base_id.trim().is_empty() {
                return Err(AppError::invalid_field(
                    &format!("knowledgeBases[{}].knowledgeBaseId", i),
                    "must not be empty",
                ));
            }
            if kb.number_of_results == 0 {
                return Err(AppError::invalid_field(
                    &format!("knowledgeBases[{}].numberOfResults", i),
                    "must be greater than zero",
                ));
            }

            let mut seen = HashSet::new();
            for (j, attribute) in kb.metadata_attributes.iter().enumerate() {
                if attribute.key.trim().is_empty() || !seen.insert(attribute.key.as_str()) {
                    return Err(AppError::invalid_field(
                        &format!("knowledgeBases[{}].metadataAttributes[{}].key", i, j),
                        "must be non-empty and unique",
                    ));
                }
            }
        }

        for (i, group) in self.action_groups.iter().enumerate() {
            if group.action_group_name.trim().is_empty() {
                return Err(AppError::invalid_field(
                    &format!("actionGroups[{}].actionGroupName", i),
                    "must not be empty",
                ));
            }
            for (j, function) in group.functions.iter().enumerate() {
                if function.name.trim().is_empty() {
                    return Err(AppError::invalid_field(
                        &format!("actionGroups[{}].functions[{}].name", i, j),
                        "must not be empty",
                    ));
                }
                for (param, spec) in &function.parameters {
                    if !PARAMETER_TYPES.contains(&spec.parameter_type.as_str()) {
                        return Err(AppError::invalid_field(
                            &format!(
                                "actionGroups[{}].functions[{}].parameters.{}.type",
                                i, j, param
                            ),
                            format!(
                                "'{}' is not one of {}",
                                spec.parameter_type,
                                PARAMETER_TYPES.join(", ")
                            ),
                        ));
                    }
                }
            }
        }

        Ok(())
    }

    /// Attribute schema across all bound bases, first definition of a key wins.
    pub fn metadata_schema(&self) -> Vec<MetadataAttributeSchema> {
        let mut seen = HashSet::new();
        self.knowledge_bases
            .iter()
            .flat_map(|kb| kb.metadata_attributes.iter())
            .filter(|a| seen.insert(a.key.clone()))
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const RESTAURANT: &str = include_str!("../../../../demos/restaurant-agent.json");

    #[test]
    fn test_restaurant_sample_is_valid() {
        let definition = AgentDefinition::parse(RESTAURANT).unwrap();

        assert_eq!(definition.agent_name, "restaurant-booking-agent");
        assert_eq!(definition.knowledge_bases.len(), 1);
        assert_eq!(definition.action_groups.len(), 1);

        let functions = &definition.action_groups[0].functions;
        assert!(functions.iter().any(|f| f.name == "create_booking"));
        let create = functions.iter().find(|f| f.name == "create_booking").unwrap();
        assert!(create.parameters["date"].required);
    }

    #[test]
    fn test_defaults_applied() {
        let definition = AgentDefinition::parse(
            r#"{"agentName": "a", "instruction": "answer", "knowledgeBases": [{"knowledgeBaseId": "docs"}]}"#,
        )
        .unwrap();

        assert_eq!(definition.idle_session_ttl_in_seconds, 600);
        assert_eq!(definition.knowledge_bases[0].number_of_results, 5);
        assert!(definition.foundation_model.is_none());
    }

    #[test]
    fn test_validation_names_the_field() {
        let cases = [
            (r#"{"agentName": "", "instruction": "x", "knowledgeBases": [{"knowledgeBaseId": "d"}]}"#, "agentName"),
            (r#"{"agentName": "a", "instruction": "x", "knowledgeBases": []}"#, "knowledgeBases"),
            (
                r#"{"agentName": "a", "instruction": "x", "knowledgeBases": [{"knowledgeBaseId": "d", "numberOfResults": 0}]}"#,
                "knowledgeBases[0].numberOfResults",
            ),
            (
                r#"{"agentName": "a", "instruction": "x", "knowledgeBases": [{"knowledgeBaseId": "d"}],
                    "actionGroups": [{"actionGroupName": "g", "functions": [{"name": "f", "parameters": {"p": {"type": "date"}}}]}]}"#,
                "actionGroups[0].functions[0].parameters.p.type",
            ),
        ];

        for (json, field) in cases {
            let err = AgentDefinition::parse(json).unwrap_err();
            assert!(matches!(err, AppError::Validation(_)), "{}", json);
            assert!(err.to_string().contains(field), "{} -> {}", field, err);
        }
    }

    #[test]
    fn test_default_for_is_valid_and_has_schema() {
        let definition = AgentDefinition::default_for("people", &FilterKeys::default());
        definition.validate().unwrap();

        let keys: Vec<_> = definition.metadata_schema().into_iter().map(|a| a.key).collect();
        assert_eq!(keys, vec!["name", "category", "role"]);
    }

    #[test]
    fn test_default_for_uses_configured_keys() {
        let keys = FilterKeys {
            name: "customer_name".to_string(),
            category: "industry".to_string(),
            role: "job_title".to_string(),
        };
        let definition = AgentDefinition::default_for("people", &keys);
        definition.validate().unwrap();

        let schema: Vec<_> = definition.metadata_schema().into_iter().map(|a| a.key).collect();
        assert_eq!(schema, vec!["customer_name", "industry", "job_title"]);
    }

    #[test]
    fn test_load_from_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("agent.json");
        std::fs::write(&path, RESTAURANT).unwrap();
        assert!(AgentDefinition::load(&path).is_ok());

        std::fs::write(&path, "{").unwrap();
        let err = AgentDefinition::load(&path).unwrap_err();
        assert!(err.to_string().contains("agent.json"));
    }
}
