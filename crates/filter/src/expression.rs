//! Filter expression tree.
//!
//! Serialized shape (externally tagged, camelCase operators):
//!
//! ```json
//! {"andAll": [
//!     {"equals": {"key": "name", "value": "Alex Anderson"}},
//!     {"equals": {"key": "category", "value": "finance"}}
//! ]}
//! ```

use kbfilter_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Boolean filter over document metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FilterExpression {
    /// Metadata `key` equals `value`
    Equals { key: String, value: String },

    /// Metadata `key` is absent or differs from `value`
    NotEquals { key: String, value: String },

    /// Metadata `key` equals one of `value`
    In { key: String, value: Vec<String> },

    /// Every child matches. Never empty.
    AndAll(Vec<FilterExpression>),

    /// At least one child matches. Never empty.
    OrAll(Vec<FilterExpression>),
}

impl FilterExpression {
    /// `equals(key, value)` leaf.
    pub fn equals(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Equals {
            key: key.into(),
            value: value.into(),
        }
    }

    /// `notEquals(key, value)` leaf.
    pub fn not_equals(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self::NotEquals {
            key: key.into(),
            value: value.into(),
        }
    }

    /// `in(key, values)` leaf.
    pub fn one_of<I, S>(key: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::In {
            key: key.into(),
            value: values.into_iter().map(Into::into).collect(),
        }
    }

    /// Conjunction of `children`.
    ///
    /// Returns `None` for no children and the child itself for exactly one,
    /// so an empty or single-element `andAll` is never produced.
    pub fn and_all(mut children: Vec<FilterExpression>) -> Option<Self> {
        match children.len() {
            0 => None,
            1 => children.pop(),
            _ => Some(Self::AndAll(children)),
        }
    }

    /// Disjunction of `children`, collapsed the same way as [`Self::and_all`].
    pub fn or_all(mut children: Vec<FilterExpression>) -> Option<Self> {
        match children.len() {
            0 => None,
            1 => children.pop(),
            _ => Some(Self::OrAll(children)),
        }
    }

    /// Parse and validate a filter from JSON text.
    pub fn parse(json: &str) -> AppResult<Self> {
        let expr: FilterExpression = serde_json::from_str(json)
            .map_err(|e| AppError::Validation(format!("filter: {}", e)))?;
        expr.validate()?;
        Ok(expr)
    }

    /// Build and validate a filter from an already-parsed JSON value.
    pub fn from_value(value: Value) -> AppResult<Self> {
        let expr: FilterExpression = serde_json::from_value(value)
            .map_err(|e| AppError::Validation(format!("filter: {}", e)))?;
        expr.validate()?;
        Ok(expr)
    }

    /// Check structural invariants: non-empty keys, non-empty `in` lists and
    /// non-empty `andAll`/`orAll` children.
    pub fn validate(&self) -> AppResult<()> {
        self.validate_at("$")
    }

    fn validate_at(&self, path: &str) -> AppResult<()> {
        match self {
            Self::Equals { key, .. } | Self::NotEquals { key, .. } => {
                check_key(path, key)?;
            }
            Self::In { key, value } => {
                check_key(path, key)?;
                if value.is_empty() {
                    return Err(AppError::invalid_field(
                        &format!("{}.in.value", path),
                        "list must not be empty",
                    ));
                }
            }
            Self::AndAll(children) | Self::OrAll(children) => {
                let op = self.operator();
                if children.is_empty() {
                    return Err(AppError::invalid_field(
                        &format!("{}.{}", path, op),
                        "must contain at least one expression",
                    ));
                }
                for (i, child) in children.iter().enumerate() {
                    child.validate_at(&format!("{}.{}[{}]", path, op, i))?;
                }
            }
        }
        Ok(())
    }

    /// JSON operator name of this node.
    pub fn operator(&self) -> &'static str {
        match self {
            Self::Equals { .. } => "equals",
            Self::NotEquals { .. } => "notEquals",
            Self::In { .. } => "in",
            Self::AndAll(_) => "andAll",
            Self::OrAll(_) => "orAll",
        }
    }

    /// Metadata keys referenced anywhere in the tree, in visit order.
    pub fn keys(&self) -> Vec<&str> {
        let mut keys = Vec::new();
        self.collect_keys(&mut keys);
        keys
    }

    fn collect_keys<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Self::Equals { key, .. } | Self::NotEquals { key, .. } | Self::In { key, .. } => {
                out.push(key)
            }
            Self::AndAll(children) | Self::OrAll(children) => {
                for child in children {
                    child.collect_keys(out);
                }
            }
        }
    }

    /// Evaluate against a document's metadata attributes.
    ///
    /// Strings compare exactly; numbers and booleans compare by their JSON
    /// text; a list-valued attribute matches when any element does.
    pub fn matches(&self, metadata: &Map<String, Value>) -> bool {
        match self {
            Self::Equals { key, value } => metadata
                .get(key)
                .is_some_and(|v| attribute_matches(v, value)),
            Self::NotEquals { key, value } => !metadata
                .get(key)
                .is_some_and(|v| attribute_matches(v, value)),
            Self::In { key, value } => metadata
                .get(key)
                .is_some_and(|v| value.iter().any(|candidate| attribute_matches(v, candidate))),
            Self::AndAll(children) => children.iter().all(|c| c.matches(metadata)),
            Self::OrAll(children) => children.iter().any(|c| c.matches(metadata)),
        }
    }
}

fn check_key(path: &str, key: &str) -> AppResult<()> {
    if key.trim().is_empty() {
        return Err(AppError::invalid_field(
            &format!("{}.key", path),
            "must not be empty",
        ));
    }
    Ok(())
}

fn attribute_matches(attribute: &Value, expected: &str) -> bool {
    match attribute {
        Value::String(s) => s == expected,
        Value::Number(n) => n.to_string() == expected,
        Value::Bool(b) => b.to_string() == expected,
        Value::Array(items) => items.iter().any(|item| attribute_matches(item, expected)),
        Value::Null | Value::Object(_) => false,
    }
}

impl fmt::Display for FilterExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let json = serde_json::to_string(self).map_err(|_| fmt::Error)?;
        f.write_str(&json)
    }
}
