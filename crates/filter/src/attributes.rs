//! Attributes extracted from free text.
//!
//! The extractor may mark a field it could not determine with the literal
//! `"unknown"`. That sentinel is folded into `None` here, at the boundary, so
//! nothing downstream ever sees it.

use kbfilter_core::{AppError, AppResult};
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::fmt;

/// Value an extractor uses for "could not determine this field".
pub const UNKNOWN_SENTINEL: &str = "unknown";

/// The recognized attribute fields, in filter order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttributeField {
    /// Who the query is about (a person or organisation name)
    Name,
    /// Subject area, e.g. "finance"
    Category,
    /// Role classifier, e.g. "manager"
    Role,
}

impl AttributeField {
    /// All fields in the fixed order filters are built in.
    pub const ALL: [AttributeField; 3] = [Self::Name, Self::Category, Self::Role];

    /// Field name as it appears in extractor output.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::Category => "category",
            Self::Role => "role",
        }
    }

    /// Parse an extractor field name.
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.as_str() == s)
    }
}

impl fmt::Display for AttributeField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One candidate attribute record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize)]
pub struct ExtractedAttribute {
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    category: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
}

impl ExtractedAttribute {
    /// Build a record. Blank values and the `"unknown"` sentinel become
    /// `None`; any other value is stored as given.
    pub fn new(name: Option<&str>, category: Option<&str>, role: Option<&str>) -> Self {
        Self {
            name: normalize(name),
            category: normalize(category),
            role: normalize(role),
        }
    }

    /// Value of `field`, `None` when absent or unknown.
    pub fn get(&self, field: AttributeField) -> Option<&str> {
        match field {
            AttributeField::Name => self.name.as_deref(),
            AttributeField::Category => self.category.as_deref(),
            AttributeField::Role => self.role.as_deref(),
        }
    }

    fn set(&mut self, field: AttributeField, value: Option<&str>) {
        let value = normalize(value);
        match field {
            AttributeField::Name => self.name = value,
            AttributeField::Category => self.category = value,
            AttributeField::Role => self.role = value,
        }
    }

    /// True when no field carries a usable value.
    pub fn is_empty(&self) -> bool {
        AttributeField::ALL.iter().all(|f| self.get(*f).is_none())
    }
}

fn normalize(value: Option<&str>) -> Option<String> {
    let value = value?;
    match value.trim() {
        "" | UNKNOWN_SENTINEL => None,
        _ => Some(value.to_string()),
    }
}

/// Deduplicated, ordered records extracted for one query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ExtractedAttributeSet {
    records: Vec<ExtractedAttribute>,
}

impl ExtractedAttributeSet {
    /// Collect records, keeping the first occurrence of each distinct record.
    pub fn from_records<I>(records: I) -> Self
    where
        I: IntoIterator<Item = ExtractedAttribute>,
    {
        let mut seen = HashSet::new();
        let records = records
            .into_iter()
            .filter(|record| seen.insert(record.clone()))
            .collect();
        Self { records }
    }

    pub fn first(&self) -> Option<&ExtractedAttribute> {
        self.records.first()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ExtractedAttribute> {
        self.records.iter()
    }
}

/// Validate raw extractor JSON and turn it into an attribute set.
///
/// Accepted shapes: `null` (no records), an array of records, a single record
/// object, or an object whose only key is `entities` or `records` holding the
/// array. Each record maps `name`/`category`/`role` to a string or `null`.
/// Anything else fails with [`AppError::Validation`] naming the field.
pub fn parse_extractor_output(value: &Value) -> AppResult<ExtractedAttributeSet> {
    let records = match value {
        Value::Null => return Ok(ExtractedAttributeSet::default()),
        Value::Array(items) => items.as_slice(),
        Value::Object(map) => match wrapped_records(map)? {
            Some(items) => items,
            None => std::slice::from_ref(value),
        },
        other => {
            return Err(AppError::Validation(format!(
                "extractor output: expected an array of records, found {}",
                value_kind(other)
            )))
        }
    };

    let parsed = records
        .iter()
        .enumerate()
        .map(|(i, record)| parse_record(i, record))
        .collect::<AppResult<Vec<_>>>()?;

    let set = ExtractedAttributeSet::from_records(parsed);
    tracing::debug!(
        raw = records.len(),
        distinct = set.len(),
        "Parsed extractor output"
    );
    Ok(set)
}

fn wrapped_records(map: &Map<String, Value>) -> AppResult<Option<&[Value]>> {
    if map.len() != 1 {
        return Ok(None);
    }
    for wrapper in ["entities", "records"] {
        if let Some(inner) = map.get(wrapper) {
            return match inner {
                Value::Array(items) => Ok(Some(items.as_slice())),
                Value::Null => Ok(Some(&[][..])),
                other => Err(AppError::invalid_field(
                    wrapper,
                    format!("expected an array of records, found {}", value_kind(other)),
                )),
            };
        }
    }
    Ok(None)
}

fn parse_record(index: usize, record: &Value) -> AppResult<ExtractedAttribute> {
    let map = record.as_object().ok_or_else(|| {
        AppError::invalid_field(
            &format!("records[{}]", index),
            format!("expected an object, found {}", value_kind(record)),
        )
    })?;

    let mut attribute = ExtractedAttribute::default();
    for (key, value) in map {
        let field = AttributeField::parse(key).ok_or_else(|| {
            AppError::invalid_field(
                &format!("records[{}].{}", index, key),
                "unrecognized attribute field (expected name, category or role)",
            )
        })?;

        match value {
            Value::String(s) => attribute.set(field, Some(s)),
            Value::Null => attribute.set(field, None),
            other => {
                return Err(AppError::invalid_field(
                    &format!("records[{}].{}", index, key),
                    format!("expected a string, found {}", value_kind(other)),
                ))
            }
        }
    }
    Ok(attribute)
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_unknown_sentinel_normalized() {
        let record = ExtractedAttribute::new(Some("unknown"), Some(" unknown "), Some("  "));
        assert!(record.is_empty());

        let record = ExtractedAttribute::new(Some("Alex Anderson"), None, Some("manager"));
        assert_eq!(record.get(AttributeField::Name), Some("Alex Anderson"));
        assert_eq!(record.get(AttributeField::Category), None);
        assert_eq!(record.get(AttributeField::Role), Some("manager"));
    }

    #[test]
    fn test_values_stored_as_given() {
        let record = ExtractedAttribute::new(Some(" Alex Anderson "), Some("Unknown"), None);
        assert_eq!(record.get(AttributeField::Name), Some(" Alex Anderson "));
        assert_eq!(record.get(AttributeField::Category), Some("Unknown"));
    }

    #[test]
    fn test_dedup_keeps_first_occurrence_order() {
        let a = ExtractedAttribute::new(Some("Alex Anderson"), Some("finance"), None);
        let b = ExtractedAttribute::new(Some("Jordan Lee"), None, None);

        let set = ExtractedAttributeSet::from_records(vec![a.clone(), b.clone(), a.clone()]);
        assert_eq!(set.len(), 2);
        let records: Vec<_> = set.iter().cloned().collect();
        assert_eq!(records, vec![a, b]);
    }

    #[test]
    fn test_dedup_treats_unknown_as_absent() {
        let set = ExtractedAttributeSet::from_records(vec![
            ExtractedAttribute::new(Some("Alex"), Some("unknown"), None),
            ExtractedAttribute::new(Some("Alex"), None, None),
        ]);
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_parse_array_of_records() {
        let set = parse_extractor_output(&json!([
            {"name": "Alex Anderson", "category": "finance", "role": "unknown"},
            {"name": "Jordan Lee", "category": null}
        ]))
        .unwrap();

        assert_eq!(set.len(), 2);
        let first = set.first().unwrap();
        assert_eq!(first.get(AttributeField::Category), Some("finance"));
        assert_eq!(first.get(AttributeField::Role), None);
    }

    #[test]
    fn test_parse_wrapped_and_single_and_null() {
        let wrapped = parse_extractor_output(&json!({"entities": [{"role": "manager"}]})).unwrap();
        assert_eq!(wrapped.len(), 1);

        let single = parse_extractor_output(&json!({"category": "healthcare"})).unwrap();
        assert_eq!(
            single.first().unwrap().get(AttributeField::Category),
            Some("healthcare")
        );

        assert!(parse_extractor_output(&Value::Null).unwrap().is_empty());
        assert!(parse_extractor_output(&json!([])).unwrap().is_empty());
        assert!(parse_extractor_output(&json!({"records": null}))
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_parse_rejects_non_string_field() {
        let err = parse_extractor_output(&json!([{"name": "Alex", "role": 3}])).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        let msg = err.to_string();
        assert!(msg.contains("records[0].role"), "{}", msg);
        assert!(msg.contains("found number"), "{}", msg);
    }

    #[test]
    fn test_parse_rejects_unrecognized_field() {
        let err = parse_extractor_output(&json!([{"name": "Alex"}, {"department": "ops"}]))
            .unwrap_err();
        assert!(err.to_string().contains("records[1].department"));
    }

    #[test]
    fn test_parse_rejects_non_object_record_and_bad_root() {
        let err = parse_extractor_output(&json!(["Alex"])).unwrap_err();
        assert!(err.to_string().contains("records[0]"));

        let err = parse_extractor_output(&json!("Alex")).unwrap_err();
        assert!(err.to_string().contains("found string"));

        let err = parse_extractor_output(&json!({"entities": "Alex"})).unwrap_err();
        assert!(err.to_string().contains("'entities'"));
    }

    #[test]
    fn test_serializes_without_absent_fields() {
        let set = ExtractedAttributeSet::from_records(vec![ExtractedAttribute::new(
            Some("Alex Anderson"),
            Some("unknown"),
            None,
        )]);
        assert_eq!(
            serde_json::to_value(&set).unwrap(),
            json!([{"name": "Alex Anderson"}])
        );
    }
}
