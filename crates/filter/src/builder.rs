//! Attribute set to filter expression.

use crate::attributes::{AttributeField, ExtractedAttribute, ExtractedAttributeSet};
use crate::expression::FilterExpression;
use kbfilter_core::config::FilterKeyConfig;

/// Metadata key emitted for each attribute field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterKeys {
    pub name: String,
    pub category: String,
    pub role: String,
}

impl FilterKeys {
    pub fn key_for(&self, field: AttributeField) -> &str {
        match field {
            AttributeField::Name => &self.name,
            AttributeField::Category => &self.category,
            AttributeField::Role => &self.role,
        }
    }
}

impl Default for FilterKeys {
    fn default() -> Self {
        Self::from(&FilterKeyConfig::default())
    }
}

impl From<&FilterKeyConfig> for FilterKeys {
    fn from(config: &FilterKeyConfig) -> Self {
        Self {
            name: config.name_key.clone(),
            category: config.category_key.clone(),
            role: config.role_key.clone(),
        }
    }
}

/// Build the metadata filter for one query.
///
/// Only the first record of the set is used; later records never affect the
/// result. Returns `None` ("no filter") when the set is missing, empty, or
/// its first record has no usable field. One usable field yields a bare
/// `equals` leaf, more yield an `andAll` in name, category, role order.
pub fn build_filter(
    attributes: Option<&ExtractedAttributeSet>,
    keys: &FilterKeys,
) -> Option<FilterExpression> {
    let attributes = attributes?;
    let record = attributes.first()?;
    if attributes.len() > 1 {
        tracing::debug!(
            ignored = attributes.len() - 1,
            "Multiple attribute records extracted; filtering on the first only"
        );
    }
    filter_for_record(record, keys)
}

/// Filter for a single record, `None` when no field qualifies.
pub fn filter_for_record(record: &ExtractedAttribute, keys: &FilterKeys) -> Option<FilterExpression> {
    let leaves = AttributeField::ALL
        .iter()
        .filter_map(|field| {
            record
                .get(*field)
                .map(|value| FilterExpression::equals(keys.key_for(*field), value))
        })
        .collect();

    FilterExpression::and_all(leaves)
}

/// One candidate filter per record that has at least one usable field.
///
/// Lets a caller surface ambiguity (several people named in one question)
/// instead of silently keeping the first.
pub fn build_candidate_filters(
    attributes: &ExtractedAttributeSet,
    keys: &FilterKeys,
) -> Vec<FilterExpression> {
    attributes
        .iter()
        .filter_map(|record| filter_for_record(record, keys))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn set(records: Vec<ExtractedAttribute>) -> ExtractedAttributeSet {
        ExtractedAttributeSet::from_records(records)
    }

    fn record(name: Option<&str>, category: Option<&str>, role: Option<&str>) -> ExtractedAttribute {
        ExtractedAttribute::new(name, category, role)
    }

    #[test]
    fn test_missing_or_empty_set_yields_no_filter() {
        let keys = FilterKeys::default();
        assert_eq!(build_filter(None, &keys), None);
        assert_eq!(build_filter(Some(&ExtractedAttributeSet::default()), &keys), None);
    }

    #[test]
    fn test_all_absent_or_unknown_yields_no_filter() {
        let keys = FilterKeys::default();
        let attributes = set(vec![record(Some("unknown"), None, Some("unknown"))]);
        assert_eq!(build_filter(Some(&attributes), &keys), None);

        let attributes = set(vec![record(None, None, None)]);
        assert_eq!(build_filter(Some(&attributes), &keys), None);
    }

    #[test]
    fn test_name_and_category_without_role() {
        let attributes = set(vec![record(Some("Alex Anderson"), Some("finance"), None)]);
        let filter = build_filter(Some(&attributes), &FilterKeys::default()).unwrap();

        assert_eq!(
            serde_json::to_value(&filter).unwrap(),
            json!({"andAll": [
                {"equals": {"key": "name", "value": "Alex Anderson"}},
                {"equals": {"key": "category", "value": "finance"}}
            ]})
        );
    }

    #[test]
    fn test_unknown_name_excluded() {
        let attributes = set(vec![record(Some("unknown"), Some("healthcare"), Some("manager"))]);
        let filter = build_filter(Some(&attributes), &FilterKeys::default()).unwrap();

        assert_eq!(
            filter,
            FilterExpression::AndAll(vec![
                FilterExpression::equals("category", "healthcare"),
                FilterExpression::equals("role", "manager"),
            ])
        );
    }

    #[test]
    fn test_single_field_is_bare_leaf() {
        let attributes = set(vec![record(None, None, Some("manager"))]);
        assert_eq!(
            build_filter(Some(&attributes), &FilterKeys::default()),
            Some(FilterExpression::equals("role", "manager"))
        );
    }

    #[test]
    fn test_idempotent_and_deterministic() {
        let attributes = set(vec![record(Some("Alex Anderson"), Some("finance"), Some("analyst"))]);
        let keys = FilterKeys::default();

        let first = build_filter(Some(&attributes), &keys);
        for _ in 0..10 {
            assert_eq!(build_filter(Some(&attributes), &keys), first);
        }

        let keys_in_order: Vec<String> = first
            .unwrap()
            .keys()
            .into_iter()
            .map(str::to_string)
            .collect();
        assert_eq!(keys_in_order, vec!["name", "category", "role"]);
    }

    #[test]
    fn test_only_first_record_counts() {
        let keys = FilterKeys::default();
        let first = record(Some("Alex Anderson"), Some("finance"), None);

        let alone = build_filter(Some(&set(vec![first.clone()])), &keys);
        let with_second = build_filter(
            Some(&set(vec![
                first,
                record(Some("Jordan Lee"), Some("healthcare"), Some("manager")),
            ])),
            &keys,
        );

        assert_eq!(alone, with_second);
    }

    #[test]
    fn test_configured_metadata_keys() {
        let keys = FilterKeys::from(&FilterKeyConfig {
            name_key: "customer_name".to_string(),
            category_key: "industry".to_string(),
            role_key: "job_title".to_string(),
        });
        let attributes = set(vec![record(Some("Alex Anderson"), None, Some("manager"))]);

        let filter = build_filter(Some(&attributes), &keys).unwrap();
        assert_eq!(filter.keys(), vec!["customer_name", "job_title"]);
    }

    #[test]
    fn test_candidate_filters_skip_empty_records() {
        let attributes = set(vec![
            record(Some("Alex Anderson"), None, None),
            record(Some("unknown"), None, None),
            record(Some("Jordan Lee"), Some("healthcare"), None),
        ]);

        let candidates = build_candidate_filters(&attributes, &FilterKeys::default());
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0], FilterExpression::equals("name", "Alex Anderson"));
        assert!(matches!(candidates[1], FilterExpression::AndAll(ref c) if c.len() == 2));
    }
}
