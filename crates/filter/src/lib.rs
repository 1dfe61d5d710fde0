//! Metadata filters for knowledge base retrieval.
//!
//! - [`FilterExpression`]: boolean tree over metadata comparisons, serialized
//!   in the `{"equals": {...}}` / `{"andAll": [...]}` shape retrieval
//!   services expect
//! - [`ExtractedAttribute`] / [`ExtractedAttributeSet`]: normalized output of
//!   a text-to-attributes extractor
//! - [`build_filter`]: turns an attribute set into an optional filter
//!
//! Everything in this crate is pure and synchronous.

pub mod attributes;
pub mod builder;
pub mod expression;

pub use attributes::{
    parse_extractor_output, AttributeField, ExtractedAttribute, ExtractedAttributeSet,
    UNKNOWN_SENTINEL,
};
pub use builder::{build_candidate_filters, build_filter, filter_for_record, FilterKeys};
pub use expression::FilterExpression;
