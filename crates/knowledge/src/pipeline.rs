//! Filtered retrieval: resolve a metadata filter by one of the three methods,
//! then invoke the agent with it.
//!
//! Steps run strictly in order: extraction (or generation) is awaited before
//! the agent is invoked.

use crate::agent::{AgentAnswer, RetrievalAgent};
use crate::extractor::AttributeExtractor;
use crate::implicit::ImplicitFilterGenerator;
use kbfilter_core::{AppError, AppResult};
use kbfilter_filter::{build_filter, ExtractedAttributeSet, FilterExpression, FilterKeys};
use serde::Serialize;
use std::sync::Arc;

/// How the filter for a query is obtained.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterMethod {
    /// Unfiltered retrieval
    None,
    /// Caller-supplied filter
    Explicit(FilterExpression),
    /// Extract attributes from the query, then build the filter
    Extracted,
    /// Let the model write the filter from the attribute schema
    Implicit,
}

impl FilterMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Explicit(_) => "explicit",
            Self::Extracted => "extracted",
            Self::Implicit => "implicit",
        }
    }
}

/// Result of [`FilteredRetrieval::answer`].
#[derive(Debug, Clone, Serialize)]
pub struct FilteredAnswer {
    pub method: &'static str,

    /// Present for the extracted method only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attributes: Option<ExtractedAttributeSet>,

    #[serde(flatten)]
    pub answer: AgentAnswer,
}

pub struct FilteredRetrieval {
    agent: Arc<dyn RetrievalAgent>,
    extractor: Option<Arc<dyn AttributeExtractor>>,
    generator: Option<ImplicitFilterGenerator>,
    keys: FilterKeys,
}

impl FilteredRetrieval {
    pub fn new(agent: Arc<dyn RetrievalAgent>, keys: FilterKeys) -> Self {
        Self {
            agent,
            extractor: None,
            generator: None,
            keys,
        }
    }

    pub fn with_extractor(mut self, extractor: Arc<dyn AttributeExtractor>) -> Self {
        self.extractor = Some(extractor);
        self
    }

    pub fn with_generator(mut self, generator: ImplicitFilterGenerator) -> Self {
        self.generator = Some(generator);
        self
    }

    /// Resolve the filter for `query`, along with the extracted attributes
    /// when the method extracts them.
    pub async fn resolve_filter(
        &self,
        query: &str,
        method: &FilterMethod,
    ) -> AppResult<(Option<FilterExpression>, Option<ExtractedAttributeSet>)> {
        match method {
            FilterMethod::None => Ok((None, None)),
            FilterMethod::Explicit(filter) => {
                filter.validate()?;
                Ok((Some(filter.clone()), None))
            }
            FilterMethod::Extracted => {
                let extractor = self.extractor.as_ref().ok_or_else(|| {
                    AppError::Config("Extracted filtering requires an attribute extractor".to_string())
                })?;
                let attributes = extractor.extract(query).await?;
                let filter = build_filter(Some(&attributes), &self.keys);
                Ok((filter, Some(attributes)))
            }
            FilterMethod::Implicit => {
                let generator = self.generator.as_ref().ok_or_else(|| {
                    AppError::Config("Implicit filtering requires a filter generator".to_string())
                })?;
                Ok((generator.generate(query).await?, None))
            }
        }
    }

    /// Resolve the filter, then ask the agent.
    pub async fn answer(&self, query: &str, method: &FilterMethod) -> AppResult<FilteredAnswer> {
        let (filter, attributes) = self.resolve_filter(query, method).await?;

        match &filter {
            Some(filter) => tracing::info!(method = method.as_str(), filter = %filter, "Resolved metadata filter"),
            None => tracing::info!(method = method.as_str(), "No metadata filter"),
        }

        let answer = self.agent.invoke(query, filter.as_ref()).await?;
        Ok(FilteredAnswer {
            method: method.as_str(),
            attributes,
            answer,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use kbfilter_filter::ExtractedAttribute;
    use std::sync::Mutex;

    /// Records the filter of every invocation.
    #[derive(Default)]
    struct RecordingAgent {
        calls: Mutex<Vec<Option<FilterExpression>>>,
    }

    #[async_trait]
    impl RetrievalAgent for RecordingAgent {
        async fn invoke(&self, _query: &str, filter: Option<&FilterExpression>) -> AppResult<AgentAnswer> {
            self.calls.lock().unwrap().push(filter.cloned());
            Ok(AgentAnswer {
                answer: "ok".to_string(),
                citations: Vec::new(),
                filter: filter.cloned(),
            })
        }
    }

    struct FixedExtractor(AppResult<ExtractedAttributeSet>);

    #[async_trait]
    impl AttributeExtractor for FixedExtractor {
        async fn extract(&self, _text: &str) -> AppResult<ExtractedAttributeSet> {
            match &self.0 {
                Ok(set) => Ok(set.clone()),
                Err(e) => Err(AppError::Validation(e.to_string())),
            }
        }
    }

    #[tokio::test]
    async fn test_explicit_filter_passed_through() {
        let agent = Arc::new(RecordingAgent::default());
        let pipeline = FilteredRetrieval::new(agent.clone(), FilterKeys::default());
        let filter = FilterExpression::equals("category", "finance");

        let result = pipeline
            .answer("q", &FilterMethod::Explicit(filter.clone()))
            .await
            .unwrap();

        assert_eq!(result.method, "explicit");
        assert_eq!(agent.calls.lock().unwrap()[0], Some(filter));
    }

    #[tokio::test]
    async fn test_extracted_uses_first_record() {
        let agent = Arc::new(RecordingAgent::default());
        let set = ExtractedAttributeSet::from_records([
            ExtractedAttribute::new(Some("Jordan Lee"), Some("unknown"), Some("manager")),
            ExtractedAttribute::new(Some("Alex Anderson"), None, None),
        ]);
        let pipeline = FilteredRetrieval::new(agent.clone(), FilterKeys::default())
            .with_extractor(Arc::new(FixedExtractor(Ok(set))));

        let result = pipeline.answer("q", &FilterMethod::Extracted).await.unwrap();

        let expected = FilterExpression::and_all(vec![
            FilterExpression::equals("name", "Jordan Lee"),
            FilterExpression::equals("role", "manager"),
        ]);
        assert_eq!(agent.calls.lock().unwrap()[0], expected);
        assert_eq!(result.attributes.map(|a| a.len()), Some(2));
    }

    #[tokio::test]
    async fn test_extracted_empty_set_means_no_filter() {
        let agent = Arc::new(RecordingAgent::default());
        let pipeline = FilteredRetrieval::new(agent.clone(), FilterKeys::default())
            .with_extractor(Arc::new(FixedExtractor(Ok(ExtractedAttributeSet::default()))));

        pipeline.answer("q", &FilterMethod::Extracted).await.unwrap();
        assert_eq!(agent.calls.lock().unwrap()[0], None);
    }

    #[tokio::test]
    async fn test_extraction_failure_skips_agent() {
        let agent = Arc::new(RecordingAgent::default());
        let pipeline = FilteredRetrieval::new(agent.clone(), FilterKeys::default()).with_extractor(
            Arc::new(FixedExtractor(Err(AppError::invalid_field("records[0].name", "bad")))),
        );

        let err = pipeline.answer("q", &FilterMethod::Extracted).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert!(agent.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_collaborators_are_config_errors() {
        let agent = Arc::new(RecordingAgent::default());
        let pipeline = FilteredRetrieval::new(agent, FilterKeys::default());

        assert!(matches!(
            pipeline.answer("q", &FilterMethod::Extracted).await,
            Err(AppError::Config(_))
        ));
        assert!(matches!(
            pipeline.answer("q", &FilterMethod::Implicit).await,
            Err(AppError::Config(_))
        ));
    }
}
