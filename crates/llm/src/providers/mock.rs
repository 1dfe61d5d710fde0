//! Scripted provider for tests and offline runs.

use crate::client::{LlmClient, LlmRequest, LlmResponse, LlmUsage};
use kbfilter_core::{AppError, AppResult};
use std::sync::Mutex;

/// Returns canned completions in order; the last one repeats once the script
/// is exhausted. Every request is recorded for inspection.
#[derive(Debug, Default)]
pub struct MockClient {
    responses: Vec<String>,
    state: Mutex<MockState>,
}

#[derive(Debug, Default)]
struct MockState {
    next: usize,
    requests: Vec<LlmRequest>,
}

impl MockClient {
    /// Create a client that replays `responses`.
    pub fn new<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            responses: responses.into_iter().map(Into::into).collect(),
            state: Mutex::new(MockState::default()),
        }
    }

    /// Requests received so far.
    pub fn requests(&self) -> Vec<LlmRequest> {
        self.state
            .lock()
            .map(|s| s.requests.clone())
            .unwrap_or_default()
    }

    /// Number of completions served.
    pub fn call_count(&self) -> usize {
        self.state.lock().map(|s| s.requests.len()).unwrap_or(0)
    }
}

#[async_trait::async_trait]
impl LlmClient for MockClient {
    fn provider_name(&self) -> &str {
        "mock"
    }

    async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| AppError::Llm("Mock client state poisoned".to_string()))?;

        state.requests.push(request.clone());

        let content = match self.responses.get(state.next).or(self.responses.last()) {
            Some(content) => content.clone(),
            None => return Err(AppError::Llm("Mock client has no scripted responses".to_string())),
        };
        state.next += 1;

        tracing::debug!(call = state.requests.len(), "Mock completion served");

        Ok(LlmResponse {
            content,
            model: request.model.clone(),
            usage: LlmUsage::default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_replays_in_order_then_repeats_last() {
        let client = MockClient::new(["first", "second"]);
        let request = LlmRequest::new("q", "m");

        assert_eq!(client.complete(&request).await.unwrap().content, "first");
        assert_eq!(client.complete(&request).await.unwrap().content, "second");
        assert_eq!(client.complete(&request).await.unwrap().content, "second");
        assert_eq!(client.call_count(), 3);
    }

    #[tokio::test]
    async fn test_empty_script_errors() {
        let client = MockClient::new(Vec::<String>::new());
        let result = client.complete(&LlmRequest::new("q", "m")).await;
        assert!(matches!(result, Err(AppError::Llm(_))));
    }

    #[tokio::test]
    async fn test_records_requests() {
        let client = MockClient::new(["ok"]);
        client
            .complete(&LlmRequest::new("hello", "m").json())
            .await
            .unwrap();

        let requests = client.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].prompt, "hello");
    }
}
