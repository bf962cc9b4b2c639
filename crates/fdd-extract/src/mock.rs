//! # Scriptable Mock Provider
//!
//! A deterministic in-process provider for tests and offline runs. A
//! handler closure inspects each request and returns a raw value or an
//! error; the mock then applies the same structured-output contract as
//! the HTTP adapter (validate, no internal re-prompt) and records every
//! call.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;

use crate::provider::{
    estimate_tokens, CapacityClass, LlmProvider, LlmRequest, LlmResponse, ProviderError,
};
use crate::schema;

type Handler = dyn Fn(&LlmRequest) -> Result<Value, ProviderError> + Send + Sync;

/// Scriptable provider driven by a handler closure.
pub struct MockLlmProvider {
    name: String,
    capacity: CapacityClass,
    handler: Arc<Handler>,
    calls: AtomicU64,
    prompts: Mutex<Vec<String>>,
}

impl MockLlmProvider {
    /// Build a mock with a custom handler.
    pub fn new(
        name: impl Into<String>,
        capacity: CapacityClass,
        handler: impl Fn(&LlmRequest) -> Result<Value, ProviderError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            capacity,
            handler: Arc::new(handler),
            calls: AtomicU64::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// A mock that returns the same value for every request.
    pub fn respond_always(
        name: impl Into<String>,
        capacity: CapacityClass,
        value: Value,
    ) -> Self {
        Self::new(name, capacity, move |_| Ok(value.clone()))
    }

    /// A mock that always fails with `Unavailable`.
    pub fn always_unavailable(name: impl Into<String>, capacity: CapacityClass) -> Self {
        Self::new(name, capacity, |_| {
            Err(ProviderError::Unavailable("scripted outage".into()))
        })
    }

    /// Number of completed calls (including failures).
    pub fn call_count(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }

    /// Prompts seen so far, in call order.
    pub fn recorded_prompts(&self) -> Vec<String> {
        self.prompts.lock().clone()
    }
}

#[async_trait]
impl LlmProvider for MockLlmProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn capacity_class(&self) -> CapacityClass {
        self.capacity
    }

    fn default_model(&self) -> &str {
        "mock-model"
    }

    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().push(request.prompt.clone());

        let value = (self.handler)(request)?;
        // Same contract as the real adapter: the returned value must
        // conform to the declared schema.
        if let Err(errors) = schema::validate(&value, &request.schema) {
            return Err(ProviderError::SchemaRejected(errors.join("; ")));
        }
        let output = value.to_string();
        Ok(LlmResponse {
            value,
            input_tokens: estimate_tokens(&request.prompt),
            output_tokens: estimate_tokens(&output),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request(schema: Value) -> LlmRequest {
        LlmRequest {
            model: "mock-model".into(),
            prompt: "extract".into(),
            schema,
        }
    }

    #[tokio::test]
    async fn conforming_response_passes() {
        let mock = MockLlmProvider::respond_always(
            "m",
            CapacityClass::Local,
            json!({"summary": "ok"}),
        );
        let resp = mock
            .complete(&request(json!({
                "type": "object",
                "required": ["summary"],
                "properties": {"summary": {"type": "string"}}
            })))
            .await
            .unwrap();
        assert_eq!(resp.value["summary"], "ok");
        assert!(resp.total_tokens() > 0);
        assert_eq!(mock.call_count(), 1);
    }

    #[tokio::test]
    async fn nonconforming_response_is_schema_rejected() {
        let mock =
            MockLlmProvider::respond_always("m", CapacityClass::Local, json!({"wrong": 1}));
        let err = mock
            .complete(&request(json!({
                "type": "object",
                "required": ["summary"],
                "additionalProperties": false,
                "properties": {"summary": {"type": "string"}}
            })))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::SchemaRejected(_)));
    }

    #[tokio::test]
    async fn records_prompts() {
        let mock = MockLlmProvider::respond_always("m", CapacityClass::Local, json!({}));
        let _ = mock.complete(&request(json!({"type": "object"}))).await;
        assert_eq!(mock.recorded_prompts(), vec!["extract".to_string()]);
    }
}
