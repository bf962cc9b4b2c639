//! # HTTP Provider Adapter
//!
//! Adapter for chat-completions-style HTTP providers with JSON-schema
//! response formats. One adapter instance represents one configured
//! provider (name, endpoint, model, capacity class).
//!
//! ## Structured-output enforcement
//!
//! The adapter validates every response against the request schema.
//! On a validation failure it re-prompts once, appending the
//! validation errors; a second failure is returned as
//! [`ProviderError::SchemaRejected`].

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::provider::{
    estimate_tokens, CapacityClass, LlmProvider, LlmRequest, LlmResponse, ProviderError,
};
use crate::schema;

/// Configuration for one HTTP provider.
#[derive(Debug, Clone)]
pub struct HttpLlmConfig {
    /// Routing name (e.g. `"primary"`).
    pub name: String,
    /// Endpoint base URL; the adapter POSTs to `{base_url}/v1/chat/completions`.
    pub base_url: String,
    pub api_key: String,
    pub default_model: String,
    pub capacity: CapacityClass,
    /// Request timeout in seconds (default 60).
    pub timeout_secs: u64,
}

impl HttpLlmConfig {
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        default_model: impl Into<String>,
        capacity: CapacityClass,
    ) -> Self {
        Self {
            name: name.into(),
            base_url: base_url.into(),
            api_key: api_key.into(),
            default_model: default_model.into(),
            capacity,
            timeout_secs: 60,
        }
    }
}

/// Chat-completions HTTP adapter.
pub struct HttpLlmAdapter {
    client: reqwest::Client,
    config: HttpLlmConfig,
}

impl HttpLlmAdapter {
    /// Build an adapter from configuration.
    pub fn new(config: HttpLlmConfig) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ProviderError::Unavailable(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client, config })
    }

    async fn call_once(
        &self,
        model: &str,
        prompt: &str,
        request_schema: &Value,
    ) -> Result<(Value, u64, u64), ProviderError> {
        let url = format!(
            "{}/v1/chat/completions",
            self.config.base_url.trim_end_matches('/')
        );
        let body = json!({
            "model": model,
            "messages": [{"role": "user", "content": prompt}],
            "response_format": {
                "type": "json_schema",
                "json_schema": {"name": "extraction", "schema": request_schema, "strict": true}
            }
        });

        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::Timeout {
                        timeout_secs: self.config.timeout_secs,
                    }
                } else {
                    ProviderError::Unavailable(format!("{url}: {e}"))
                }
            })?;

        let status = resp.status();
        if status.as_u16() == 429 {
            let retry_after_secs = resp
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok());
            return Err(ProviderError::RateLimited { retry_after_secs });
        }
        if !status.is_success() {
            return Err(ProviderError::Unavailable(format!("{url}: HTTP {status}")));
        }

        let payload: Value = resp
            .json()
            .await
            .map_err(|e| ProviderError::BadResponse(e.to_string()))?;

        let content = payload["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| ProviderError::BadResponse("missing choices[0].message.content".into()))?;

        let value: Value = serde_json::from_str(content)
            .map_err(|e| ProviderError::BadResponse(format!("content is not JSON: {e}")))?;

        let input_tokens = payload["usage"]["prompt_tokens"]
            .as_u64()
            .unwrap_or_else(|| estimate_tokens(prompt));
        let output_tokens = payload["usage"]["completion_tokens"]
            .as_u64()
            .unwrap_or_else(|| estimate_tokens(content));

        Ok((value, input_tokens, output_tokens))
    }
}

#[async_trait]
impl LlmProvider for HttpLlmAdapter {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn capacity_class(&self) -> CapacityClass {
        self.config.capacity
    }

    fn default_model(&self) -> &str {
        &self.config.default_model
    }

    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, ProviderError> {
        let model = if request.model.is_empty() {
            self.config.default_model.as_str()
        } else {
            request.model.as_str()
        };

        let (value, mut input_tokens, mut output_tokens) =
            self.call_once(model, &request.prompt, &request.schema).await?;

        match schema::validate(&value, &request.schema) {
            Ok(()) => Ok(LlmResponse {
                value,
                input_tokens,
                output_tokens,
            }),
            Err(errors) => {
                tracing::warn!(
                    provider = self.name(),
                    model,
                    errors = errors.len(),
                    "schema validation failed, re-prompting once"
                );
                let repair_prompt = format!(
                    "{}\n\nYour previous response failed schema validation:\n{}\nRespond again \
with JSON that conforms exactly to the schema.",
                    request.prompt,
                    errors.join("\n")
                );
                let (value, inp, out) =
                    self.call_once(model, &repair_prompt, &request.schema).await?;
                input_tokens += inp;
                output_tokens += out;
                match schema::validate(&value, &request.schema) {
                    Ok(()) => Ok(LlmResponse {
                        value,
                        input_tokens,
                        output_tokens,
                    }),
                    Err(errors) => Err(ProviderError::SchemaRejected(errors.join("; "))),
                }
            }
        }
    }
}
