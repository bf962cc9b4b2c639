//! # LLM Provider Interface
//!
//! The generic trait every extraction backend implements, plus the
//! request/response shapes and the provider error taxonomy. Adapters
//! own the structured-output contract: they must either return a value
//! conforming to the request schema or fail with `SchemaRejected`.

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

/// Capacity tier of a provider. The router escalates from `Local`
/// to `HighCapacity` on schema failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CapacityClass {
    /// Cheap, fast, good at simple tables.
    Local,
    /// Expensive, strong at narrative and financial reasoning.
    HighCapacity,
}

/// One completion request against a declared schema.
#[derive(Debug, Clone)]
pub struct LlmRequest {
    pub model: String,
    pub prompt: String,
    /// JSON schema the response value must conform to.
    pub schema: Value,
}

/// A schema-conforming completion.
#[derive(Debug, Clone)]
pub struct LlmResponse {
    pub value: Value,
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl LlmResponse {
    /// Total tokens charged against the document budget.
    pub fn total_tokens(&self) -> u64 {
        self.input_tokens + self.output_tokens
    }
}

/// Error from a provider call.
#[derive(Error, Debug)]
pub enum ProviderError {
    /// The provider throttled the request.
    #[error("rate limited{}", retry_after_secs.map(|s| format!(", retry after {s}s")).unwrap_or_default())]
    RateLimited { retry_after_secs: Option<u64> },

    /// The provider is unreachable or returned a server error.
    #[error("provider unavailable: {0}")]
    Unavailable(String),

    /// The call did not complete within the timeout.
    #[error("provider timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    /// The response failed schema validation even after the adapter's
    /// internal re-prompt.
    #[error("response rejected by schema: {0}")]
    SchemaRejected(String),

    /// The response body was not parseable at all.
    #[error("malformed provider response: {0}")]
    BadResponse(String),
}

impl ProviderError {
    /// Whether a retry against the same provider may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::RateLimited { .. } | Self::Unavailable(_) | Self::Timeout { .. }
        )
    }
}

/// An extraction backend.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Stable provider name used in routing configuration.
    fn name(&self) -> &str;

    /// Capacity tier for escalation decisions.
    fn capacity_class(&self) -> CapacityClass;

    /// Model identifier used when the request does not name one.
    fn default_model(&self) -> &str;

    /// Complete a request. The returned value conforms to
    /// `request.schema`.
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, ProviderError>;
}

/// Estimate a token count from text length when the provider omits
/// usage data. Four characters per token is the standard rule of thumb.
pub fn estimate_tokens(text: &str) -> u64 {
    (text.len() as u64).div_ceil(4)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_classification() {
        assert!(ProviderError::RateLimited {
            retry_after_secs: Some(2)
        }
        .is_transient());
        assert!(ProviderError::Unavailable("503".into()).is_transient());
        assert!(ProviderError::Timeout { timeout_secs: 60 }.is_transient());
        assert!(!ProviderError::SchemaRejected("missing field".into()).is_transient());
        assert!(!ProviderError::BadResponse("not json".into()).is_transient());
    }

    #[test]
    fn token_estimate_rounds_up() {
        assert_eq!(estimate_tokens(""), 0);
        assert_eq!(estimate_tokens("abcd"), 1);
        assert_eq!(estimate_tokens("abcde"), 2);
    }

    #[test]
    fn capacity_ordering_supports_escalation() {
        assert!(CapacityClass::Local < CapacityClass::HighCapacity);
    }
}
