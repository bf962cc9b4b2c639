//! # fdd-extract — LLM Extraction Engine
//!
//! Turns a section's text into a typed extraction result or a
//! definitive failure. Providers sit behind [`LlmProvider`]; the
//! [`router::ModelRouter`] picks an ordered chain per item, and the
//! [`engine::ExtractionEngine`] drives calls with schema enforcement,
//! capacity-escalating fallback, and per-document token budgets.
//!
//! ## Structured-output contract
//!
//! Every call declares a JSON schema. The adapter validates the
//! response and may internally re-prompt once; a response that still
//! fails validation is a [`provider::ProviderError::SchemaRejected`].
//! The engine then escalates to a higher-capacity provider, up to
//! three attempts per section in total.

pub mod budget;
pub mod engine;
pub mod http;
pub mod mock;
pub mod prompt;
pub mod provider;
pub mod router;
pub mod schema;

pub use budget::TokenBudget;
pub use engine::{
    ExtractError, Extraction, ExtractionEngine, NoThrottle, SectionContext, Throttle,
};
pub use http::{HttpLlmAdapter, HttpLlmConfig};
pub use mock::MockLlmProvider;
pub use provider::{CapacityClass, LlmProvider, LlmRequest, LlmResponse, ProviderError};
pub use router::ModelRouter;
