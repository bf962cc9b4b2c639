//! # Extraction Engine
//!
//! Drives one section through its provider chain: render the prompt,
//! check the document budget, call, parse the schema-valid value into
//! the typed payload. Schema rejections escalate along the chain;
//! transient provider failures fall through to the next provider and,
//! if the whole chain is down, surface as a retryable error for the
//! scheduler.
//!
//! Attempt accounting is per section: at most
//! [`MAX_ATTEMPTS_PER_SECTION`] provider calls regardless of why
//! earlier ones failed.

use std::sync::Arc;

use async_trait::async_trait;
use fdd_core::{ExtractedItem, FddId, ItemNo};
use serde::Deserialize;
use thiserror::Error;

use crate::budget::TokenBudget;
use crate::prompt::{self, PromptVars};
use crate::provider::{LlmRequest, ProviderError};
use crate::router::{ModelRouter, RouterError};
use crate::schema;

/// Hard cap on provider calls for one section.
pub const MAX_ATTEMPTS_PER_SECTION: u32 = 3;

/// Error from section extraction.
#[derive(Error, Debug)]
pub enum ExtractError {
    /// Every attempt produced a schema-invalid response.
    #[error("schema-invalid after {attempts} attempts: {last_error}")]
    SchemaInvalid { attempts: u32, last_error: String },

    /// All providers in the chain were unreachable.
    #[error("no provider available: {0}")]
    ProviderUnavailable(String),

    /// The chain's providers throttled every attempt.
    #[error("rate limited{}", retry_after_secs.map(|s| format!(", retry after {s}s")).unwrap_or_default())]
    RateLimited { retry_after_secs: Option<u64> },

    /// The document's token budget is exhausted; the section should be
    /// marked Skipped.
    #[error("token budget exceeded: {spent} of {limit}")]
    BudgetExceeded { spent: u64, limit: u64 },

    /// No chain could be built for the item.
    #[error(transparent)]
    Routing(#[from] RouterError),

    /// A schema-valid value failed to convert into the typed payload.
    #[error("payload conversion failed: {0}")]
    BadPayload(String),
}

impl ExtractError {
    /// Whether the scheduler should retry this section later.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::ProviderUnavailable(_) | Self::RateLimited { .. })
    }
}

/// Inputs for one section extraction.
#[derive(Debug, Clone)]
pub struct SectionContext {
    pub fdd_id: FddId,
    pub item_no: ItemNo,
    pub franchisor_name: String,
    pub issue_year: i32,
    pub section_text: String,
}

/// A completed extraction with its metadata.
#[derive(Debug, Clone)]
pub struct Extraction {
    pub item: ExtractedItem,
    /// Provider/model that produced the accepted value.
    pub model: String,
    pub template_version: u32,
    pub attempts: u32,
    pub tokens_used: u64,
    pub confidence: f32,
}

/// Rate-budget gate consulted before every provider call. The
/// scheduler supplies per-provider token buckets; the default is
/// unlimited.
#[async_trait]
pub trait Throttle: Send + Sync {
    /// Wait until the named provider has call budget.
    async fn acquire(&self, provider: &str);
}

/// No-op throttle.
pub struct NoThrottle;

#[async_trait]
impl Throttle for NoThrottle {
    async fn acquire(&self, _provider: &str) {}
}

/// Engine tying the router, templates, schemas, and budget together.
pub struct ExtractionEngine {
    router: ModelRouter,
    throttle: Arc<dyn Throttle>,
}

impl ExtractionEngine {
    pub fn new(router: ModelRouter) -> Self {
        Self {
            router,
            throttle: Arc::new(NoThrottle),
        }
    }

    /// Attach a rate-budget gate.
    pub fn with_throttle(router: ModelRouter, throttle: Arc<dyn Throttle>) -> Self {
        Self { router, throttle }
    }

    /// Extract one section, charging the document budget.
    pub async fn extract(
        &self,
        ctx: &SectionContext,
        budget: &TokenBudget,
    ) -> Result<Extraction, ExtractError> {
        if budget.exhausted() {
            return Err(ExtractError::BudgetExceeded {
                spent: budget.spent(),
                limit: budget.limit(),
            });
        }

        let template = prompt::template_for(ctx.item_no);
        let rendered = template.render(&PromptVars {
            franchisor_name: &ctx.franchisor_name,
            issue_year: ctx.issue_year,
            item_title: ctx.item_no.title(),
            section_text: &ctx.section_text,
        });
        let item_schema = schema::schema_for(ctx.item_no);

        let chain = self.router.chain_for(ctx.item_no)?;
        // Attempt order: the chain as configured, with the final (most
        // capable) provider repeated to fill the attempt cap.
        let mut order = chain.clone();
        while order.len() < MAX_ATTEMPTS_PER_SECTION as usize {
            match order.last() {
                Some(last) => order.push(last.clone()),
                None => break,
            }
        }
        order.truncate(MAX_ATTEMPTS_PER_SECTION as usize);

        let mut attempts = 0u32;
        let mut tokens_used = 0u64;
        let mut last_schema_error: Option<String> = None;
        let mut last_transient: Option<ProviderError> = None;

        for provider in &order {
            if budget.exhausted() {
                return Err(ExtractError::BudgetExceeded {
                    spent: budget.spent(),
                    limit: budget.limit(),
                });
            }
            attempts += 1;
            self.throttle.acquire(provider.name()).await;

            let request = LlmRequest {
                model: provider.default_model().to_string(),
                prompt: rendered.clone(),
                schema: item_schema.clone(),
            };
            tracing::debug!(
                fdd_id = %ctx.fdd_id,
                item = %ctx.item_no,
                provider = provider.name(),
                attempt = attempts,
                "extraction call"
            );

            match provider.complete(&request).await {
                Ok(response) => {
                    tokens_used += response.total_tokens();
                    budget.charge(response.total_tokens());
                    let item = parse_item(ctx.item_no, response.value)
                        .map_err(ExtractError::BadPayload)?;
                    return Ok(Extraction {
                        item,
                        model: format!("{}/{}", provider.name(), request.model),
                        template_version: template.version,
                        attempts,
                        tokens_used,
                        confidence: confidence_for(attempts),
                    });
                }
                Err(ProviderError::SchemaRejected(message)) => {
                    tracing::warn!(
                        fdd_id = %ctx.fdd_id,
                        item = %ctx.item_no,
                        provider = provider.name(),
                        attempt = attempts,
                        "schema rejected, escalating"
                    );
                    last_schema_error = Some(message);
                }
                Err(e) if e.is_transient() => {
                    tracing::warn!(
                        fdd_id = %ctx.fdd_id,
                        item = %ctx.item_no,
                        provider = provider.name(),
                        attempt = attempts,
                        error = %e,
                        "provider failed, falling back"
                    );
                    last_transient = Some(e);
                }
                Err(e) => {
                    // Malformed responses are treated like schema failures:
                    // escalate rather than retry the same provider.
                    last_schema_error = Some(e.to_string());
                }
            }
        }

        if let Some(message) = last_schema_error {
            return Err(ExtractError::SchemaInvalid {
                attempts,
                last_error: message,
            });
        }
        match last_transient {
            Some(ProviderError::RateLimited { retry_after_secs }) => {
                Err(ExtractError::RateLimited { retry_after_secs })
            }
            Some(e) => Err(ExtractError::ProviderUnavailable(e.to_string())),
            None => Err(ExtractError::ProviderUnavailable(
                "provider chain exhausted".into(),
            )),
        }
    }
}

/// First-attempt acceptances score highest; each escalation costs 0.15.
fn confidence_for(attempts: u32) -> f32 {
    (1.0 - 0.15 * (attempts.saturating_sub(1)) as f32).max(0.5)
}

#[derive(Deserialize)]
struct FeesWrapper {
    fees: serde_json::Value,
}

#[derive(Deserialize)]
struct LinesWrapper {
    lines: serde_json::Value,
}

#[derive(Deserialize)]
struct RowsWrapper {
    rows: serde_json::Value,
}

/// Convert a schema-valid JSON value into the typed payload.
pub fn parse_item(item_no: ItemNo, value: serde_json::Value) -> Result<ExtractedItem, String> {
    let err = |e: serde_json::Error| format!("{item_no}: {e}");
    match item_no.as_u8() {
        5 => {
            let wrapper: FeesWrapper = serde_json::from_value(value).map_err(err)?;
            Ok(ExtractedItem::InitialFees(
                serde_json::from_value(wrapper.fees).map_err(err)?,
            ))
        }
        6 => {
            let wrapper: FeesWrapper = serde_json::from_value(value).map_err(err)?;
            Ok(ExtractedItem::OtherFees(
                serde_json::from_value(wrapper.fees).map_err(err)?,
            ))
        }
        7 => {
            let wrapper: LinesWrapper = serde_json::from_value(value).map_err(err)?;
            Ok(ExtractedItem::InitialInvestment(
                serde_json::from_value(wrapper.lines).map_err(err)?,
            ))
        }
        19 => Ok(ExtractedItem::Fpr(
            serde_json::from_value(value).map_err(err)?,
        )),
        20 => {
            let wrapper: RowsWrapper = serde_json::from_value(value).map_err(err)?;
            Ok(ExtractedItem::Outlets(
                serde_json::from_value(wrapper.rows).map_err(err)?,
            ))
        }
        21 => {
            let wrapper: RowsWrapper = serde_json::from_value(value).map_err(err)?;
            Ok(ExtractedItem::Financials(
                serde_json::from_value(wrapper.rows).map_err(err)?,
            ))
        }
        _ => Ok(ExtractedItem::Other {
            item_no,
            schema_version: schema::OPAQUE_SCHEMA_VERSION,
            payload: value,
        }),
    }
}
