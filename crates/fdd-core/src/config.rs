//! # Configuration Surface
//!
//! `PipelineConfig` is the single serde-deserializable tree recognized
//! by the pipeline. Every field has a production default, so an empty
//! YAML document yields a fully working configuration and a partial
//! one overrides only what it names.
//!
//! ## Recognized options
//!
//! - `max_concurrency.{register,segment,extract,validate,store}`
//! - `retry.{register,segment,extract,validate,store}.*`
//! - `llm.routing` (item number → ordered provider chain) and
//!   `llm.budget.per_document_tokens`
//! - `similarity.{high_threshold,review_threshold}`
//! - `detector.min_anchors_required`
//! - `document.deadline_seconds`
//! - `validation.bypass_reasons`
//! - `timeouts.{llm_secs,embedding_secs,object_store_secs,db_secs}`

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error loading or validating a configuration document.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The YAML document could not be parsed.
    #[error("config parse error: {0}")]
    Parse(#[from] serde_yaml::Error),

    /// A routing chain referenced an item number outside the catalog.
    #[error("llm.routing references item {0}, outside 0..=24")]
    UnknownItem(u8),

    /// A routing chain was empty.
    #[error("llm.routing chain for item {0} is empty")]
    EmptyChain(u8),

    /// Thresholds must satisfy 0 < review <= high <= 1.
    #[error("similarity thresholds out of order: review={review}, high={high}")]
    ThresholdOrder { review: f32, high: f32 },
}

/// Worker caps per pipeline stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StageConcurrency {
    pub register: usize,
    pub segment: usize,
    pub extract: usize,
    pub validate: usize,
    pub store: usize,
}

impl Default for StageConcurrency {
    fn default() -> Self {
        Self {
            register: 4,
            segment: 2,
            extract: 8,
            validate: 8,
            store: 4,
        }
    }
}

/// Retry policy parameters for one stage.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 1_000,
            max_delay_ms: 60_000,
            factor: 2.0,
        }
    }
}

/// Per-stage retry policies.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryTable {
    pub register: RetryConfig,
    pub segment: RetryConfig,
    pub extract: RetryConfig,
    pub validate: RetryConfig,
    pub store: RetryConfig,
}

/// LLM routing and budget options.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Item number → ordered provider-name chain. Items absent from the
    /// map use the built-in routing defaults.
    pub routing: BTreeMap<u8, Vec<String>>,
    pub budget: LlmBudget,
}

/// Token budget caps.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmBudget {
    /// Hard cap on tokens spent per document; exceeding marks the
    /// remaining sections Skipped.
    pub per_document_tokens: u64,
}

impl Default for LlmBudget {
    fn default() -> Self {
        Self {
            per_document_tokens: 1_500_000,
        }
    }
}

/// Entity-resolution similarity thresholds.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct SimilarityConfig {
    pub high_threshold: f32,
    pub review_threshold: f32,
}

impl Default for SimilarityConfig {
    fn default() -> Self {
        Self {
            high_threshold: 0.94,
            review_threshold: 0.85,
        }
    }
}

/// Section-detector options.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Minimum distinct items required for a detection to stand.
    pub min_anchors_required: usize,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            min_anchors_required: 18,
        }
    }
}

/// Per-document scheduling options.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct DocumentConfig {
    /// Wall-clock cap on the sum of a document's stage attempts.
    pub deadline_seconds: u64,
}

impl Default for DocumentConfig {
    fn default() -> Self {
        Self {
            deadline_seconds: 600,
        }
    }
}

/// Validation options.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// Allowed reason strings for operator bypasses. Empty means
    /// bypasses are disabled.
    pub bypass_reasons: Vec<String>,
}

/// External-call timeouts, in seconds.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct Timeouts {
    pub llm_secs: u64,
    pub embedding_secs: u64,
    pub object_store_secs: u64,
    pub db_secs: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            llm_secs: 60,
            embedding_secs: 10,
            object_store_secs: 30,
            db_secs: 15,
        }
    }
}

/// The complete pipeline configuration tree.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub max_concurrency: StageConcurrency,
    pub retry: RetryTable,
    pub llm: LlmConfig,
    pub similarity: SimilarityConfig,
    pub detector: DetectorConfig,
    pub document: DocumentConfig,
    pub validation: ValidationConfig,
    pub timeouts: Timeouts,
}

impl PipelineConfig {
    /// Parse a YAML document and validate cross-field constraints.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints that serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (item, chain) in &self.llm.routing {
            if *item > 24 {
                return Err(ConfigError::UnknownItem(*item));
            }
            if chain.is_empty() {
                return Err(ConfigError::EmptyChain(*item));
            }
        }
        let sim = self.similarity;
        if !(0.0 < sim.review_threshold
            && sim.review_threshold <= sim.high_threshold
            && sim.high_threshold <= 1.0)
        {
            return Err(ConfigError::ThresholdOrder {
                review: sim.review_threshold,
                high: sim.high_threshold,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_yaml_gives_defaults() {
        let config = PipelineConfig::from_yaml("{}").unwrap();
        assert_eq!(config.max_concurrency.extract, 8);
        assert_eq!(config.retry.extract.max_attempts, 3);
        assert_eq!(config.similarity.high_threshold, 0.94);
        assert_eq!(config.detector.min_anchors_required, 18);
        assert_eq!(config.document.deadline_seconds, 600);
        assert_eq!(config.timeouts.llm_secs, 60);
    }

    #[test]
    fn partial_yaml_overrides_only_named_fields() {
        let yaml = r#"
max_concurrency:
  extract: 2
similarity:
  high_threshold: 0.97
"#;
        let config = PipelineConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.max_concurrency.extract, 2);
        assert_eq!(config.max_concurrency.register, 4);
        assert_eq!(config.similarity.high_threshold, 0.97);
        assert_eq!(config.similarity.review_threshold, 0.85);
    }

    #[test]
    fn rejects_out_of_catalog_routing() {
        let yaml = r#"
llm:
  routing:
    25: ["primary"]
"#;
        assert!(matches!(
            PipelineConfig::from_yaml(yaml),
            Err(ConfigError::UnknownItem(25))
        ));
    }

    #[test]
    fn rejects_inverted_thresholds() {
        let yaml = r#"
similarity:
  high_threshold: 0.8
  review_threshold: 0.9
"#;
        assert!(matches!(
            PipelineConfig::from_yaml(yaml),
            Err(ConfigError::ThresholdOrder { .. })
        ));
    }
}
