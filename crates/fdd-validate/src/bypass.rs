//! # Operator Bypasses
//!
//! An operator may record a bypass for one (entity type, entity id)
//! pair with a configured reason. While active, error-severity findings
//! for that entity are demoted to warnings. Bypasses never cross
//! entities and are process-wide state owned by the validator.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error recording a bypass.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum BypassError {
    /// The reason string is not in `validation.bypass_reasons`.
    #[error("bypass reason {0:?} is not an allowed reason")]
    ReasonNotAllowed(String),
}

/// One recorded bypass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bypass {
    pub entity_type: String,
    pub entity_id: String,
    pub reason: String,
    pub recorded_at: DateTime<Utc>,
    pub active: bool,
}

/// Process-wide bypass registry.
///
/// Initialized at startup from configuration and passed explicitly to
/// the validator; there is no module-level singleton.
#[derive(Debug, Default)]
pub struct BypassRegistry {
    allowed_reasons: Vec<String>,
    entries: DashMap<(String, String), Bypass>,
}

impl BypassRegistry {
    /// Create a registry with the configured allowed reasons. An empty
    /// list disables bypasses entirely.
    pub fn new(allowed_reasons: Vec<String>) -> Self {
        Self {
            allowed_reasons,
            entries: DashMap::new(),
        }
    }

    /// Record an active bypass for an entity.
    pub fn record(
        &self,
        entity_type: &str,
        entity_id: &str,
        reason: &str,
    ) -> Result<(), BypassError> {
        if !self.allowed_reasons.iter().any(|r| r == reason) {
            return Err(BypassError::ReasonNotAllowed(reason.to_string()));
        }
        self.entries.insert(
            (entity_type.to_string(), entity_id.to_string()),
            Bypass {
                entity_type: entity_type.to_string(),
                entity_id: entity_id.to_string(),
                reason: reason.to_string(),
                recorded_at: Utc::now(),
                active: true,
            },
        );
        tracing::info!(entity_type, entity_id, reason, "bypass recorded");
        Ok(())
    }

    /// Deactivate a bypass, if present.
    pub fn revoke(&self, entity_type: &str, entity_id: &str) {
        if let Some(mut entry) = self
            .entries
            .get_mut(&(entity_type.to_string(), entity_id.to_string()))
        {
            entry.active = false;
        }
    }

    /// Whether an active bypass exists for the entity.
    pub fn is_active(&self, entity_type: &str, entity_id: &str) -> bool {
        self.entries
            .get(&(entity_type.to_string(), entity_id.to_string()))
            .map(|b| b.active)
            .unwrap_or(false)
    }
}
