//! # Outlier Flags
//!
//! Monetary fields deviating more than four standard deviations from
//! the cross-document distribution get an info-severity flag. The
//! distribution is supplied by the embedding application (computed
//! offline over stored records) and registered per field path.

use dashmap::DashMap;
use fdd_core::Category;
use serde::{Deserialize, Serialize};

use crate::issue::ValidationIssue;

/// Deviation threshold in standard deviations.
const SIGMA_THRESHOLD: f64 = 4.0;

/// Cross-document distribution of one monetary field.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct FieldStats {
    pub mean: f64,
    pub std_dev: f64,
    /// Number of observations behind the estimate.
    pub sample_size: u64,
}

/// Registry of field distributions, keyed by field path
/// (e.g. `item5.amount_cents`).
#[derive(Debug, Default)]
pub struct OutlierRegistry {
    stats: DashMap<String, FieldStats>,
}

impl OutlierRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register or replace the distribution for a field.
    pub fn set(&self, field: impl Into<String>, stats: FieldStats) {
        self.stats.insert(field.into(), stats);
    }

    /// Flag a value if it deviates more than 4σ from its field's
    /// distribution. Unknown fields and degenerate distributions
    /// (σ = 0 or tiny samples) never flag.
    pub fn check(&self, field: &str, value_cents: i64) -> Option<ValidationIssue> {
        let stats = self.stats.get(field)?;
        if stats.std_dev <= 0.0 || stats.sample_size < 10 {
            return None;
        }
        let deviation = ((value_cents as f64) - stats.mean).abs() / stats.std_dev;
        if deviation > SIGMA_THRESHOLD {
            Some(
                ValidationIssue::info(
                    field,
                    Category::Range,
                    format!(
                        "value deviates {deviation:.1}σ from the cross-document mean"
                    ),
                )
                .with_actual(value_cents)
                .with_expected(format!(
                    "within {SIGMA_THRESHOLD}σ of {:.0}",
                    stats.mean
                )),
            )
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> OutlierRegistry {
        let reg = OutlierRegistry::new();
        reg.set(
            "item5.amount_cents",
            FieldStats {
                mean: 4_000_000.0,
                std_dev: 1_000_000.0,
                sample_size: 500,
            },
        );
        reg
    }

    #[test]
    fn typical_values_pass() {
        assert!(registry().check("item5.amount_cents", 4_500_000).is_none());
    }

    #[test]
    fn extreme_values_flag_as_info() {
        let issue = registry()
            .check("item5.amount_cents", 50_000_000)
            .expect("46σ deviation must flag");
        assert_eq!(issue.severity, fdd_core::Severity::Info);
        assert_eq!(issue.category, Category::Range);
    }

    #[test]
    fn unknown_fields_never_flag() {
        assert!(registry().check("item7.low_cents", i64::MAX / 2).is_none());
    }

    #[test]
    fn thin_samples_never_flag() {
        let reg = OutlierRegistry::new();
        reg.set(
            "f",
            FieldStats {
                mean: 100.0,
                std_dev: 1.0,
                sample_size: 3,
            },
        );
        assert!(reg.check("f", 1_000_000).is_none());
    }
}
