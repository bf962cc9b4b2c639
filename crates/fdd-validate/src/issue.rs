//! # Validation Issues and Reports

use fdd_core::{Category, Severity};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One validation finding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationIssue {
    /// Dotted path to the violating field, e.g. `rows[2].count_end`.
    pub field_path: String,
    pub severity: Severity,
    pub category: Category,
    /// The observed value, when meaningful.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actual: Option<Value>,
    /// The expected value or constraint, when meaningful.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected: Option<Value>,
    pub message: String,
}

impl ValidationIssue {
    /// Construct an error-severity issue.
    pub fn error(
        field_path: impl Into<String>,
        category: Category,
        message: impl Into<String>,
    ) -> Self {
        Self {
            field_path: field_path.into(),
            severity: Severity::Error,
            category,
            actual: None,
            expected: None,
            message: message.into(),
        }
    }

    /// Construct a warning-severity issue.
    pub fn warning(
        field_path: impl Into<String>,
        category: Category,
        message: impl Into<String>,
    ) -> Self {
        Self {
            severity: Severity::Warning,
            ..Self::error(field_path, category, message)
        }
    }

    /// Construct an info-severity issue.
    pub fn info(
        field_path: impl Into<String>,
        category: Category,
        message: impl Into<String>,
    ) -> Self {
        Self {
            severity: Severity::Info,
            ..Self::error(field_path, category, message)
        }
    }

    /// Attach the observed value.
    pub fn with_actual(mut self, actual: impl Into<Value>) -> Self {
        self.actual = Some(actual.into());
        self
    }

    /// Attach the expected value or constraint.
    pub fn with_expected(mut self, expected: impl Into<Value>) -> Self {
        self.expected = Some(expected.into());
        self
    }
}

/// The outcome of validating one extracted record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub issues: Vec<ValidationIssue>,
    /// True when an active operator bypass demoted errors.
    pub bypassed: bool,
}

impl ValidationReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, issue: ValidationIssue) {
        self.issues.push(issue);
    }

    /// Merge another report's issues into this one.
    pub fn extend(&mut self, other: ValidationReport) {
        self.issues.extend(other.issues);
        self.bypassed |= other.bypassed;
    }

    /// Whether storage of the record is blocked.
    pub fn has_blocking(&self) -> bool {
        self.issues.iter().any(|i| i.severity == Severity::Error)
    }

    /// Whether the stored record must carry the review flag: any
    /// warning, or any bypassed error.
    pub fn needs_review(&self) -> bool {
        self.bypassed || self.issues.iter().any(|i| i.severity >= Severity::Warning)
    }

    /// Demote every error to a warning, recording the bypass.
    pub fn apply_bypass(&mut self) {
        for issue in &mut self.issues {
            if issue.severity == Severity::Error {
                issue.severity = Severity::Warning;
            }
        }
        self.bypassed = true;
    }

    /// Highest severity present, if any issues exist.
    pub fn max_severity(&self) -> Option<Severity> {
        self.issues.iter().map(|i| i.severity).max()
    }
}
