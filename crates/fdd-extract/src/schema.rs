//! # Extraction Schemas
//!
//! The JSON schema declared with every completion request, keyed by
//! item number. High-value items get strict shapes mirroring the typed
//! payloads; everything else gets a permissive object schema whose
//! version is recorded with the stored payload.

use fdd_core::ItemNo;
use serde_json::{json, Value};

/// Schema version recorded for opaque (non-high-value) payloads.
pub const OPAQUE_SCHEMA_VERSION: u32 = 1;

/// The response schema for an item's extraction call.
pub fn schema_for(item_no: ItemNo) -> Value {
    match item_no.as_u8() {
        5 => json!({
            "type": "object",
            "required": ["fees"],
            "properties": {
                "fees": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "required": ["name", "amount_cents", "refundable"],
                        "properties": {
                            "name": {"type": "string"},
                            "amount_cents": {"type": "integer", "minimum": 0},
                            "refundable": {"type": "boolean"},
                            "conditions": {"type": ["string", "null"]}
                        },
                        "additionalProperties": false
                    }
                }
            },
            "additionalProperties": false
        }),
        6 => json!({
            "type": "object",
            "required": ["fees"],
            "properties": {
                "fees": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "required": ["name", "frequency", "basis"],
                        "properties": {
                            "name": {"type": "string"},
                            "amount_cents": {"type": ["integer", "null"], "minimum": 0},
                            "amount_percentage": {"type": ["number", "null"], "minimum": 0},
                            "frequency": {"type": "string"},
                            "basis": {"type": "string"},
                            "minimum_cents": {"type": ["integer", "null"], "minimum": 0},
                            "maximum_cents": {"type": ["integer", "null"], "minimum": 0}
                        },
                        "additionalProperties": false
                    }
                }
            },
            "additionalProperties": false
        }),
        7 => json!({
            "type": "object",
            "required": ["lines"],
            "properties": {
                "lines": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "required": ["category", "low_cents", "high_cents", "when_due", "to_whom"],
                        "properties": {
                            "category": {"type": "string"},
                            "low_cents": {"type": "integer", "minimum": 0},
                            "high_cents": {"type": "integer", "minimum": 0},
                            "when_due": {"type": "string"},
                            "to_whom": {"type": "string"}
                        },
                        "additionalProperties": false
                    }
                }
            },
            "additionalProperties": false
        }),
        19 => json!({
            "type": "object",
            "required": ["disclosure_type", "sample_size", "time_period"],
            "properties": {
                "disclosure_type": {"type": "string"},
                "sample_size": {"type": "integer", "minimum": 0},
                "time_period": {"type": "string"},
                "revenue": {"$ref": "#/$defs/metric_range"},
                "profit": {"$ref": "#/$defs/metric_range"}
            },
            "additionalProperties": false,
            "$defs": {
                "metric_range": {
                    "type": ["object", "null"],
                    "required": ["low_cents", "average_cents", "high_cents"],
                    "properties": {
                        "low_cents": {"type": "integer"},
                        "average_cents": {"type": "integer"},
                        "median_cents": {"type": ["integer", "null"]},
                        "high_cents": {"type": "integer"}
                    },
                    "additionalProperties": false
                }
            }
        }),
        20 => json!({
            "type": "object",
            "required": ["rows"],
            "properties": {
                "rows": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "required": [
                            "fiscal_year", "outlet_type", "count_start", "opened",
                            "closed", "transferred_in", "transferred_out", "count_end"
                        ],
                        "properties": {
                            "fiscal_year": {"type": "integer"},
                            "outlet_type": {"enum": ["Franchised", "CompanyOwned"]},
                            "count_start": {"type": "integer", "minimum": 0},
                            "opened": {"type": "integer", "minimum": 0},
                            "closed": {"type": "integer", "minimum": 0},
                            "transferred_in": {"type": "integer", "minimum": 0},
                            "transferred_out": {"type": "integer", "minimum": 0},
                            "count_end": {"type": "integer", "minimum": 0}
                        },
                        "additionalProperties": false
                    }
                }
            },
            "additionalProperties": false
        }),
        21 => json!({
            "type": "object",
            "required": ["rows"],
            "properties": {
                "rows": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "required": [
                            "fiscal_year", "revenue_cents", "net_income_cents",
                            "total_assets_cents", "total_liabilities_cents", "total_equity_cents"
                        ],
                        "properties": {
                            "fiscal_year": {"type": "integer"},
                            "revenue_cents": {"type": "integer"},
                            "net_income_cents": {"type": "integer"},
                            "total_assets_cents": {"type": "integer"},
                            "total_liabilities_cents": {"type": "integer"},
                            "total_equity_cents": {"type": "integer"}
                        },
                        "additionalProperties": false
                    }
                }
            },
            "additionalProperties": false
        }),
        _ => json!({
            "type": "object",
            "required": ["summary"],
            "properties": {
                "summary": {"type": "string"}
            },
            "additionalProperties": true
        }),
    }
}

/// Validate a value against a schema; errors are instance-path-prefixed
/// messages.
pub fn validate(value: &Value, schema: &Value) -> Result<(), Vec<String>> {
    let validator = match jsonschema::validator_for(schema) {
        Ok(v) => v,
        Err(e) => return Err(vec![format!("schema did not compile: {e}")]),
    };
    let errors: Vec<String> = validator
        .iter_errors(value)
        .map(|e| format!("{}: {}", e.instance_path, e))
        .collect();
    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
