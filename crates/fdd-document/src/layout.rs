//! # Layout Analysis Records
//!
//! Shapes produced by the external layout analyzer, plus the
//! [`LayoutAnalyzer`] trait the pipeline calls through. The analyzer is
//! a collaborator service; this crate defines the wire contract and an
//! HTTP client for it.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Classification of a layout block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockKind {
    Title,
    Text,
    Header,
    Table,
    Image,
}

/// One detected block on a page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayoutBlock {
    #[serde(rename = "type")]
    pub kind: BlockKind,
    /// `[x0, y0, x1, y1]` in page coordinates.
    pub bbox: [f32; 4],
    pub text: String,
    /// Analyzer confidence in `[0, 1]`.
    pub confidence: f32,
}

/// One analyzed page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayoutPage {
    /// Zero-based page index.
    pub page_idx: u32,
    /// `[width, height]` in points.
    pub size: [f32; 2],
    pub blocks: Vec<LayoutBlock>,
}

/// Full layout-analysis output for a document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LayoutRecord {
    pub pages: Vec<LayoutPage>,
}

impl LayoutRecord {
    /// Concatenated text of all blocks on a page, in block order.
    pub fn page_text(&self, page_idx: u32) -> String {
        self.pages
            .iter()
            .filter(|p| p.page_idx == page_idx)
            .flat_map(|p| p.blocks.iter())
            .map(|b| b.text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Error calling the layout analyzer.
#[derive(Error, Debug)]
pub enum LayoutError {
    /// The analyzer did not respond within the timeout.
    #[error("layout analyzer timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    /// The analyzer is unreachable or returned a server error.
    #[error("layout analyzer unavailable: {0}")]
    Unavailable(String),

    /// The response body did not match the layout record shape.
    #[error("layout analyzer returned a malformed record: {0}")]
    BadResponse(String),
}

impl LayoutError {
    /// Whether a retry may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::Unavailable(_))
    }
}

/// A service that turns PDF bytes into a [`LayoutRecord`].
#[async_trait]
pub trait LayoutAnalyzer: Send + Sync {
    async fn analyze(&self, pdf_bytes: &[u8]) -> Result<LayoutRecord, LayoutError>;
}

/// HTTP client for the layout analyzer service.
///
/// POSTs the raw PDF to `{base_url}/analyze` and expects a JSON
/// [`LayoutRecord`] back.
#[derive(Debug)]
pub struct HttpLayoutAnalyzer {
    client: reqwest::Client,
    base_url: String,
    timeout_secs: u64,
}

impl HttpLayoutAnalyzer {
    /// Build a client with the given base URL and timeout.
    pub fn new(base_url: impl Into<String>, timeout_secs: u64) -> Result<Self, LayoutError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| LayoutError::Unavailable(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout_secs,
        })
    }
}

#[async_trait]
impl LayoutAnalyzer for HttpLayoutAnalyzer {
    async fn analyze(&self, pdf_bytes: &[u8]) -> Result<LayoutRecord, LayoutError> {
        let url = format!("{}/analyze", self.base_url);
        let resp = self
            .client
            .post(&url)
            .header(reqwest::header::CONTENT_TYPE, "application/pdf")
            .body(pdf_bytes.to_vec())
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LayoutError::Timeout {
                        timeout_secs: self.timeout_secs,
                    }
                } else {
                    LayoutError::Unavailable(format!("{url}: {e}"))
                }
            })?;

        if !resp.status().is_success() {
            let status = resp.status();
            return Err(LayoutError::Unavailable(format!("{url}: HTTP {status}")));
        }

        resp.json::<LayoutRecord>()
            .await
            .map_err(|e| LayoutError::BadResponse(e.to_string()))
    }
}

/// Canned analyzer returning a fixed record; for tests and local runs.
#[derive(Debug, Clone, Default)]
pub struct StaticLayoutAnalyzer {
    record: LayoutRecord,
}

impl StaticLayoutAnalyzer {
    pub fn new(record: LayoutRecord) -> Self {
        Self { record }
    }
}

#[async_trait]
impl LayoutAnalyzer for StaticLayoutAnalyzer {
    async fn analyze(&self, _pdf_bytes: &[u8]) -> Result<LayoutRecord, LayoutError> {
        Ok(self.record.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_kind_wire_format() {
        let block = LayoutBlock {
            kind: BlockKind::Header,
            bbox: [0.0, 0.0, 100.0, 20.0],
            text: "ITEM 5".to_string(),
            confidence: 0.98,
        };
        let json = serde_json::to_value(&block).unwrap();
        assert_eq!(json["type"], "header");
        let back: LayoutBlock = serde_json::from_value(json).unwrap();
        assert_eq!(back.kind, BlockKind::Header);
    }

    #[test]
    fn page_text_concatenates_blocks() {
        let record = LayoutRecord {
            pages: vec![LayoutPage {
                page_idx: 0,
                size: [612.0, 792.0],
                blocks: vec![
                    LayoutBlock {
                        kind: BlockKind::Title,
                        bbox: [0.0; 4],
                        text: "ITEM 5".into(),
                        confidence: 1.0,
                    },
                    LayoutBlock {
                        kind: BlockKind::Text,
                        bbox: [0.0; 4],
                        text: "INITIAL FEES".into(),
                        confidence: 1.0,
                    },
                ],
            }],
        };
        assert_eq!(record.page_text(0), "ITEM 5\nINITIAL FEES");
        assert_eq!(record.page_text(3), "");
    }
}
