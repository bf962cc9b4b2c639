//! # Object-Store Path Layout
//!
//! Paths are stable and content-addressed at the document level: the
//! same bytes always land at the same raw path, and section slices live
//! under the document identifier.
//!
//! - Raw uploads: `raw/{state}/{franchise_slug}/{year}/{hash}.pdf`
//! - Section slices: `processed/{fdd_id}/section_{nn}.pdf`

use fdd_core::{filename_slug, ContentHash, FddId, ItemNo};

/// Path for a raw uploaded document.
pub fn raw_document_path(state: &str, franchisor_name: &str, year: i32, hash: &ContentHash) -> String {
    format!(
        "raw/{}/{}/{}/{}.pdf",
        state.to_ascii_lowercase(),
        filename_slug(franchisor_name),
        year,
        hash.to_hex()
    )
}

/// Path for a segmented per-section PDF.
pub fn section_path(fdd_id: FddId, item_no: ItemNo) -> String {
    format!("processed/{}/{}.pdf", fdd_id, item_no.section_file_stem())
}
