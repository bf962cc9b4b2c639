//! # fdd-document — PDFs, Object Storage, and Layout Records
//!
//! Everything the pipeline needs to handle a disclosure document as a
//! file: a structural PDF reader that can count pages and cut
//! page-range slices, the object-store interface with filesystem and
//! in-memory backends, the content-addressed path layout, and the
//! record types produced by the external layout analyzer.
//!
//! ## Design
//!
//! The PDF reader is deliberately structural: it parses the object
//! graph far enough to walk the page tree and copy page objects into a
//! slice, and not one step further. Content streams are copied
//! byte-for-byte — pages are never re-rendered. Files whose page
//! objects live inside compressed object streams are rejected with
//! [`pdf::PdfError::Unsupported`] rather than half-parsed.

pub mod layout;
pub mod paths;
pub mod pdf;
pub mod store;

pub use layout::{
    BlockKind, HttpLayoutAnalyzer, LayoutAnalyzer, LayoutBlock, LayoutError, LayoutPage,
    LayoutRecord, StaticLayoutAnalyzer,
};
pub use paths::{raw_document_path, section_path};
pub use pdf::{PdfDocument, PdfError};
pub use store::{FsObjectStore, MemoryObjectStore, ObjectStore, StoreError};
