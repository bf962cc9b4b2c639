//! # fdd-core — Foundational Types for the FDD Pipeline
//!
//! Shared vocabulary for every pipeline stage: identifiers, content
//! digests, the 25-item catalog, status enums with their exact wire
//! strings, domain records, the tagged extracted-payload variants, and
//! the configuration surface.
//!
//! ## Design
//!
//! - Identifiers are UUID newtypes — a `SectionId` can never be passed
//!   where an `FddId` is expected.
//! - Monetary values are `i64` cents everywhere. Floats never carry
//!   money.
//! - Status enums serialize to the exact strings the metadata store and
//!   downstream consumers expect; round-tripping through serde is
//!   lossless and case-sensitive.
//! - `ExtractedItem` is a tagged variant discriminated by item number.
//!   The validator and the storage router both dispatch on the tag, so
//!   adding a normalized item shape is a compile-visible change.

pub mod config;
pub mod digest;
pub mod extracted;
pub mod ids;
pub mod item;
pub mod model;
pub mod quality;
pub mod status;

pub use config::{PipelineConfig, RetryConfig, StageConcurrency, Timeouts};
pub use digest::{filename_slug, ContentHash, DigestError};
pub use extracted::{
    ExtractedItem, FinancialsRow, FprDisclosure, InitialFee, InvestmentLine, MetricRange, OtherFee,
    OutletRow, OutletType,
};
pub use ids::{FddId, FranchisorId, ReviewId, SectionId};
pub use item::{ItemNo, HIGH_VALUE_ITEMS, ITEM_TITLES};
pub use model::{
    Fdd, Franchisor, LineageViolation, RawDocument, ReviewReason, ReviewRecord, Section,
};
pub use quality::quality_score;
pub use status::{
    Category, DocumentType, ExtractionStatus, MatchKind, ProcessingStatus, Severity,
};
