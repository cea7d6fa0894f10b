//! Core library for legacy open-balance migration.
//!
//! This crate provides:
//! - Cell normalization for Argentine-formatted spreadsheet exports
//! - Row classification and hierarchical (branch → customer → document) assembly
//! - Deterministic document fingerprints for idempotent loading
//! - Balanced opening-balance postings and an extraction report
//! - Customer master listing extraction and a loader interface
//!
//! The crate never reads files: callers hand it a materialized [`RawGrid`].

pub mod destination;
pub mod error;
pub mod extract;
pub mod fingerprint;
pub mod models;
pub mod pipeline;
pub mod posting;
pub mod report;

pub use destination::{CustomerImport, Destination, InMemoryDestination, MigrationSummary, Migrator};
pub use error::{DestinationError, PostingError, Result, SaldosError};
pub use extract::{CustomerMasterParser, ReportMetadata, SectionClassifier};
pub use fingerprint::fingerprint;
pub use models::config::{
    ClassifierConfig, ColumnLayout, CustomerImportConfig, PostingConfig, ReportConfig, SaldosConfig,
};
pub use models::customer::{CustomerExtraction, CustomerRecord};
pub use models::document::{
    BranchContext, ClassifiedRow, CustomerContext, DocumentRecord, FieldKey, Fingerprint,
    RejectionReason, RowKind,
};
pub use models::grid::{RawCell, RawGrid, Scalar};
pub use models::posting::{PostingLeg, PostingPair};
pub use pipeline::{BalanceExtractor, ExtractedDocument, Extraction};
pub use posting::PostingSynthesizer;
pub use report::ExtractionReport;
