//! Row-level extraction: normalization, classification and assembly.

mod assembler;
mod classifier;
pub mod customers;
pub mod header;
pub mod normalize;
pub mod rules;

pub use assembler::{Assembled, Assembler};
pub use classifier::SectionClassifier;
pub use customers::CustomerMasterParser;
pub use header::ReportMetadata;
pub use normalize::{normalize_cell, normalize_row};
