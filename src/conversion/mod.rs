//! The conversion core: raw extraction records in, activities and diagnostics out.
//!
//! Nothing here performs I/O or returns errors. Every raw record yields a
//! [`ConversionDiagnostics`], successful or not.

pub mod builder;
pub mod diagnostics;
pub mod mapper;
pub mod orchestrator;
pub mod scorer;
pub mod text;
pub mod validators;

pub use builder::ActivityBuilder;
pub use diagnostics::{
    ConversionDiagnostics, ConversionIssue, FieldMapping, IssueSummary, IssueType, MappingType,
    Severity, ValidationStatus,
};
pub use mapper::FieldMapper;
pub use orchestrator::{BatchSummary, ConversionOutcome, Converter};
pub use scorer::ConfidenceScorer;
pub use validators::{FieldValidator, SemanticType, ValidationResult, Validators};
