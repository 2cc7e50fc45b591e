pub mod config;
pub mod constants;
pub mod conversion;
pub mod domain;
pub mod error;
pub mod logging;
pub mod observability;

// Application layer and its adapters
pub mod app;
pub mod infra;

pub use config::ConverterConfig;
pub use conversion::{BatchSummary, ConversionDiagnostics, ConversionOutcome, Converter};
pub use domain::{Activity, RawRecord};
