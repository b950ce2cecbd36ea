//! DAF420 Processor Library
//!
//! A Rust library for parsing Texas Railroad Commission DAF420 drilling
//! permit files: large fixed-width flat files where each line is one segment
//! of a permit, identified by a two-digit record type.
//!
//! This library provides tools for:
//! - Describing record layouts declaratively ([`FieldSpec`], [`RecordSchema`])
//! - Streaming a file line by line and rebuilding permit aggregates
//! - Validating extracted values against lookup tables, ranges and flags
//! - Collecting a filterable, exportable [`ValidationReport`]
//! - Periodic checkpoints so long runs can resume after a crash

pub mod config;
pub mod constants;
pub mod error;
pub mod models;
pub mod processor;
pub mod schema;
pub mod validation;

// CLI modules
pub mod cli {
    pub mod args;
    pub mod commands;
}

// Re-export commonly used types
pub use config::{Config, Encoding, Settings};
pub use error::{PermitError, Result};
pub use models::{FieldValue, ParseStats, ParsedRecord, Permit, PermitStore, StorageKey};
pub use processor::{
    CheckpointManager, CheckpointOptions, ParseOutcome, ParserOptions, PerformanceMonitor,
    PermitParser,
};
pub use schema::{FieldSpec, FieldType, RecordSchema};
pub use validation::{Severity, ValidationIssue, ValidationReport, Validator};
