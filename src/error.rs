//! Error handling for DAF420 permit processing.
//!
//! Configuration problems and input-open failures are fatal. Checkpoint
//! problems are surfaced here so they can be logged, but the parser never lets
//! them abort a run. Malformed, orphaned and invalid records are data, not
//! errors: they are counted in [`ParseStats`] and the validation report.

use std::path::PathBuf;
use thiserror::Error;

use crate::models::ParseStats;

#[derive(Error, Debug)]
pub enum PermitError {
    /// I/O operation failed
    #[error("I/O error: {message}")]
    Io {
        message: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Input file not found: {path}")]
    InputNotFound { path: PathBuf },

    /// Invalid schema geometry, malformed lookup tables or unreadable config
    #[error("Configuration error: {message}{}", format_details(.errors))]
    Configuration { message: String, errors: Vec<String> },

    #[error("Checkpoint error: {message}")]
    Checkpoint { message: String },

    #[error("Checkpoint does not match input: {reason}")]
    ResumeMismatch { reason: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("CSV export error: {0}")]
    Csv(#[from] csv::Error),

    /// Strict mode turned a structural failure into a hard stop
    #[error("Strict mode abort at line {line}: {reason}")]
    StrictModeAbort {
        line: u64,
        reason: String,
        stats: Box<ParseStats>,
    },

    #[error("Parser already used; call reset() before parsing another file")]
    ParserNotReset,
}

fn format_details(errors: &[String]) -> String {
    if errors.is_empty() {
        String::new()
    } else {
        let lines: Vec<String> = errors.iter().map(|e| format!("\n  - {}", e)).collect();
        lines.concat()
    }
}

impl PermitError {
    /// Create an I/O error with context
    pub fn io(message: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            message: message.into(),
            source,
        }
    }

    /// Create a configuration error without itemised details
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
            errors: Vec::new(),
        }
    }

    /// Create a configuration error listing every problem found
    pub fn configuration_with(message: impl Into<String>, errors: Vec<String>) -> Self {
        Self::Configuration {
            message: message.into(),
            errors,
        }
    }

    pub fn checkpoint(message: impl Into<String>) -> Self {
        Self::Checkpoint {
            message: message.into(),
        }
    }

    pub fn resume_mismatch(reason: impl Into<String>) -> Self {
        Self::ResumeMismatch {
            reason: reason.into(),
        }
    }

    pub fn strict_abort(line: u64, reason: impl Into<String>, stats: ParseStats) -> Self {
        Self::StrictModeAbort {
            line,
            reason: reason.into(),
            stats: Box::new(stats),
        }
    }

    /// Stats captured at the point of failure, when the error carries them
    pub fn stats(&self) -> Option<&ParseStats> {
        match self {
            Self::StrictModeAbort { stats, .. } => Some(stats),
            _ => None,
        }
    }
}

impl From<std::io::Error> for PermitError {
    fn from(error: std::io::Error) -> Self {
        Self::Io {
            message: "I/O operation failed".to_string(),
            source: error,
        }
    }
}

impl From<toml::de::Error> for PermitError {
    fn from(error: toml::de::Error) -> Self {
        Self::Configuration {
            message: "Failed to parse TOML configuration".to_string(),
            errors: vec![error.to_string()],
        }
    }
}

pub type Result<T> = std::result::Result<T, PermitError>;
