//! Application constants for the DAF420 processor
//!
//! Default values for parser settings, checkpointing cadence and the
//! validator tags that have built-in meaning.

// =============================================================================
// Parser Settings
// =============================================================================

/// Lines shorter than this are malformed unless the config overrides it
pub const DEFAULT_MIN_RECORD_LENGTH: usize = 10;

/// Number of characters used as the record type routing key
pub const RECORD_TYPE_WIDTH: usize = 2;

/// Progress callback cadence in lines
pub const DEFAULT_PROGRESS_INTERVAL: u64 = 1_000;

/// Upper bound on orphan/malformed detail messages kept in stats
pub const MAX_DETAIL_ENTRIES: usize = 1_000;

/// Name of the field that carries the permit number on root and detail records
pub const PERMIT_NUMBER_FIELD: &str = "permit_number";

// =============================================================================
// Checkpointing
// =============================================================================

pub mod checkpoint {
    /// Save a checkpoint every N lines
    pub const DEFAULT_INTERVAL: u64 = 10_000;

    /// Keep the most recent N checkpoint files
    pub const DEFAULT_MAX_CHECKPOINTS: usize = 3;

    /// Default checkpoint directory, relative to the working directory
    pub const DEFAULT_DIR: &str = ".checkpoints";

    /// File name prefix for checkpoint files
    pub const DEFAULT_BASE_NAME: &str = "parser-checkpoint";

    pub const FILE_EXTENSION: &str = "json";

    /// Format version written into every checkpoint
    pub const FORMAT_VERSION: &str = "1.0.0";

    /// Read buffer used when hashing the input file
    pub const HASH_BUFFER_SIZE: usize = 64 * 1024;
}

// =============================================================================
// Validator Tags
// =============================================================================

pub mod validators {
    /// Tags whose range rules use coordinate conventions
    pub const LATITUDE: &str = "latitude";
    pub const LONGITUDE: &str = "longitude";

    pub const FLAG: &str = "flag";
    pub const OPERATOR_NUMBER: &str = "operator_number";

    /// Accepted but not yet checked against anything
    pub const DISTRICT: &str = "district";

    /// Lookup-backed validators used when the config does not list its own
    pub const DEFAULT_LOOKUP_VALIDATORS: &[(&str, &str)] = &[
        ("county_code", "county_codes"),
        ("app_type", "app_type_codes"),
        ("well_type", "well_type_codes"),
    ];

    /// Scale applied to coordinate digit strings with no decimal point
    pub const COORDINATE_SCALE: f64 = 1e7;

    /// Rule name used for required-field issues
    pub const REQUIRED_RULE: &str = "required";
}
