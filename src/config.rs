//! Configuration loading and validation.
//!
//! A [`Config`] is built once from a TOML document and never mutated. It holds
//! the parser settings, every record layout keyed by its two-character type
//! code, the lookup tables and the validation rules. Validator tags used by the
//! layouts are resolved into [`Rule`]s here, so an unrecognised tag is reported
//! at load time instead of silently passing every value later on.

use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use tracing::{debug, warn};

use crate::constants::{DEFAULT_MIN_RECORD_LENGTH, RECORD_TYPE_WIDTH, validators};
use crate::error::{PermitError, Result};
use crate::models::StorageKey;
use crate::schema::{FieldSpec, RecordSchema};
use crate::validation::Rule;

/// Built-in DAF420 layout
const DAF420_CONFIG: &str = include_str!("../config/daf420.toml");

static EMPTY_LOOKUP: BTreeMap<String, String> = BTreeMap::new();
static UNKNOWN_RULE: Rule = Rule::Unknown;

/// Character encoding of the input file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Encoding {
    #[default]
    #[serde(alias = "latin-1", alias = "iso-8859-1")]
    Latin1,
    #[serde(alias = "utf-8")]
    Utf8,
    Ascii,
}

impl Encoding {
    /// Decode one raw line; never fails
    pub fn decode(self, bytes: &[u8]) -> String {
        match self {
            Encoding::Latin1 => bytes.iter().map(|&b| b as char).collect(),
            Encoding::Utf8 => String::from_utf8_lossy(bytes).into_owned(),
            Encoding::Ascii => bytes.iter().map(|&b| (b & 0x7f) as char).collect(),
        }
    }
}

/// Global parser settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Lines shorter than this are malformed
    pub min_record_length: usize,

    /// Abort on the first structural failure
    pub strict_mode: bool,

    pub encoding: Encoding,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            min_record_length: DEFAULT_MIN_RECORD_LENGTH,
            strict_mode: false,
            encoding: Encoding::Latin1,
        }
    }
}

/// Inclusive numeric range
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RangeRule {
    pub min: f64,
    pub max: f64,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlagRules {
    pub valid_values: Vec<String>,
}

/// Format constraints for operator numbers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OperatorNumberRules {
    pub numeric_only: bool,
    pub min_length: Option<usize>,
    pub max_length: Option<usize>,
}

impl Default for OperatorNumberRules {
    fn default() -> Self {
        Self {
            numeric_only: true,
            min_length: Some(5),
            max_length: Some(6),
        }
    }
}

/// Validation rule definitions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationRules {
    pub ranges: BTreeMap<String, RangeRule>,
    pub flags: FlagRules,
    pub operator_number: OperatorNumberRules,

    /// Validator tag to lookup table name
    pub lookup_validators: BTreeMap<String, String>,
}

impl Default for ValidationRules {
    fn default() -> Self {
        Self {
            ranges: BTreeMap::new(),
            flags: FlagRules::default(),
            operator_number: OperatorNumberRules::default(),
            lookup_validators: validators::DEFAULT_LOOKUP_VALIDATORS
                .iter()
                .map(|(tag, table)| (tag.to_string(), table.to_string()))
                .collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawSchema {
    name: String,
    expected_min_length: Option<usize>,
    storage_key: Option<StorageKey>,
    #[serde(default)]
    fields: Vec<FieldSpec>,
}

#[derive(Debug, Deserialize)]
struct RawConfig {
    #[serde(default)]
    settings: Settings,
    #[serde(default)]
    schemas: BTreeMap<String, RawSchema>,
    #[serde(default)]
    lookup_tables: BTreeMap<String, BTreeMap<String, String>>,
    #[serde(default)]
    validation: ValidationRules,
}

/// Short description of a loaded configuration
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigSummary {
    pub schemas_count: usize,
    pub lookup_tables_count: usize,
    pub rules_count: usize,
    pub settings: Settings,
}

/// Immutable parser configuration
#[derive(Debug, Clone)]
pub struct Config {
    settings: Settings,
    schemas: BTreeMap<String, RecordSchema>,
    lookup_tables: BTreeMap<String, BTreeMap<String, String>>,
    validation_rules: ValidationRules,
    rules: HashMap<String, Rule>,
    warnings: Vec<String>,
}

impl Config {
    /// Load the built-in DAF420 layout
    pub fn daf420() -> Result<Self> {
        Self::from_toml_str(DAF420_CONFIG)
    }

    /// Load a configuration file
    pub fn from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(PermitError::configuration(format!(
                "Configuration file not found: {}",
                path.display()
            )));
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            PermitError::configuration_with(
                format!("Failed to read configuration file: {}", path.display()),
                vec![e.to_string()],
            )
        })?;

        Self::from_toml_str(&content)
    }

    /// Parse and validate a TOML configuration document
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let raw: RawConfig = toml::from_str(content)?;
        Self::from_raw(raw)
    }

    fn from_raw(raw: RawConfig) -> Result<Self> {
        let mut errors = Vec::new();

        if raw.settings.min_record_length < RECORD_TYPE_WIDTH {
            errors.push(format!(
                "settings.min_record_length must be at least {}",
                RECORD_TYPE_WIDTH
            ));
        }

        let mut schemas = BTreeMap::new();
        for (code, raw_schema) in raw.schemas {
            if code.chars().count() != RECORD_TYPE_WIDTH
                || !code.chars().all(|c| c.is_ascii_digit())
            {
                errors.push(format!(
                    "record type '{}' must be {} digits",
                    code, RECORD_TYPE_WIDTH
                ));
                continue;
            }

            match RecordSchema::new(
                raw_schema.name,
                raw_schema.expected_min_length,
                raw_schema.storage_key,
                raw_schema.fields,
            ) {
                Ok(schema) => {
                    schemas.insert(code, schema);
                }
                Err(problems) => {
                    errors.extend(
                        problems
                            .into_iter()
                            .map(|p| format!("schema for record type {}: {}", code, p)),
                    );
                }
            }
        }

        for (name, range) in &raw.validation.ranges {
            if !range.min.is_finite() || !range.max.is_finite() || range.min > range.max {
                errors.push(format!(
                    "range '{}' must have finite bounds with min <= max",
                    name
                ));
            }
        }

        let operator = &raw.validation.operator_number;
        if let (Some(min), Some(max)) = (operator.min_length, operator.max_length) {
            if min > max {
                errors.push(format!(
                    "operator_number min_length {} exceeds max_length {}",
                    min, max
                ));
            }
        }

        if !errors.is_empty() {
            return Err(PermitError::configuration_with(
                "Invalid configuration detected",
                errors,
            ));
        }

        let mut config = Self {
            settings: raw.settings,
            schemas,
            lookup_tables: raw.lookup_tables,
            validation_rules: raw.validation,
            rules: HashMap::new(),
            warnings: Vec::new(),
        };
        config.resolve_rules();

        for warning in &config.warnings {
            warn!("Configuration warning: {}", warning);
        }
        debug!(
            "Loaded configuration: {} schemas, {} lookup tables, {} validator tags",
            config.schemas.len(),
            config.lookup_tables.len(),
            config.rules.len()
        );

        Ok(config)
    }

    /// Resolve every validator tag used by a layout into a rule
    fn resolve_rules(&mut self) {
        let mut rules = HashMap::new();
        let mut warnings = Vec::new();

        for (code, schema) in &self.schemas {
            for field in &schema.fields {
                let Some(tag) = field.validator.as_deref() else {
                    continue;
                };
                if rules.contains_key(tag) {
                    continue;
                }

                let rule = Rule::resolve(tag, &self.validation_rules);
                match &rule {
                    Rule::Unknown => warnings.push(format!(
                        "record type {} field '{}' uses unknown validator '{}'; values will not be checked",
                        code, field.name, tag
                    )),
                    Rule::Lookup { table } if !self.lookup_tables.contains_key(table) => {
                        warnings.push(format!(
                            "validator '{}' refers to missing lookup table '{}'",
                            tag, table
                        ))
                    }
                    _ => {}
                }
                rules.insert(tag.to_string(), rule);
            }
        }

        self.rules = rules;
        self.warnings = warnings;
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Schema for a record type code; unknown codes are not an error
    pub fn schema(&self, record_type: &str) -> Option<&RecordSchema> {
        self.schemas.get(record_type)
    }

    /// Lookup table by name; empty if absent
    pub fn lookup(&self, table: &str) -> &BTreeMap<String, String> {
        self.lookup_tables.get(table).unwrap_or(&EMPTY_LOOKUP)
    }

    /// True if `key` is present in the named lookup table
    pub fn validate_lookup(&self, table: &str, key: &str) -> bool {
        self.lookup(table).contains_key(key)
    }

    pub fn validation_rules(&self) -> &ValidationRules {
        &self.validation_rules
    }

    /// Rule for a validator tag.
    ///
    /// Tags used by a layout were resolved at load; any other tag is resolved
    /// on the fly with the same precedence.
    pub fn rule(&self, tag: &str) -> Cow<'_, Rule> {
        match self.rules.get(tag) {
            Some(rule) => Cow::Borrowed(rule),
            None => match Rule::resolve(tag, &self.validation_rules) {
                Rule::Unknown => Cow::Borrowed(&UNKNOWN_RULE),
                rule => Cow::Owned(rule),
            },
        }
    }

    pub fn schema_codes(&self) -> Vec<&str> {
        self.schemas.keys().map(String::as_str).collect()
    }

    pub fn is_valid_record_type(&self, record_type: &str) -> bool {
        self.schemas.contains_key(record_type)
    }

    /// Non-fatal problems found while loading
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    pub fn summary(&self) -> ConfigSummary {
        ConfigSummary {
            schemas_count: self.schemas.len(),
            lookup_tables_count: self.lookup_tables.len(),
            rules_count: self.rules.len(),
            settings: self.settings.clone(),
        }
    }
}
