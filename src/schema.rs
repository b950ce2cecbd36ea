//! Fixed-width record layouts.
//!
//! A [`RecordSchema`] is an ordered list of [`FieldSpec`]s describing where each
//! value sits inside a line. Geometry is checked once when the schema is built;
//! extraction itself never fails, even on lines shorter than the layout.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

use crate::models::StorageKey;

/// Declared type of a positional field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    #[default]
    String,
    Date,
    Int,
    Float,
}

/// One positional field: `[start, end)` in characters, zero-based
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    pub start: usize,
    pub end: usize,
    #[serde(rename = "type", default)]
    pub field_type: FieldType,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub validator: Option<String>,
}

impl FieldSpec {
    pub fn new(name: impl Into<String>, start: usize, end: usize) -> Self {
        Self {
            name: name.into(),
            start,
            end,
            field_type: FieldType::String,
            required: false,
            validator: None,
        }
    }

    pub fn with_type(mut self, field_type: FieldType) -> Self {
        self.field_type = field_type;
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn with_validator(mut self, tag: impl Into<String>) -> Self {
        self.validator = Some(tag.into());
        self
    }

    /// Width of the field in characters
    pub fn width(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    /// Check `start < end`; negative starts are already impossible
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.name.trim().is_empty() {
            return Err(format!(
                "field at {}..{} has an empty name",
                self.start, self.end
            ));
        }
        if self.end <= self.start {
            return Err(format!(
                "field '{}': end position {} must be greater than start {}",
                self.name, self.end, self.start
            ));
        }
        Ok(())
    }

    /// Extract the trimmed value, clipping the range to the line length
    pub fn extract<'a>(&self, line: &'a str) -> &'a str {
        char_range(line, self.start, self.end).trim()
    }
}

/// Slice `line` by character positions, clipped to what is present
pub(crate) fn char_range(line: &str, start: usize, end: usize) -> &str {
    if end <= start {
        return "";
    }
    if line.is_ascii() {
        let begin = start.min(line.len());
        let finish = end.min(line.len());
        return &line[begin..finish];
    }

    let mut offsets = line.char_indices().map(|(i, _)| i).skip(start);
    let Some(begin) = offsets.next() else {
        return "";
    };
    let finish = offsets.nth(end - start - 1).unwrap_or(line.len());
    &line[begin..finish]
}

/// Raw extraction result: field name to trimmed string, tagged with the segment
#[derive(Debug, Clone, PartialEq)]
pub struct RawRecord {
    pub segment: String,
    pub values: BTreeMap<String, String>,
}

impl RawRecord {
    pub fn get(&self, field: &str) -> Option<&str> {
        self.values.get(field).map(String::as_str)
    }
}

/// Layout of one record type
#[derive(Debug, Clone, PartialEq)]
pub struct RecordSchema {
    pub name: String,
    pub expected_min_length: Option<usize>,
    pub storage_key: Option<StorageKey>,
    pub fields: Vec<FieldSpec>,
}

impl RecordSchema {
    /// Build a schema, collecting every geometry problem found
    pub fn new(
        name: impl Into<String>,
        expected_min_length: Option<usize>,
        storage_key: Option<StorageKey>,
        fields: Vec<FieldSpec>,
    ) -> std::result::Result<Self, Vec<String>> {
        let name = name.into();
        let mut problems = Vec::new();

        if name.trim().is_empty() {
            problems.push("schema name must not be empty".to_string());
        }

        let mut seen = HashSet::new();
        for field in &fields {
            if let Err(problem) = field.validate() {
                problems.push(problem);
            }
            if !seen.insert(field.name.as_str()) {
                problems.push(format!("field '{}' is defined more than once", field.name));
            }
        }

        if !problems.is_empty() {
            return Err(problems);
        }

        Ok(Self {
            name,
            expected_min_length,
            storage_key,
            fields,
        })
    }

    /// Decode one line into named string values
    pub fn parse_record(&self, line: &str) -> RawRecord {
        let values = self
            .fields
            .iter()
            .map(|field| (field.name.clone(), field.extract(line).to_string()))
            .collect();

        RawRecord {
            segment: self.name.clone(),
            values,
        }
    }

    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// True if any field uses the given validator tag
    pub fn has_validator(&self, tag: &str) -> bool {
        self.fields
            .iter()
            .any(|f| f.validator.as_deref() == Some(tag))
    }

    /// True if the line is too short for this record type
    pub fn is_too_short(&self, line_length: usize) -> bool {
        self.expected_min_length
            .is_some_and(|min| line_length < min)
    }
}
