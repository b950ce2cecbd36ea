//! Per-line routing for the permit state machine
//!
//! A line passes a structural gate, is matched to a schema by its type code
//! and is then attached to the current permit (or starts a new one). Values
//! are decoded and validated only for lines that will actually be stored.

use std::sync::Arc;
use tracing::{debug, trace};

use crate::config::Encoding;
use crate::constants::validators::REQUIRED_RULE;
use crate::constants::{PERMIT_NUMBER_FIELD, RECORD_TYPE_WIDTH};
use crate::models::{ParsedRecord, RecordRole, StorageKey};
use crate::processor::PermitParser;
use crate::processor::field_parsers::decode_value;
use crate::schema::{RawRecord, RecordSchema, char_range};
use crate::validation::{IssueContext, Verdict};

/// What happened to one line
#[derive(Debug, Clone, PartialEq)]
pub enum LineOutcome {
    /// Stored on a permit
    Applied,
    /// Counted and dropped: unknown type, orphan or no storage key
    Skipped,
    /// Failed the structural gate
    Malformed(String),
}

/// Decode raw bytes and strip the terminator plus trailing whitespace
pub fn decode_line(bytes: &[u8], encoding: Encoding) -> String {
    let mut line = encoding.decode(bytes);
    let kept = line.trim_end().len();
    line.truncate(kept);
    line
}

/// True for a non-empty, all-digit permit number
fn is_valid_permit_number(value: &str) -> bool {
    !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit())
}

impl PermitParser {
    /// Run one decoded line through the gate and the state machine
    pub(crate) fn process_line(&mut self, line_number: u64, line: &str) -> LineOutcome {
        self.stats.lines_processed += 1;

        let length = line.chars().count();
        let min_length = self.config.settings().min_record_length;
        if length < min_length {
            self.drop_context_for_root(char_range(line, 0, RECORD_TYPE_WIDTH));
            return self.malformed(line_number, format!("Too short ({} chars)", length));
        }

        let code = char_range(line, 0, RECORD_TYPE_WIDTH);
        if code.len() != RECORD_TYPE_WIDTH || !code.bytes().all(|b| b.is_ascii_digit()) {
            return self.malformed(line_number, format!("Invalid record type '{}'", code));
        }

        let config = Arc::clone(&self.config);
        let Some(schema) = config.schema(code) else {
            self.stats.unknown_records += 1;
            debug!("Line {}: unknown record type {}", line_number, code);
            return LineOutcome::Skipped;
        };

        if schema.is_too_short(length) {
            self.drop_context_for_root(code);
            let min = schema.expected_min_length.unwrap_or_default();
            return self.malformed(
                line_number,
                format!("{} too short ({} < {})", schema.name, length, min),
            );
        }

        self.stats.increment_record_type(code);
        self.stats.add_record_length(code, length);

        let Some(key) = schema.storage_key else {
            trace!("Line {}: {} has no storage key", line_number, schema.name);
            return LineOutcome::Skipped;
        };

        let raw = schema.parse_record(line);
        match key.role() {
            RecordRole::Root => self.apply_root(line_number, schema, &raw),
            RecordRole::Detail => self.apply_detail(line_number, schema, &raw),
            RecordRole::Child(child) => self.apply_child(line_number, schema, &raw, child),
        }
    }

    fn malformed(&mut self, line_number: u64, reason: String) -> LineOutcome {
        debug!("Line {}: malformed: {}", line_number, reason);
        self.stats.log_malformed(line_number, &reason);
        LineOutcome::Malformed(reason)
    }

    /// A broken root line still ends the previous permit; children that
    /// follow it belong to a permit that never made it into the store.
    fn drop_context_for_root(&mut self, code: &str) {
        let is_root = self
            .config
            .schema(code)
            .and_then(|schema| schema.storage_key)
            .is_some_and(|key| matches!(key.role(), RecordRole::Root));
        if is_root {
            self.current = None;
        }
    }

    fn orphan(&mut self, line_number: u64, reason: String) -> LineOutcome {
        debug!("Line {}: orphaned: {}", line_number, reason);
        self.stats.log_orphan(line_number, &reason);
        LineOutcome::Skipped
    }

    /// Permit number of the current context
    fn current_permit_number(&self) -> Option<String> {
        self.current
            .and_then(|idx| self.store.get(idx))
            .map(|p| p.permit_number.clone())
    }

    fn apply_root(
        &mut self,
        line_number: u64,
        schema: &RecordSchema,
        raw: &RawRecord,
    ) -> LineOutcome {
        let permit_number = raw.get(PERMIT_NUMBER_FIELD).unwrap_or_default();
        if !is_valid_permit_number(permit_number) {
            self.current = None;
            return self.malformed(
                line_number,
                format!("{} has invalid permit number '{}'", schema.name, permit_number),
            );
        }

        let record = self.decode_record(line_number, schema, raw, permit_number);
        let (idx, created) = self.store.get_or_insert(permit_number);
        if !created {
            debug!(
                "Line {}: repeated root for permit {}, merging",
                line_number, permit_number
            );
        }
        if let Some(permit) = self.store.get_mut(idx) {
            permit.merge_root(record);
        }

        self.current = Some(idx);
        self.stats.successful_permits = self.store.len() as u64;
        LineOutcome::Applied
    }

    fn apply_detail(
        &mut self,
        line_number: u64,
        schema: &RecordSchema,
        raw: &RawRecord,
    ) -> LineOutcome {
        let permit_number = raw.get(PERMIT_NUMBER_FIELD).unwrap_or_default();
        let Some(current) = self.current_permit_number() else {
            return self.orphan(
                line_number,
                format!("{} with no current permit", schema.name),
            );
        };
        if !permit_number.is_empty() && permit_number != current {
            return self.orphan(
                line_number,
                format!(
                    "{} for permit {} while permit {} is open",
                    schema.name, permit_number, current
                ),
            );
        }

        let record = self.decode_record(line_number, schema, raw, &current);
        if let Some(permit) = self.current.and_then(|idx| self.store.get_mut(idx)) {
            permit.merge_detail(record);
        }
        LineOutcome::Applied
    }

    fn apply_child(
        &mut self,
        line_number: u64,
        schema: &RecordSchema,
        raw: &RawRecord,
        key: StorageKey,
    ) -> LineOutcome {
        let Some(current) = self.current_permit_number() else {
            return self.orphan(
                line_number,
                format!("{} with no current permit", schema.name),
            );
        };

        let record = self.decode_record(line_number, schema, raw, &current);
        if let Some(permit) = self.current.and_then(|idx| self.store.get_mut(idx)) {
            permit.add_record(key, record);
        }
        LineOutcome::Applied
    }

    /// Convert extracted strings to typed values, validating as we go
    fn decode_record(
        &mut self,
        line_number: u64,
        schema: &RecordSchema,
        raw: &RawRecord,
        permit_number: &str,
    ) -> ParsedRecord {
        let mut record = ParsedRecord::new(schema.name.as_str());

        for spec in &schema.fields {
            let value = raw.get(&spec.name).unwrap_or_default();
            record
                .values
                .insert(spec.name.clone(), decode_value(spec, value));

            let issue_context = || {
                IssueContext::new()
                    .at_line(line_number)
                    .for_permit(permit_number)
            };

            if let Some(tag) = spec.validator.as_deref() {
                if !value.is_empty() {
                    let context = format!("line_{}_{}", line_number, spec.name);
                    match self.validator.evaluate(tag, value, &context) {
                        Verdict::Pass => {}
                        Verdict::Warning(message) => {
                            self.report
                                .add_warning(&spec.name, value, &message, tag, issue_context());
                            self.stats.validation_warnings += 1;
                        }
                        Verdict::Error(message) => {
                            self.report
                                .add_error(&spec.name, value, &message, tag, issue_context());
                            self.stats.validation_errors += 1;
                        }
                    }
                }
            }

            if spec.required && value.is_empty() {
                self.report.add_error(
                    &spec.name,
                    "",
                    "Required field missing",
                    REQUIRED_RULE,
                    issue_context(),
                );
                self.stats.validation_errors += 1;
            }
        }

        record
    }
}
