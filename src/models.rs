//! Core data structures for DAF420 permit processing.
//!
//! Defines typed field values, decoded records, the permit aggregate and the
//! arena that owns every aggregate during a parse, plus the parse statistics.
//! Everything here is plain serde data so checkpoints are a structural copy.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

use crate::constants::MAX_DETAIL_ENTRIES;

/// Where a decoded record is stored on its permit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StorageKey {
    #[serde(rename = "daroot")]
    Root,
    #[serde(rename = "dapermit")]
    Detail,
    #[serde(rename = "dafield")]
    Field,
    #[serde(rename = "dalease")]
    Lease,
    #[serde(rename = "dasurvey")]
    Survey,
    #[serde(rename = "dacanres")]
    CancellationRestriction,
    #[serde(rename = "daareas")]
    Area,
    #[serde(rename = "daremarks")]
    Remark,
    #[serde(rename = "daareares")]
    AreaRestriction,
    #[serde(rename = "daaddress")]
    Address,
    #[serde(rename = "gis_surface")]
    SurfaceLocation,
    #[serde(rename = "gis_bottomhole")]
    BottomholeLocation,
}

/// Position of a record type in the permit hierarchy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordRole {
    Root,
    Detail,
    Child(StorageKey),
}

impl StorageKey {
    pub fn role(self) -> RecordRole {
        match self {
            StorageKey::Root => RecordRole::Root,
            StorageKey::Detail => RecordRole::Detail,
            other => RecordRole::Child(other),
        }
    }

    /// Name used in configuration files and checkpoints
    pub fn as_str(self) -> &'static str {
        match self {
            StorageKey::Root => "daroot",
            StorageKey::Detail => "dapermit",
            StorageKey::Field => "dafield",
            StorageKey::Lease => "dalease",
            StorageKey::Survey => "dasurvey",
            StorageKey::CancellationRestriction => "dacanres",
            StorageKey::Area => "daareas",
            StorageKey::Remark => "daremarks",
            StorageKey::AreaRestriction => "daareares",
            StorageKey::Address => "daaddress",
            StorageKey::SurfaceLocation => "gis_surface",
            StorageKey::BottomholeLocation => "gis_bottomhole",
        }
    }
}

impl fmt::Display for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Typed value of one decoded field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldValue {
    Text(String),
    Int(i64),
    Float(f64),
    Date(NaiveDate),
    Null,
}

impl FieldValue {
    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Float(v) => Some(*v),
            FieldValue::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            FieldValue::Date(d) => Some(*d),
            _ => None,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Text(s) => f.write_str(s),
            FieldValue::Int(v) => write!(f, "{}", v),
            FieldValue::Float(v) => write!(f, "{}", v),
            FieldValue::Date(d) => write!(f, "{}", d.format("%m/%d/%Y")),
            FieldValue::Null => Ok(()),
        }
    }
}

/// A decoded line: segment name plus typed values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedRecord {
    pub segment: String,
    pub values: BTreeMap<String, FieldValue>,
}

impl ParsedRecord {
    pub fn new(segment: impl Into<String>) -> Self {
        Self {
            segment: segment.into(),
            values: BTreeMap::new(),
        }
    }

    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.values.get(field)
    }

    /// Text value of a field, if it decoded as text
    pub fn text(&self, field: &str) -> Option<&str> {
        self.get(field).and_then(FieldValue::as_text)
    }

    /// Overwrite fields one by one with those of `newer`
    pub fn merge_from(&mut self, newer: ParsedRecord) {
        self.segment = newer.segment;
        self.values.extend(newer.values);
    }
}

/// Merge into an optional slot, creating it on first sighting
fn merge_slot(slot: &mut Option<ParsedRecord>, record: ParsedRecord) {
    match slot {
        Some(existing) => existing.merge_from(record),
        None => *slot = Some(record),
    }
}

/// Complete permit aggregate with all related records
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Permit {
    pub permit_number: String,
    pub root: Option<ParsedRecord>,
    pub detail: Option<ParsedRecord>,
    pub fields: Vec<ParsedRecord>,
    pub leases: Vec<ParsedRecord>,
    pub surveys: Vec<ParsedRecord>,
    pub cancellation_restrictions: Vec<ParsedRecord>,
    pub areas: Vec<ParsedRecord>,
    pub remarks: Vec<ParsedRecord>,
    pub area_restrictions: Vec<ParsedRecord>,
    pub addresses: Vec<ParsedRecord>,
    pub surface_location: Option<ParsedRecord>,
    pub bottomhole_location: Option<ParsedRecord>,
}

impl Permit {
    pub fn new(permit_number: impl Into<String>) -> Self {
        Self {
            permit_number: permit_number.into(),
            root: None,
            detail: None,
            fields: Vec::new(),
            leases: Vec::new(),
            surveys: Vec::new(),
            cancellation_restrictions: Vec::new(),
            areas: Vec::new(),
            remarks: Vec::new(),
            area_restrictions: Vec::new(),
            addresses: Vec::new(),
            surface_location: None,
            bottomhole_location: None,
        }
    }

    /// Last write wins per field; children are untouched
    pub fn merge_root(&mut self, record: ParsedRecord) {
        merge_slot(&mut self.root, record);
    }

    pub fn merge_detail(&mut self, record: ParsedRecord) {
        merge_slot(&mut self.detail, record);
    }

    /// Store a record under its storage key
    pub fn add_record(&mut self, key: StorageKey, record: ParsedRecord) {
        match key {
            StorageKey::Root => self.merge_root(record),
            StorageKey::Detail => self.merge_detail(record),
            StorageKey::SurfaceLocation => self.surface_location = Some(record),
            StorageKey::BottomholeLocation => self.bottomhole_location = Some(record),
            StorageKey::Field => self.fields.push(record),
            StorageKey::Lease => self.leases.push(record),
            StorageKey::Survey => self.surveys.push(record),
            StorageKey::CancellationRestriction => self.cancellation_restrictions.push(record),
            StorageKey::Area => self.areas.push(record),
            StorageKey::Remark => self.remarks.push(record),
            StorageKey::AreaRestriction => self.area_restrictions.push(record),
            StorageKey::Address => self.addresses.push(record),
        }
    }

    /// Records stored under a key: 0/1 for single slots, length for collections
    pub fn record_count(&self, key: StorageKey) -> usize {
        let single = |slot: &Option<ParsedRecord>| usize::from(slot.is_some());
        match key {
            StorageKey::Root => single(&self.root),
            StorageKey::Detail => single(&self.detail),
            StorageKey::SurfaceLocation => single(&self.surface_location),
            StorageKey::BottomholeLocation => single(&self.bottomhole_location),
            StorageKey::Field => self.fields.len(),
            StorageKey::Lease => self.leases.len(),
            StorageKey::Survey => self.surveys.len(),
            StorageKey::CancellationRestriction => self.cancellation_restrictions.len(),
            StorageKey::Area => self.areas.len(),
            StorageKey::Remark => self.remarks.len(),
            StorageKey::AreaRestriction => self.area_restrictions.len(),
            StorageKey::Address => self.addresses.len(),
        }
    }

    pub fn has_record(&self, key: StorageKey) -> bool {
        self.record_count(key) > 0
    }

    /// Lease name from the root record, falling back to the detail record
    pub fn lease_name(&self) -> Option<&str> {
        self.root
            .as_ref()
            .and_then(|r| r.text("lease_name"))
            .or_else(|| self.detail.as_ref().and_then(|d| d.text("lease_name")))
    }

    pub fn summary(&self) -> String {
        format!(
            "Permit {}: {} fields, {} leases, {} surveys",
            self.permit_number,
            self.fields.len(),
            self.leases.len(),
            self.surveys.len()
        )
    }
}

/// Arena owning every permit aggregate of a parse.
///
/// Callers hold plain indices into the arena, never a second reference to a
/// permit, so duplicate roots always resolve to the same aggregate.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PermitStore {
    permits: Vec<Permit>,
    index: HashMap<String, usize>,
}

impl PermitStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a store from a snapshot, keeping snapshot order
    pub fn from_permits(permits: Vec<Permit>) -> Self {
        let mut store = Self::new();
        for permit in permits {
            let (idx, _) = store.get_or_insert(&permit.permit_number);
            store.permits[idx] = permit;
        }
        store
    }

    /// Index of the permit, creating an empty aggregate if needed
    pub fn get_or_insert(&mut self, permit_number: &str) -> (usize, bool) {
        if let Some(&idx) = self.index.get(permit_number) {
            return (idx, false);
        }
        let idx = self.permits.len();
        self.permits.push(Permit::new(permit_number));
        self.index.insert(permit_number.to_string(), idx);
        (idx, true)
    }

    pub fn position(&self, permit_number: &str) -> Option<usize> {
        self.index.get(permit_number).copied()
    }

    pub fn get(&self, idx: usize) -> Option<&Permit> {
        self.permits.get(idx)
    }

    pub fn get_mut(&mut self, idx: usize) -> Option<&mut Permit> {
        self.permits.get_mut(idx)
    }

    pub fn find(&self, permit_number: &str) -> Option<&Permit> {
        self.position(permit_number).and_then(|idx| self.get(idx))
    }

    pub fn len(&self) -> usize {
        self.permits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.permits.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Permit> {
        self.permits.iter()
    }

    /// Plain copy of every permit in first-seen order
    pub fn snapshot(&self) -> Vec<Permit> {
        self.permits.clone()
    }

    /// Permit-number keyed copy for callers
    pub fn to_map(&self) -> BTreeMap<String, Permit> {
        self.permits
            .iter()
            .map(|p| (p.permit_number.clone(), p.clone()))
            .collect()
    }

    pub fn clear(&mut self) {
        self.permits.clear();
        self.index.clear();
    }
}

/// Running min/max/total of record lengths for one record type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LengthSummary {
    pub count: u64,
    pub total: u64,
    pub min: usize,
    pub max: usize,
}

impl LengthSummary {
    fn record(&mut self, length: usize) {
        self.count += 1;
        self.total += length as u64;
        self.min = self.min.min(length);
        self.max = self.max.max(length);
    }

    pub fn average(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.total as f64 / self.count as f64
        }
    }
}

/// Parse statistics, owned and mutated only by the parser
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParseStats {
    pub lines_processed: u64,
    pub records_by_type: BTreeMap<String, u64>,
    pub record_lengths: BTreeMap<String, LengthSummary>,
    pub validation_errors: u64,
    pub validation_warnings: u64,
    pub orphaned_records: u64,
    pub malformed_records: u64,
    /// Well-formed lines whose record type has no schema
    pub unknown_records: u64,
    pub successful_permits: u64,
    /// Orphans later re-attached; stays zero under current-permit-only attachment
    pub recovered_records: u64,
    /// First [`MAX_DETAIL_ENTRIES`] orphan descriptions
    pub orphan_details: Vec<String>,
    /// First [`MAX_DETAIL_ENTRIES`] malformed-line descriptions
    pub malformed_details: Vec<String>,
}

impl ParseStats {
    pub fn new() -> Self {
        Self {
            lines_processed: 0,
            records_by_type: BTreeMap::new(),
            record_lengths: BTreeMap::new(),
            validation_errors: 0,
            validation_warnings: 0,
            orphaned_records: 0,
            malformed_records: 0,
            unknown_records: 0,
            successful_permits: 0,
            recovered_records: 0,
            orphan_details: Vec::new(),
            malformed_details: Vec::new(),
        }
    }

    pub fn increment_record_type(&mut self, record_type: &str) {
        *self
            .records_by_type
            .entry(record_type.to_string())
            .or_insert(0) += 1;
    }

    pub fn add_record_length(&mut self, record_type: &str, length: usize) {
        self.record_lengths
            .entry(record_type.to_string())
            .or_insert(LengthSummary {
                count: 0,
                total: 0,
                min: usize::MAX,
                max: 0,
            })
            .record(length);
    }

    pub fn log_orphan(&mut self, line_number: u64, message: &str) {
        self.orphaned_records += 1;
        push_capped(
            &mut self.orphan_details,
            format!("Line {}: {}", line_number, message),
        );
    }

    pub fn log_malformed(&mut self, line_number: u64, message: &str) {
        self.malformed_records += 1;
        push_capped(
            &mut self.malformed_details,
            format!("Line {}: {}", line_number, message),
        );
    }

    pub fn record_count(&self, record_type: &str) -> u64 {
        self.records_by_type.get(record_type).copied().unwrap_or(0)
    }

    pub fn average_length(&self, record_type: &str) -> f64 {
        self.record_lengths
            .get(record_type)
            .map_or(0.0, LengthSummary::average)
    }

    /// (min, max) observed length, (0, 0) if the type never appeared
    pub fn length_range(&self, record_type: &str) -> (usize, usize) {
        self.record_lengths
            .get(record_type)
            .map_or((0, 0), |s| (s.min, s.max))
    }

    /// Orphans that were never re-attached
    pub fn lost_records(&self) -> u64 {
        self.orphaned_records.saturating_sub(self.recovered_records)
    }

    /// Share of processed lines that were malformed, as a percentage
    pub fn malformed_rate(&self) -> f64 {
        if self.lines_processed == 0 {
            0.0
        } else {
            (self.malformed_records as f64 / self.lines_processed as f64) * 100.0
        }
    }

    pub fn summary(&self) -> String {
        format!(
            "Processing Summary:\n  \
             Lines Processed:      {}\n  \
             Unique Permits:       {}\n  \
             Malformed Records:    {}\n  \
             Unknown Record Types: {}\n  \
             Orphaned Records:     {}\n    \
             - Recovered:        {}\n    \
             - Lost:             {}\n  \
             Validation Errors:    {}\n  \
             Validation Warnings:  {}",
            self.lines_processed,
            self.successful_permits,
            self.malformed_records,
            self.unknown_records,
            self.orphaned_records,
            self.recovered_records,
            self.lost_records(),
            self.validation_errors,
            self.validation_warnings
        )
    }
}

impl Default for ParseStats {
    fn default() -> Self {
        Self::new()
    }
}

fn push_capped(details: &mut Vec<String>, message: String) {
    if details.len() < MAX_DETAIL_ENTRIES {
        details.push(message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(segment: &str, pairs: &[(&str, &str)]) -> ParsedRecord {
        let mut rec = ParsedRecord::new(segment);
        for (k, v) in pairs {
            rec.values
                .insert(k.to_string(), FieldValue::Text(v.to_string()));
        }
        rec
    }

    #[test]
    fn test_merge_root_last_write_wins_per_field() {
        let mut permit = Permit::new("0123456");
        permit.merge_root(record(
            "DAROOT",
            &[("lease_name", "SMITH"), ("operator_name", "ACME")],
        ));
        permit.add_record(StorageKey::Field, record("DAFIELD", &[("field_name", "X")]));
        permit.merge_root(record("DAROOT", &[("lease_name", "JONES")]));

        let root = permit.root.as_ref().unwrap();
        assert_eq!(root.text("lease_name"), Some("JONES"));
        assert_eq!(root.text("operator_name"), Some("ACME"));
        assert_eq!(permit.fields.len(), 1);
    }

    #[test]
    fn test_location_slots_keep_latest() {
        let mut permit = Permit::new("1");
        permit.add_record(StorageKey::SurfaceLocation, record("GIS", &[("a", "1")]));
        permit.add_record(StorageKey::SurfaceLocation, record("GIS", &[("a", "2")]));

        assert_eq!(permit.record_count(StorageKey::SurfaceLocation), 1);
        assert_eq!(
            permit.surface_location.as_ref().unwrap().text("a"),
            Some("2")
        );
        assert!(!permit.has_record(StorageKey::BottomholeLocation));
    }

    #[test]
    fn test_store_reuses_index_for_duplicate_numbers() {
        let mut store = PermitStore::new();
        let (first, created) = store.get_or_insert("100");
        assert!(created);
        let (again, created) = store.get_or_insert("100");
        assert!(!created);
        assert_eq!(first, again);

        store.get_or_insert("200");
        assert_eq!(store.len(), 2);
        assert_eq!(store.position("200"), Some(1));
        assert!(store.find("300").is_none());
    }

    #[test]
    fn test_store_snapshot_round_trip() {
        let mut store = PermitStore::new();
        let (idx, _) = store.get_or_insert("100");
        store
            .get_mut(idx)
            .unwrap()
            .add_record(StorageKey::Remark, record("DAREMARKS", &[("remark", "OK")]));
        store.get_or_insert("050");

        let rebuilt = PermitStore::from_permits(store.snapshot());
        assert_eq!(rebuilt, store);
        assert_eq!(
            rebuilt.to_map().keys().cloned().collect::<Vec<_>>(),
            vec!["050".to_string(), "100".to_string()]
        );
    }

    #[test]
    fn test_stats_lengths_and_details() {
        let mut stats = ParseStats::new();
        stats.add_record_length("01", 120);
        stats.add_record_length("01", 100);
        stats.increment_record_type("01");
        stats.increment_record_type("01");
        stats.log_orphan(7, "DAFIELD without permit");
        stats.log_malformed(9, "Too short (3 bytes)");
        stats.lines_processed = 10;

        assert_eq!(stats.record_count("01"), 2);
        assert_eq!(stats.length_range("01"), (100, 120));
        assert_eq!(stats.average_length("01"), 110.0);
        assert_eq!(stats.length_range("99"), (0, 0));
        assert_eq!(stats.orphan_details, vec!["Line 7: DAFIELD without permit"]);
        assert_eq!(stats.malformed_rate(), 10.0);
        assert_eq!(stats.lost_records(), 1);
        assert!(stats.summary().contains("Lines Processed:      10"));
    }

    #[test]
    fn test_detail_lists_are_capped() {
        let mut stats = ParseStats::new();
        for line in 0..(MAX_DETAIL_ENTRIES as u64 + 5) {
            stats.log_malformed(line, "bad");
        }
        assert_eq!(stats.malformed_records, MAX_DETAIL_ENTRIES as u64 + 5);
        assert_eq!(stats.malformed_details.len(), MAX_DETAIL_ENTRIES);
    }

    #[test]
    fn test_field_value_display_uses_rrc_date_format() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 7).unwrap();
        assert_eq!(FieldValue::Date(date).to_string(), "03/07/2024");
        assert_eq!(FieldValue::Null.to_string(), "");
        assert_eq!(FieldValue::Int(42).as_f64(), Some(42.0));
    }
}
