//! Tests for line routing and permit assembly

use super::*;
use crate::models::{FieldValue, StorageKey};
use crate::processor::ParserOptions;
use crate::validation::{IssueFilter, Severity};
use chrono::NaiveDate;
use tempfile::TempDir;

#[tokio::test]
async fn test_assembles_permits_with_children() {
    let temp_dir = TempDir::new().unwrap();
    let input = write_input(temp_dir.path(), "daf420.dat", &two_permit_file());

    let mut parser = test_parser(ParserOptions::new());
    let outcome = parser.parse_file(&input).await.unwrap();

    assert_eq!(outcome.permits.len(), 2);
    let first = &outcome.permits["0100001"];
    assert_eq!(first.lease_name(), Some("SMITH"));
    assert_eq!(first.fields.len(), 2);
    assert_eq!(first.remarks.len(), 1);
    assert!(first.has_record(StorageKey::Detail));
    assert_eq!(
        first.detail.as_ref().unwrap().get("issued_date"),
        Some(&FieldValue::Date(NaiveDate::from_ymd_opt(2023, 1, 15).unwrap()))
    );

    let second = &outcome.permits["0100002"];
    assert_eq!(second.fields.len(), 1);
    assert_eq!(second.fields[0].text("field_name"), Some("PERMIAN"));
    assert_eq!(second.remarks[0].text("remark"), Some("SECOND REMARK"));

    let stats = &outcome.stats;
    assert_eq!(stats.lines_processed, 10);
    assert_eq!(stats.successful_permits, 2);
    assert_eq!(stats.record_count("01"), 2);
    assert_eq!(stats.record_count("03"), 3);
    assert_eq!(stats.orphaned_records, 0);
    assert_eq!(stats.malformed_records, 0);
}

#[tokio::test]
async fn test_children_before_any_root_are_orphaned() {
    let temp_dir = TempDir::new().unwrap();
    let input = write_input(
        temp_dir.path(),
        "orphans.dat",
        &[
            field("ORPHAN FIELD"),
            detail("0100009", "123456", "20230101"),
            remark("ORPHAN REMARK"),
            root("0100001", "SMITH"),
            field("KEPT"),
        ],
    );

    let mut parser = test_parser(ParserOptions::new());
    let outcome = parser.parse_file(&input).await.unwrap();

    assert_eq!(outcome.stats.orphaned_records, 3);
    assert_eq!(outcome.stats.orphan_details.len(), 3);
    assert!(outcome.stats.orphan_details[0].starts_with("Line 1:"));
    assert_eq!(outcome.permits.len(), 1);
    assert!(!outcome.permits.contains_key("0100009"));

    let permit = &outcome.permits["0100001"];
    assert_eq!(permit.fields.len(), 1);
    assert_eq!(permit.fields[0].text("field_name"), Some("KEPT"));
    assert!(permit.remarks.is_empty());
}

#[tokio::test]
async fn test_duplicate_root_merges_and_keeps_children() {
    let temp_dir = TempDir::new().unwrap();
    let input = write_input(
        temp_dir.path(),
        "dupes.dat",
        &[
            root("0100001", "SMITH"),
            field("SPRABERRY"),
            root("0100002", "OTHER"),
            root("0100001", "JONES"),
            field("WOLFCAMP"),
        ],
    );

    let mut parser = test_parser(ParserOptions::new());
    let outcome = parser.parse_file(&input).await.unwrap();

    assert_eq!(outcome.permits.len(), 2);
    assert_eq!(outcome.stats.successful_permits, 2);

    let permit = &outcome.permits["0100001"];
    assert_eq!(permit.lease_name(), Some("JONES"));
    let names: Vec<_> = permit
        .fields
        .iter()
        .filter_map(|f| f.text("field_name"))
        .collect();
    assert_eq!(names, vec!["SPRABERRY", "WOLFCAMP"]);
}

#[tokio::test]
async fn test_detail_for_other_permit_is_orphaned() {
    let temp_dir = TempDir::new().unwrap();
    let input = write_input(
        temp_dir.path(),
        "interleaved.dat",
        &[
            root("0100001", "SMITH"),
            root("0100002", "JONES"),
            detail("0100001", "123456", "20230101"),
        ],
    );

    let mut parser = test_parser(ParserOptions::new());
    let outcome = parser.parse_file(&input).await.unwrap();

    assert_eq!(outcome.stats.orphaned_records, 1);
    assert!(outcome.permits["0100001"].detail.is_none());
    assert!(outcome.permits["0100002"].detail.is_none());
    assert!(outcome.stats.orphan_details[0].contains("while permit 0100002 is open"));
}

#[tokio::test]
async fn test_structural_gate() {
    let temp_dir = TempDir::new().unwrap();
    let input = write_input(
        temp_dir.path(),
        "gate.dat",
        &[
            root("0100001", "SMITH"),
            "03".to_string(),
            "XX SOMETHING".to_string(),
            "0201".to_string(),
            "14 -101.0".to_string(),
            "99 UNKNOWN TYPE".to_string(),
            field("STILL ATTACHED"),
        ],
    );

    let mut parser = test_parser(ParserOptions::new());
    let outcome = parser.parse_file(&input).await.unwrap();
    let stats = &outcome.stats;

    assert_eq!(stats.malformed_records, 4);
    assert_eq!(stats.unknown_records, 1);
    assert!(stats.malformed_details[0].contains("Too short"));
    assert!(stats.malformed_details[1].contains("Invalid record type 'XX'"));
    assert!(stats.malformed_details[2].contains("DAPERMIT too short"));
    assert!(stats.malformed_details[3].contains("GIS_SURFACE too short (9 < 27)"));
    assert_eq!(stats.record_count("99"), 0);

    let permit = &outcome.permits["0100001"];
    assert!(permit.detail.is_none());
    assert!(permit.surface_location.is_none());
    assert_eq!(permit.fields.len(), 1);
}

#[tokio::test]
async fn test_root_with_bad_permit_number_clears_context() {
    let temp_dir = TempDir::new().unwrap();
    let input = write_input(
        temp_dir.path(),
        "badroot.dat",
        &[
            root("0100001", "SMITH"),
            root("01A0002", "BROKEN"),
            field("NOWHERE"),
        ],
    );

    let mut parser = test_parser(ParserOptions::new());
    let outcome = parser.parse_file(&input).await.unwrap();

    assert_eq!(outcome.stats.malformed_records, 1);
    assert_eq!(outcome.stats.orphaned_records, 1);
    assert!(outcome.permits["0100001"].fields.is_empty());
    assert_eq!(outcome.permits.len(), 1);
}

#[tokio::test]
async fn test_truncated_root_orphans_following_children() {
    let temp_dir = TempDir::new().unwrap();
    let input = write_input(
        temp_dir.path(),
        "truncated_root.dat",
        &[
            root("0100001", "SMITH"),
            field("SPRABERRY"),
            "010100".to_string(),
            field("BELONGS_TO_NEXT"),
        ],
    );

    let mut parser = test_parser(ParserOptions::new());
    let outcome = parser.parse_file(&input).await.unwrap();

    assert_eq!(outcome.stats.malformed_records, 1);
    assert_eq!(outcome.stats.orphaned_records, 1);
    assert!(outcome.stats.malformed_details[0].contains("DAROOT too short"));
    let names: Vec<_> = outcome.permits["0100001"]
        .fields
        .iter()
        .filter_map(|f| f.text("field_name"))
        .collect();
    assert_eq!(names, vec!["SPRABERRY"]);
}

#[tokio::test]
async fn test_root_below_global_minimum_clears_context() {
    let temp_dir = TempDir::new().unwrap();
    let input = write_input(
        temp_dir.path(),
        "stub_root.dat",
        &[
            root("0100001", "SMITH"),
            "010".to_string(),
            field("NOWHERE"),
        ],
    );

    let mut parser = test_parser(ParserOptions::new());
    let outcome = parser.parse_file(&input).await.unwrap();

    assert_eq!(outcome.stats.malformed_records, 1);
    assert_eq!(outcome.stats.orphaned_records, 1);
    assert!(outcome.stats.malformed_details[0].contains("Too short"));
    assert!(outcome.permits["0100001"].fields.is_empty());
}

#[tokio::test]
async fn test_placeholder_date_is_null_without_issues() {
    let temp_dir = TempDir::new().unwrap();
    let input = write_input(
        temp_dir.path(),
        "dates.dat",
        &[
            root("0100001", "SMITH"),
            detail("0100001", "123456", "00000000"),
        ],
    );

    let mut parser = test_parser(ParserOptions::new());
    let outcome = parser.parse_file(&input).await.unwrap();

    let detail = outcome.permits["0100001"].detail.clone().unwrap();
    assert_eq!(detail.get("issued_date"), Some(&FieldValue::Null));
    assert!(outcome.validation_report.is_empty());
    assert_eq!(outcome.stats.validation_errors, 0);
    assert_eq!(outcome.stats.validation_warnings, 0);
}

#[tokio::test]
async fn test_coordinates_keep_west_sign_and_scale() {
    let temp_dir = TempDir::new().unwrap();
    let input = write_input(
        temp_dir.path(),
        "gis.dat",
        &[
            root("0100001", "SMITH"),
            surface("-1015000000", "0312500000"),
            surface("-101.7500000", "31.5000000"),
        ],
    );

    let mut parser = test_parser(ParserOptions::new());
    let outcome = parser.parse_file(&input).await.unwrap();

    let location = outcome.permits["0100001"].surface_location.clone().unwrap();
    assert_eq!(location.get("longitude"), Some(&FieldValue::Float(-101.75)));
    assert_eq!(location.get("latitude"), Some(&FieldValue::Float(31.5)));
    assert!(outcome.validation_report.is_empty());
}

#[tokio::test]
async fn test_validation_issues_carry_line_and_permit() {
    let temp_dir = TempDir::new().unwrap();
    let input = write_input(
        temp_dir.path(),
        "issues.dat",
        &[
            root("0100001", "SMITH"),
            detail("", "12A45", "20230101"),
            surface("-101.0000000", "99.0000000"),
        ],
    );

    let mut parser = test_parser(ParserOptions::new());
    let outcome = parser.parse_file(&input).await.unwrap();
    let report = &outcome.validation_report;

    let summary = report.summary();
    assert_eq!(summary.total_warnings, 2);
    assert_eq!(summary.total_errors, 1);
    assert_eq!(outcome.stats.validation_warnings, 2);
    assert_eq!(outcome.stats.validation_errors, 1);

    let required = report.issues(&IssueFilter::new().with_rule("required"));
    assert_eq!(required.len(), 1);
    assert_eq!(required[0].line_number, Some(2));
    assert_eq!(required[0].permit_number.as_deref(), Some("0100001"));

    let latitude = report.issues(
        &IssueFilter::new()
            .with_severity(Severity::Warning)
            .with_field("latitude"),
    );
    assert_eq!(latitude.len(), 1);
    assert_eq!(latitude[0].line_number, Some(3));
    assert_eq!(latitude[0].value, "99.0000000");

    assert_eq!(report.permit_issues("0100001").len(), 3);
    assert_eq!(parser.validator().summary().warning_count, 2);
    assert!(parser.validator().warnings().contains_key("line_2_operator_number"));
}

#[tokio::test]
async fn test_crlf_and_latin1_lines() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("latin1.dat");
    let mut bytes = b"010100001PE\xD1A RANCH   \r\n".to_vec();
    bytes.extend_from_slice(b"03SPRABERRY\r\n");
    std::fs::write(&path, bytes).unwrap();

    let mut parser = test_parser(ParserOptions::new());
    let outcome = parser.parse_file(&path).await.unwrap();

    let permit = &outcome.permits["0100001"];
    assert_eq!(permit.lease_name(), Some("PEÑA RANCH"));
    assert_eq!(permit.fields[0].text("field_name"), Some("SPRABERRY"));
    assert_eq!(outcome.stats.length_range("01"), (19, 19));
}

#[tokio::test]
async fn test_missing_trailing_newline_still_reads_last_line() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("no_newline.dat");
    std::fs::write(&path, format!("{}\n{}", root("0100001", "SMITH"), field("LAST"))).unwrap();

    let mut parser = test_parser(ParserOptions::new());
    let outcome = parser.parse_file(&path).await.unwrap();

    assert_eq!(outcome.stats.lines_processed, 2);
    assert_eq!(outcome.permits["0100001"].fields.len(), 1);
}
