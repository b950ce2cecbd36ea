//! Tests for rule evaluation

use super::test_config;
use crate::validation::{Validator, Verdict};

#[test]
fn test_range_violation_is_one_warning() {
    let mut validator = Validator::new(test_config());

    assert!(!validator.validate("latitude", "99.000000", "line_7_latitude"));

    let summary = validator.summary();
    assert_eq!(summary.warning_count, 1);
    assert_eq!(summary.error_count, 0);
    let messages = &summary.warnings_by_context["line_7_latitude"];
    assert_eq!(messages.len(), 1);
    assert!(messages[0].contains("latitude outside Texas latitude bounds: 99"));
}

#[test]
fn test_range_inside_bounds_passes() {
    let mut validator = Validator::new(test_config());

    assert!(validator.validate("latitude", "30.500000", "ctx"));
    assert!(validator.validate("longitude", "-0975000000", "ctx"));
    assert_eq!(validator.summary(), Default::default());
}

#[test]
fn test_range_non_numeric_passes() {
    let validator = Validator::new(test_config());
    assert_eq!(validator.check("latitude", "UNKNOWN"), Verdict::Pass);
}

#[test]
fn test_range_non_finite_is_an_error() {
    let mut validator = Validator::new(test_config());

    let verdict = validator.evaluate("latitude", "1.5e999", "line_3_latitude");
    assert!(matches!(verdict, Verdict::Error(_)));
    assert_eq!(validator.summary().error_count, 1);
    assert_eq!(validator.summary().warning_count, 0);
}

#[test]
fn test_coordinate_digit_overflow_is_an_error() {
    let validator = Validator::new(test_config());
    assert!(matches!(
        validator.check("longitude", "-99999999999999999999"),
        Verdict::Error(_)
    ));
}

#[test]
fn test_operator_number_rules() {
    let mut validator = Validator::new(test_config());

    assert!(!validator.validate("operator_number", "12A45", "a"));
    assert!(validator.validate("operator_number", "123456", "b"));
    assert!(!validator.validate("operator_number", "1234", "c"));
    assert!(!validator.validate("operator_number", "1234567", "d"));

    let summary = validator.summary();
    assert_eq!(summary.warning_count, 3);
    assert_eq!(
        summary.warnings_by_context["a"],
        vec!["Invalid operator number: 12A45".to_string()]
    );
}

#[test]
fn test_lookup_and_flag_rules() {
    let mut validator = Validator::new(test_config());

    assert!(validator.validate("county_code", "001", "ctx"));
    assert!(!validator.validate("county_code", "999", "ctx"));
    assert!(validator.validate("flag", "Y", "ctx"));
    assert!(!validator.validate("flag", "X", "ctx"));

    let messages = &validator.warnings()["ctx"];
    assert_eq!(
        messages,
        &vec![
            "Invalid county_code: 999".to_string(),
            "Invalid flag: X".to_string()
        ]
    );
}

#[test]
fn test_blank_values_always_pass() {
    let mut validator = Validator::new(test_config());

    for tag in ["county_code", "flag", "latitude", "operator_number", "district"] {
        assert!(validator.validate(tag, "", "ctx"), "{} should pass blank", tag);
    }
    assert_eq!(validator.summary().warning_count, 0);
}

#[test]
fn test_placeholder_and_unknown_tags_pass() {
    let validator = Validator::new(test_config());

    assert_eq!(validator.check("district", "ZZ"), Verdict::Pass);
    assert_eq!(validator.check("no_such_tag", "anything"), Verdict::Pass);
}

#[test]
fn test_same_inputs_same_buckets() {
    let inputs = [
        ("latitude", "99.0", "line_1_latitude"),
        ("operator_number", "12A45", "line_2_operator_number"),
        ("county_code", "999", "line_3_county_code"),
        ("latitude", "inf", "line_4_latitude"),
    ];

    let run = || {
        let mut validator = Validator::new(test_config());
        for (tag, value, ctx) in inputs {
            validator.validate(tag, value, ctx);
        }
        validator.summary()
    };

    assert_eq!(run(), run());
}

#[test]
fn test_reset_clears_buckets() {
    let mut validator = Validator::new(test_config());
    validator.validate("flag", "X", "ctx");
    validator.reset();

    assert!(validator.errors().is_empty());
    assert!(validator.warnings().is_empty());
}
