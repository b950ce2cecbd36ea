//! Field parsing utilities for DAF420 records
//!
//! Helpers that turn trimmed fixed-width slices into typed values. None of
//! these fail on placeholder data: blank, all-zero and otherwise invalid values
//! decode to `None` so a bad historical record never stops a run.

use chrono::NaiveDate;
use thiserror::Error;

use crate::constants::validators::{COORDINATE_SCALE, LATITUDE, LONGITUDE};
use crate::models::FieldValue;
use crate::schema::{FieldSpec, FieldType};

/// A value that looked numeric but cannot be used as a number
#[derive(Error, Debug, Clone, PartialEq)]
pub enum NumericError {
    #[error("value is not a finite number")]
    NonFinite,

    #[error("coordinate digits exceed the supported range")]
    CoordinateOverflow,
}

/// True for validator tags whose values follow coordinate conventions
pub fn is_coordinate_tag(tag: &str) -> bool {
    tag == LATITUDE || tag == LONGITUDE
}

/// Parse an 8-digit `YYYYMMDD` date; placeholders and impossible dates give `None`
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    let trimmed = value.trim();
    if trimmed.len() != 8 || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    let year: i32 = trimmed[0..4].parse().ok()?;
    let month: u32 = trimmed[4..6].parse().ok()?;
    let day: u32 = trimmed[6..8].parse().ok()?;

    if year == 0 {
        return None;
    }
    NaiveDate::from_ymd_opt(year, month, day)
}

pub fn parse_int(value: &str) -> Option<i64> {
    let trimmed = value.trim();
    let unsigned = trimmed.strip_prefix('+').unwrap_or(trimmed);
    unsigned.parse::<i64>().ok()
}

/// Parse a finite float; anything else is `None`
pub fn parse_float(value: &str) -> Option<f64> {
    value
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
}

/// Parse a value for numeric rule checks.
///
/// `Ok(None)` means "not a number" (blank or placeholder text) and is not an
/// error. For coordinate tags a digit string without a decimal point carries
/// seven implied decimals and keeps its sign.
pub fn parse_numeric(value: &str, tag: &str) -> Result<Option<f64>, NumericError> {
    let cleaned: String = value.trim().chars().filter(|&c| c != '+').collect();
    if cleaned.is_empty() {
        return Ok(None);
    }

    if is_coordinate_tag(tag) && !cleaned.contains('.') {
        let (sign, digits) = match cleaned.strip_prefix('-') {
            Some(rest) => (-1.0, rest),
            None => (1.0, cleaned.as_str()),
        };
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Ok(None);
        }
        let scaled = digits
            .parse::<i64>()
            .map_err(|_| NumericError::CoordinateOverflow)?;
        return Ok(Some(sign * (scaled as f64 / COORDINATE_SCALE)));
    }

    match cleaned.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(Some(v)),
        Ok(_) => Err(NumericError::NonFinite),
        Err(_) => Ok(None),
    }
}

/// Parse a latitude/longitude, preserving negative (west) values
pub fn parse_coordinate(value: &str) -> Option<f64> {
    parse_numeric(value, LONGITUDE).ok().flatten()
}

/// Decode one extracted slice according to its field spec.
///
/// Coordinates are chosen by validator tag, not declared type. Numbers that do
/// not parse are kept as text so validation sees the original value.
pub fn decode_value(spec: &FieldSpec, raw: &str) -> FieldValue {
    if spec.validator.as_deref().is_some_and(is_coordinate_tag) {
        return match parse_coordinate(raw) {
            Some(v) => FieldValue::Float(v),
            None if raw.is_empty() => FieldValue::Null,
            None => FieldValue::Text(raw.to_string()),
        };
    }

    match spec.field_type {
        FieldType::String => FieldValue::Text(raw.to_string()),
        FieldType::Date => parse_date(raw).map_or(FieldValue::Null, FieldValue::Date),
        FieldType::Int => match parse_int(raw) {
            Some(v) => FieldValue::Int(v),
            None if raw.is_empty() => FieldValue::Null,
            None => FieldValue::Text(raw.to_string()),
        },
        FieldType::Float => match parse_float(raw) {
            Some(v) => FieldValue::Float(v),
            None if raw.is_empty() => FieldValue::Null,
            None => FieldValue::Text(raw.to_string()),
        },
    }
}
