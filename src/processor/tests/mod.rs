//! Tests for the permit parser
//!
//! Uses a compact layout so test lines stay readable. Builders below pad
//! values into the right columns.

pub mod state_machine_tests;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::Config;
use crate::processor::{CheckpointOptions, ParserOptions, PermitParser};

pub const TEST_LAYOUT: &str = r#"
[settings]
min_record_length = 4

[schemas."01"]
name = "DAROOT"
expected_min_length = 9
storage_key = "daroot"
fields = [
    { name = "permit_number", start = 2, end = 9, required = true },
    { name = "lease_name", start = 9, end = 20 },
]

[schemas."02"]
name = "DAPERMIT"
expected_min_length = 9
storage_key = "dapermit"
fields = [
    { name = "permit_number", start = 2, end = 9, required = true },
    { name = "operator_number", start = 9, end = 15, validator = "operator_number" },
    { name = "issued_date", start = 15, end = 23, type = "date" },
]

[schemas."03"]
name = "DAFIELD"
storage_key = "dafield"
fields = [{ name = "field_name", start = 2, end = 20 }]

[schemas."08"]
name = "DAREMARKS"
storage_key = "daremarks"
fields = [{ name = "remark", start = 2, end = 40 }]

[schemas."14"]
name = "GIS_SURFACE"
expected_min_length = 27
storage_key = "gis_surface"
fields = [
    { name = "longitude", start = 3, end = 15, type = "float", validator = "longitude" },
    { name = "latitude", start = 16, end = 27, type = "float", validator = "latitude" },
]

[validation.ranges.latitude]
min = 25.0
max = 37.0
description = "Texas latitude range"

[validation.ranges.longitude]
min = -107.0
max = -93.0
description = "Texas longitude range"

[validation.operator_number]
numeric_only = true
min_length = 5
max_length = 6
"#;

pub fn test_config() -> Arc<Config> {
    Arc::new(Config::from_toml_str(TEST_LAYOUT).expect("test layout should load"))
}

pub fn test_parser(options: ParserOptions) -> PermitParser {
    PermitParser::new(test_config(), options)
}

/// Options that checkpoint into `dir` every `interval` lines, keeping everything
pub fn checkpointing(dir: &Path, interval: u64) -> ParserOptions {
    ParserOptions::new().with_checkpoints(
        CheckpointOptions::new()
            .with_dir(dir)
            .with_interval(interval)
            .with_max_checkpoints(100),
    )
}

pub fn root(permit: &str, lease: &str) -> String {
    format!("01{:<7}{}", permit, lease)
}

pub fn detail(permit: &str, operator: &str, issued: &str) -> String {
    format!("02{:<7}{:<6}{}", permit, operator, issued)
}

pub fn field(name: &str) -> String {
    format!("03{}", name)
}

pub fn remark(text: &str) -> String {
    format!("08{}", text)
}

pub fn surface(longitude: &str, latitude: &str) -> String {
    format!("14 {:>12} {:>11}", longitude, latitude)
}

/// Write lines with `\n` terminators
pub fn write_input(dir: &Path, name: &str, lines: &[String]) -> PathBuf {
    let path = dir.join(name);
    let mut content = lines.join("\n");
    content.push('\n');
    std::fs::write(&path, content).unwrap();
    path
}

/// Checkpoint file names in `dir`, sorted
pub fn checkpoint_files(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = match std::fs::read_dir(dir) {
        Ok(entries) => entries
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .filter(|n| n.ends_with(".json"))
            .collect(),
        Err(_) => Vec::new(),
    };
    names.sort();
    names
}

/// Two permits with children; line 3 is in the middle of the first permit
pub fn two_permit_file() -> Vec<String> {
    vec![
        root("0100001", "SMITH"),
        detail("0100001", "123456", "20230115"),
        field("SPRABERRY"),
        field("WOLFCAMP"),
        remark("FIRST REMARK"),
        surface("-101.5000000", "31.2500000"),
        root("0100002", "JONES"),
        detail("", "54321", "00000000"),
        field("PERMIAN"),
        remark("SECOND REMARK"),
    ]
}
