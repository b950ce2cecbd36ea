//! Tests for the validation module

pub mod validator_tests;

use std::sync::Arc;

use crate::config::Config;

/// Small configuration with one of each rule kind
pub fn test_config() -> Arc<Config> {
    let toml = r#"
[schemas."01"]
name = "DAROOT"
storage_key = "daroot"
fields = [
    { name = "permit_number", start = 2, end = 9, required = true },
    { name = "county_code", start = 9, end = 12, validator = "county_code" },
    { name = "operator_number", start = 12, end = 18, validator = "operator_number" },
    { name = "horizontal_flag", start = 18, end = 19, validator = "flag" },
    { name = "district", start = 19, end = 21, validator = "district" },
]

[schemas."14"]
name = "GIS_SURFACE"
storage_key = "gis_surface"
fields = [
    { name = "longitude", start = 3, end = 15, type = "float", validator = "longitude" },
    { name = "latitude", start = 16, end = 27, type = "float", validator = "latitude" },
]

[lookup_tables.county_codes]
"001" = "ANDERSON"
"003" = "ANDREWS"

[validation.ranges.latitude]
min = 25.0
max = 37.0
description = "Texas latitude bounds"

[validation.ranges.longitude]
min = -107.0
max = -93.0
description = "Texas longitude bounds"

[validation.flags]
valid_values = ["Y", "N"]

[validation.operator_number]
numeric_only = true
min_length = 5
max_length = 6
"#;
    Arc::new(Config::from_toml_str(toml).expect("test config should load"))
}
