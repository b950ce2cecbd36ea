//! Config command: load a layout and describe it
//!
//! Loading runs the full geometry and rule checks, so this doubles as a
//! validator for hand-edited layout files.

use super::shared::{load_configuration, setup_logging};
use crate::cli::args::ConfigArgs;
use crate::config::Config;
use anyhow::Result;
use colored::*;

pub fn run_config(args: ConfigArgs) -> Result<()> {
    setup_logging(args.get_log_level(), false);

    let config = load_configuration(args.config_file.as_deref())?;
    print!("{}", describe(&config));
    Ok(())
}

fn describe(config: &Config) -> String {
    let summary = config.summary();
    let mut out = String::new();

    out.push_str(&format!("\n{}\n", "Layout".bright_green().bold()));
    out.push_str(&format!(
        "   • Schemas: {}, lookup tables: {}, validator tags: {}\n",
        summary.schemas_count, summary.lookup_tables_count, summary.rules_count
    ));
    out.push_str(&format!(
        "   • min_record_length={} strict_mode={} encoding={:?}\n",
        summary.settings.min_record_length, summary.settings.strict_mode, summary.settings.encoding
    ));

    out.push_str(&format!("\n{}\n", "Record types:".bold()));
    for code in config.schema_codes() {
        let Some(schema) = config.schema(code) else {
            continue;
        };
        let storage = schema.storage_key.map_or("-", |key| key.as_str());
        let min = schema
            .expected_min_length
            .map_or_else(|| "-".to_string(), |n| n.to_string());
        out.push_str(&format!(
            "   {}  {:<16} storage={:<15} min_len={:<4} fields={}\n",
            code,
            schema.name,
            storage,
            min,
            schema.fields.len()
        ));
    }

    if !config.warnings().is_empty() {
        out.push_str(&format!("\n{}\n", "Warnings:".yellow().bold()));
        for warning in config.warnings() {
            out.push_str(&format!("   • {}\n", warning));
        }
    }
    out.push('\n');
    out
}
