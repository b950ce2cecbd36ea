//! Parse command implementation
//!
//! Loads the layout, runs one parse with a progress spinner and then writes
//! the optional exports and a summary.

use super::shared::{create_line_progress, load_configuration, setup_logging};
use crate::cli::args::{OutputFormat, ParseArgs};
use crate::error::PermitError;
use crate::processor::{ParseOutcome, PermitParser};
use anyhow::{Context, Result};
use colored::*;
use indicatif::HumanDuration;
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

/// Parse command runner
///
/// 1. Set up logging and load the layout
/// 2. Stream the input through a [`PermitParser`]
/// 3. Write the validation CSV and permit JSON if requested
/// 4. Print the final report
pub async fn run_parse(args: ParseArgs) -> Result<()> {
    let start_time = Instant::now();

    setup_logging(args.get_log_level(), args.quiet);
    info!("Starting DAF420 processor");
    debug!("Command line arguments: {:?}", args);

    args.validate()?;
    let config = load_configuration(args.config_file.as_deref())?;

    let mut parser = PermitParser::new(config, args.parser_options());
    let progress = args
        .show_progress()
        .then(|| create_line_progress("parsing"));
    if let Some(pb) = &progress {
        let pb = pb.clone();
        parser = parser.with_progress_callback(move |line, stats| {
            pb.set_position(line);
            pb.set_message(format!(
                "{} permits, {} malformed",
                stats.successful_permits, stats.malformed_records
            ));
            Ok(())
        });
    }

    let result = parser.parse_file(&args.input).await;
    if let Some(pb) = &progress {
        pb.finish_and_clear();
    }

    let outcome = match result {
        Ok(outcome) => outcome,
        Err(e) => {
            if let PermitError::StrictModeAbort { stats, .. } = &e {
                error!("Parse stopped in strict mode");
                eprintln!("{}", stats.summary());
            }
            return Err(e).with_context(|| format!("Failed to parse {}", args.input.display()));
        }
    };

    if let Some(path) = &args.validation_csv {
        outcome
            .validation_report
            .export_csv(path)
            .with_context(|| format!("Failed to write validation report {}", path.display()))?;
        info!("Validation report written to {}", path.display());
    }

    if let Some(path) = &args.output_json {
        write_permits_json(&outcome, path).await?;
        info!("Permits written to {}", path.display());
    }

    match args.output_format {
        OutputFormat::Human => generate_human_report(&args, &outcome, start_time.elapsed()),
        OutputFormat::Json => generate_json_report(&outcome, start_time.elapsed())?,
    }

    Ok(())
}

async fn write_permits_json(outcome: &ParseOutcome, path: &Path) -> Result<()> {
    let json = serde_json::to_vec_pretty(&outcome.permits).context("Failed to serialize permits")?;
    tokio::fs::write(path, json)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))
}

/// Generate human-readable report
fn generate_human_report(args: &ParseArgs, outcome: &ParseOutcome, elapsed: Duration) {
    if args.quiet {
        return;
    }
    let stats = &outcome.stats;

    println!("\n{}", "DAF420 Parse Complete".bright_green().bold());
    println!("{}", "━".repeat(41));
    println!("   • Input: {}", args.input.display());
    println!(
        "   • Lines processed: {}",
        stats.lines_processed.to_string().bright_white().bold()
    );
    println!(
        "   • Permits: {}",
        stats.successful_permits.to_string().bright_white().bold()
    );
    if stats.malformed_records > 0 {
        println!(
            "   • Malformed lines: {} ({:.2}%)",
            stats.malformed_records.to_string().bright_red().bold(),
            stats.malformed_rate()
        );
    }
    if stats.orphaned_records > 0 {
        println!(
            "   • Orphaned records: {}",
            stats.orphaned_records.to_string().yellow()
        );
    }
    if stats.unknown_records > 0 {
        println!("   • Unknown record types: {}", stats.unknown_records);
    }
    println!("   • Processing time: {}", HumanDuration(elapsed));

    if outcome.resumed_from_checkpoint {
        println!("   • {}", "Resumed from checkpoint".cyan());
    }
    if let Some(info) = outcome.checkpoint_info {
        println!(
            "   • Checkpoints: {} saved, last at line {}",
            info.checkpoints_created, info.last_saved_line
        );
    }

    if !stats.records_by_type.is_empty() {
        println!("\n{}", "Records by type:".bold());
        for (code, count) in &stats.records_by_type {
            let (min, max) = stats.length_range(code);
            println!(
                "   {}  {:>10}  len {}..{} (avg {:.1})",
                code,
                count,
                min,
                max,
                stats.average_length(code)
            );
        }
    }

    let summary = outcome.validation_report.summary();
    if summary.total > 0 {
        let headline = format!(
            "Validation: {} errors, {} warnings",
            summary.total_errors, summary.total_warnings
        );
        if summary.total_errors > 0 {
            println!("\n{}", headline.bright_red().bold());
        } else {
            println!("\n{}", headline.yellow().bold());
        }
        if args.verbose > 0 {
            println!("{}", summary);
        }
    }

    if let Some(report) = &outcome.performance {
        println!("\n{}", "Performance:".bold());
        for (label, timing) in report {
            println!(
                "   {:<20} n={:<10} total={:>10.2}ms avg={:.4}ms min={:.4}ms max={:.4}ms",
                label, timing.count, timing.total_ms, timing.avg_ms, timing.min_ms, timing.max_ms
            );
        }
    }

    println!();
}

/// Generate JSON report for machine consumption
fn generate_json_report(outcome: &ParseOutcome, elapsed: Duration) -> Result<()> {
    let report = serde_json::json!({
        "stats": outcome.stats,
        "validation": outcome.validation_report.summary(),
        "performance": outcome.performance,
        "resumed_from_checkpoint": outcome.resumed_from_checkpoint,
        "checkpoint_info": outcome.checkpoint_info.map(|info| serde_json::json!({
            "last_saved_line": info.last_saved_line,
            "checkpoints_created": info.checkpoints_created,
        })),
        "processing_time_seconds": elapsed.as_secs_f64(),
    });

    println!(
        "{}",
        serde_json::to_string_pretty(&report).context("Failed to serialize report")?
    );
    Ok(())
}
