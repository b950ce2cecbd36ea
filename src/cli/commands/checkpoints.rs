//! Checkpoints command: show or clear saved parser checkpoints

use super::shared::{format_size, setup_logging};
use crate::cli::args::{CheckpointAction, CheckpointArgs};
use crate::processor::{CheckpointManager, CheckpointStatus};
use anyhow::{Context, Result};
use colored::*;
use std::path::Path;

pub async fn run_checkpoints(args: CheckpointArgs) -> Result<()> {
    setup_logging(args.get_log_level(), false);

    let mut manager = CheckpointManager::new(args.checkpoints.options());
    let dir = args.checkpoints.dir.as_path();

    match args.action {
        CheckpointAction::Status => {
            let status = manager
                .info()
                .await
                .with_context(|| format!("Failed to list checkpoints in {}", dir.display()))?;
            print_status(dir, &status);
        }
        CheckpointAction::Clear => {
            let removed = manager
                .clear()
                .await
                .with_context(|| format!("Failed to clear checkpoints in {}", dir.display()))?;
            println!(
                "Removed {} checkpoint(s) from {}",
                removed.to_string().bright_white().bold(),
                dir.display()
            );
        }
    }

    Ok(())
}

fn print_status(dir: &Path, status: &CheckpointStatus) {
    if status.count == 0 {
        println!("No checkpoints in {}", dir.display());
        return;
    }

    println!("\n{}", "Checkpoints".bright_green().bold());
    println!("   • Directory: {}", dir.display());
    println!(
        "   • Files: {} ({})",
        status.count.to_string().bright_white().bold(),
        format_size(status.total_bytes)
    );
    if let Some(line) = status.newest_line {
        println!("   • Newest covers line {}", line);
    }
    if let Some(timestamp) = status.newest_timestamp {
        println!("   • Saved at {}", timestamp.to_rfc3339());
    }
    println!();
}
