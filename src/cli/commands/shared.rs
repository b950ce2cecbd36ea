//! Shared components for CLI commands
//!
//! Logging setup, configuration loading and progress display used by more
//! than one command.

use crate::config::Config;
use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Set up structured logging on stderr
///
/// `RUST_LOG` wins over the verbosity flags when it is set.
pub fn setup_logging(log_level: &str, quiet: bool) {
    use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("daf420_processor={}", log_level)));

    if quiet {
        // Minimal logging for quiet mode
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_level(true)
                    .with_writer(std::io::stderr)
                    .compact(),
            )
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_level(true)
                    .with_timer(fmt::time::uptime())
                    .with_writer(std::io::stderr),
            )
            .init();
    }

    debug!("Logging initialized at level: {}", log_level);
}

/// Load the layout from a file, or the built-in DAF420 layout
pub fn load_configuration(config_file: Option<&Path>) -> Result<Arc<Config>> {
    let config = match config_file {
        Some(path) => {
            info!("Using config file: {}", path.display());
            Config::from_path(path)
                .with_context(|| format!("Failed to load configuration {}", path.display()))?
        }
        None => {
            info!("No config file given, using built-in DAF420 layout");
            Config::daf420().context("Built-in DAF420 layout is invalid")?
        }
    };

    for message in config.warnings() {
        warn!("Configuration: {}", message);
    }

    Ok(Arc::new(config))
}

/// Spinner that counts lines; the total is unknown while streaming
pub fn create_line_progress(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {pos} lines {msg} [{per_sec}]")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ "),
    );
    pb.set_message(message.to_string());
    pb
}

/// Format a byte count in human-readable form
pub fn format_size(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    if unit_index == 0 {
        format!("{} {}", bytes, UNITS[unit_index])
    } else {
        format!("{:.2} {}", size, UNITS[unit_index])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(2048), "2.00 KB");
        assert_eq!(format_size(5 * 1024 * 1024), "5.00 MB");
    }

    #[test]
    fn test_load_builtin_configuration() {
        let config = load_configuration(None).unwrap();
        assert!(config.schema("01").is_some());
    }

    #[test]
    fn test_load_missing_configuration_fails() {
        let temp_dir = TempDir::new().unwrap();
        let missing = temp_dir.path().join("missing.toml");

        let err = load_configuration(Some(missing.as_path())).unwrap_err();
        assert!(format!("{:#}", err).contains("Configuration file not found"));
    }
}
