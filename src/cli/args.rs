//! Command-line argument definitions for the DAF420 processor
//!
//! This module defines the complete CLI interface using the clap derive API.

use crate::constants::DEFAULT_PROGRESS_INTERVAL;
use crate::constants::checkpoint::{
    DEFAULT_BASE_NAME, DEFAULT_DIR, DEFAULT_INTERVAL, DEFAULT_MAX_CHECKPOINTS,
};
use crate::error::{PermitError, Result};
use crate::processor::{CheckpointOptions, ParserOptions};
use clap::{Args as ClapArgs, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// CLI arguments for the DAF420 permit processor
///
/// Parses Texas RRC DAF420 fixed-width drilling permit files into
/// validated permit aggregates.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "daf420-processor",
    version,
    about = "Parse Texas RRC DAF420 fixed-width drilling permit files",
    long_about = "Streams a DAF420 permit dump one line at a time, rebuilds each permit from its \
                  root, detail and child segments, validates extracted values against the \
                  configured lookup tables and ranges, and checkpoints progress so that a run \
                  over a multi-gigabyte file can resume after a crash."
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands
#[derive(Debug, Clone, Subcommand)]
pub enum Commands {
    /// Parse a DAF420 file into permits (main command)
    Parse(ParseArgs),
    /// Inspect or clear saved checkpoints
    Checkpoints(CheckpointArgs),
    /// Load a layout configuration and report what it defines
    Config(ConfigArgs),
}

/// Arguments for the parse command
#[derive(Debug, Clone, Parser)]
pub struct ParseArgs {
    /// DAF420 input file
    #[arg(value_name = "INPUT", help = "DAF420 input file to parse")]
    pub input: PathBuf,

    /// Path to a layout configuration file
    ///
    /// TOML file with settings, record schemas, lookup tables and validation
    /// rules. If not specified, the built-in DAF420 layout is used.
    #[arg(
        short = 'c',
        long = "config",
        value_name = "FILE",
        help = "Path to layout configuration file (TOML format)"
    )]
    pub config_file: Option<PathBuf>,

    /// Abort on the first malformed line
    ///
    /// Overrides `settings.strict_mode` from the configuration. A checkpoint
    /// is flushed before aborting so the run can be inspected or resumed.
    #[arg(long = "strict", help = "Abort on the first malformed line")]
    pub strict: bool,

    /// Record per-stage timings and print them at the end
    #[arg(long = "perf", help = "Collect and print performance timings")]
    pub performance: bool,

    #[command(flatten)]
    pub checkpoints: CheckpointFlags,

    /// Resume from the newest checkpoint matching this input
    ///
    /// The checkpoint must match the input path and content hash; otherwise
    /// the parse starts from the beginning.
    #[arg(long = "resume", help = "Resume from the newest matching checkpoint")]
    pub resume: bool,

    /// Delete checkpoint files once a resumed parse completes
    #[arg(
        long = "clear-checkpoints",
        requires = "resume",
        help = "Delete checkpoints after a resumed parse completes"
    )]
    pub clear_checkpoints: bool,

    /// Progress update cadence in lines
    #[arg(
        long = "progress-interval",
        value_name = "LINES",
        default_value_t = DEFAULT_PROGRESS_INTERVAL,
        help = "Update progress every N lines"
    )]
    pub progress_interval: u64,

    /// Write every validation issue to a CSV file
    #[arg(
        long = "validation-csv",
        value_name = "FILE",
        help = "Export validation issues to CSV"
    )]
    pub validation_csv: Option<PathBuf>,

    /// Write the permit map as pretty JSON
    #[arg(
        short = 'o',
        long = "output-json",
        value_name = "FILE",
        help = "Write parsed permits to a JSON file"
    )]
    pub output_json: Option<PathBuf>,

    /// Output format for the final summary
    #[arg(
        long = "output-format",
        value_enum,
        default_value = "human",
        help = "Output format for results"
    )]
    pub output_format: OutputFormat,

    /// Logging verbosity level
    #[arg(
        short = 'v',
        long = "verbose",
        action = clap::ArgAction::Count,
        help = "Increase logging verbosity (-v: info, -vv: debug, -vvv: trace)"
    )]
    pub verbose: u8,

    /// Suppress output (quiet mode)
    ///
    /// Only show errors. Overrides verbose settings and hides the progress bar.
    #[arg(
        short = 'q',
        long = "quiet",
        help = "Suppress output except errors",
        conflicts_with = "verbose"
    )]
    pub quiet: bool,
}

/// Checkpoint location and cadence, shared by `parse` and `checkpoints`
#[derive(Debug, Clone, ClapArgs)]
pub struct CheckpointFlags {
    #[arg(
        long = "checkpoint-dir",
        value_name = "DIR",
        default_value = DEFAULT_DIR,
        help = "Directory for checkpoint files"
    )]
    pub dir: PathBuf,

    #[arg(
        long = "checkpoint-name",
        value_name = "NAME",
        default_value = DEFAULT_BASE_NAME,
        help = "File name prefix for checkpoint files"
    )]
    pub base_name: String,

    #[arg(
        long = "checkpoint-interval",
        value_name = "LINES",
        default_value_t = DEFAULT_INTERVAL,
        help = "Save a checkpoint every N lines"
    )]
    pub interval: u64,

    #[arg(
        long = "max-checkpoints",
        value_name = "COUNT",
        default_value_t = DEFAULT_MAX_CHECKPOINTS,
        help = "Number of checkpoint files to keep"
    )]
    pub max_checkpoints: usize,

    /// Skip hashing the input; resume then only checks the path
    #[arg(long = "no-verify-hash", help = "Do not verify the input hash on resume")]
    pub no_verify_hash: bool,

    #[arg(long = "no-checkpoints", help = "Disable checkpointing")]
    pub disabled: bool,
}

/// Arguments for the checkpoints command
#[derive(Debug, Clone, Parser)]
pub struct CheckpointArgs {
    #[arg(value_enum, default_value = "status", help = "What to do with saved checkpoints")]
    pub action: CheckpointAction,

    #[command(flatten)]
    pub checkpoints: CheckpointFlags,

    #[arg(
        short = 'v',
        long = "verbose",
        action = clap::ArgAction::Count,
        help = "Enable verbose logging (-v: info, -vv: debug, -vvv: trace)"
    )]
    pub verbose: u8,
}

/// Checkpoint maintenance actions
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CheckpointAction {
    /// Show how many checkpoints exist and the newest one
    Status,
    /// Delete every checkpoint file with the configured prefix
    Clear,
}

/// Arguments for the config command
#[derive(Debug, Clone, Parser)]
pub struct ConfigArgs {
    /// Configuration to inspect; the built-in layout if omitted
    #[arg(
        short = 'c',
        long = "config",
        value_name = "FILE",
        help = "Path to layout configuration file (TOML format)"
    )]
    pub config_file: Option<PathBuf>,

    #[arg(
        short = 'v',
        long = "verbose",
        action = clap::ArgAction::Count,
        help = "Enable verbose logging (-v: info, -vv: debug, -vvv: trace)"
    )]
    pub verbose: u8,
}

/// Output format options for the final summary
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable output
    Human,
    /// JSON format for scripting
    Json,
}

impl Args {
    /// Get the command if one was specified
    pub fn get_command(&self) -> Option<Commands> {
        self.command.clone()
    }
}

impl ParseArgs {
    /// Validate the parse command arguments for consistency
    pub fn validate(&self) -> Result<()> {
        if !self.input.is_file() {
            return Err(PermitError::InputNotFound {
                path: self.input.clone(),
            });
        }

        if let Some(config_file) = &self.config_file {
            if !config_file.exists() {
                return Err(PermitError::configuration(format!(
                    "Config file does not exist: {}",
                    config_file.display()
                )));
            }
        }

        if self.resume && self.checkpoints.disabled {
            return Err(PermitError::configuration(
                "--resume cannot be combined with --no-checkpoints",
            ));
        }

        if self.checkpoints.interval == 0 {
            return Err(PermitError::configuration(
                "Checkpoint interval must be greater than 0",
            ));
        }

        Ok(())
    }

    /// Get log level based on verbosity settings
    pub fn get_log_level(&self) -> &'static str {
        if self.quiet {
            "error"
        } else {
            match self.verbose {
                0 => "warn",
                1 => "info",
                2 => "debug",
                _ => "trace",
            }
        }
    }

    /// Check if we should show progress bars (not in quiet mode)
    pub fn show_progress(&self) -> bool {
        !self.quiet && self.output_format == OutputFormat::Human
    }

    /// Translate flags into parser options
    pub fn parser_options(&self) -> ParserOptions {
        let mut options = ParserOptions::new()
            .with_performance_monitoring(self.performance)
            .with_resume(self.resume)
            .with_clear_checkpoints_on_success(self.clear_checkpoints)
            .with_progress_interval(self.progress_interval);

        // Only override the configured strict mode when asked to
        if self.strict {
            options = options.with_strict_mode(true);
        }
        if !self.checkpoints.disabled {
            options = options.with_checkpoints(self.checkpoints.options());
        }
        options
    }
}

impl CheckpointFlags {
    pub fn options(&self) -> CheckpointOptions {
        let options = CheckpointOptions::new()
            .with_dir(self.dir.clone())
            .with_base_name(self.base_name.clone())
            .with_interval(self.interval)
            .with_max_checkpoints(self.max_checkpoints)
            .with_verify_hash(!self.no_verify_hash);
        if self.disabled {
            options.disabled()
        } else {
            options
        }
    }
}

impl CheckpointArgs {
    pub fn get_log_level(&self) -> &'static str {
        verbosity_level(self.verbose)
    }
}

impl ConfigArgs {
    pub fn get_log_level(&self) -> &'static str {
        verbosity_level(self.verbose)
    }
}

fn verbosity_level(verbose: u8) -> &'static str {
    match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_help_renders_without_subcommand() {
        let args = Args::try_parse_from(["daf420-processor"]).unwrap();
        assert!(args.command.is_none());

        let mut command = Args::command();
        command.clone().debug_assert();
        let help = command.render_help().to_string();
        assert!(help.contains("parse"));
        assert!(help.contains("checkpoints"));
    }

    #[test]
    fn test_parse_defaults() {
        let args = Args::try_parse_from(["daf420-processor", "parse", "permits.dat"]).unwrap();
        let Some(Commands::Parse(parse)) = args.get_command() else {
            panic!("expected parse command");
        };

        assert_eq!(parse.input, PathBuf::from("permits.dat"));
        assert_eq!(parse.get_log_level(), "warn");
        assert!(parse.show_progress());

        let options = parse.parser_options();
        assert_eq!(options.strict_mode, None);
        assert!(!options.resume);
        let checkpoints = options.checkpoints.unwrap();
        assert_eq!(checkpoints.interval, DEFAULT_INTERVAL);
        assert_eq!(checkpoints.dir, PathBuf::from(DEFAULT_DIR));
        assert!(checkpoints.verify_hash);
    }

    #[test]
    fn test_parse_flags_map_to_options() {
        let args = Args::try_parse_from([
            "daf420-processor",
            "parse",
            "permits.dat",
            "--strict",
            "--perf",
            "--resume",
            "--clear-checkpoints",
            "--checkpoint-interval",
            "500",
            "--max-checkpoints",
            "5",
            "--no-verify-hash",
            "-vv",
        ])
        .unwrap();
        let Some(Commands::Parse(parse)) = args.get_command() else {
            panic!("expected parse command");
        };

        assert_eq!(parse.get_log_level(), "debug");
        let options = parse.parser_options();
        assert_eq!(options.strict_mode, Some(true));
        assert!(options.performance_monitoring);
        assert!(options.clear_checkpoints_on_success);
        let checkpoints = options.checkpoints.unwrap();
        assert_eq!(checkpoints.interval, 500);
        assert_eq!(checkpoints.max_checkpoints, 5);
        assert!(!checkpoints.verify_hash);
    }

    #[test]
    fn test_no_checkpoints_drops_manager() {
        let args = Args::try_parse_from([
            "daf420-processor",
            "parse",
            "permits.dat",
            "--no-checkpoints",
            "-q",
        ])
        .unwrap();
        let Some(Commands::Parse(parse)) = args.get_command() else {
            panic!("expected parse command");
        };

        assert!(parse.parser_options().checkpoints.is_none());
        assert_eq!(parse.get_log_level(), "error");
        assert!(!parse.show_progress());
    }

    #[test]
    fn test_clear_requires_resume() {
        let result = Args::try_parse_from([
            "daf420-processor",
            "parse",
            "permits.dat",
            "--clear-checkpoints",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_rejects_missing_input() {
        let args = Args::try_parse_from(["daf420-processor", "parse", "/no/such/file.dat"]).unwrap();
        let Some(Commands::Parse(parse)) = args.get_command() else {
            panic!("expected parse command");
        };

        assert!(matches!(
            parse.validate(),
            Err(PermitError::InputNotFound { .. })
        ));
    }

    #[test]
    fn test_checkpoints_command_defaults_to_status() {
        let args = Args::try_parse_from(["daf420-processor", "checkpoints"]).unwrap();
        let Some(Commands::Checkpoints(checkpoints)) = args.get_command() else {
            panic!("expected checkpoints command");
        };
        assert_eq!(checkpoints.action, CheckpointAction::Status);
    }
}
