//! Command implementations for the DAF420 processor CLI
//!
//! Each subcommand lives in its own module:
//! - `parse`: stream a file into permits with progress and a final summary
//! - `checkpoints`: inspect or clear saved checkpoints
//! - `layout`: load a configuration and describe its record schemas

pub mod checkpoints;
pub mod layout;
pub mod parse;
pub mod shared;

use crate::cli::args::{Args, Commands};
use anyhow::Result;

/// Dispatch to the handler for the requested subcommand
pub async fn run(args: Args) -> Result<()> {
    match args.get_command() {
        Some(Commands::Parse(parse_args)) => parse::run_parse(parse_args).await,
        Some(Commands::Checkpoints(checkpoint_args)) => {
            checkpoints::run_checkpoints(checkpoint_args).await
        }
        Some(Commands::Config(config_args)) => layout::run_config(config_args),
        None => Ok(()),
    }
}
